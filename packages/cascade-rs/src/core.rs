//! Core types for the cascade dispatcher.
//!
//! # Overview
//!
//! - [`Event`] = any `Clone + 'static` payload that can be raised
//! - [`Identity`] = the key type used to address targeted events
//! - [`ListenerId`] / [`Subscription`] = handles to a registered listener
//! - [`RaiseOutcome`] = what a raise actually did
//!
//! Listeners are plain closures wrapped in a [`Handler`]. Every invocation
//! receives the event by exclusive reference, so a listener can modify the
//! payload before lower-priority listeners see it, and a reference to the bus
//! so it can subscribe, unsubscribe, raise, or consume without capturing the
//! bus itself.

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::engine::EventBus;

/// Marker trait for events that can be raised on an [`EventBus`].
///
/// Implemented automatically for every `Clone + 'static` type. `Clone` is
/// required because a raise issued while the bus is already dispatching is
/// copied into the deferred queue.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug, Clone)]
/// struct Damaged {
///     amount: u32,
/// }
/// // Event auto-impl by blanket
/// ```
pub trait Event: Clone + 'static {}

impl<T: Clone + 'static> Event for T {}

/// Identity used to key per-target and per-source registries.
///
/// Equality must be total (reflexive, symmetric, transitive) and consistent
/// with `Hash`. One value, [`Identity::unaddressed`], is the sentinel for
/// "no specific target/source": listeners can never be registered against it
/// through the targeted entry points.
pub trait Identity: Clone + Eq + Hash + fmt::Debug + 'static {
    /// The sentinel value meaning "not addressed to anything".
    fn unaddressed() -> Self;

    /// Returns true if this is the sentinel value.
    fn is_unaddressed(&self) -> bool {
        *self == Self::unaddressed()
    }
}

/// Identity for buses that never address events.
///
/// Its only value is the sentinel, so a bus parameterised with `NoAddress`
/// only ever dispatches through its global registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NoAddress;

impl Identity for NoAddress {
    fn unaddressed() -> Self {
        NoAddress
    }
}

impl<T> Identity for Option<T>
where
    T: Clone + Eq + Hash + fmt::Debug + 'static,
{
    fn unaddressed() -> Self {
        None
    }

    fn is_unaddressed(&self) -> bool {
        self.is_none()
    }
}

/// Opaque handle to a host object (scene node, entity, widget...).
///
/// `ObjectId::NONE` (raw value `0`) is the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Sentinel value for "no object".
    pub const NONE: Self = Self(0);

    /// Wrap a raw host handle.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw handle value.
    pub fn get(self) -> u64 {
        self.0
    }

    /// Check if this is the NONE sentinel value.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for ObjectId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "object#{}", self.0)
    }
}

impl Identity for ObjectId {
    fn unaddressed() -> Self {
        Self::NONE
    }

    fn is_unaddressed(&self) -> bool {
        self.is_none()
    }
}

/// Listener priority. Higher values run first.
pub type Priority = f32;

/// Returns true if `a` strictly outranks `b`.
///
/// Uses the IEEE total order so a NaN priority has a fixed place instead of
/// breaking the sorted-registry invariant.
pub(crate) fn outranks(a: Priority, b: Priority) -> bool {
    a.total_cmp(&b) == Ordering::Greater
}

/// Bus-unique identifier of one registration.
///
/// Two registrations of the same closure get distinct ids; listener equality
/// inside a registry is id equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A listener callback.
///
/// Returning `Err` (or panicking) is a listener fault: it is reported to the
/// bus's failure sink and dispatch continues with the next listener.
pub type Handler<E, K = NoAddress> = Rc<dyn Fn(&mut E, &EventBus<K>) -> anyhow::Result<()>>;

/// Which registry a subscription lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope<K> {
    /// The global (unaddressed) registry of the event type.
    Global,
    /// The registry of events raised at a specific target.
    Target(K),
    /// The registry of events raised by a specific source.
    Source(K),
}

/// Handle returned by the subscribe methods.
///
/// Pass it to [`EventBus::unsubscribe`] to remove the listener. Dropping the
/// handle does not unsubscribe.
pub struct Subscription<E, K = NoAddress> {
    id: ListenerId,
    priority: Priority,
    scope: Scope<K>,
    _event: PhantomData<fn() -> E>,
}

impl<E, K> Subscription<E, K> {
    pub(crate) fn new(id: ListenerId, priority: Priority, scope: Scope<K>) -> Self {
        Self {
            id,
            priority,
            scope,
            _event: PhantomData,
        }
    }

    /// The listener's id.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// The priority the listener was registered with.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// The registry the listener was registered in.
    pub fn scope(&self) -> &Scope<K> {
        &self.scope
    }
}

impl<E, K: Clone> Clone for Subscription<E, K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            scope: self.scope.clone(),
            _event: PhantomData,
        }
    }
}

impl<E, K: fmt::Debug> fmt::Debug for Subscription<E, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("event_type", &std::any::type_name::<E>())
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("scope", &self.scope)
            .finish()
    }
}

/// What a call to one of the raise methods did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseOutcome {
    /// Every resolved listener ran.
    Delivered,
    /// A listener consumed the event and the remaining listeners were skipped.
    Consumed,
    /// The bus was already dispatching; the event was queued and will be
    /// dispatched once the outermost raise finishes.
    Deferred,
}

impl RaiseOutcome {
    /// Returns true if dispatch was halted by consumption.
    pub fn is_consumed(self) -> bool {
        matches!(self, RaiseOutcome::Consumed)
    }

    /// Returns true if the event was queued instead of dispatched.
    pub fn is_deferred(self) -> bool {
        matches!(self, RaiseOutcome::Deferred)
    }
}
