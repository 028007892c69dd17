//! The event bus: per-type registries plus the reentrant raise engine.
//!
//! ```text
//! raise(e) ──► idle? ──yes──► raise_immediately(e)
//!                │                 │ depth += 1
//!                no                ▼
//!                │           Walk(global[, target][, source])
//!                ▼                 │ invoke listeners in priority order
//!        deferred queue            │ stop early if consumed at this depth
//!                ▲                 ▼
//!                │           depth -= 1 ── back to 0? ──► drain queue (FIFO)
//!                └───────── raises made while draining ◄──┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cascade::{EventBus, ObjectId};
//!
//! #[derive(Debug, Clone)]
//! struct Damaged { amount: u32 }
//!
//! let bus = EventBus::<ObjectId>::default();
//! let hero = ObjectId::new(1);
//!
//! // Global listener: sees every Damaged event.
//! bus.subscribe(0.0, |e: &mut Damaged, _bus| {
//!     println!("someone took {} damage", e.amount);
//!     Ok(())
//! });
//!
//! // Armor runs first and may rewrite the payload or stop propagation.
//! bus.subscribe_target(&hero, 100.0, |e: &mut Damaged, bus| {
//!     e.amount /= 2;
//!     if e.amount == 0 {
//!         bus.consume_current_event()?;
//!     }
//!     Ok(())
//! });
//!
//! bus.raise_targeted(&mut Damaged { amount: 10 }, &hero, &ObjectId::NONE);
//! ```
//!
//! # Reentrancy
//!
//! Listeners receive `&EventBus` and may subscribe, unsubscribe, and raise at
//! any time. `raise` from inside a listener is queued and dispatched after
//! the outermost raise finishes; `raise_immediately` dispatches right away at
//! the next recursion depth. Each depth has its own consumption flag.
//!
//! The bus is single-threaded by construction (`!Send`, `!Sync`).

use std::any::{type_name, Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::config::BusConfig;
use crate::core::{
    Event, Handler, Identity, ListenerId, NoAddress, Priority, RaiseOutcome, Scope, Subscription,
};
use crate::dispatch::{SharedRegistry, Walk};
use crate::error::{panic_message, BusError, FailureSink, FaultKind, ListenerFault, TracingSink};
use crate::pool::Pool;
use crate::registry::{Listener, Registry};
use crate::stats::{BusStats, Counters};

// =============================================================================
// Per-Type Tables
// =============================================================================

/// Which keyed registry map an addressed listener lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Target,
    Source,
}

impl Side {
    fn scope<K>(self, key: K) -> Scope<K> {
        match self {
            Side::Target => Scope::Target(key),
            Side::Source => Scope::Source(key),
        }
    }
}

type KeyedRegistries<E, K> = RefCell<HashMap<K, SharedRegistry<E, K>>>;

/// Everything the bus keeps for one event type.
struct Table<E, K> {
    global: SharedRegistry<E, K>,
    targets: KeyedRegistries<E, K>,
    sources: KeyedRegistries<E, K>,
    walks: RefCell<Pool<Walk<E, K>>>,
    holders: RefCell<Pool<Box<Queued<E, K>>>>,
}

impl<E: Event, K: Identity> Table<E, K> {
    fn new(pool_capacity: usize) -> Self {
        Self {
            global: Rc::new(RefCell::new(Registry::new())),
            targets: RefCell::new(HashMap::new()),
            sources: RefCell::new(HashMap::new()),
            walks: RefCell::new(Pool::new(pool_capacity)),
            holders: RefCell::new(Pool::new(pool_capacity)),
        }
    }

    fn keyed(&self, side: Side) -> &KeyedRegistries<E, K> {
        match side {
            Side::Target => &self.targets,
            Side::Source => &self.sources,
        }
    }

    /// The registry for `key`, if it has any listeners.
    fn registry_for(&self, side: Side, key: &K) -> Option<SharedRegistry<E, K>> {
        if key.is_unaddressed() {
            return None;
        }
        self.keyed(side).borrow().get(key).cloned()
    }

    /// Insert into the registry for `key`, creating it on first use.
    fn insert_keyed(&self, side: Side, key: &K, listener: Listener<E, K>) -> usize {
        let registry = self
            .keyed(side)
            .borrow_mut()
            .entry(key.clone())
            .or_insert_with(|| Rc::new(RefCell::new(Registry::new())))
            .clone();
        let mut registry = registry.borrow_mut();
        registry.insert(listener)
    }

    /// Remove matching listeners for `key`, dropping the registry once it is
    /// empty and no walk is iterating it.
    fn remove_keyed(
        &self,
        side: Side,
        key: &K,
        predicate: impl FnMut(&Listener<E, K>) -> bool,
    ) -> usize {
        let mut registries = self.keyed(side).borrow_mut();
        let Some(registry) = registries.get(key) else {
            return 0;
        };
        let removed = registry.borrow_mut().remove_where(predicate);
        if Self::is_idle_and_empty(registry) {
            registries.remove(key);
        }
        removed
    }

    /// Drop the registry for `key` if it was emptied during a walk that has
    /// since finished.
    fn prune(&self, side: Side, key: &K) {
        if key.is_unaddressed() {
            return;
        }
        let mut registries = self.keyed(side).borrow_mut();
        if registries.get(key).is_some_and(Self::is_idle_and_empty) {
            registries.remove(key);
        }
    }

    fn is_idle_and_empty(registry: &SharedRegistry<E, K>) -> bool {
        let registry = registry.borrow();
        registry.is_empty() && !registry.has_active_cursors()
    }

    fn keyed_len(&self, side: Side, key: &K) -> usize {
        self.keyed(side)
            .borrow()
            .get(key)
            .map_or(0, |registry| registry.borrow().len())
    }

    fn has_listeners(&self) -> bool {
        let any = |registries: &KeyedRegistries<E, K>| {
            registries
                .borrow()
                .values()
                .any(|registry| !registry.borrow().is_empty())
        };
        !self.global.borrow().is_empty() || any(&self.targets) || any(&self.sources)
    }
}

/// Type-erased view of a [`Table`] for whole-bus operations.
trait ErasedTable: Any {
    fn event_type(&self) -> &'static str;
    fn is_iterating(&self) -> bool;
    fn clear(&self);
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<E: Event, K: Identity> ErasedTable for Table<E, K> {
    fn event_type(&self) -> &'static str {
        type_name::<E>()
    }

    fn is_iterating(&self) -> bool {
        let walking = |registries: &KeyedRegistries<E, K>| {
            registries
                .borrow()
                .values()
                .any(|registry| registry.borrow().has_active_cursors())
        };
        self.global.borrow().has_active_cursors() || walking(&self.targets) || walking(&self.sources)
    }

    fn clear(&self) {
        self.global.borrow_mut().clear();
        self.targets.borrow_mut().clear();
        self.sources.borrow_mut().clear();
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

// =============================================================================
// Deferred Raises
// =============================================================================

/// Pooled holder for a raise issued while the bus was busy.
struct Queued<E, K> {
    event: Option<E>,
    target: K,
    source: K,
}

impl<E, K: Identity> Queued<E, K> {
    fn empty() -> Self {
        Self {
            event: None,
            target: K::unaddressed(),
            source: K::unaddressed(),
        }
    }
}

trait Deferred<K> {
    fn event_type(&self) -> &'static str;

    /// Dispatch the held event and hand the holder back to its pool.
    fn dispatch(self: Box<Self>, bus: &EventBus<K>);
}

impl<E: Event, K: Identity> Deferred<K> for Queued<E, K> {
    fn event_type(&self) -> &'static str {
        type_name::<E>()
    }

    fn dispatch(mut self: Box<Self>, bus: &EventBus<K>) {
        let event = self.event.take();
        let target = mem::replace(&mut self.target, K::unaddressed());
        let source = mem::replace(&mut self.source, K::unaddressed());
        bus.table::<E>().holders.borrow_mut().release(self);

        if let Some(mut event) = event {
            bus.raise_targeted_immediately(&mut event, &target, &source);
        }
    }
}

// =============================================================================
// Recursion Depth
// =============================================================================

/// Marks one active recursion depth; leaving it resets the depth's
/// consumption flag even if a dispatch unwinds.
struct DepthGuard<'a, K: Identity> {
    bus: &'a EventBus<K>,
    depth: usize,
}

impl<K: Identity> Drop for DepthGuard<'_, K> {
    fn drop(&mut self) {
        self.bus.exit(self.depth);
    }
}

/// Marks the deferred queue as being drained until dropped.
struct DrainGuard<'a> {
    draining: &'a Cell<bool>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.draining.set(false);
    }
}

// =============================================================================
// Event Bus
// =============================================================================

/// Synchronous, reentrancy-safe event bus.
///
/// `K` is the identity type used for targeted events. The default,
/// [`NoAddress`], gives a plain bus where every listener is global.
pub struct EventBus<K = NoAddress> {
    tables: RefCell<HashMap<TypeId, Rc<dyn ErasedTable>>>,
    depth: Cell<usize>,
    /// Consumption flag per recursion depth (index 0 unused).
    consumed: RefCell<SmallVec<[bool; 8]>>,
    queue: RefCell<VecDeque<Box<dyn Deferred<K>>>>,
    draining: Cell<bool>,
    next_id: Cell<u64>,
    config: BusConfig,
    sink: Box<dyn FailureSink>,
    stats: Counters,
}

impl EventBus<NoAddress> {
    /// Create an untargeted bus with default configuration.
    pub fn new() -> Self {
        EventBusBuilder::new().build()
    }
}

impl<K: Identity> EventBus<K> {
    /// Start building a bus.
    pub fn builder() -> EventBusBuilder<K> {
        EventBusBuilder::new()
    }

    fn from_parts(config: BusConfig, sink: Box<dyn FailureSink>) -> Self {
        Self {
            tables: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
            consumed: RefCell::new(SmallVec::new()),
            queue: RefCell::new(VecDeque::with_capacity(config.queue_capacity)),
            draining: Cell::new(false),
            next_id: Cell::new(1),
            config,
            sink,
            stats: Counters::default(),
        }
    }

    /// The configuration this bus was built with.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    fn table<E: Event>(&self) -> Rc<Table<E, K>> {
        let erased = Rc::clone(
            self.tables
                .borrow_mut()
                .entry(TypeId::of::<E>())
                .or_insert_with(|| {
                    Rc::new(Table::<E, K>::new(self.config.pool_capacity)) as Rc<dyn ErasedTable>
                }),
        );
        match erased.into_any().downcast::<Table<E, K>>() {
            Ok(table) => table,
            Err(_) => unreachable!("event tables are keyed by TypeId"),
        }
    }

    fn existing_table<E: Event>(&self) -> Option<Rc<Table<E, K>>> {
        let erased = self.tables.borrow().get(&TypeId::of::<E>()).cloned()?;
        erased.into_any().downcast::<Table<E, K>>().ok()
    }

    fn listener<E>(&self, priority: Priority, handler: Handler<E, K>) -> Listener<E, K> {
        let id = ListenerId::new(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        Listener {
            id,
            priority,
            handler,
        }
    }

    // -------------------------------------------------------------------------
    // Subscription
    // -------------------------------------------------------------------------

    /// Register a global listener for `E`.
    ///
    /// Listeners run in descending priority order; equal priorities run in
    /// registration order. Safe to call from inside a listener.
    pub fn subscribe<E, F>(&self, priority: Priority, handler: F) -> Subscription<E, K>
    where
        E: Event,
        F: Fn(&mut E, &EventBus<K>) -> anyhow::Result<()> + 'static,
    {
        self.subscribe_handler(priority, Rc::new(handler))
    }

    /// Register a shared handler as a global listener for `E`.
    ///
    /// The same handler may be registered more than once; see
    /// [`EventBus::unsubscribe_handler`].
    pub fn subscribe_handler<E: Event>(
        &self,
        priority: Priority,
        handler: Handler<E, K>,
    ) -> Subscription<E, K> {
        let listener = self.listener(priority, handler);
        let id = listener.id;
        let slot = self.table::<E>().global.borrow_mut().insert(listener);
        trace!(event_type = type_name::<E>(), listener = %id, priority, slot, "listener subscribed");
        Subscription::new(id, priority, Scope::Global)
    }

    /// Register a listener for `E` events raised at `target`.
    ///
    /// Returns `None` (and registers nothing) if `target` is the unaddressed
    /// sentinel.
    pub fn subscribe_target<E, F>(
        &self,
        target: &K,
        priority: Priority,
        handler: F,
    ) -> Option<Subscription<E, K>>
    where
        E: Event,
        F: Fn(&mut E, &EventBus<K>) -> anyhow::Result<()> + 'static,
    {
        self.subscribe_keyed(Side::Target, target, priority, Rc::new(handler))
    }

    /// Register a listener for `E` events raised by `source`.
    ///
    /// Returns `None` (and registers nothing) if `source` is the unaddressed
    /// sentinel.
    pub fn subscribe_source<E, F>(
        &self,
        source: &K,
        priority: Priority,
        handler: F,
    ) -> Option<Subscription<E, K>>
    where
        E: Event,
        F: Fn(&mut E, &EventBus<K>) -> anyhow::Result<()> + 'static,
    {
        self.subscribe_keyed(Side::Source, source, priority, Rc::new(handler))
    }

    fn subscribe_keyed<E: Event>(
        &self,
        side: Side,
        key: &K,
        priority: Priority,
        handler: Handler<E, K>,
    ) -> Option<Subscription<E, K>> {
        if key.is_unaddressed() {
            debug!(
                event_type = type_name::<E>(),
                ?side,
                "ignoring subscription against the unaddressed identity"
            );
            return None;
        }

        let listener = self.listener(priority, handler);
        let id = listener.id;
        let slot = self.table::<E>().insert_keyed(side, key, listener);
        trace!(event_type = type_name::<E>(), listener = %id, ?side, ?key, priority, slot, "listener subscribed");
        Some(Subscription::new(id, priority, side.scope(key.clone())))
    }

    /// Remove a listener. Returns false if it was not registered.
    ///
    /// Safe to call from inside a listener: a listener removed before the
    /// in-flight walk reaches it is not invoked.
    pub fn unsubscribe<E: Event>(&self, subscription: &Subscription<E, K>) -> bool {
        let Some(table) = self.existing_table::<E>() else {
            return false;
        };
        let id = subscription.id();
        let removed = match subscription.scope() {
            Scope::Global => table.global.borrow_mut().remove(id),
            Scope::Target(key) => table.remove_keyed(Side::Target, key, |l| l.id == id),
            Scope::Source(key) => table.remove_keyed(Side::Source, key, |l| l.id == id),
        };
        trace!(event_type = type_name::<E>(), listener = %id, removed, "listener unsubscribed");
        removed > 0
    }

    /// Remove every registration of `handler` for `E`, in every registry.
    /// Returns how many registrations were removed.
    pub fn unsubscribe_handler<E: Event>(&self, handler: &Handler<E, K>) -> usize {
        let Some(table) = self.existing_table::<E>() else {
            return 0;
        };
        let same = |listener: &Listener<E, K>| Rc::ptr_eq(&listener.handler, handler);

        let mut removed = table.global.borrow_mut().remove_where(same);
        for side in [Side::Target, Side::Source] {
            let keys: Vec<K> = table.keyed(side).borrow().keys().cloned().collect();
            for key in &keys {
                removed += table.remove_keyed(side, key, same);
            }
        }
        removed
    }

    /// Remove every listener of `E`.
    ///
    /// Fails with [`BusError::ClearWhileRaising`] if any registry of `E` is
    /// being walked; meant for idle-time teardown.
    pub fn clear<E: Event>(&self) -> Result<(), BusError> {
        let Some(table) = self.existing_table::<E>() else {
            return Ok(());
        };
        if table.is_iterating() {
            warn!(event_type = type_name::<E>(), "refusing to clear listeners mid-raise");
            return Err(BusError::ClearWhileRaising {
                event_type: type_name::<E>(),
            });
        }
        table.clear();
        debug!(event_type = type_name::<E>(), "listeners cleared");
        Ok(())
    }

    /// Remove every listener of every event type.
    ///
    /// Fails without clearing anything if any event type is being walked.
    pub fn clear_all(&self) -> Result<(), BusError> {
        let tables: Vec<Rc<dyn ErasedTable>> = self.tables.borrow().values().cloned().collect();
        if let Some(busy) = tables.iter().find(|table| table.is_iterating()) {
            warn!(event_type = busy.event_type(), "refusing to clear listeners mid-raise");
            return Err(BusError::ClearWhileRaising {
                event_type: busy.event_type(),
            });
        }
        for table in &tables {
            table.clear();
        }
        debug!(event_types = tables.len(), "all listeners cleared");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Raising
    // -------------------------------------------------------------------------

    /// Raise an unaddressed event.
    ///
    /// Dispatches now when the bus is idle; otherwise queues a copy and
    /// returns [`RaiseOutcome::Deferred`].
    pub fn raise<E: Event>(&self, event: &mut E) -> RaiseOutcome {
        let none = K::unaddressed();
        self.raise_targeted(event, &none, &none)
    }

    /// Raise an unaddressed event now, even from inside a listener.
    pub fn raise_immediately<E: Event>(&self, event: &mut E) -> RaiseOutcome {
        let none = K::unaddressed();
        self.raise_targeted_immediately(event, &none, &none)
    }

    /// Raise an event at `target` on behalf of `source`.
    ///
    /// Global listeners and the listeners registered for `target` and for
    /// `source` run as one priority-ordered sequence; on equal priority the
    /// order is global, target, source. Pass the unaddressed sentinel for
    /// either identity to skip it.
    pub fn raise_targeted<E: Event>(&self, event: &mut E, target: &K, source: &K) -> RaiseOutcome {
        if self.is_raising() {
            self.defer(event, target, source);
            return RaiseOutcome::Deferred;
        }
        self.raise_targeted_immediately(event, target, source)
    }

    /// Targeted counterpart of [`EventBus::raise_immediately`].
    pub fn raise_targeted_immediately<E: Event>(
        &self,
        event: &mut E,
        target: &K,
        source: &K,
    ) -> RaiseOutcome {
        let consumed = {
            let guard = self.enter();
            self.dispatch(event, target, source, guard.depth)
        };

        if self.depth.get() == 0 {
            self.drain();
        }

        if consumed {
            RaiseOutcome::Consumed
        } else {
            RaiseOutcome::Delivered
        }
    }

    /// Stop the event currently being dispatched at this recursion depth.
    ///
    /// Listeners after the caller are skipped; raises at other depths are
    /// unaffected. Calling it twice has no further effect.
    pub fn consume_current_event(&self) -> Result<(), BusError> {
        let depth = self.depth.get();
        if depth == 0 {
            warn!("consume_current_event called while no event is being raised");
            return Err(BusError::NotRaising);
        }
        self.consumed.borrow_mut()[depth] = true;
        Ok(())
    }

    fn enter(&self) -> DepthGuard<'_, K> {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        let mut flags = self.consumed.borrow_mut();
        if flags.len() <= depth {
            flags.resize(depth + 1, false);
        }
        flags[depth] = false;
        DepthGuard { bus: self, depth }
    }

    fn exit(&self, depth: usize) {
        let mut flags = self.consumed.borrow_mut();
        flags[depth] = false;
        if depth == 1 {
            flags.iter_mut().for_each(|flag| *flag = false);
        }
        self.depth.set(depth - 1);
    }

    fn is_consumed(&self, depth: usize) -> bool {
        self.consumed.borrow().get(depth).copied().unwrap_or(false)
    }

    fn defer<E: Event>(&self, event: &E, target: &K, source: &K) {
        let table = self.table::<E>();
        let mut holder = table
            .holders
            .borrow_mut()
            .acquire_with(|| Box::new(Queued::empty()));
        holder.event = Some(event.clone());
        holder.target = target.clone();
        holder.source = source.clone();

        let mut queue = self.queue.borrow_mut();
        queue.push_back(holder);
        self.stats.deferred();
        debug!(
            event_type = type_name::<E>(),
            depth = self.depth.get(),
            pending = queue.len(),
            "raise deferred until the bus is idle"
        );
    }

    /// Dispatch queued raises in FIFO order.
    ///
    /// Raises queued while draining are appended and picked up by this same
    /// loop, so nested drains never recurse.
    fn drain(&self) {
        if self.draining.replace(true) {
            return;
        }
        let _draining = DrainGuard {
            draining: &self.draining,
        };

        let pending = self.queue.borrow().len();
        if pending > 0 {
            debug!(pending, "draining deferred raises");
        }
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(deferred) = next else {
                break;
            };
            trace!(event_type = deferred.event_type(), "dispatching deferred raise");
            deferred.dispatch(self);
        }
    }

    fn dispatch<E: Event>(&self, event: &mut E, target: &K, source: &K, depth: usize) -> bool {
        let table = self.table::<E>();
        let mut walk = table.walks.borrow_mut().acquire_with(Walk::new);
        walk.attach(Rc::clone(&table.global));
        if let Some(registry) = table.registry_for(Side::Target, target) {
            walk.attach(registry);
        }
        if let Some(registry) = table.registry_for(Side::Source, source) {
            walk.attach(registry);
        }

        self.stats.raised();
        trace!(event_type = type_name::<E>(), depth, lanes = walk.lane_count(), "dispatching");

        let mut consumed = false;
        while let Some(listener) = walk.next_listener() {
            self.invoke(&listener, event, depth);
            if self.is_consumed(depth) {
                consumed = true;
                break;
            }
        }

        if consumed {
            self.stats.consumed();
            debug!(event_type = type_name::<E>(), depth, "event consumed");
        }
        if walk.skipped() > 0 {
            trace!(skipped = walk.skipped(), "listeners inserted behind the merge frontier were skipped");
        }

        walk.release();
        table.walks.borrow_mut().release(walk);
        table.prune(Side::Target, target);
        table.prune(Side::Source, source);
        consumed
    }

    fn invoke<E: Event>(&self, listener: &Listener<E, K>, event: &mut E, depth: usize) {
        self.stats.invocation();
        trace!(
            event_type = type_name::<E>(),
            listener = %listener.id,
            priority = listener.priority,
            depth,
            "invoking listener"
        );

        // A panicking listener must not tear down the walk for the others.
        let handler = &listener.handler;
        let kind = match catch_unwind(AssertUnwindSafe(|| handler(event, self))) {
            Ok(Ok(())) => return,
            Ok(Err(error)) => FaultKind::Error(error),
            Err(payload) => FaultKind::Panic(panic_message(payload.as_ref())),
        };

        self.stats.fault();
        self.sink.report(&ListenerFault {
            event_type: type_name::<E>(),
            listener: listener.id,
            priority: listener.priority,
            depth,
            kind,
        });
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Number of global listeners for `E`.
    pub fn listener_count<E: Event>(&self) -> usize {
        self.existing_table::<E>()
            .map_or(0, |table| table.global.borrow().len())
    }

    /// Number of listeners for `E` registered against `target`.
    pub fn target_listener_count<E: Event>(&self, target: &K) -> usize {
        self.existing_table::<E>()
            .map_or(0, |table| table.keyed_len(Side::Target, target))
    }

    /// Number of listeners for `E` registered against `source`.
    pub fn source_listener_count<E: Event>(&self, source: &K) -> usize {
        self.existing_table::<E>()
            .map_or(0, |table| table.keyed_len(Side::Source, source))
    }

    /// Returns true if any registry of `E` has a listener.
    pub fn has_listeners<E: Event>(&self) -> bool {
        self.existing_table::<E>()
            .is_some_and(|table| table.has_listeners())
    }

    /// Current recursion depth; `0` when idle.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Returns true while any raise is executing.
    pub fn is_raising(&self) -> bool {
        self.depth.get() > 0
    }

    /// Number of raises waiting in the deferred queue.
    pub fn pending_count(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Snapshot of the bus's counters.
    pub fn stats(&self) -> BusStats {
        self.stats.snapshot()
    }
}

impl<K: Identity> Default for EventBus<K> {
    fn default() -> Self {
        EventBusBuilder::new().build()
    }
}

impl<K: Identity> fmt::Debug for EventBus<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.tables.borrow().len())
            .field("depth", &self.depth.get())
            .field("pending", &self.queue.borrow().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for [`EventBus`].
///
/// # Example
///
/// ```ignore
/// let bus = EventBus::<ObjectId>::builder()
///     .with_pool_capacity(64)
///     .with_failure_sink(|fault: &ListenerFault| eprintln!("{}", fault))
///     .build();
/// ```
pub struct EventBusBuilder<K = NoAddress> {
    config: BusConfig,
    sink: Option<Box<dyn FailureSink>>,
    _identity: PhantomData<fn() -> K>,
}

impl<K: Identity> EventBusBuilder<K> {
    /// Create a builder with default configuration and the tracing sink.
    pub fn new() -> Self {
        Self {
            config: BusConfig::default(),
            sink: None,
            _identity: PhantomData,
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the per-event-type pool capacity.
    pub fn with_pool_capacity(mut self, n: usize) -> Self {
        self.config.pool_capacity = n;
        self
    }

    /// Set the initial deferred-queue capacity.
    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.config.queue_capacity = n;
        self
    }

    /// Route listener faults to `sink` instead of the log.
    pub fn with_failure_sink(mut self, sink: impl FailureSink) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Build the bus.
    pub fn build(self) -> EventBus<K> {
        let sink = self.sink.unwrap_or_else(|| Box::new(TracingSink));
        EventBus::from_parts(self.config, sink)
    }
}

impl<K: Identity> Default for EventBusBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Identity> fmt::Debug for EventBusBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBusBuilder")
            .field("config", &self.config)
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}
