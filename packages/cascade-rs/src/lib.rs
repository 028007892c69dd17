//! # Cascade
//!
//! A synchronous, reentrancy-safe event dispatcher with priority-ordered
//! listeners and targeted delivery.
//!
//! ## Core Concepts
//!
//! - [`Event`] = any `Clone + 'static` payload, routed by its type
//! - [`EventBus`] = owns every listener registry and the raise engine
//! - [`Identity`] = key for addressing events at a target or from a source
//!
//! The key principle: **listeners may do anything, at any time**. A listener
//! can subscribe, unsubscribe, raise, or consume while an event is being
//! dispatched, and the in-flight dispatch stays well defined.
//!
//! ## Architecture
//!
//! ```text
//! raise_targeted(e, target, source)
//!     │
//!     ▼
//! EventBus ── TypeId ──► Table<E>
//!                          ├─ global registry ─────┐
//!                          ├─ targets[target] ─────┼──► Walk (priority merge)
//!                          └─ sources[source] ─────┘        │
//!                                                           ▼
//!                                             listener(&mut e, &bus)
//!                                                           │
//!                         ┌──── raise() while busy ─────────┤
//!                         ▼                                 │
//!                  deferred queue ◄─────────────────────────┘
//!                         │
//!                         └─► drained FIFO when the outermost raise returns
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Priority order** - Higher priority first; equal priorities in
//!    registration order
//! 2. **Merge precedence** - On ties: global, then target, then source
//! 3. **Stable iteration** - Mutations during a walk never cause a skip or a
//!    double visit
//! 4. **Queued raises are FIFO** - and run only once the bus is idle
//! 5. **Consumption is per depth** - Consuming a nested raise never stops the
//!    outer one
//! 6. **Faults stay inside** - A failing listener is reported to the
//!    [`FailureSink`] and the walk continues
//!
//! ## Example
//!
//! ```ignore
//! use cascade::{EventBus, ObjectId, RaiseOutcome};
//!
//! #[derive(Debug, Clone)]
//! struct Damaged {
//!     amount: u32,
//! }
//!
//! #[derive(Debug, Clone)]
//! struct Died;
//!
//! let bus = EventBus::<ObjectId>::default();
//! let hero = ObjectId::new(1);
//!
//! bus.subscribe_target(&hero, 0.0, move |e: &mut Damaged, bus| {
//!     if e.amount >= 10 {
//!         // Queued: runs after every Damaged listener has finished.
//!         bus.raise_targeted(&mut Died, &hero, &ObjectId::NONE);
//!     }
//!     Ok(())
//! });
//!
//! let outcome = bus.raise_targeted(&mut Damaged { amount: 12 }, &hero, &ObjectId::NONE);
//! assert_eq!(outcome, RaiseOutcome::Delivered);
//! ```
//!
//! ## What This Is Not
//!
//! Cascade is **not**:
//! - Thread-safe (the bus is `!Send` and `!Sync`)
//! - Asynchronous
//! - Persistent
//!
//! Cascade **is**:
//! > An in-process, single-threaded dispatcher whose ordering guarantees hold
//! > no matter what listeners do to it mid-dispatch.

// Core modules
mod config;
mod core;
mod dispatch;
mod engine;
mod error;
mod pool;
mod registry;
mod stats;

// Testing utilities (feature-gated)
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Stress tests (test-only)
#[cfg(test)]
mod stress_tests;

// Re-export core types
pub use crate::core::{
    Event, Handler, Identity, ListenerId, NoAddress, ObjectId, Priority, RaiseOutcome, Scope,
    Subscription,
};

// Re-export the bus
pub use engine::{EventBus, EventBusBuilder};

// Re-export configuration
pub use config::{BusConfig, DEFAULT_POOL_CAPACITY, DEFAULT_QUEUE_CAPACITY};

// Re-export error types
pub use crate::error::{BusError, FailureSink, FaultKind, ListenerFault, TracingSink};

// Re-export stats and pooling
pub use pool::Pool;
pub use stats::BusStats;
