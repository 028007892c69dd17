//! Structured errors, listener faults, and the failure sink.
//!
//! Two kinds of failure exist on a bus:
//!
//! - **Invalid-state faults** are programming errors made by the caller of a
//!   bus method (clearing a registry that is being walked, consuming while
//!   idle). They surface synchronously as [`BusError`].
//! - **Listener faults** happen inside user callbacks: a handler returned
//!   `Err` or panicked. They never reach the caller of `raise`; the dispatch
//!   loop packages them as a [`ListenerFault`], hands them to the bus's
//!   [`FailureSink`], and moves on to the next listener.
//!
//! # The Fault Boundary Rule
//!
//! > **No listener error ever crosses the raise boundary.**
//!
//! - `anyhow` is the ergonomic error type handlers return
//! - `FailureSink` is the only place those errors are externalized
//!
//! # Example
//!
//! ```ignore
//! use cascade::{EventBus, BusError};
//!
//! match bus.clear::<Damaged>() {
//!     Ok(()) => {}
//!     Err(BusError::ClearWhileRaising { event_type }) => {
//!         eprintln!("cannot clear {} while it is dispatching", event_type);
//!     }
//!     Err(e) => eprintln!("other bus error: {}", e),
//! }
//! ```

use std::any::Any;
use std::fmt;

use thiserror::Error;
use tracing::error;

use crate::core::{ListenerId, Priority};

// =============================================================================
// Bus Error
// =============================================================================

/// Structured error type for bus operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    /// `clear` was called while an iterator is walking a registry of this
    /// event type.
    #[error("cannot clear listeners of {event_type} while it is being raised")]
    ClearWhileRaising {
        /// Human-readable type name of the event.
        event_type: &'static str,
    },

    /// `consume_current_event` was called while no raise is executing.
    #[error("no event is being raised")]
    NotRaising,
}

// =============================================================================
// Listener Fault
// =============================================================================

/// How a listener failed.
#[derive(Debug)]
pub enum FaultKind {
    /// The handler returned an error.
    Error(anyhow::Error),
    /// The handler panicked; holds the panic message.
    Panic(String),
}

impl FaultKind {
    /// Returns true if the handler panicked.
    pub fn is_panic(&self) -> bool {
        matches!(self, FaultKind::Panic(_))
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Error(e) => write!(f, "{:#}", e),
            FaultKind::Panic(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

/// A fault raised by one listener during one dispatch.
#[derive(Debug)]
pub struct ListenerFault {
    /// Type name of the event being dispatched.
    pub event_type: &'static str,
    /// The listener that failed.
    pub listener: ListenerId,
    /// Priority the listener was registered with.
    pub priority: Priority,
    /// Recursion depth of the raise the listener was invoked from.
    pub depth: usize,
    /// What went wrong.
    pub kind: FaultKind,
}

impl fmt::Display for ListenerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (priority {}) failed on {} at depth {}: {}",
            self.listener, self.priority, self.event_type, self.depth, self.kind
        )
    }
}

/// Extract a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// =============================================================================
// Failure Sink
// =============================================================================

/// Receives every listener fault reported by a bus.
///
/// Implementations must not panic and must not call back into the bus that
/// reported the fault.
pub trait FailureSink: 'static {
    /// Report one fault. Called from inside the dispatch loop.
    fn report(&self, fault: &ListenerFault);
}

/// Default sink: logs each fault at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&self, fault: &ListenerFault) {
        error!(
            event_type = fault.event_type,
            listener = %fault.listener,
            priority = fault.priority,
            depth = fault.depth,
            panicked = fault.kind.is_panic(),
            error = %fault.kind,
            "listener failed"
        );
    }
}

impl<F> FailureSink for F
where
    F: Fn(&ListenerFault) + 'static,
{
    fn report(&self, fault: &ListenerFault) {
        self(fault)
    }
}
