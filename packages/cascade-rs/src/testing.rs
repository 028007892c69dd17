//! Testing utilities for code built on the bus.
//!
//! # Feature Flag
//!
//! This module is only available with the `testing` feature:
//!
//! ```toml
//! [dev-dependencies]
//! cascade = { version = "0.1", features = ["testing"] }
//! ```
//!
//! # Quick Start
//!
//! ## Recording Dispatch Order with `CallLog`
//!
//! ```ignore
//! use cascade::testing::{assert_calls, CallLog};
//!
//! let log = CallLog::new();
//! bus.subscribe_handler(10.0, log.handler::<Damaged, _>("armor"));
//! bus.subscribe_handler(0.0, log.handler::<Damaged, _>("health"));
//!
//! bus.raise(&mut Damaged { amount: 3 });
//! assert_calls!(log, "armor", "health");
//! ```
//!
//! ## Capturing Faults with `RecordingSink`
//!
//! ```ignore
//! use cascade::testing::RecordingSink;
//!
//! let sink = RecordingSink::new();
//! let bus: EventBus = EventBus::builder().with_failure_sink(sink.clone()).build();
//!
//! bus.raise(&mut Damaged { amount: 3 });
//! assert!(sink.faults().is_empty());
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::core::{Event, Handler, Identity, ListenerId, Priority};
use crate::engine::EventBus;
use crate::error::{FailureSink, FaultKind, ListenerFault};

/// Asserts the exact sequence of labels recorded in a [`CallLog`].
///
/// # Panics
///
/// Panics if the recorded sequence differs from the expected one.
#[macro_export]
macro_rules! assert_calls {
    ($log:expr $(,)?) => {
        assert!(
            $log.is_empty(),
            "Expected no listener calls, got {:?}",
            $log.entries()
        );
    };
    ($log:expr, $($label:expr),+ $(,)?) => {
        let expected: Vec<String> = vec![$(String::from($label)),+];
        let actual = $log.entries();
        assert_eq!(
            actual, expected,
            "Unexpected listener call order\n  expected: {:?}\n  actual: {:?}",
            expected, actual
        );
    };
}

pub use assert_calls;

// =============================================================================
// CallLog
// =============================================================================

/// Shared, clonable record of listener invocations.
///
/// Clones share the same underlying log, so a clone can be moved into each
/// listener closure while the test keeps one for assertions.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label.
    pub fn record(&self, label: impl Into<String>) {
        self.entries.borrow_mut().push(label.into());
    }

    /// All labels recorded so far, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Number of recorded labels.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// How many times `label` was recorded.
    pub fn count(&self, label: &str) -> usize {
        self.entries.borrow().iter().filter(|e| *e == label).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// A handler that records `label` every time it runs.
    pub fn handler<E: Event, K: Identity>(&self, label: &str) -> Handler<E, K> {
        let log = self.clone();
        let label = label.to_string();
        Rc::new(move |_: &mut E, _: &EventBus<K>| -> anyhow::Result<()> {
            log.record(label.as_str());
            Ok(())
        })
    }
}

// =============================================================================
// RecordingSink
// =============================================================================

/// An owned copy of one reported [`ListenerFault`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFault {
    pub event_type: &'static str,
    pub listener: ListenerId,
    pub priority: Priority,
    pub depth: usize,
    /// True if the listener panicked rather than returning an error.
    pub panicked: bool,
    /// The error chain or the panic message.
    pub message: String,
}

/// Failure sink that keeps every fault for later assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    faults: Rc<RefCell<Vec<RecordedFault>>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// All faults reported so far, oldest first.
    pub fn faults(&self) -> Vec<RecordedFault> {
        self.faults.borrow().clone()
    }

    /// Number of faults reported.
    pub fn len(&self) -> usize {
        self.faults.borrow().len()
    }

    /// Returns true if no fault was reported.
    pub fn is_empty(&self) -> bool {
        self.faults.borrow().is_empty()
    }

    /// Forget every recorded fault.
    pub fn clear(&self) {
        self.faults.borrow_mut().clear();
    }
}

impl FailureSink for RecordingSink {
    fn report(&self, fault: &ListenerFault) {
        let message = match &fault.kind {
            FaultKind::Error(error) => format!("{:#}", error),
            FaultKind::Panic(message) => message.clone(),
        };
        self.faults.borrow_mut().push(RecordedFault {
            event_type: fault.event_type,
            listener: fault.listener,
            priority: fault.priority,
            depth: fault.depth,
            panicked: fault.kind.is_panic(),
            message,
        });
    }
}
