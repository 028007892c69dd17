//! Dispatch counters for debugging and tests.

use std::cell::Cell;

/// Snapshot of a bus's counters. All counters only ever increase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    /// Dispatches actually executed (immediate raises and drained raises).
    pub raised: u64,
    /// Raises that were queued because the bus was already dispatching.
    pub deferred: u64,
    /// Dispatches halted by `consume_current_event`.
    pub consumed: u64,
    /// Listener invocations.
    pub invocations: u64,
    /// Listener invocations that returned an error or panicked.
    pub listener_faults: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    raised: Cell<u64>,
    deferred: Cell<u64>,
    consumed: Cell<u64>,
    invocations: Cell<u64>,
    listener_faults: Cell<u64>,
}

fn bump(cell: &Cell<u64>) {
    cell.set(cell.get().saturating_add(1));
}

impl Counters {
    pub(crate) fn raised(&self) {
        bump(&self.raised);
    }

    pub(crate) fn deferred(&self) {
        bump(&self.deferred);
    }

    pub(crate) fn consumed(&self) {
        bump(&self.consumed);
    }

    pub(crate) fn invocation(&self) {
        bump(&self.invocations);
    }

    pub(crate) fn fault(&self) {
        bump(&self.listener_faults);
    }

    pub(crate) fn snapshot(&self) -> BusStats {
        BusStats {
            raised: self.raised.get(),
            deferred: self.deferred.get(),
            consumed: self.consumed.get(),
            invocations: self.invocations.get(),
            listener_faults: self.listener_faults.get(),
        }
    }
}
