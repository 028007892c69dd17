//! Priority-merged walk over up to three registries.
//!
//! A raise resolves a set of *lanes*: the event type's global registry, plus
//! the registry of the raise's target and the registry of its source when
//! those exist. The [`Walk`] emits listeners from all lanes as one sequence:
//!
//! ```text
//!   global  ──┐
//!   target  ──┼──► pick highest head ──► advance that lane ──► listener
//!   source  ──┘        (ties: earliest lane wins)
//! ```
//!
//! Each lane owns a cursor registered with its registry, so listeners added
//! or removed by callbacks during the walk are handled by the registry's
//! cursor adjustment. The merge adds one rule on top: emitted priorities never
//! increase. A head that outranks the last emitted listener can only be a
//! listener inserted into a lower lane after the walk already moved past its
//! priority; it counts as "already passed" and is skipped.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;
use tracing::trace;

use crate::core::{outranks, Priority};
use crate::registry::{CursorToken, Listener, Registry};

/// A registry shared between the bus and the walks iterating it.
pub(crate) type SharedRegistry<E, K> = Rc<RefCell<Registry<E, K>>>;

struct Lane<E, K> {
    registry: SharedRegistry<E, K>,
    token: CursorToken,
}

/// In-flight iteration over one raise's resolved registries.
///
/// Walks are pooled per event type: [`Walk::release`] detaches every lane and
/// leaves the walk ready for reuse.
pub(crate) struct Walk<E, K> {
    lanes: SmallVec<[Lane<E, K>; 3]>,
    last: Option<Priority>,
    skipped: usize,
}

impl<E, K> Walk<E, K> {
    pub(crate) fn new() -> Self {
        Self {
            lanes: SmallVec::new(),
            last: None,
            skipped: 0,
        }
    }

    /// Add a registry as the next lane. Lanes attached earlier win ties.
    pub(crate) fn attach(&mut self, registry: SharedRegistry<E, K>) {
        let token = registry.borrow_mut().open_cursor();
        self.lanes.push(Lane { registry, token });
    }

    /// Number of attached lanes.
    pub(crate) fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Number of listeners skipped because they were inserted behind the
    /// merge frontier during this walk.
    pub(crate) fn skipped(&self) -> usize {
        self.skipped
    }

    /// The next listener to invoke, or `None` when every lane is exhausted.
    ///
    /// No registry borrow is held once this returns, so the caller is free to
    /// run the listener, which may mutate any registry.
    pub(crate) fn next_listener(&mut self) -> Option<Listener<E, K>> {
        loop {
            let (lane, priority) = self.pick()?;
            let listener = {
                let lane = &self.lanes[lane];
                let mut registry = lane.registry.borrow_mut();
                let listener = registry.peek(lane.token).cloned();
                registry.advance(lane.token);
                listener
            };

            if let Some(last) = self.last {
                if outranks(priority, last) {
                    // Within one registry the cursor shift already hides
                    // such listeners; only a lower lane can surface one.
                    debug_assert!(
                        self.lanes.len() > 1,
                        "single registry emitted a listener above the merge frontier"
                    );
                    trace!(priority, last, "skipping listener inserted behind merge frontier");
                    self.skipped += 1;
                    continue;
                }
            }

            self.last = Some(priority);
            return listener;
        }
    }

    /// Index and priority of the lane whose head goes next.
    fn pick(&self) -> Option<(usize, Priority)> {
        let mut best: Option<(usize, Priority)> = None;
        for (index, lane) in self.lanes.iter().enumerate() {
            let registry = lane.registry.borrow();
            let Some(head) = registry.peek(lane.token) else {
                continue;
            };
            match best {
                Some((_, priority)) if !outranks(head.priority, priority) => {}
                _ => best = Some((index, head.priority)),
            }
        }
        best
    }

    /// Close every lane's cursor and reset for reuse.
    pub(crate) fn release(&mut self) {
        for lane in self.lanes.drain(..) {
            lane.registry.borrow_mut().close_cursor(lane.token);
        }
        self.last = None;
        self.skipped = 0;
    }
}

impl<E, K> Default for Walk<E, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, K> Drop for Walk<E, K> {
    fn drop(&mut self) {
        self.release();
    }
}
