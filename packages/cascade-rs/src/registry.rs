//! Priority-sorted listener registry with mutation-aware cursors.
//!
//! # Ordering
//!
//! Listeners are kept in non-increasing priority order. Among equal
//! priorities, registration order is preserved: a new listener is placed
//! after every existing listener whose priority is greater than or equal to
//! its own.
//!
//! # Cursors
//!
//! A registry also tracks the cursors of every walk currently iterating it.
//! A cursor is the index of the next listener the walk will visit. Inserting
//! or removing a listener shifts every cursor positioned after the mutated
//! slot, which gives the following rules for an in-flight walk:
//!
//! | mutation                      | effect on the walk                  |
//! |-------------------------------|-------------------------------------|
//! | insert before the cursor      | new listener is not visited         |
//! | insert at/after the cursor    | new listener is visited in order    |
//! | remove before the cursor      | no skip, no double visit            |
//! | remove at/after the cursor    | removed listener is not visited     |

use smallvec::SmallVec;

use crate::core::{outranks, Handler, ListenerId, Priority};

/// One registered listener.
pub(crate) struct Listener<E, K> {
    pub(crate) id: ListenerId,
    pub(crate) priority: Priority,
    pub(crate) handler: Handler<E, K>,
}

impl<E, K> Clone for Listener<E, K> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            priority: self.priority,
            handler: self.handler.clone(),
        }
    }
}

impl<E, K> std::fmt::Debug for Listener<E, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Handle to a cursor registered with a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CursorToken(u32);

#[derive(Debug, Clone, Copy)]
struct ActiveCursor {
    token: CursorToken,
    index: usize,
}

/// Sorted listeners for one (event type[, identity]) pair.
pub(crate) struct Registry<E, K> {
    listeners: Vec<Listener<E, K>>,
    cursors: SmallVec<[ActiveCursor; 2]>,
    next_token: u32,
}

impl<E, K> Registry<E, K> {
    pub(crate) fn new() -> Self {
        Self {
            listeners: Vec::new(),
            cursors: SmallVec::new(),
            next_token: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Insert a listener in priority order and return the slot it now
    /// occupies.
    pub(crate) fn insert(&mut self, listener: Listener<E, K>) -> usize {
        let priority = listener.priority;
        // Everything not strictly outranked by the newcomer stays ahead of it.
        let slot = self
            .listeners
            .partition_point(|existing| !outranks(priority, existing.priority));
        self.listeners.insert(slot, listener);

        for cursor in &mut self.cursors {
            if cursor.index > slot {
                cursor.index += 1;
            }
        }
        slot
    }

    /// Remove every listener with the given id. Returns how many were removed.
    pub(crate) fn remove(&mut self, id: ListenerId) -> usize {
        self.remove_where(|listener| listener.id == id)
    }

    /// Remove every listener matching `predicate`, scanning from the tail.
    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&Listener<E, K>) -> bool) -> usize {
        let mut removed = 0;
        let mut slot = self.listeners.len();
        while slot > 0 {
            slot -= 1;
            if !predicate(&self.listeners[slot]) {
                continue;
            }
            self.listeners.remove(slot);
            removed += 1;
            for cursor in &mut self.cursors {
                if cursor.index > slot {
                    cursor.index -= 1;
                }
            }
        }
        removed
    }

    /// Drop every listener. The caller guarantees no cursor is active.
    pub(crate) fn clear(&mut self) {
        debug_assert!(
            self.cursors.is_empty(),
            "registry cleared while a walk is in flight"
        );
        self.listeners.clear();
    }

    pub(crate) fn has_active_cursors(&self) -> bool {
        !self.cursors.is_empty()
    }

    /// Register a new cursor positioned before the first listener.
    pub(crate) fn open_cursor(&mut self) -> CursorToken {
        let token = CursorToken(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        self.cursors.push(ActiveCursor { token, index: 0 });
        token
    }

    pub(crate) fn close_cursor(&mut self, token: CursorToken) {
        self.cursors.retain(|cursor| cursor.token != token);
    }

    /// The listener the cursor will visit next, if any.
    pub(crate) fn peek(&self, token: CursorToken) -> Option<&Listener<E, K>> {
        let index = self.cursor(token)?;
        self.listeners.get(index)
    }

    /// Move the cursor past its current listener.
    pub(crate) fn advance(&mut self, token: CursorToken) {
        if let Some(cursor) = self.cursors.iter_mut().find(|c| c.token == token) {
            cursor.index += 1;
        }
    }

    pub(crate) fn cursor(&self, token: CursorToken) -> Option<usize> {
        self.cursors
            .iter()
            .find(|c| c.token == token)
            .map(|c| c.index)
    }

    /// Priorities in iteration order.
    #[cfg(test)]
    pub(crate) fn priorities(&self) -> Vec<Priority> {
        self.listeners.iter().map(|l| l.priority).collect()
    }

    /// Listener ids in iteration order.
    #[cfg(test)]
    pub(crate) fn ids(&self) -> Vec<u64> {
        self.listeners.iter().map(|l| l.id.get()).collect()
    }
}
