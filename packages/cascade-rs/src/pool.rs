//! Bounded free-list of reusable values.
//!
//! The bus keeps one pool of walk iterators and one pool of queued-event
//! holders per event type so that steady-state raising does not allocate.
//! Pooling is purely an optimisation: a pool with capacity `0` hands out a
//! fresh value on every acquire and behaves identically otherwise.

/// A bounded pool of idle values.
#[derive(Debug)]
pub struct Pool<T> {
    idle: Vec<T>,
    capacity: usize,
}

impl<T> Pool<T> {
    /// Create a pool that retains at most `capacity` idle values.
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Vec::new(),
            capacity,
        }
    }

    /// Take an idle value, or build one with `make` if none is available.
    pub fn acquire_with(&mut self, make: impl FnOnce() -> T) -> T {
        self.idle.pop().unwrap_or_else(make)
    }

    /// Return a value for reuse.
    ///
    /// The caller resets the value before releasing it. Returns false (and
    /// drops the value) when the pool is already full.
    pub fn release(&mut self, value: T) -> bool {
        if self.idle.len() >= self.capacity {
            return false;
        }
        self.idle.push(value);
        true
    }

    /// Number of idle values currently retained.
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    /// Returns true if no idle values are retained.
    pub fn is_empty(&self) -> bool {
        self.idle.is_empty()
    }

    /// Maximum number of idle values retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Default> Pool<T> {
    /// Take an idle value, or a `T::default()` if none is available.
    pub fn acquire(&mut self) -> T {
        self.acquire_with(T::default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_builds_when_empty() {
        let mut pool: Pool<Vec<u8>> = Pool::new(4);
        let value = pool.acquire();
        assert!(value.is_empty());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_released_value_is_reused() {
        let mut pool = Pool::new(4);
        let mut buf: Vec<u8> = Vec::with_capacity(64);
        buf.clear();
        assert!(pool.release(buf));
        assert_eq!(pool.len(), 1);

        let reused = pool.acquire_with(Vec::new);
        assert!(reused.capacity() >= 64);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_release_past_capacity_drops() {
        let mut pool = Pool::new(1);
        assert!(pool.release(1_u32));
        assert!(!pool.release(2_u32));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.acquire(), 1);
    }

    #[test]
    fn test_zero_capacity_never_retains() {
        let mut pool = Pool::new(0);
        assert!(!pool.release(String::from("x")));
        assert_eq!(pool.capacity(), 0);
        assert_eq!(pool.acquire(), String::new());
    }
}
