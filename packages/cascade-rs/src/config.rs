//! Bus configuration.
//!
//! `BusConfig` is plain data so a host can embed it in its own configuration
//! file:
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct GameConfig {
//!     #[serde(default)]
//!     events: cascade::BusConfig,
//! }
//! ```

use serde::{Deserialize, Serialize};

/// Default number of idle walks / queued-event holders kept per event type.
pub const DEFAULT_POOL_CAPACITY: usize = 16;

/// Default initial capacity of the deferred queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// Tunables for an [`EventBus`](crate::EventBus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Maximum idle values each per-event-type pool retains. `0` disables
    /// reuse.
    pub pool_capacity: usize,

    /// Initial capacity of the deferred-event queue.
    pub queue_capacity: usize,
}

impl BusConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the per-event-type pool capacity.
    pub fn with_pool_capacity(mut self, n: usize) -> Self {
        self.pool_capacity = n;
        self
    }

    /// Set the initial deferred-queue capacity.
    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new()
    }
}
