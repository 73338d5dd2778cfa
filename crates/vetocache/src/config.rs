//! Construction parameters for [`Cache`](crate::Cache)

/// Default pre-allocation for the eviction batch buffer
pub const DEFAULT_EVICTED_BUFFER_SIZE: usize = 16;

/// Cache configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of live entries
    pub capacity: usize,

    /// Initial capacity of the eviction batch buffer (sizing hint only)
    pub evicted_buffer_capacity: usize,
}

impl CacheConfig {
    /// Configuration for a cache holding `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            evicted_buffer_capacity: DEFAULT_EVICTED_BUFFER_SIZE,
        }
    }

    /// Override the eviction batch buffer pre-allocation
    pub fn evicted_buffer_capacity(mut self, size: usize) -> Self {
        self.evicted_buffer_capacity = size;
        self
    }
}
