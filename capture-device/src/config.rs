use std::time::Duration;

use capture_core::frame_number::{FRAME_REGISTER_CAPACITY, INTERNAL_FRAME_STARTING_NUMBER};

pub const DEFAULT_FLUSH_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MISSING_BUFFER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Number of frame number mappings kept before the oldest are evicted.
    pub registry_capacity: usize,
    pub internal_frame_start: u32,
    /// Upper bound a flush waits for outstanding buffers.
    pub flush_timeout: Duration,
    /// Age after which a request with missing buffers is reported as stale.
    pub missing_buffer_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            registry_capacity: FRAME_REGISTER_CAPACITY,
            internal_frame_start: INTERNAL_FRAME_STARTING_NUMBER,
            flush_timeout: DEFAULT_FLUSH_TIMEOUT,
            missing_buffer_timeout: DEFAULT_MISSING_BUFFER_TIMEOUT,
        }
    }
}
