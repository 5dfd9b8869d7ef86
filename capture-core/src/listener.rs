use std::sync::Arc;

use crate::stream::StreamBuffer;

/// Consumer of ordered capture results.
///
/// Callbacks run on whichever completion thread unblocked them, while the
/// calling dispatcher holds its lock. An implementation must not call back
/// into the dispatcher that invoked it.
pub trait CaptureResultListener: Send + Sync {
    /// Capture of `frame_number` started at `timestamp` (nanoseconds).
    fn on_shutter(&self, frame_number: u32, timestamp: i64);

    /// Output for `frame_number` on `buffer.stream` is ready.
    fn on_buffer_ready(&self, frame_number: u32, buffer: &StreamBuffer);

    /// `frame_number` was abandoned by a flush; `buffers` are returned with an
    /// error status and will never be reported through `on_buffer_ready`.
    /// Neither will its shutter, if it has not been delivered yet. `buffers`
    /// is empty when only the shutter was still owed.
    fn on_request_aborted(&self, frame_number: u32, buffers: &[StreamBuffer]) {
        let _ = (frame_number, buffers);
    }
}

pub type SharedListener = Arc<dyn CaptureResultListener>;
