use capture_core::{BufferHandle, StreamId};
use smallvec::SmallVec;

const DEFAULT_MAX_OUTPUT_BUFFERS: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OutputBuffer {
    pub stream: StreamId,
    pub handle: BufferHandle,
}

/// A framework capture request as seen by the session.
#[derive(Clone, Debug)]
pub struct CaptureRequest {
    pub frame_number: u32,
    pub output_buffers: SmallVec<[OutputBuffer; DEFAULT_MAX_OUTPUT_BUFFERS]>,
    // Served by an auxiliary processing path instead of the regular pipeline
    pub auxiliary: bool,
}

impl CaptureRequest {
    pub fn new(frame_number: u32) -> Self {
        Self {
            frame_number,
            output_buffers: SmallVec::new(),
            auxiliary: false,
        }
    }

    pub fn with_output(mut self, stream: StreamId, handle: BufferHandle) -> Self {
        self.output_buffers.push(OutputBuffer {
            stream,
            handle,
        });
        self
    }

    pub fn with_auxiliary(mut self, auxiliary: bool) -> Self {
        self.auxiliary = auxiliary;
        self
    }
}

/// Outcome of a flush.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FlushReport {
    /// Buffers outstanding when the flush started.
    pub pending_at_flush: usize,
    /// Requests returned to the listener through `on_request_aborted`.
    pub aborted_frames: Vec<u32>,
    pub timed_out: bool,
}
