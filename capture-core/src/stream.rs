use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::Display as StrumDisplay;

/// Opaque identity of a configured output stream.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StreamId(pub u32);

impl Display for StreamId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Opaque identity of a buffer handed to the pipeline by the consumer.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BufferHandle(pub u64);

impl Display for BufferHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "buffer#{:#x}", self.0)
    }
}

#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive, StrumDisplay)]
#[strum(serialize_all = "lowercase")]
pub enum BufferStatus {
    #[default]
    Ok = 0,
    Error = 1,
}

impl BufferStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, BufferStatus::Error)
    }
}

/// Output buffer payload released to the consumer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamBuffer {
    pub stream: StreamId,
    pub handle: BufferHandle,
    pub status: BufferStatus,
    pub release_fence: Option<i32>,
}

impl StreamBuffer {
    pub fn new(stream: StreamId, handle: BufferHandle) -> Self {
        Self {
            stream,
            handle,
            status: BufferStatus::Ok,
            release_fence: None,
        }
    }

    pub fn with_status(mut self, status: BufferStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_release_fence(mut self, fence: i32) -> Self {
        self.release_fence = Some(fence);
        self
    }
}
