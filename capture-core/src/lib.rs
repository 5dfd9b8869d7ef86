pub mod buffer_dispatcher;
pub mod error;
pub mod frame_number;
pub mod listener;
pub mod pending_buffers;
pub mod shutter;
pub mod stream;
pub mod time;

mod utils;

pub use buffer_dispatcher::OutputBufferDispatcher;
pub use frame_number::FrameNumberRegistry;
pub use listener::{CaptureResultListener, SharedListener};
pub use pending_buffers::{BufferRemoval, PendingBufferInfo, PendingBuffersTracker, PendingRequest};
pub use shutter::ShutterDispatcher;
pub use stream::*;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;
