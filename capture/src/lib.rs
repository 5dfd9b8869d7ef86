use cfg_if::cfg_if;

pub use capture_core::*;

cfg_if! {
    if #[cfg(feature = "device")] {
        pub use capture_device as device;
        pub use capture_device::{CaptureRequest, CaptureSession, FlushReport, SessionConfig};
    }
}
