use std::{
    sync::{mpsc, Arc},
    thread,
    time::Duration,
};

use capture_core::{time::timestamp_nsec, BufferHandle, CaptureResultListener, StreamBuffer, StreamId};
use capture_device::{CaptureRequest, CaptureSession, SessionConfig};
use log::{error, info};

const PREVIEW: StreamId = StreamId(0);
const VIDEO: StreamId = StreamId(1);
const FRAMES: u32 = 16;

struct Logger;

impl CaptureResultListener for Logger {
    fn on_shutter(&self, frame_number: u32, timestamp: i64) {
        info!("shutter: frame {} at {}", frame_number, timestamp);
    }

    fn on_buffer_ready(&self, frame_number: u32, buffer: &StreamBuffer) {
        info!("buffer: frame {} on {} ({})", frame_number, buffer.stream, buffer.status);
    }

    fn on_request_aborted(&self, frame_number: u32, buffers: &[StreamBuffer]) {
        info!("aborted: frame {} with {} buffers", frame_number, buffers.len());
    }
}

// Sleeps a pseudo-random amount so completions arrive out of order
fn jitter(seed: u32) {
    thread::sleep(Duration::from_micros((seed.wrapping_mul(2654435761) % 3000) as u64));
}

fn main() {
    std::env::set_var("RUST_LOG", "info");
    env_logger::init();

    let session = Arc::new(CaptureSession::new(SessionConfig::default(), Arc::new(Logger)));
    if let Err(e) = session.configure_streams([PREVIEW, VIDEO]) {
        error!("{:?}", e.to_string());
        return;
    }

    // One channel per completion thread: shutter, preview, video
    let (senders, receivers): (Vec<_>, Vec<_>) = (0..3).map(|_| mpsc::channel::<(u32, u32)>()).unzip();

    let workers: Vec<_> = receivers
        .into_iter()
        .enumerate()
        .map(|(index, rx)| {
            let session = session.clone();
            thread::spawn(move || {
                for (frame_number, internal) in rx {
                    jitter(frame_number + index as u32 * 31);
                    match index {
                        0 => session.notify_shutter(internal, timestamp_nsec()),
                        1 => session.notify_buffer(internal, StreamBuffer::new(PREVIEW, BufferHandle(frame_number as u64))),
                        _ => session.notify_buffer(internal, StreamBuffer::new(VIDEO, BufferHandle(0x1000 + frame_number as u64))),
                    }
                }
            })
        })
        .collect();

    for frame_number in 0..FRAMES {
        let request = CaptureRequest::new(frame_number)
            .with_output(PREVIEW, BufferHandle(frame_number as u64))
            .with_output(VIDEO, BufferHandle(0x1000 + frame_number as u64));

        let internal = match session.submit_request(&request) {
            Ok(internal) => internal,
            Err(e) => {
                error!("{:?}", e.to_string());
                continue;
            }
        };

        for tx in &senders {
            tx.send((frame_number, internal)).ok();
        }
    }

    drop(senders);
    for worker in workers {
        worker.join().ok();
    }

    let report = session.flush();
    info!("flush report: {:?}", report);

    session.teardown();
    info!("done");
}
