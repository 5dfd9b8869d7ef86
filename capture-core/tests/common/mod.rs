#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use capture_core::{CaptureResultListener, StreamBuffer, StreamId};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Event {
    Shutter(u32, i64),
    Buffer(StreamId, u32),
    Aborted(u32, usize),
}

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn shutters(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Shutter(frame_number, _) => Some(frame_number),
                _ => None,
            })
            .collect()
    }

    pub fn buffers(&self, stream: StreamId) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Buffer(s, frame_number) if s == stream => Some(frame_number),
                _ => None,
            })
            .collect()
    }
}

impl CaptureResultListener for Recorder {
    fn on_shutter(&self, frame_number: u32, timestamp: i64) {
        self.events.lock().unwrap().push(Event::Shutter(frame_number, timestamp));
    }

    fn on_buffer_ready(&self, frame_number: u32, buffer: &StreamBuffer) {
        self.events.lock().unwrap().push(Event::Buffer(buffer.stream, frame_number));
    }

    fn on_request_aborted(&self, frame_number: u32, buffers: &[StreamBuffer]) {
        self.events.lock().unwrap().push(Event::Aborted(frame_number, buffers.len()));
    }
}

/// Deterministic permutation of `0..n` from a linear congruential sequence.
pub fn shuffled(n: u32, seed: u64) -> Vec<u32> {
    let mut values: Vec<u32> = (0..n).collect();
    let mut state = seed;
    for i in (1..values.len()).rev() {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let j = (state >> 33) as usize % (i + 1);
        values.swap(i, j);
    }
    values
}
