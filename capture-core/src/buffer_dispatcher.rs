//! In-order delivery of output buffers, one queue per stream.
//!
//! A buffer on a stream is delivered only after the buffers of every earlier
//! expected frame on the same stream were delivered. Streams never block each
//! other.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};

use log::{debug, trace, warn};

use crate::{
    error::Error,
    listener::SharedListener,
    stream::{StreamBuffer, StreamId},
    utils::lock,
    Result,
};

#[derive(Clone, Copy, Debug)]
enum Slot {
    Expected,
    Ready(StreamBuffer),
}

pub struct OutputBufferDispatcher {
    // stream -> (frame number -> buffer)
    stream_buffers: Mutex<HashMap<StreamId, BTreeMap<u32, Slot>>>,
    listener: SharedListener,
}

impl OutputBufferDispatcher {
    pub fn new(listener: SharedListener) -> Self {
        Self {
            stream_buffers: Mutex::new(HashMap::new()),
            listener,
        }
    }

    /// Tracks exactly `streams` from now on; all pending buffers are dropped.
    pub fn configure_streams<I>(&self, streams: I)
    where
        I: IntoIterator<Item = StreamId>,
    {
        let mut stream_buffers = lock(&self.stream_buffers);

        stream_buffers.clear();
        for stream in streams {
            stream_buffers.insert(stream, BTreeMap::new());
        }

        debug!("configured {} output streams", stream_buffers.len());
    }

    pub fn is_configured(&self, stream: StreamId) -> bool {
        lock(&self.stream_buffers).contains_key(&stream)
    }

    pub fn streams(&self) -> Vec<StreamId> {
        let mut streams: Vec<StreamId> = lock(&self.stream_buffers).keys().copied().collect();
        streams.sort_unstable();
        streams
    }

    /// Expects a buffer for `frame_number` on `stream`. Expecting a buffer that
    /// is already pending keeps the existing record.
    pub fn expect(&self, frame_number: u32, stream: StreamId) -> Result<()> {
        let mut stream_buffers = lock(&self.stream_buffers);

        let buffers = stream_buffers.get_mut(&stream).ok_or(Error::UnknownStream(stream))?;
        if buffers.contains_key(&frame_number) {
            warn!("buffer for frame {} on {} is already expected", frame_number, stream);
            return Ok(());
        }

        buffers.insert(frame_number, Slot::Expected);

        Ok(())
    }

    /// Marks `buffer` ready for `frame_number` and delivers every buffer on the
    /// same stream that is no longer blocked by an earlier frame.
    pub fn mark_ready(&self, frame_number: u32, buffer: StreamBuffer) {
        let mut stream_buffers = lock(&self.stream_buffers);

        let Some(buffers) = stream_buffers.get_mut(&buffer.stream) else {
            warn!("dropping buffer for frame {} on unconfigured {}", frame_number, buffer.stream);
            return;
        };

        match buffers.get_mut(&frame_number) {
            Some(slot) if matches!(*slot, Slot::Expected) => *slot = Slot::Ready(buffer),
            Some(_) => {
                warn!("buffer for frame {} on {} is already ready", frame_number, buffer.stream);
                return;
            }
            None => {
                warn!("dropping unexpected buffer for frame {} on {}", frame_number, buffer.stream);
                return;
            }
        }

        while let Some(entry) = buffers.first_entry() {
            let Slot::Ready(ready) = *entry.get() else {
                break;
            };

            let frame_number = entry.remove_entry().0;
            trace!("dispatching {} for frame {} on {}", ready.handle, frame_number, ready.stream);
            self.listener.on_buffer_ready(frame_number, &ready);
        }
    }

    /// Discards the buffers of `frame_number` on every stream without
    /// delivering them.
    pub fn clear_frame(&self, frame_number: u32) {
        for buffers in lock(&self.stream_buffers).values_mut() {
            buffers.remove(&frame_number);
        }
    }

    /// Removes every buffer that is ready but still blocked by an earlier
    /// frame, lowest frame number first. Expected records stay in place.
    pub fn take_ready(&self) -> Vec<(u32, StreamBuffer)> {
        let mut ready = Vec::new();

        for buffers in lock(&self.stream_buffers).values_mut() {
            buffers.retain(|frame_number, slot| match *slot {
                Slot::Ready(buffer) => {
                    ready.push((*frame_number, buffer));
                    false
                }
                Slot::Expected => true,
            });
        }

        ready.sort_by_key(|(frame_number, buffer)| (*frame_number, buffer.stream));
        ready
    }

    /// Discards every pending buffer without delivering it. Unless
    /// `preserve_streams` is set, the stream configuration is dropped too.
    pub fn clear(&self, preserve_streams: bool) {
        let mut stream_buffers = lock(&self.stream_buffers);

        if preserve_streams {
            for buffers in stream_buffers.values_mut() {
                buffers.clear();
            }
        } else {
            stream_buffers.clear();
        }
    }

    /// Number of pending buffers across all streams.
    pub fn len(&self) -> usize {
        lock(&self.stream_buffers).values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
