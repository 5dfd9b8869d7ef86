//! In-order delivery of shutter notifications.
//!
//! A shutter for a frame is delivered only after the shutters of every
//! earlier expected frame were delivered.

use std::{collections::BTreeMap, sync::Mutex};

use log::{trace, warn};

use crate::{listener::SharedListener, utils::lock};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Shutter {
    Expected,
    Ready(i64),
}

pub struct ShutterDispatcher {
    // frame number -> shutter
    shutters: Mutex<BTreeMap<u32, Shutter>>,
    listener: SharedListener,
}

impl ShutterDispatcher {
    pub fn new(listener: SharedListener) -> Self {
        Self {
            shutters: Mutex::new(BTreeMap::new()),
            listener,
        }
    }

    /// Expects a shutter for `frame_number`. Expecting a frame that is already
    /// pending keeps the existing record.
    pub fn expect(&self, frame_number: u32) {
        let mut shutters = lock(&self.shutters);

        if shutters.contains_key(&frame_number) {
            warn!("shutter for frame {} is already expected", frame_number);
            return;
        }

        shutters.insert(frame_number, Shutter::Expected);
    }

    /// Marks the shutter of `frame_number` ready and delivers every shutter
    /// that is no longer blocked by an earlier frame.
    pub fn mark_ready(&self, frame_number: u32, timestamp: i64) {
        let mut shutters = lock(&self.shutters);

        match shutters.get_mut(&frame_number) {
            Some(shutter) if *shutter == Shutter::Expected => *shutter = Shutter::Ready(timestamp),
            Some(_) => {
                warn!("shutter for frame {} is already ready", frame_number);
                return;
            }
            None => {
                warn!("dropping unexpected shutter for frame {}", frame_number);
                return;
            }
        }

        while let Some(entry) = shutters.first_entry() {
            let Shutter::Ready(timestamp) = *entry.get() else {
                break;
            };

            let frame_number = entry.remove_entry().0;
            trace!("dispatching shutter for frame {} at {}", frame_number, timestamp);
            self.listener.on_shutter(frame_number, timestamp);
        }
    }

    /// Discards the shutter of `frame_number` without delivering it.
    pub fn clear_frame(&self, frame_number: u32) {
        lock(&self.shutters).remove(&frame_number);
    }

    /// Discards every pending shutter without delivering it.
    pub fn clear(&self) {
        lock(&self.shutters).clear();
    }

    /// Frames whose shutter has not been delivered yet, ascending.
    pub fn pending_frames(&self) -> Vec<u32> {
        lock(&self.shutters).keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.shutters).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
