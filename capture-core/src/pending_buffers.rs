//! Bookkeeping of output buffers the pipeline still holds, per in-flight
//! request. Flush and error reporting consult it to learn what is outstanding.

use std::sync::Mutex;

use log::debug;
use smallvec::SmallVec;

use crate::{
    invalid_error,
    stream::{BufferHandle, BufferStatus, StreamBuffer, StreamId},
    utils::lock,
    Result,
};

const DEFAULT_MAX_BUFFERS_PER_REQUEST: usize = 4;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PendingBufferInfo {
    pub stream: StreamId,
    pub handle: BufferHandle,
    pub status: BufferStatus,
}

impl From<PendingBufferInfo> for StreamBuffer {
    fn from(info: PendingBufferInfo) -> Self {
        StreamBuffer::new(info.stream, info.handle).with_status(info.status)
    }
}

#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub frame_number: u32,
    // Queue time in nanoseconds, replaced once capture starts
    pub timestamp: i64,
    pub buffers: SmallVec<[PendingBufferInfo; DEFAULT_MAX_BUFFERS_PER_REQUEST]>,
    // Served by an auxiliary processing path instead of the regular pipeline
    pub auxiliary: bool,
}

/// Result of removing a buffer from the tracker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BufferRemoval {
    pub frame_number: u32,
    pub status: BufferStatus,
    /// The owning request has no outstanding buffers left.
    pub request_complete: bool,
    pub auxiliary: bool,
}

struct PendingBuffers {
    // Ordered by frame number
    requests: Vec<PendingRequest>,
    pending_at_flush: usize,
}

impl PendingBuffers {
    fn locate(&self, handle: BufferHandle) -> Option<(usize, usize)> {
        self.requests.iter().enumerate().find_map(|(request_index, request)| {
            request.buffers.iter().position(|info| info.handle == handle).map(|buffer_index| (request_index, buffer_index))
        })
    }

    fn find_request(&self, frame_number: u32) -> std::result::Result<usize, usize> {
        self.requests.binary_search_by_key(&frame_number, |request| request.frame_number)
    }
}

pub struct PendingBuffersTracker {
    pending: Mutex<PendingBuffers>,
}

impl Default for PendingBuffersTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingBuffersTracker {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(PendingBuffers {
                requests: Vec::new(),
                pending_at_flush: 0,
            }),
        }
    }

    /// Records every buffer `frame_number` expects, each with status `Ok`.
    pub fn add_request<I>(&self, frame_number: u32, timestamp: i64, buffers: I, auxiliary: bool) -> Result<()>
    where
        I: IntoIterator<Item = (StreamId, BufferHandle)>,
    {
        let buffers: SmallVec<[PendingBufferInfo; DEFAULT_MAX_BUFFERS_PER_REQUEST]> = buffers
            .into_iter()
            .map(|(stream, handle)| PendingBufferInfo {
                stream,
                handle,
                status: BufferStatus::Ok,
            })
            .collect();

        let mut pending = lock(&self.pending);

        let index = match pending.find_request(frame_number) {
            Ok(_) => return Err(invalid_error!("frame number already pending")),
            Err(index) => index,
        };

        if buffers.is_empty() {
            debug!("request {} has no output buffers", frame_number);
            return Ok(());
        }

        pending.requests.insert(index, PendingRequest {
            frame_number,
            timestamp,
            buffers,
            auxiliary,
        });

        Ok(())
    }

    /// Removes `handle` from its owning request, dropping the request once it
    /// has nothing outstanding. Unknown handles are ignored.
    pub fn remove_buffer(&self, handle: BufferHandle) -> Option<BufferRemoval> {
        let mut pending = lock(&self.pending);

        let Some((request_index, buffer_index)) = pending.locate(handle) else {
            debug!("{} is not pending", handle);
            return None;
        };

        let request = &mut pending.requests[request_index];
        let info = request.buffers.remove(buffer_index);
        let frame_number = request.frame_number;
        let auxiliary = request.auxiliary;
        let request_complete = request.buffers.is_empty();

        if request_complete {
            pending.requests.remove(request_index);
        }

        Some(BufferRemoval {
            frame_number,
            status: info.status,
            request_complete,
            auxiliary,
        })
    }

    /// Status recorded for `handle`, or `None` if it is not pending.
    pub fn error_status(&self, handle: BufferHandle) -> Option<BufferStatus> {
        let pending = lock(&self.pending);
        let (request_index, buffer_index) = pending.locate(handle)?;
        Some(pending.requests[request_index].buffers[buffer_index].status)
    }

    pub fn set_error_status(&self, handle: BufferHandle, status: BufferStatus) -> bool {
        let mut pending = lock(&self.pending);

        match pending.locate(handle) {
            Some((request_index, buffer_index)) => {
                pending.requests[request_index].buffers[buffer_index].status = status;
                true
            }
            None => false,
        }
    }

    /// Buffers still outstanding across all requests.
    pub fn count_outstanding(&self) -> usize {
        lock(&self.pending).requests.iter().map(|request| request.buffers.len()).sum()
    }

    pub fn outstanding_for(&self, frame_number: u32) -> usize {
        let pending = lock(&self.pending);
        pending.find_request(frame_number).map_or(0, |index| pending.requests[index].buffers.len())
    }

    /// Restarts the age of `frame_number` at `timestamp`, typically when its
    /// capture starts.
    pub fn update_timestamp(&self, frame_number: u32, timestamp: i64) -> bool {
        let mut pending = lock(&self.pending);

        match pending.find_request(frame_number) {
            Ok(index) => {
                pending.requests[index].timestamp = timestamp;
                true
            }
            Err(_) => false,
        }
    }

    pub fn request_count(&self) -> usize {
        lock(&self.pending).requests.len()
    }

    /// Records the number of outstanding buffers at the start of a flush and
    /// returns it.
    pub fn begin_flush(&self) -> usize {
        let mut pending = lock(&self.pending);
        let outstanding = pending.requests.iter().map(|request| request.buffers.len()).sum();
        pending.pending_at_flush = outstanding;
        outstanding
    }

    pub fn pending_at_flush(&self) -> usize {
        lock(&self.pending).pending_at_flush
    }

    pub fn remove_request(&self, frame_number: u32) -> Option<PendingRequest> {
        let mut pending = lock(&self.pending);
        let index = pending.find_request(frame_number).ok()?;
        Some(pending.requests.remove(index))
    }

    /// Removes and returns every pending request, lowest frame number first.
    pub fn take_all(&self) -> Vec<PendingRequest> {
        std::mem::take(&mut lock(&self.pending).requests)
    }

    /// Frame numbers of requests whose timestamp lies more than `max_age`
    /// nanoseconds before `now` and that still have buffers outstanding.
    pub fn stale_requests(&self, now: i64, max_age: i64) -> Vec<u32> {
        lock(&self.pending)
            .requests
            .iter()
            .filter(|request| now.saturating_sub(request.timestamp) > max_age)
            .map(|request| request.frame_number)
            .collect()
    }
}
