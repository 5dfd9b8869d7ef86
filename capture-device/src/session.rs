//! Request orchestration around the ordered dispatch core.
//!
//! The session assigns internal frame numbers to framework requests, registers
//! what each request expects, and routes pipeline completions (which carry
//! internal frame numbers) to the dispatchers under the framework frame
//! number. Completion methods may be called from any number of threads.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
    },
    time::Duration,
};

use capture_core::{
    error::Error, invalid_error, time::timestamp_nsec, BufferHandle, BufferStatus, FrameNumberRegistry, OutputBufferDispatcher, PendingBuffersTracker,
    Result, SharedListener, ShutterDispatcher, StreamBuffer, StreamId,
};
use log::{debug, info, trace, warn};
use smallvec::SmallVec;

use crate::{CaptureRequest, FlushReport, SessionConfig};

pub struct CaptureSession {
    config: SessionConfig,
    registry: FrameNumberRegistry,
    shutters: ShutterDispatcher,
    buffers: OutputBufferDispatcher,
    pending: PendingBuffersTracker,
    listener: SharedListener,
    flushing: AtomicBool,
    // Held for the whole of a flush, one flush at a time
    flush_serial: Mutex<()>,
    // Completions hold it shared, flush holds it exclusively while aborting
    completion_gate: RwLock<()>,
    // Pairs with `buffers_cond`, signalled whenever a buffer comes back
    flush_lock: Mutex<()>,
    buffers_cond: Condvar,
}

impl CaptureSession {
    pub fn new(config: SessionConfig, listener: SharedListener) -> Self {
        Self {
            registry: FrameNumberRegistry::with_capacity(config.registry_capacity, config.internal_frame_start),
            shutters: ShutterDispatcher::new(listener.clone()),
            buffers: OutputBufferDispatcher::new(listener.clone()),
            pending: PendingBuffersTracker::new(),
            listener,
            flushing: AtomicBool::new(false),
            flush_serial: Mutex::new(()),
            completion_gate: RwLock::new(()),
            flush_lock: Mutex::new(()),
            buffers_cond: Condvar::new(),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn configured_streams(&self) -> Vec<StreamId> {
        self.buffers.streams()
    }

    pub fn outstanding_buffers(&self) -> usize {
        self.pending.count_outstanding()
    }

    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    /// Replaces the set of output streams. Refused while buffers are still
    /// outstanding.
    pub fn configure_streams<I>(&self, streams: I) -> Result<()>
    where
        I: IntoIterator<Item = StreamId>,
    {
        let outstanding = self.pending.count_outstanding();
        if outstanding > 0 {
            warn!("cannot configure streams with {} buffers outstanding", outstanding);
            return Err(invalid_error!("buffers still outstanding"));
        }

        self.shutters.clear();
        self.buffers.configure_streams(streams);

        Ok(())
    }

    /// Registers a framework request and returns the internal frame number the
    /// pipeline must report its completions with.
    pub fn submit_request(&self, request: &CaptureRequest) -> Result<u32> {
        if self.is_flushing() {
            return Err(Error::Again("flush in progress".into()));
        }

        if let Some(output) = request.output_buffers.iter().find(|output| !self.buffers.is_configured(output.stream)) {
            return Err(Error::UnknownStream(output.stream));
        }

        let frame_number = request.frame_number;
        let internal = self.registry.allocate_and_store(frame_number)?;

        let outputs = request.output_buffers.iter().map(|output| (output.stream, output.handle));
        if let Err(err) = self.pending.add_request(frame_number, timestamp_nsec(), outputs, request.auxiliary) {
            self.registry.free(internal).ok();
            return Err(err);
        }

        self.shutters.expect(frame_number);
        for output in &request.output_buffers {
            if let Err(err) = self.buffers.expect(frame_number, output.stream) {
                // Streams were reconfigured underneath us
                self.pending.remove_request(frame_number);
                self.shutters.clear_frame(frame_number);
                self.buffers.clear_frame(frame_number);
                self.registry.free(internal).ok();
                return Err(err);
            }
        }

        debug!("request {} submitted as internal frame {} with {} buffers", frame_number, internal, request.output_buffers.len());

        Ok(internal)
    }

    /// Allocates an internal frame number for a pipeline operation that has no
    /// framework request behind it.
    pub fn submit_internal_request(&self) -> Result<u32> {
        if self.is_flushing() {
            return Err(Error::Again("flush in progress".into()));
        }

        Ok(self.registry.generate_and_store())
    }

    pub fn complete_internal_request(&self, internal: u32) -> Result<()> {
        self.registry.free(internal)
    }

    /// Pipeline report: capture of `internal` started at `timestamp`. The
    /// missing-buffer timeout of the request restarts from here.
    pub fn notify_shutter(&self, internal: u32, timestamp: i64) {
        let frame_number = match self.registry.resolve_external_id(internal) {
            Ok(Some(frame_number)) => frame_number,
            Ok(None) => {
                trace!("ignoring shutter of internal-only frame {}", internal);
                return;
            }
            Err(err) => {
                warn!("dropping shutter of frame {}: {}", internal, err);
                return;
            }
        };

        let _gate = self.enter_completion();
        self.pending.update_timestamp(frame_number, timestamp_nsec());
        self.shutters.mark_ready(frame_number, timestamp);
    }

    /// Pipeline report: `buffer` of `internal` is complete.
    pub fn notify_buffer(&self, internal: u32, buffer: StreamBuffer) {
        let frame_number = match self.registry.resolve_external_id(internal) {
            Ok(Some(frame_number)) => frame_number,
            Ok(None) => {
                trace!("ignoring {} of internal-only frame {}", buffer.handle, internal);
                return;
            }
            Err(err) => {
                warn!("dropping {} of frame {}: {}", buffer.handle, internal, err);
                return;
            }
        };

        {
            let _gate = self.enter_completion();

            let Some(removal) = self.pending.remove_buffer(buffer.handle) else {
                warn!("dropping untracked {} of frame {}", buffer.handle, frame_number);
                return;
            };

            if removal.frame_number != frame_number {
                warn!("{} belongs to frame {}, reported for frame {}", buffer.handle, removal.frame_number, frame_number);
            }

            let status = if removal.status.is_error() {
                BufferStatus::Error
            } else {
                buffer.status
            };
            self.buffers.mark_ready(removal.frame_number, buffer.with_status(status));

            if removal.request_complete {
                let path = if removal.auxiliary {
                    "auxiliary"
                } else {
                    "pipeline"
                };
                debug!("{} request {} has no outstanding buffers", path, removal.frame_number);
            }
        }

        let _guard = self.lock_flush();
        self.buffers_cond.notify_all();
    }

    /// Marks a still outstanding buffer as failed; its eventual completion is
    /// delivered with an error status.
    pub fn mark_buffer_error(&self, handle: BufferHandle) -> bool {
        self.pending.set_error_status(handle, BufferStatus::Error)
    }

    /// Frame numbers of requests whose buffers have been missing for longer
    /// than the configured timeout.
    pub fn stale_requests(&self) -> Vec<u32> {
        let max_age = i64::try_from(self.config.missing_buffer_timeout.as_nanos()).unwrap_or(i64::MAX);
        self.pending.stale_requests(timestamp_nsec(), max_age)
    }

    pub fn flush(&self) -> FlushReport {
        self.flush_with_timeout(self.config.flush_timeout)
    }

    /// Waits up to `timeout` for outstanding buffers, then abandons every
    /// request that has not been delivered completely. Each of them is
    /// reported through `on_request_aborted` together with its undelivered
    /// buffers before the ordering state is cleared. Concurrent flushes run
    /// one after the other.
    pub fn flush_with_timeout(&self, timeout: Duration) -> FlushReport {
        let _serial = self.flush_serial.lock().unwrap_or_else(PoisonError::into_inner);
        self.flushing.store(true, Ordering::SeqCst);

        let pending_at_flush = self.pending.begin_flush();
        info!("flushing with {} buffers outstanding", pending_at_flush);

        let timed_out = {
            let guard = self.lock_flush();
            let (_guard, result) = self
                .buffers_cond
                .wait_timeout_while(guard, timeout, |_| self.pending.count_outstanding() > 0)
                .unwrap_or_else(PoisonError::into_inner);
            result.timed_out()
        };

        let aborted_frames = {
            let _gate = self.block_completions();

            let unfinished = self.take_unfinished();
            for (frame_number, buffers) in &unfinished {
                self.listener.on_request_aborted(*frame_number, buffers);
            }

            self.shutters.clear();
            self.buffers.clear(true);

            unfinished.into_keys().collect::<Vec<_>>()
        };

        self.flushing.store(false, Ordering::SeqCst);

        if timed_out {
            warn!("flush timed out, {} requests aborted", aborted_frames.len());
        } else {
            info!("flush done, {} requests aborted", aborted_frames.len());
        }

        FlushReport {
            pending_at_flush,
            aborted_frames,
            timed_out,
        }
    }

    /// Drops all in-flight state including the stream configuration.
    pub fn teardown(&self) {
        let dropped = {
            let _gate = self.block_completions();

            let dropped = self.pending.take_all();
            self.shutters.clear();
            self.buffers.clear(false);
            self.registry.clear();
            dropped
        };

        info!("session torn down, {} pending requests dropped", dropped.len());

        let _guard = self.lock_flush();
        self.buffers_cond.notify_all();
    }

    // Every request with something undelivered, keyed by frame number, with
    // the buffers still owed to the consumer marked as failed. Callers hold
    // the completion gate exclusively.
    fn take_unfinished(&self) -> BTreeMap<u32, SmallVec<[StreamBuffer; 4]>> {
        let mut unfinished: BTreeMap<u32, SmallVec<[StreamBuffer; 4]>> = BTreeMap::new();

        for request in self.pending.take_all() {
            let buffers = request.buffers.iter().map(|info| StreamBuffer::from(*info).with_status(BufferStatus::Error));
            unfinished.entry(request.frame_number).or_default().extend(buffers);
        }

        // Completed, but blocked behind an earlier frame
        for (frame_number, buffer) in self.buffers.take_ready() {
            unfinished.entry(frame_number).or_default().push(buffer.with_status(BufferStatus::Error));
        }

        for frame_number in self.shutters.pending_frames() {
            unfinished.entry(frame_number).or_default();
        }

        unfinished
    }

    fn enter_completion(&self) -> RwLockReadGuard<'_, ()> {
        self.completion_gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn block_completions(&self) -> RwLockWriteGuard<'_, ()> {
        self.completion_gate.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_flush(&self) -> MutexGuard<'_, ()> {
        self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
