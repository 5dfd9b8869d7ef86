//! Mapping between framework frame numbers and the internal frame numbers
//! handed to the capture pipeline.
//!
//! One framework request may fan out into several pipeline operations (for
//! example an extra metering-only capture). Each operation gets its own
//! internal frame number; operations without a framework counterpart map to
//! no external frame number at all.
//!
//! Internal numbers increase monotonically from a starting number and wrap
//! to zero on overflow, skipping numbers that are still mapped.
//!
//! The table is bounded. Once it holds more than its capacity, the oldest
//! entries are dropped in insertion order, so a pipeline that never frees its
//! numbers still runs in constant memory.

use std::{
    collections::{HashMap, VecDeque},
    sync::Mutex,
};

use log::debug;

use crate::{error::Error, utils::lock, Result};

pub const FRAME_REGISTER_CAPACITY: usize = 256;
pub const INTERNAL_FRAME_STARTING_NUMBER: u32 = 800;
pub const EMPTY_FRAMEWORK_FRAME_NUMBER: u32 = 0xFFFF_FFFF;

struct Register {
    // internal -> external, `None` for internal-only operations
    entries: HashMap<u32, Option<u32>>,
    // external -> internal
    external: HashMap<u32, u32>,
    // internal numbers, oldest first
    order: VecDeque<u32>,
    next_free: u32,
}

impl Register {
    fn next_internal_number(&mut self) -> u32 {
        loop {
            let candidate = self.next_free;
            self.next_free = match candidate.checked_add(1) {
                Some(next) if next != EMPTY_FRAMEWORK_FRAME_NUMBER => next,
                _ => 0,
            };

            if candidate != EMPTY_FRAMEWORK_FRAME_NUMBER && !self.entries.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    fn insert(&mut self, internal: u32, external: Option<u32>) {
        self.entries.insert(internal, external);
        if let Some(external) = external {
            self.external.insert(external, internal);
        }
        self.order.push_back(internal);
    }

    fn remove(&mut self, internal: u32) -> Option<Option<u32>> {
        let external = self.entries.remove(&internal)?;
        if let Some(external) = external {
            self.external.remove(&external);
        }
        if let Some(pos) = self.order.iter().position(|&n| n == internal) {
            self.order.remove(pos);
        }
        Some(external)
    }

    fn purge_old_entries(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };

            if let Some(external) = self.entries.remove(&oldest) {
                if let Some(external) = external {
                    self.external.remove(&external);
                }
                debug!("evicted internal frame number {} (external {:?})", oldest, external);
            }
        }
    }
}

fn not_found(internal: u32) -> Error {
    Error::NotFound(format!("internal frame number {}", internal).into())
}

pub struct FrameNumberRegistry {
    register: Mutex<Register>,
    capacity: usize,
}

impl Default for FrameNumberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameNumberRegistry {
    pub fn new() -> Self {
        Self::with_capacity(FRAME_REGISTER_CAPACITY, INTERNAL_FRAME_STARTING_NUMBER)
    }

    pub fn with_capacity(capacity: usize, starting_number: u32) -> Self {
        let capacity = capacity.max(1);
        let starting_number = if starting_number == EMPTY_FRAMEWORK_FRAME_NUMBER {
            INTERNAL_FRAME_STARTING_NUMBER
        } else {
            starting_number
        };

        Self {
            register: Mutex::new(Register {
                entries: HashMap::with_capacity(capacity + 1),
                external: HashMap::with_capacity(capacity + 1),
                order: VecDeque::with_capacity(capacity + 1),
                next_free: starting_number,
            }),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        lock(&self.register).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocates an internal frame number for a framework request.
    pub fn allocate_and_store(&self, external: u32) -> Result<u32> {
        let mut register = lock(&self.register);

        if register.external.contains_key(&external) {
            return Err(Error::DuplicateExternalId(external));
        }

        let internal = register.next_internal_number();
        register.insert(internal, Some(external));
        register.purge_old_entries(self.capacity);

        Ok(internal)
    }

    /// Allocates an internal frame number with no framework counterpart.
    pub fn generate_and_store(&self) -> u32 {
        let mut register = lock(&self.register);

        let internal = register.next_internal_number();
        register.insert(internal, None);
        register.purge_old_entries(self.capacity);

        internal
    }

    pub fn free(&self, internal: u32) -> Result<()> {
        lock(&self.register).remove(internal).map(|_| ()).ok_or_else(|| not_found(internal))
    }

    /// Returns the framework frame number behind `internal`, or `None` for an
    /// internal-only operation.
    pub fn resolve_external_id(&self, internal: u32) -> Result<Option<u32>> {
        lock(&self.register).entries.get(&internal).copied().ok_or_else(|| not_found(internal))
    }

    pub fn clear(&self) {
        let mut register = lock(&self.register);
        register.entries.clear();
        register.external.clear();
        register.order.clear();
    }
}
