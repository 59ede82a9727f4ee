//! Durable field store.
//!
//! The store sits on top of a byte-addressed medium (EEPROM emulation, NVS
//! blob, image file) and exposes bounded string slots. Writes only touch the
//! bytes that differ from what is already stored, and are staged until the
//! commit timer or an explicit [`FieldStore::commit_now`] flushes them.

use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::StorageError;
use crate::schema::{FieldDescriptor, TERMINATOR};

/// Default debounce between the last staged change and the physical commit.
pub const DEFAULT_COMMIT_INTERVAL: Duration = Duration::from_secs(5);

/// A byte-addressed durable medium.
///
/// `write_byte` stages a change; nothing is guaranteed to survive a power
/// cycle until `commit` returns `Ok`.
pub trait StorageMedium {
    /// Prepare a region of `capacity` bytes. A fresh medium reads as zeros.
    fn begin(&mut self, capacity: usize) -> Result<(), StorageError>;

    fn read_byte(&self, addr: usize) -> u8;

    fn write_byte(&mut self, addr: usize, value: u8);

    /// Flush staged bytes to the physical medium.
    fn commit(&mut self) -> Result<(), StorageError>;
}

/// In-memory medium that keeps staged and committed images apart and
/// counts physical operations.
#[derive(Debug, Clone, Default)]
pub struct MemoryMedium {
    staged: Vec<u8>,
    committed: Vec<u8>,
    byte_writes: usize,
    commits: usize,
}

impl MemoryMedium {
    pub fn new() -> Self {
        Self::default()
    }

    /// Medium pre-loaded with a committed image, as found after a reboot.
    pub fn from_image(image: Vec<u8>) -> Self {
        Self {
            staged: image.clone(),
            committed: image,
            byte_writes: 0,
            commits: 0,
        }
    }

    /// Number of `write_byte` calls that reached the medium.
    pub fn byte_writes(&self) -> usize {
        self.byte_writes
    }

    /// Number of successful commits.
    pub fn commits(&self) -> usize {
        self.commits
    }

    /// The committed image.
    pub fn image(&self) -> &[u8] {
        &self.committed
    }

    /// Drop every staged byte that was not committed.
    pub fn power_loss(&mut self) {
        self.staged = self.committed.clone();
    }
}

impl StorageMedium for MemoryMedium {
    fn begin(&mut self, capacity: usize) -> Result<(), StorageError> {
        self.staged.resize(capacity, 0);
        self.committed.resize(capacity, 0);
        Ok(())
    }

    fn read_byte(&self, addr: usize) -> u8 {
        self.staged.get(addr).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, addr: usize, value: u8) {
        if let Some(byte) = self.staged.get_mut(addr) {
            *byte = value;
            self.byte_writes += 1;
        }
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.committed = self.staged.clone();
        self.commits += 1;
        Ok(())
    }
}

/// Longest prefix of `value` that fits in `max_length` bytes without
/// splitting a UTF-8 character.
pub fn truncate_to_capacity(value: &str, max_length: usize) -> &str {
    if value.len() <= max_length {
        return value;
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Bounded-string store with minimal writes and deferred commit.
#[derive(Debug)]
pub struct FieldStore<M> {
    medium: M,
    capacity: usize,
    commit_interval: Duration,
    commit_needed: bool,
    /// Tick time at which the current batch was first observed. `None`
    /// while a change has not been seen by `tick` yet.
    quiet_since: Option<Duration>,
}

impl<M: StorageMedium> FieldStore<M> {
    /// Open the store over `capacity` bytes of `medium`.
    pub fn open(
        mut medium: M,
        capacity: usize,
        commit_interval: Duration,
    ) -> Result<Self, StorageError> {
        medium.begin(capacity)?;
        Ok(Self {
            medium,
            capacity,
            commit_interval,
            commit_needed: false,
            quiet_since: None,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn medium(&self) -> &M {
        &self.medium
    }

    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    pub fn into_medium(self) -> M {
        self.medium
    }

    /// Whether staged changes are waiting for a commit.
    pub fn commit_needed(&self) -> bool {
        self.commit_needed
    }

    /// Read a bounded string starting at `offset`.
    ///
    /// Stops at the first terminator or after `max_length` bytes. Bytes that
    /// are not valid UTF-8 are replaced rather than reported.
    pub fn read_field(&self, offset: usize, max_length: usize) -> String {
        let mut bytes = Vec::with_capacity(max_length);
        for addr in offset..offset.saturating_add(max_length).min(self.capacity) {
            let byte = self.medium.read_byte(addr);
            if byte == TERMINATOR {
                break;
            }
            bytes.push(byte);
        }
        if bytes.is_empty() {
            return String::new();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Stage `value` into the slot at `offset`.
    ///
    /// The slot spans `max_length + 1` bytes: payload, terminator, then zero
    /// padding. Only bytes that differ from the current content are written.
    /// Returns whether any byte changed.
    pub fn write_field(
        &mut self,
        offset: usize,
        value: &str,
        max_length: usize,
    ) -> Result<bool, StorageError> {
        let fits = offset
            .checked_add(max_length)
            .is_some_and(|last| last < self.capacity);
        if !fits {
            return Err(StorageError::OutOfBounds {
                offset,
                max_length,
                capacity: self.capacity,
            });
        }

        let payload = truncate_to_capacity(value, max_length).as_bytes();
        if payload.len() < value.len() {
            warn!(
                "Value of {} bytes truncated to {} at offset {}",
                value.len(),
                payload.len(),
                offset
            );
        }

        let mut changed = false;
        for i in 0..=max_length {
            let target = payload.get(i).copied().unwrap_or(TERMINATOR);
            let addr = offset + i;
            if self.medium.read_byte(addr) != target {
                self.medium.write_byte(addr, target);
                changed = true;
            }
        }

        if changed {
            self.mark_staged();
        }
        Ok(changed)
    }

    /// Read a text slot through its descriptor.
    pub fn read(&self, field: &FieldDescriptor) -> String {
        self.read_field(field.offset, field.max_length)
    }

    /// Write a text slot through its descriptor.
    pub fn write(&mut self, field: &FieldDescriptor, value: &str) -> Result<bool, StorageError> {
        self.write_field(field.offset, value, field.max_length)
    }

    /// Read a single-byte slot. Out-of-region reads return 0.
    pub fn read_byte(&self, field: &FieldDescriptor) -> u8 {
        if field.offset >= self.capacity {
            return 0;
        }
        self.medium.read_byte(field.offset)
    }

    /// Stage a single-byte slot, skipping the write if unchanged.
    pub fn write_byte(&mut self, field: &FieldDescriptor, value: u8) -> Result<bool, StorageError> {
        if field.offset >= self.capacity {
            return Err(StorageError::OutOfBounds {
                offset: field.offset,
                max_length: 0,
                capacity: self.capacity,
            });
        }
        if self.medium.read_byte(field.offset) == value {
            return Ok(false);
        }
        self.medium.write_byte(field.offset, value);
        self.mark_staged();
        Ok(true)
    }

    /// Run the commit timer. Commits once the staged batch has been quiet
    /// for the commit interval. Returns whether a commit happened.
    pub fn tick(&mut self, now: Duration) -> Result<bool, StorageError> {
        if !self.commit_needed {
            return Ok(false);
        }
        self.stamp(now);
        let since = self.quiet_since.unwrap_or(now);
        if now.saturating_sub(since) < self.commit_interval {
            return Ok(false);
        }
        self.flush()
    }

    /// Start the quiet period of the staged batch at `now`, unless it has
    /// already started. Call right after writing so the commit interval is
    /// measured from the write rather than from the next tick.
    pub fn stamp(&mut self, now: Duration) {
        if self.commit_needed && self.quiet_since.is_none() {
            self.quiet_since = Some(now);
        }
    }

    /// Commit staged changes immediately. No-op when nothing is staged.
    pub fn commit_now(&mut self) -> Result<bool, StorageError> {
        if !self.commit_needed {
            return Ok(false);
        }
        self.flush()
    }

    fn mark_staged(&mut self) {
        self.commit_needed = true;
        self.quiet_since = None;
    }

    fn flush(&mut self) -> Result<bool, StorageError> {
        debug!("Committing staged configuration changes");
        match self.medium.commit() {
            Ok(()) => {
                self.commit_needed = false;
                self.quiet_since = None;
                Ok(true)
            }
            Err(e) => {
                error!("Commit failed, will retry: {}", e);
                Err(e)
            }
        }
    }
}
