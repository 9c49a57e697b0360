//! Elastic byte store
//!
//! Growable FIFO accumulator that re-aligns compressed data to decode-unit
//! boundaries when deliveries do not line up with frames.
//!
//! # Cursors
//!
//! `read <= write <= capacity`. `push` never reallocates: it stores what fits
//! and reports the count, so growth is always an explicit `grow_to_fit`
//! subject to the configured ceiling. Consuming everything resets both
//! cursors to zero; a push that would run off the end first shifts the
//! unconsumed bytes down to offset zero.

use crate::error::{Result, StageError};
use tracing::{debug, trace, warn};

/// Growable byte accumulator with read and write cursors
#[derive(Debug)]
pub struct ElasticByteStore {
    /// Backing storage; its length is the store capacity
    buf: Vec<u8>,

    /// Start of unconsumed bytes
    read: usize,

    /// End of stored bytes
    write: usize,

    /// Growth ceiling in bytes
    max_capacity: usize,
}

impl ElasticByteStore {
    /// Create a store with `capacity` bytes that may grow up to `max_capacity`
    pub fn new(capacity: usize, max_capacity: usize) -> Result<Self> {
        if capacity > max_capacity {
            return Err(StageError::ResourceExhausted {
                requested: capacity,
                limit: max_capacity,
            });
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| StageError::ResourceExhausted {
                requested: capacity,
                limit: max_capacity,
            })?;
        buf.resize(capacity, 0);

        Ok(Self {
            buf,
            read: 0,
            write: 0,
            max_capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Unconsumed bytes
    pub fn available(&self) -> usize {
        self.write - self.read
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// Bytes that can be pushed without growth (after compaction)
    pub fn free_space(&self) -> usize {
        self.capacity() - self.available()
    }

    /// Read cursor, exposed for diagnostics
    pub fn consumed_offset(&self) -> usize {
        self.read
    }

    /// Append as many bytes as fit without reallocating
    ///
    /// Returns the number of bytes stored. The caller grows explicitly if it
    /// needs the rest stored.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        if bytes.len() > self.capacity() - self.write && self.read > 0 {
            self.compact();
        }

        let n = bytes.len().min(self.capacity() - self.write);
        self.buf[self.write..self.write + n].copy_from_slice(&bytes[..n]);
        self.write += n;

        trace!(
            "Store push: {} of {} bytes stored (available={})",
            n,
            bytes.len(),
            self.available()
        );
        n
    }

    /// Push all of `bytes`, growing exactly once if they do not fit
    pub fn push_all(&mut self, bytes: &[u8]) -> Result<()> {
        let stored = self.push(bytes);
        if stored < bytes.len() {
            let refused = bytes.len() - stored;
            warn!(
                "Store refused {} bytes at capacity {}, growing",
                refused,
                self.capacity()
            );
            self.grow_to_fit(refused)?;
            let rest = self.push(&bytes[stored..]);
            debug_assert_eq!(rest, refused);
        }
        Ok(())
    }

    /// Reallocate so that `additional` more bytes fit
    ///
    /// Unconsumed bytes are first shifted to offset zero; the new capacity is
    /// then exactly `available() + additional` (never shrinks). Growing past
    /// the ceiling, or an allocation failure, is resource exhaustion.
    pub fn grow_to_fit(&mut self, additional: usize) -> Result<()> {
        self.compact();

        let target = self
            .available()
            .checked_add(additional)
            .ok_or(StageError::ResourceExhausted {
                requested: usize::MAX,
                limit: self.max_capacity,
            })?;
        if target <= self.capacity() {
            return Ok(());
        }
        if target > self.max_capacity {
            return Err(StageError::ResourceExhausted {
                requested: target,
                limit: self.max_capacity,
            });
        }

        self.buf
            .try_reserve_exact(target - self.buf.len())
            .map_err(|_| StageError::ResourceExhausted {
                requested: target,
                limit: self.max_capacity,
            })?;
        let old = self.capacity();
        self.buf.resize(target, 0);
        debug!("Store grew from {} to {} bytes", old, target);
        Ok(())
    }

    /// Unconsumed bytes, starting at the read cursor
    pub fn peek(&self) -> &[u8] {
        &self.buf[self.read..self.write]
    }

    /// Advance the read cursor by `n`
    ///
    /// # Panics
    /// Panics if `n > available()`.
    pub fn consume(&mut self, n: usize) {
        assert!(
            n <= self.available(),
            "consume of {} bytes exceeds available {}",
            n,
            self.available()
        );
        self.read += n;
        if self.read == self.write {
            self.read = 0;
            self.write = 0;
        }
        trace!("Store consume: {} bytes (available={})", n, self.available());
    }

    /// Discard all stored bytes; capacity is kept
    pub fn clear(&mut self) {
        self.read = 0;
        self.write = 0;
    }

    /// Shift unconsumed bytes down to offset zero
    fn compact(&mut self) {
        if self.read == 0 {
            return;
        }
        let available = self.available();
        self.buf.copy_within(self.read..self.write, 0);
        debug!("Store compacted {} bytes from offset {}", available, self.read);
        self.read = 0;
        self.write = available;
    }
}
