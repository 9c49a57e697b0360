//! Host-owned media buffer handle
//!
//! A `MediaBuffer` is created by the host, lent to the stage by value on
//! claim, and handed back by value on release. Moving the value is the
//! ownership transfer: it lives in exactly one place at any time.
//!
//! Bookkeeping fields are private. `offset + filled <= capacity` always holds.

/// Stable identifier the host assigns to a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

impl std::fmt::Display for BufferId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "buf#{}", self.0)
    }
}

/// Fixed-capacity byte buffer with offset, filled length and EOS flag
#[derive(Debug)]
pub struct MediaBuffer {
    id: BufferId,
    data: Box<[u8]>,
    offset: usize,
    filled: usize,
    eos: bool,
}

impl MediaBuffer {
    /// Allocate an empty buffer with `capacity` bytes of storage
    pub fn new(id: BufferId, capacity: usize) -> Self {
        Self {
            id,
            data: vec![0u8; capacity].into_boxed_slice(),
            offset: 0,
            filled: 0,
            eos: false,
        }
    }

    /// Allocate a buffer sized exactly to `payload` and fill it
    pub fn with_payload(id: BufferId, payload: &[u8], eos: bool) -> Self {
        let mut buffer = Self::new(id, payload.len());
        buffer.load(0, payload);
        buffer.eos = eos;
        buffer
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Start of meaningful data
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes currently meaningful, starting at `offset`
    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_eos(&self) -> bool {
        self.eos
    }

    pub fn set_eos(&mut self, eos: bool) {
        self.eos = eos;
    }

    /// Bytes that can still be written after the payload
    pub fn remaining(&self) -> usize {
        self.capacity() - self.offset - self.filled
    }

    /// Meaningful bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[self.offset..self.offset + self.filled]
    }

    /// Writable region directly after the payload
    pub fn writable(&mut self) -> &mut [u8] {
        let start = self.offset + self.filled;
        &mut self.data[start..]
    }

    /// Extend the payload by `n` bytes already written into `writable()`
    ///
    /// # Panics
    /// Panics if `n` exceeds `remaining()`.
    pub fn commit(&mut self, n: usize) {
        assert!(
            n <= self.remaining(),
            "commit of {} bytes exceeds remaining {} in {}",
            n,
            self.remaining(),
            self.id
        );
        self.filled += n;
    }

    /// Drop the first `n` payload bytes
    ///
    /// # Panics
    /// Panics if `n` exceeds `filled()`.
    pub fn mark_consumed(&mut self, n: usize) {
        assert!(
            n <= self.filled,
            "consume of {} bytes exceeds filled {} in {}",
            n,
            self.filled,
            self.id
        );
        self.offset += n;
        self.filled -= n;
        if self.filled == 0 {
            self.offset = 0;
        }
    }

    /// Replace the payload with `bytes` starting at `offset`
    ///
    /// Copies as many bytes as fit and returns the count. Used by hosts to
    /// prepare input buffers.
    pub fn load(&mut self, offset: usize, bytes: &[u8]) -> usize {
        let offset = offset.min(self.capacity());
        let n = bytes.len().min(self.capacity() - offset);
        self.data[offset..offset + n].copy_from_slice(&bytes[..n]);
        self.offset = offset;
        self.filled = n;
        n
    }

    /// Move the payload to the start so `offset` is zero
    pub(crate) fn rewind(&mut self) {
        if self.offset != 0 {
            let start = self.offset;
            self.data.copy_within(start..start + self.filled, 0);
            self.offset = 0;
        }
    }

    /// Reset to an empty buffer for reuse by the host
    pub fn clear(&mut self) {
        self.offset = 0;
        self.filled = 0;
        self.eos = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = MediaBuffer::new(BufferId(7), 16);
        assert_eq!(buf.capacity(), 16);
        assert_eq!(buf.filled(), 0);
        assert_eq!(buf.remaining(), 16);
        assert!(!buf.is_eos());
        assert!(buf.payload().is_empty());
    }

    #[test]
    fn test_write_and_commit() {
        let mut buf = MediaBuffer::new(BufferId(1), 8);
        buf.writable()[..3].copy_from_slice(&[1, 2, 3]);
        buf.commit(3);
        assert_eq!(buf.payload(), &[1, 2, 3]);
        assert_eq!(buf.remaining(), 5);

        buf.writable()[..2].copy_from_slice(&[4, 5]);
        buf.commit(2);
        assert_eq!(buf.payload(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    #[should_panic]
    fn test_commit_past_capacity_panics() {
        let mut buf = MediaBuffer::new(BufferId(1), 4);
        buf.commit(5);
    }

    #[test]
    fn test_load_at_offset_and_rewind() {
        let mut buf = MediaBuffer::new(BufferId(2), 10);
        assert_eq!(buf.load(4, &[9, 8, 7]), 3);
        assert_eq!(buf.offset(), 4);
        assert_eq!(buf.payload(), &[9, 8, 7]);

        buf.rewind();
        assert_eq!(buf.offset(), 0);
        assert_eq!(buf.payload(), &[9, 8, 7]);
    }

    #[test]
    fn test_load_truncates_to_capacity() {
        let mut buf = MediaBuffer::new(BufferId(3), 4);
        assert_eq!(buf.load(2, &[1, 2, 3, 4]), 2);
        assert_eq!(buf.payload(), &[1, 2]);
        assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn test_mark_consumed_resets_offset_when_drained() {
        let mut buf = MediaBuffer::with_payload(BufferId(4), &[1, 2, 3, 4], true);
        buf.mark_consumed(1);
        assert_eq!(buf.offset(), 1);
        assert_eq!(buf.payload(), &[2, 3, 4]);

        buf.mark_consumed(3);
        assert_eq!(buf.offset(), 0);
        assert_eq!(buf.filled(), 0);
        assert!(buf.is_eos(), "consuming bytes must not touch the EOS flag");
    }

    #[test]
    fn test_clear() {
        let mut buf = MediaBuffer::with_payload(BufferId(5), &[1, 2], true);
        buf.clear();
        assert_eq!(buf.filled(), 0);
        assert!(!buf.is_eos());
        assert_eq!(buf.capacity(), 2);
    }
}
