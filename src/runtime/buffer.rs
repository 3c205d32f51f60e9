//! Per-connection byte buffers.
//!
//! `ReadBuffer` is a fixed-capacity byte queue with a read cursor: bytes are
//! appended at the tail by socket reads and consumed from the head by the
//! frame decoder. Unconsumed bytes are moved back to the front lazily, right
//! before the next read, and only when a partial frame was left behind.
//!
//! `WriteBuffer` stages encoded reply frames and tracks how much of them has
//! already been transmitted.

use bytes::{Buf, BytesMut};

/// Fixed-capacity read queue.
#[derive(Debug)]
pub struct ReadBuffer {
    buf: Box<[u8]>,
    /// Start of unconsumed data.
    head: usize,
    /// End of valid data.
    tail: usize,
}

impl ReadBuffer {
    /// Create a buffer able to hold `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of unconsumed bytes.
    pub fn len(&self) -> usize {
        self.tail - self.head
    }

    /// Check if there are no unconsumed bytes.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Number of bytes that can still be appended.
    pub fn remaining(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Unconsumed bytes, in arrival order.
    pub fn data(&self) -> &[u8] {
        &self.buf[self.head..self.tail]
    }

    /// Writable tail region for the next socket read.
    ///
    /// Moves unconsumed bytes to the front first, so the returned slice is
    /// always `remaining()` bytes long.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        if self.head > 0 {
            self.compact();
        }
        &mut self.buf[self.tail..]
    }

    /// Mark `n` bytes of the spare region as filled.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.tail + n <= self.buf.len(), "commit past capacity");
        self.tail += n;
    }

    /// Discard `n` bytes from the head.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len(), "consume past filled region");
        self.head += n;
        if self.head == self.tail {
            self.head = 0;
            self.tail = 0;
        }
    }

    /// Append bytes, returning how many fit.
    #[cfg(test)]
    pub fn extend_from_slice(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.remaining());
        self.spare_mut()[..n].copy_from_slice(&data[..n]);
        self.commit(n);
        n
    }

    fn compact(&mut self) {
        self.buf.copy_within(self.head..self.tail, 0);
        self.tail -= self.head;
        self.head = 0;
    }
}

/// Outgoing byte queue with a sent cursor.
///
/// `filled()` counts bytes staged since the queue was last empty and
/// `sent()` those already transmitted; both return to zero once everything
/// staged has been flushed.
#[derive(Debug, Default)]
pub struct WriteBuffer {
    pending: BytesMut,
    sent: usize,
}

impl WriteBuffer {
    /// Create an empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(capacity),
            sent: 0,
        }
    }

    /// Staging area for encoders.
    pub fn staging(&mut self) -> &mut BytesMut {
        &mut self.pending
    }

    /// Bytes not yet transmitted.
    pub fn unsent(&self) -> &[u8] {
        &self.pending
    }

    /// Record that `n` bytes of `unsent()` were transmitted.
    pub fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.pending.len(), "advance past staged data");
        self.pending.advance(n);
        self.sent += n;
        if self.pending.is_empty() {
            self.pending.clear();
            self.sent = 0;
        }
    }

    /// Total bytes staged in the current batch.
    pub fn filled(&self) -> usize {
        self.sent + self.pending.len()
    }

    /// Bytes of the current batch already transmitted.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Check if nothing is waiting to be sent.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_buffer_fill_and_consume() {
        let mut buf = ReadBuffer::new(8);
        assert_eq!(buf.capacity(), 8);
        assert!(buf.is_empty());

        assert_eq!(buf.extend_from_slice(b"abcdef"), 6);
        assert_eq!(buf.data(), b"abcdef");
        assert_eq!(buf.remaining(), 2);

        buf.consume(4);
        assert_eq!(buf.data(), b"ef");
        assert_eq!(buf.remaining(), 6);

        buf.consume(2);
        assert!(buf.is_empty());
        assert_eq!(buf.spare_mut().len(), 8);
    }

    #[test]
    fn test_read_buffer_compacts_lazily() {
        let mut buf = ReadBuffer::new(8);
        buf.extend_from_slice(b"12345678");
        buf.consume(5);
        assert_eq!(buf.data(), b"678");

        // The consumed prefix is reclaimed before the next read.
        let spare = buf.spare_mut();
        assert_eq!(spare.len(), 5);
        spare[..2].copy_from_slice(b"9a");
        buf.commit(2);
        assert_eq!(buf.data(), b"6789a");
    }

    #[test]
    fn test_read_buffer_extend_truncates_at_capacity() {
        let mut buf = ReadBuffer::new(4);
        assert_eq!(buf.extend_from_slice(b"abcdef"), 4);
        assert_eq!(buf.remaining(), 0);
        assert_eq!(buf.data(), b"abcd");
    }

    #[test]
    fn test_write_buffer_partial_sends() {
        let mut buf = WriteBuffer::with_capacity(16);
        assert!(buf.is_empty());

        buf.staging().extend_from_slice(b"hello world");
        assert_eq!(buf.filled(), 11);
        assert_eq!(buf.sent(), 0);

        buf.advance(5);
        assert_eq!(buf.unsent(), b" world");
        assert_eq!(buf.filled(), 11);
        assert_eq!(buf.sent(), 5);

        buf.advance(6);
        assert!(buf.is_empty());
        assert_eq!(buf.filled(), 0);
        assert_eq!(buf.sent(), 0);
    }

    #[test]
    fn test_write_buffer_appends_while_partially_sent() {
        let mut buf = WriteBuffer::default();
        buf.staging().extend_from_slice(b"first");
        buf.advance(2);
        buf.staging().extend_from_slice(b"second");
        assert_eq!(buf.unsent(), b"rstsecond");
        assert_eq!(buf.filled(), 11);
    }
}
