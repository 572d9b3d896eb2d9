//! Reusable frame buffers
//!
//! Both relay directions build one frame per iteration. Instead of
//! allocating a fresh `BytesMut` every time, they borrow one from a
//! [`BufferPool`] and hand it back when the frame has been sent or
//! processed.
//!
//! A [`PooledBuffer`] goes back to the pool when it is dropped, and it is
//! cleared first so the next borrower starts from an empty buffer.

use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

use bytes::BytesMut;

use crate::frame::{MessageType, TAG_SIZE};

/// Capacity of each pooled buffer, tag byte included
pub const DEFAULT_BUFFER_CAPACITY: usize = 4096;

/// Number of idle buffers kept by a pool unless configured otherwise
const DEFAULT_MAX_IDLE: usize = 8;

/// Returned buffers grown past this multiple of the pool capacity are freed
const MAX_RETAINED_GROWTH: usize = 4;

/// A bounded, internally synchronized pool of frame buffers
#[derive(Debug)]
pub struct BufferPool {
    /// Idle buffers, all empty
    idle: Mutex<Vec<BytesMut>>,
    /// Capacity of every buffer handed out
    capacity: usize,
    /// Maximum number of idle buffers retained
    max_idle: usize,
}

impl BufferPool {
    /// Create a pool of 4096-byte buffers
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_IDLE)
    }

    /// Create a pool with a custom buffer capacity and idle limit
    ///
    /// The capacity is raised to at least two bytes so a frame always has
    /// room for its tag and one payload byte.
    pub fn with_capacity(capacity: usize, max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle)),
            capacity: capacity.max(TAG_SIZE + 1),
            max_idle,
        }
    }

    /// Capacity of the buffers handed out by this pool
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle buffers currently held
    pub fn idle(&self) -> usize {
        self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
    }

    /// Borrow an empty buffer with at least [`capacity`](Self::capacity) bytes reserved
    pub fn borrow(&self) -> PooledBuffer<'_> {
        let recycled = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let mut buf = recycled.unwrap_or_else(|| BytesMut::with_capacity(self.capacity));
        // A recycled buffer may have been split or grown by its last user
        buf.reserve(self.capacity);

        PooledBuffer { buf, pool: self }
    }

    fn give_back(&self, mut buf: BytesMut) {
        if buf.capacity() > self.capacity * MAX_RETAINED_GROWTH {
            return;
        }
        buf.clear();
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(buf);
            }
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// A buffer on loan from a [`BufferPool`]
///
/// Dereferences to `BytesMut`. Returned to the pool on drop.
#[derive(Debug)]
pub struct PooledBuffer<'a> {
    buf: BytesMut,
    pool: &'a BufferPool,
}

impl PooledBuffer<'_> {
    /// Grow the buffer to full capacity, write `message_type` at index 0
    /// and return the payload region (`capacity - 1` bytes)
    ///
    /// The payload region is zero-filled, never stale bytes.
    pub fn begin_frame(&mut self, message_type: MessageType) -> &mut [u8] {
        let capacity = self.pool.capacity;
        let buf = &mut self.buf;
        buf.clear();
        buf.resize(capacity, 0);
        buf[0] = message_type.as_u8();
        &mut buf[TAG_SIZE..]
    }

    /// Trim the buffer to the tag plus `payload_len` written bytes
    pub fn finish_frame(&mut self, payload_len: usize) {
        self.buf.truncate(TAG_SIZE + payload_len);
    }

    /// Return the buffer to the pool now instead of at end of scope
    pub fn release(self) {}
}

impl Deref for PooledBuffer<'_> {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_borrow_is_empty_with_capacity() {
        let pool = BufferPool::new();
        let buf = pool.borrow();
        assert_eq!(buf.len(), 0);
        assert!(buf.capacity() >= DEFAULT_BUFFER_CAPACITY);
    }

    #[test]
    fn test_return_resets_length() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.borrow();
            buf.extend_from_slice(b"\x02secret output");
        }
        assert_eq!(pool.idle(), 1);

        let buf = pool.borrow();
        assert_eq!(buf.len(), 0);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_no_residual_bytes_after_reuse() {
        let pool = BufferPool::new();
        {
            let mut buf = pool.borrow();
            let payload = buf.begin_frame(MessageType::SessionData);
            payload[..6].copy_from_slice(b"hunter");
            buf.finish_frame(6);
            assert_eq!(&buf[..], b"\x02hunter");
        }

        let mut buf = pool.borrow();
        let payload = buf.begin_frame(MessageType::SessionData);
        assert_eq!(payload.len(), DEFAULT_BUFFER_CAPACITY - 1);
        assert!(payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_idle_limit() {
        let pool = BufferPool::with_capacity(64, 2);
        let a = pool.borrow();
        let b = pool.borrow();
        let c = pool.borrow();
        drop(a);
        drop(b);
        c.release();
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_grown_buffer_is_not_retained() {
        let pool = BufferPool::with_capacity(64, 2);
        {
            let mut buf = pool.borrow();
            buf.extend_from_slice(&[0x41; 64 * 1024]);
        }
        assert_eq!(pool.idle(), 0);

        {
            let mut buf = pool.borrow();
            buf.extend_from_slice(&[0x41; 100]);
        }
        assert_eq!(pool.idle(), 1);
        assert!(pool.borrow().capacity() < 64 * 1024);
    }

    #[test]
    fn test_minimum_capacity() {
        let pool = BufferPool::with_capacity(0, 1);
        assert_eq!(pool.capacity(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_borrowers_never_share() {
        let pool = Arc::new(BufferPool::with_capacity(128, 4));
        let mut tasks = Vec::new();

        for id in 0..8u8 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                for _ in 0..200 {
                    let mut buf = pool.borrow();
                    assert!(buf.is_empty());
                    let payload = buf.begin_frame(MessageType::SessionData);
                    payload.fill(id);
                    tokio::task::yield_now().await;
                    assert!(buf[1..].iter().all(|&b| b == id));
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert!(pool.idle() <= 4);
    }
}
