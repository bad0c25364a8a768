//! Sensor driver boundary: a fixed pool of reusable frame buffers and the
//! capture trait the pipeline consumes frames through.

pub mod v4l2;

pub use v4l2::V4l2Sensor;

use bytes::BytesMut;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    /// The driver has no free frame buffer; the caller should skip this cycle.
    #[error("no frame buffer available")]
    NoFrame,
    #[error("sensor is not streaming")]
    NotStreaming,
    #[error("no suitable capture device found")]
    NoDevice,
    #[error("device does not support video capture")]
    Unsupported,
    #[error("sensor i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Source of captured frames. One `capture` call hands out exclusive
/// ownership of one pool buffer; the buffer finds its way back to the pool
/// when the last reference to it is dropped.
pub trait SensorDriver: Send {
    fn capture(&mut self) -> Result<FrameBuffer, SensorError>;
}

/// One driver-owned buffer holding an opaque encoded frame payload.
///
/// Dropping the buffer returns it to its pool exactly once; the payload must
/// not be copied on its way through the pipeline.
pub struct FrameBuffer {
    data: BytesMut,
    reclaim: flume::Sender<BytesMut>,
}

impl FrameBuffer {
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the payload, reusing the buffer's allocation.
    pub fn fill(&mut self, src: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(src);
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        // Pool gone means shutdown; the allocation is simply freed.
        let _ = self.reclaim.try_send(std::mem::take(&mut self.data));
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.data.len())
            .finish()
    }
}

/// Fixed set of pre-allocated frame buffers. The pool bounds pipeline memory:
/// when every buffer is in flight, `acquire` fails until a stage releases one.
#[derive(Clone)]
pub struct BufferPool {
    free_tx: flume::Sender<BytesMut>,
    free_rx: flume::Receiver<BytesMut>,
}

impl BufferPool {
    pub fn with_buffers(count: usize, capacity: usize) -> Self {
        let (free_tx, free_rx) = flume::unbounded();
        for _ in 0..count {
            let _ = free_tx.send(BytesMut::with_capacity(capacity));
        }
        Self { free_tx, free_rx }
    }

    /// Check out a free buffer, or fail when the pool is exhausted.
    pub fn acquire(&self) -> Option<FrameBuffer> {
        let data = self.free_rx.try_recv().ok()?;
        Some(FrameBuffer {
            data,
            reclaim: self.free_tx.clone(),
        })
    }

    pub fn available(&self) -> usize {
        self.free_rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_fails_when_pool_exhausted() {
        let pool = BufferPool::with_buffers(2, 64);
        let a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn dropped_buffer_returns_to_pool_once() {
        let pool = BufferPool::with_buffers(1, 16);
        let mut buf = pool.acquire().unwrap();
        buf.fill(b"payload");
        assert_eq!(buf.payload(), b"payload");
        drop(buf);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn fill_reuses_allocation() {
        let pool = BufferPool::with_buffers(1, 1024);
        let mut buf = pool.acquire().unwrap();
        buf.fill(&[0u8; 512]);
        let ptr = buf.payload().as_ptr();
        buf.fill(&[1u8; 256]);
        assert_eq!(buf.payload().as_ptr(), ptr);
        assert_eq!(buf.len(), 256);
    }
}
