use std::sync::Arc;

use crate::sensor::FrameBuffer;

/// Shared handle to one captured frame.
///
/// Cloning takes an extra reference; dropping releases one. The last drop
/// releases the wrapped buffer, which returns it to the driver pool — so the
/// buffer goes back exactly once no matter how releases interleave across
/// stages, and a freed frame cannot be dereferenced.
#[derive(Clone)]
pub struct FrameHandle {
    inner: Arc<Inner>,
}

struct Inner {
    buf: FrameBuffer,
    time_index: u32,
    frame_index: u32,
}

impl FrameHandle {
    pub fn new(buf: FrameBuffer, time_index: u32, frame_index: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                buf,
                time_index,
                frame_index,
            }),
        }
    }

    pub fn payload(&self) -> &[u8] {
        self.inner.buf.payload()
    }

    /// Rolling second-bucket this frame belongs to.
    pub fn time_index(&self) -> u32 {
        self.inner.time_index
    }

    /// Sequence number within the bucket.
    pub fn frame_index(&self) -> u32 {
        self.inner.frame_index
    }
}

impl std::fmt::Debug for FrameHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameHandle")
            .field("time_index", &self.inner.time_index)
            .field("frame_index", &self.inner.frame_index)
            .field("len", &self.inner.buf.len())
            .finish()
    }
}
