//! Retrospective upload window: ring-range arithmetic and storage replay

use std::sync::Arc;

use metrics::counter;
use tracing::{info, warn};

use crate::storage::FrameStore;
use crate::transport::{EventTag, TransportError, UploadTransport};

/// Inclusive range of buckets on the time-index ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub start: u32,
    pub end: u32,
    pub size: u32,
}

impl WindowRange {
    /// The buckets `window` seconds either side of the bucket the recording
    /// was armed in. `start > end` means the range wraps the ring boundary.
    pub fn around(center: u32, window: u32) -> Self {
        let size = window * 2;
        Self {
            start: (center + size - window) % size,
            end: (center + window - 1) % size,
            size,
        }
    }

    /// Buckets in replay order, honoring wraparound.
    pub fn buckets(&self) -> impl Iterator<Item = u32> + '_ {
        let len = (self.end + self.size - self.start) % self.size + 1;
        (0..len).map(move |i| (self.start + i) % self.size)
    }
}

/// Re-reads the persisted window and retransmits it over the live-stream
/// transport. Holds no frame handles: by the time a window resolves, the
/// in-memory frames for its buckets are long released.
pub struct WindowResolver {
    store: Arc<dyn FrameStore>,
    transport: Arc<dyn UploadTransport>,
}

impl WindowResolver {
    pub fn new(store: Arc<dyn FrameStore>, transport: Arc<dyn UploadTransport>) -> Self {
        Self { store, transport }
    }

    /// Transmit every persisted frame in `range`, in bucket then frame order,
    /// tagged with the trigger timestamp. A frame that cannot be read or sent
    /// is skipped; the replay itself never fails.
    pub async fn replay(&self, range: WindowRange, event_ts: u64) -> usize {
        let tag = EventTag { time: event_ts };
        let mut sent = 0usize;

        for bucket in range.buckets() {
            let indices = match self.store.list(bucket).await {
                Ok(indices) => indices,
                Err(e) => {
                    warn!("Skipping bucket {}: {}", bucket, e);
                    continue;
                }
            };
            for frame_index in indices {
                let payload = match self.store.read(bucket, frame_index).await {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to read frame {}/{}: {}", bucket, frame_index, e);
                        continue;
                    }
                };
                match self.transport.send_frame(&payload, Some(tag)).await {
                    Ok(()) | Err(TransportError::Timeout) => sent += 1,
                    Err(e) => warn!("Failed to upload frame {}/{}: {}", bucket, frame_index, e),
                }
            }
        }

        counter!("vigil_frames_replayed_total").increment(sent as u64);
        info!("Replayed {} frames for event at {}", sent, event_ts);
        sent
    }
}
