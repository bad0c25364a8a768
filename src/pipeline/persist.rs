use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use crate::pipeline::queue::FrameQueue;
use crate::storage::FrameStore;

/// Consumes the save queue: persists every frame into its ring bucket and
/// forwards a down-sampled subset to the stream queue.
pub struct PersistStage {
    save_q: FrameQueue,
    stream_q: FrameQueue,
    store: Arc<dyn FrameStore>,
    /// Forward one frame to the live stream per this many persisted
    forward_every: u32,
}

impl PersistStage {
    pub fn new(
        save_q: FrameQueue,
        stream_q: FrameQueue,
        store: Arc<dyn FrameStore>,
        forward_every: u32,
    ) -> Self {
        Self {
            save_q,
            stream_q,
            store,
            forward_every: forward_every.max(1),
        }
    }

    pub async fn run(self) {
        let mut last_bucket: Option<u32> = None;
        let mut since_forward = 0u32;

        while let Ok(frame) = self.save_q.recv().await {
            // First frame of a new bucket: wipe whatever the previous cycle
            // through the ring left there.
            if last_bucket != Some(frame.time_index()) {
                if let Err(e) = self.store.clear_bucket(frame.time_index()).await {
                    warn!("Failed to clear bucket {}: {}", frame.time_index(), e);
                }
                last_bucket = Some(frame.time_index());
            }

            match self
                .store
                .write(frame.time_index(), frame.frame_index(), frame.payload())
                .await
            {
                Ok(()) => counter!("vigil_frames_persisted_total").increment(1),
                Err(e) => warn!(
                    "Failed to persist frame {}/{}: {}",
                    frame.time_index(),
                    frame.frame_index(),
                    e
                ),
            }

            since_forward += 1;
            if since_forward >= self.forward_every {
                since_forward = 0;
                // The clone is the stream stage's reference; a full queue
                // hands it back and the drop undoes the acquire.
                if !self.stream_q.offer(frame.clone()) {
                    debug!("Stream queue full; live frame dropped");
                }
            }

            drop(frame);
            self.save_q.mark_done();
        }
    }
}
