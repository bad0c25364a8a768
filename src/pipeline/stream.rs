use std::sync::Arc;

use metrics::counter;
use tracing::warn;

use crate::pipeline::queue::FrameQueue;
use crate::transport::{TransportError, UploadTransport};

/// Consumes the stream queue and uploads each frame live. Terminal consumer
/// on this path: the frame's reference is released whether or not the
/// upload went through.
pub struct StreamStage {
    stream_q: FrameQueue,
    transport: Arc<dyn UploadTransport>,
}

impl StreamStage {
    pub fn new(stream_q: FrameQueue, transport: Arc<dyn UploadTransport>) -> Self {
        Self {
            stream_q,
            transport,
        }
    }

    pub async fn run(self) {
        while let Ok(frame) = self.stream_q.recv().await {
            match self.transport.send_frame(frame.payload(), None).await {
                Ok(()) => counter!("vigil_frames_streamed_total").increment(1),
                // A timeout on the live path is not an error
                Err(TransportError::Timeout) => {
                    counter!("vigil_stream_timeouts_total").increment(1)
                }
                Err(e) => warn!("Live upload failed: {}", e),
            }

            drop(frame);
            self.stream_q.mark_done();
        }
    }
}
