//! Fixed-cadence capture stage; owns the recording-window state machine

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use metrics::counter;
use tokio::time;
use tracing::{debug, info, warn};

use crate::pipeline::frame::FrameHandle;
use crate::pipeline::queue::FrameQueue;
use crate::pipeline::state::{RecordingControl, RecordingState};
use crate::pipeline::window::{WindowRange, WindowResolver};
use crate::sensor::SensorDriver;
use crate::CaptureConfig;

/// Seconds source for bucket indexing
pub trait Clock: Send + 'static {
    fn now_secs(&self) -> u64;
}

/// Wall clock; the host is assumed to keep time via NTP or similar.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

pub struct CaptureStage<C: Clock> {
    sensor: Box<dyn SensorDriver>,
    save_q: FrameQueue,
    stream_q: FrameQueue,
    control: Arc<RecordingControl>,
    resolver: WindowResolver,
    clock: C,
    frame_rate: u32,
    window: u32,
    /// Bucket the active recording window was armed in
    armed_at: Option<u32>,
}

impl<C: Clock> CaptureStage<C> {
    pub fn new(
        sensor: Box<dyn SensorDriver>,
        save_q: FrameQueue,
        stream_q: FrameQueue,
        control: Arc<RecordingControl>,
        resolver: WindowResolver,
        clock: C,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            sensor,
            save_q,
            stream_q,
            control,
            resolver,
            clock,
            frame_rate: config.frame_rate.max(1),
            window: config.window_secs,
            armed_at: None,
        }
    }

    pub async fn run(mut self) {
        let ring = self.window * 2;
        // Fixed-rate tick: missed deadlines fire immediately instead of
        // shifting the phase.
        let mut ticker =
            time::interval(Duration::from_millis(u64::from((1000 / self.frame_rate).max(1))));

        let mut prev_time_index = (self.clock.now_secs() % u64::from(ring)) as u32;
        let mut frame_index: u32 = 0;

        loop {
            ticker.tick().await;

            let time_index = (self.clock.now_secs() % u64::from(ring)) as u32;
            if time_index != prev_time_index {
                prev_time_index = time_index;
                frame_index = 0;
            }

            if let Some(armed_at) = self.armed_at {
                let dt = (time_index + ring - armed_at) % ring;
                if dt > self.window {
                    self.control.begin_upload();
                    let range = WindowRange::around(armed_at, self.window);
                    info!(
                        "Sending frames from {} to {} (center: {})",
                        range.start, range.end, armed_at
                    );

                    // The replay must not interleave with live traffic still
                    // sitting in the stream queue.
                    self.stream_q.drained().await;
                    self.resolver.replay(range, self.control.trigger_ts()).await;

                    self.control.finish_upload();
                    self.armed_at = None;
                }
            }

            match self.sensor.capture() {
                Ok(buf) => {
                    let frame = FrameHandle::new(buf, time_index, frame_index);
                    frame_index += 1;
                    counter!("vigil_frames_captured_total").increment(1);
                    if !self.save_q.offer(frame) {
                        debug!("Save queue full; frame dropped");
                    }
                }
                Err(e) => warn!("Frame capture failed: {}", e),
            }

            if self.control.state() == RecordingState::Recording && self.armed_at.is_none() {
                info!("Beginning capture window at bucket {}", time_index);
                self.armed_at = Some(time_index);
            }
        }
    }
}
