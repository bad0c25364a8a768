//! Frame pipeline: capture → persist → stream, with event-triggered
//! retrospective upload of the persisted window.

pub mod capture;
pub mod event;
pub mod frame;
pub mod persist;
pub mod queue;
pub mod state;
pub mod stream;
pub mod window;

pub use capture::{Clock, SystemClock};
pub use frame::FrameHandle;
pub use queue::FrameQueue;
pub use state::{RecordingControl, RecordingState};
pub use window::{WindowRange, WindowResolver};

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::sensor::SensorDriver;
use crate::storage::FrameStore;
use crate::transport::UploadTransport;
use crate::trigger::Trigger;
use crate::CaptureConfig;

/// Running pipeline: the four stage tasks plus their shared recording state.
pub struct Pipeline {
    control: Arc<RecordingControl>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    pub fn spawn(
        sensor: Box<dyn SensorDriver>,
        store: Arc<dyn FrameStore>,
        transport: Arc<dyn UploadTransport>,
        triggers: watch::Receiver<Option<Trigger>>,
        config: &CaptureConfig,
    ) -> Self {
        Self::spawn_with_clock(sensor, store, transport, triggers, config, SystemClock)
    }

    pub fn spawn_with_clock<C: Clock>(
        sensor: Box<dyn SensorDriver>,
        store: Arc<dyn FrameStore>,
        transport: Arc<dyn UploadTransport>,
        triggers: watch::Receiver<Option<Trigger>>,
        config: &CaptureConfig,
        clock: C,
    ) -> Self {
        let save_q = FrameQueue::bounded(config.save_queue_depth(), "save");
        let stream_q = FrameQueue::bounded(config.stream_queue_depth(), "stream");
        let control = Arc::new(RecordingControl::new());

        let persist = persist::PersistStage::new(
            save_q.clone(),
            stream_q.clone(),
            store.clone(),
            config.forward_every(),
        );
        let streaming = stream::StreamStage::new(stream_q.clone(), transport.clone());
        let events = event::EventStage::new(control.clone(), triggers);
        let resolver = WindowResolver::new(store, transport);
        let capturing = capture::CaptureStage::new(
            sensor,
            save_q,
            stream_q,
            control.clone(),
            resolver,
            clock,
            config,
        );

        let tasks = vec![
            tokio::spawn(streaming.run()),
            tokio::spawn(events.run()),
            tokio::spawn(capturing.run()),
            tokio::spawn(persist.run()),
        ];

        Self { control, tasks }
    }

    pub fn control(&self) -> &Arc<RecordingControl> {
        &self.control
    }

    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
