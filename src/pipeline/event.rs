use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::pipeline::state::RecordingControl;
use crate::trigger::Trigger;

/// Waits on the trigger sink and arms the recording window when the node is
/// idle. A trigger arriving while a window is recording or uploading is
/// dropped; no backlog of pending events is kept.
pub struct EventStage {
    control: Arc<RecordingControl>,
    triggers: watch::Receiver<Option<Trigger>>,
}

impl EventStage {
    pub fn new(control: Arc<RecordingControl>, triggers: watch::Receiver<Option<Trigger>>) -> Self {
        Self { control, triggers }
    }

    pub async fn run(mut self) {
        while self.triggers.changed().await.is_ok() {
            let Some(trigger) = *self.triggers.borrow_and_update() else {
                continue;
            };

            if self.control.try_begin_recording(trigger.time) {
                info!("Got trigger at {}: recording window opens", trigger.time);
            } else {
                warn!("Trigger at {} dropped: camera is busy", trigger.time);
            }
        }
    }
}
