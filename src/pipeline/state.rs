use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Recording phase of the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordingState {
    /// Passively saving and streaming
    Normal = 0,
    /// A trigger arrived; the post-event half of the window is filling
    Recording = 1,
    /// Replaying the persisted window to the coordinator
    Uploading = 2,
}

/// Shared recording state machine.
///
/// Each transition has exactly one owning stage: the event stage moves
/// Normal→Recording, the capture stage moves Recording→Uploading and
/// Uploading→Normal. Any stage may read a snapshot at any time.
pub struct RecordingControl {
    state: AtomicU8,
    /// Wall-clock timestamp of the trigger, forwarded with the upload
    trigger_ts: AtomicU64,
}

impl RecordingControl {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RecordingState::Normal as u8),
            trigger_ts: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> RecordingState {
        match self.state.load(Ordering::Acquire) {
            1 => RecordingState::Recording,
            2 => RecordingState::Uploading,
            _ => RecordingState::Normal,
        }
    }

    /// Event stage: arm recording for the given trigger. Fails without any
    /// state change while a previous window is still recording or uploading.
    pub fn try_begin_recording(&self, trigger_ts: u64) -> bool {
        let armed = self
            .state
            .compare_exchange(
                RecordingState::Normal as u8,
                RecordingState::Recording as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if armed {
            self.trigger_ts.store(trigger_ts, Ordering::Release);
        }
        armed
    }

    /// Capture stage: the post-event window elapsed, the replay starts.
    pub fn begin_upload(&self) {
        let _ = self.state.compare_exchange(
            RecordingState::Recording as u8,
            RecordingState::Uploading as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Capture stage: the replay finished, back to passive operation.
    pub fn finish_upload(&self) {
        self.state
            .store(RecordingState::Normal as u8, Ordering::Release);
    }

    pub fn trigger_ts(&self) -> u64 {
        self.trigger_ts.load(Ordering::Acquire)
    }
}

impl Default for RecordingControl {
    fn default() -> Self {
        Self::new()
    }
}
