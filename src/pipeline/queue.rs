//! Bounded stage queues for frame handles

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::utils::CachePadded;
use metrics::counter;
use tokio::sync::Notify;

use crate::pipeline::frame::FrameHandle;

/// Fixed-capacity FIFO of frame handles between two pipeline stages.
///
/// Enqueue never blocks: a full queue drops the newest frame, releasing its
/// reference. Consumers acknowledge each item with [`mark_done`] after fully
/// processing it, which feeds the [`drained`] signal used to quiesce the
/// queue before a retrospective upload.
///
/// [`mark_done`]: FrameQueue::mark_done
/// [`drained`]: FrameQueue::drained
#[derive(Clone)]
pub struct FrameQueue {
    tx: flume::Sender<FrameHandle>,
    rx: flume::Receiver<FrameHandle>,
    shared: Arc<Shared>,
    name: &'static str,
}

struct Shared {
    stats: CachePadded<Stats>,
    /// Frames enqueued but not yet acknowledged by a consumer
    depth: AtomicUsize,
    drained: Notify,
}

#[derive(Default)]
struct Stats {
    frames_enqueued: AtomicUsize,
    frames_dropped: AtomicUsize,
}

impl FrameQueue {
    pub fn bounded(capacity: usize, name: &'static str) -> Self {
        let (tx, rx) = flume::bounded(capacity);
        Self {
            tx,
            rx,
            shared: Arc::new(Shared {
                stats: CachePadded::new(Stats::default()),
                depth: AtomicUsize::new(0),
                drained: Notify::new(),
            }),
            name,
        }
    }

    /// Non-blocking enqueue. On a full queue the frame is dropped — its
    /// reference released — and `false` is returned.
    pub fn offer(&self, frame: FrameHandle) -> bool {
        // Count the frame in flight before it becomes visible to consumers,
        // or a fast consumer's acknowledgement could underflow the depth.
        self.shared.depth.fetch_add(1, Ordering::AcqRel);
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.shared
                    .stats
                    .frames_enqueued
                    .fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(flume::TrySendError::Full(frame)) | Err(flume::TrySendError::Disconnected(frame)) => {
                drop(frame);
                self.mark_done();
                self.shared
                    .stats
                    .frames_dropped
                    .fetch_add(1, Ordering::Relaxed);
                counter!("vigil_queue_dropped_total", "queue" => self.name).increment(1);
                false
            }
        }
    }

    pub async fn recv(&self) -> Result<FrameHandle, flume::RecvError> {
        self.rx.recv_async().await
    }

    /// Consumer acknowledgement: the item received earlier is fully
    /// processed. Wakes `drained` waiters when nothing is left in flight.
    pub fn mark_done(&self) {
        if self.shared.depth.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.drained.notify_waiters();
        }
    }

    /// Wait until every enqueued frame has been acknowledged.
    pub async fn drained(&self) {
        loop {
            let mut notified = std::pin::pin!(self.shared.drained.notified());
            // Register before the depth check so an acknowledgement landing
            // in between cannot be missed.
            notified.as_mut().enable();
            if self.shared.depth.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// (enqueued, dropped) totals since creation
    pub fn stats(&self) -> (usize, usize) {
        (
            self.shared.stats.frames_enqueued.load(Ordering::Relaxed),
            self.shared.stats.frames_dropped.load(Ordering::Relaxed),
        )
    }
}
