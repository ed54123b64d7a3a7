use std::sync::Arc;

use crossbeam_queue::ArrayQueue;

use crate::{LidarStats, ScanMessage};

/// Bounded hand-off of finished scans to the transmit path. When full the oldest scan
/// is dropped.
#[derive(Clone)]
pub struct OutputSink {
    queue: Arc<ArrayQueue<ScanMessage>>,
    stats: Arc<LidarStats>,
}

impl OutputSink {
    pub fn new(capacity: usize, stats: Arc<LidarStats>) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
            stats,
        }
    }

    pub fn publish(&self, scan: ScanMessage) {
        if let Some(dropped) = self.queue.force_push(scan) {
            log::debug!("Output full, dropped scan of {:.3}s", dropped.time);
            self.stats.sink_dropped();
        }
    }

    pub fn pop(&self) -> Option<ScanMessage> {
        self.queue.pop()
    }

    /// All pending scans, oldest first
    pub fn drain(&self) -> Vec<ScanMessage> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
