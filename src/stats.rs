use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the capture, readback and stitch contexts
#[derive(Debug, Default)]
pub struct LidarStats {
    cycles_started: AtomicU64,
    dropped_no_slot: AtomicU64,
    dropped_render: AtomicU64,
    readback_failures: AtomicU64,
    queue_rejections: AtomicU64,
    scans_published: AtomicU64,
    segments_skipped: AtomicU64,
    filter_skips: AtomicU64,
    sink_drops: AtomicU64,
    last_latency: AtomicU64,
}

/// Point in time copy of [`LidarStats`]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LidarStatistics {
    pub cycles_started: u64,
    pub dropped_no_slot: u64,
    pub dropped_render: u64,
    pub readback_failures: u64,
    pub queue_rejections: u64,
    pub scans_published: u64,
    pub segments_skipped: u64,
    pub filter_skips: u64,
    pub sink_drops: u64,
    /// Seconds of simulation time between the last capture and its readback
    pub last_latency: f64,
}

impl LidarStatistics {
    pub fn cycles_dropped(&self) -> u64 {
        self.dropped_no_slot + self.dropped_render + self.readback_failures + self.queue_rejections
    }
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl LidarStats {
    pub fn cycle_started(&self) {
        bump(&self.cycles_started, 1);
    }

    pub fn no_free_slot(&self) {
        bump(&self.dropped_no_slot, 1);
    }

    pub fn render_failed(&self) {
        bump(&self.dropped_render, 1);
    }

    pub fn readback_failed(&self) {
        bump(&self.readback_failures, 1);
    }

    pub fn queue_rejected(&self) {
        bump(&self.queue_rejections, 1);
    }

    pub fn scan_published(&self) {
        bump(&self.scans_published, 1);
    }

    pub fn segments_skipped(&self, count: usize) {
        bump(&self.segments_skipped, count as u64);
    }

    pub fn filter_skipped(&self) {
        bump(&self.filter_skips, 1);
    }

    pub fn sink_dropped(&self) {
        bump(&self.sink_drops, 1);
    }

    pub fn record_latency(&self, latency: f64) {
        self.last_latency.store(latency.to_bits(), Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LidarStatistics {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        LidarStatistics {
            cycles_started: get(&self.cycles_started),
            dropped_no_slot: get(&self.dropped_no_slot),
            dropped_render: get(&self.dropped_render),
            readback_failures: get(&self.readback_failures),
            queue_rejections: get(&self.queue_rejections),
            scans_published: get(&self.scans_published),
            segments_skipped: get(&self.segments_skipped),
            filter_skips: get(&self.filter_skips),
            sink_drops: get(&self.sink_drops),
            last_latency: f64::from_bits(get(&self.last_latency)),
        }
    }
}
