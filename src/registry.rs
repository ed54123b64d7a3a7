use std::sync::atomic::{AtomicUsize, Ordering};

/// Hands out sequence numbers to sensors of one simulation, so their captures don't all
/// fall on the same tick.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    next: AtomicUsize,
}

/// Position of a sensor in its [`SensorRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSlot {
    pub sequence: usize,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> SensorSlot {
        SensorSlot {
            sequence: self.next.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn registered(&self) -> usize {
        self.next.load(Ordering::Relaxed)
    }
}

impl SensorSlot {
    /// Delay of the first capture, a tenth of a period per position, repeating every ten sensors
    pub fn start_offset(&self, period: f64) -> f64 {
        (self.sequence % 10) as f64 / 10. * period
    }
}
