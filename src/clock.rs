use std::sync::atomic::{AtomicU64, Ordering};

/// Source of simulation time in seconds
pub trait SimClock: Send + Sync {
    fn sim_time(&self) -> f64;
}

/// Clock advanced explicitly by its owner, e.g. a stepping simulation loop
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, dt: f64) {
        // Single writer, no need for a CAS loop
        self.set(self.sim_time() + dt);
    }
}

impl SimClock for ManualClock {
    fn sim_time(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances() {
        let clock = ManualClock::new(1.5);
        clock.advance(0.25);
        assert_eq!(1.75, clock.sim_time());
        clock.set(0.);
        assert_eq!(0., clock.sim_time());
    }
}
