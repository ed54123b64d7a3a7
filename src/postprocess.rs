use std::sync::Arc;

use crate::{LaserFilter, LidarStats, NoiseModel, ScanMessage};

/// Noise followed by filtering, run on every stitched scan
pub struct PostProcessor {
    noise: Option<Box<dyn NoiseModel>>,
    filter: LaserFilter,
    stats: Arc<LidarStats>,
    last_time: Option<f64>,
}

impl PostProcessor {
    pub fn new(
        noise: Option<Box<dyn NoiseModel>>,
        filter: LaserFilter,
        stats: Arc<LidarStats>,
    ) -> Self {
        Self {
            noise,
            filter,
            stats,
            last_time: None,
        }
    }

    pub fn filter(&self) -> &LaserFilter {
        &self.filter
    }

    /// Expects `scan.time` to hold the capture time already
    pub fn apply(&mut self, scan: &mut ScanMessage) {
        let dt = self
            .last_time
            .map_or(0., |last| (scan.time - last).max(0.));
        self.last_time = Some(scan.time);

        if let Some(noise) = self.noise.as_mut() {
            noise.apply(&mut scan.ranges, dt);
        }
        if let Err(e) = self.filter.apply(scan) {
            log::warn!("Skipping filter: {e}");
            self.stats.filter_skipped();
        }
    }
}
