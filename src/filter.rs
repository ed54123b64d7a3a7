use rayon::prelude::*;

use crate::{FilterConfig, FilterWindow, ScanGeometry, ScanMessage, ANGLE_EPSILON};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Expected {expected} beams, got {ranges} ranges and {intensities} intensities")]
pub struct LengthMismatch {
    pub expected: usize,
    pub ranges: usize,
    pub intensities: usize,
}

/// Masks beams outside the configured horizontal angle and range windows.
///
/// The angle window is turned into beam indices once, on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct LaserFilter {
    lower: Option<usize>,
    upper: Option<usize>,
    range: Option<FilterWindow>,
    samples: usize,
    rows: usize,
}

impl LaserFilter {
    pub fn new(config: &FilterConfig, geometry: &ScanGeometry) -> Self {
        let axis = &geometry.horizontal;
        let samples = axis.samples as usize;
        // First beam at or above the lower bound, last beam at or below the upper one
        let lower_index =
            |angle: f64| (axis.beam_offset(angle) - ANGLE_EPSILON).ceil().max(0.) as usize;
        let upper_index =
            |angle: f64| (axis.beam_offset(angle) + ANGLE_EPSILON).floor().max(0.) as usize;

        let (lower, upper) = match config.angle {
            Some(w) => (
                (axis.angle.min < w.lower).then(|| lower_index(w.lower)),
                (axis.angle.max > w.upper).then(|| upper_index(w.upper)),
            ),
            None => (None, None),
        };

        Self {
            lower,
            upper,
            range: config.range,
            samples,
            rows: geometry.vertical.samples as usize,
        }
    }

    /// First and last horizontal index kept by the angle filter, `None` if unbounded
    pub fn angle_bounds(&self) -> (Option<usize>, Option<usize>) {
        (self.lower, self.upper)
    }

    pub fn keeps_index(&self, horizontal: usize) -> bool {
        !(self.lower.is_some_and(|l| horizontal < l) || self.upper.is_some_and(|u| horizontal > u))
    }

    fn filters_angle(&self) -> bool {
        self.lower.is_some() || self.upper.is_some()
    }

    pub fn is_passthrough(&self) -> bool {
        !self.filters_angle() && self.range.is_none()
    }

    pub fn apply(&self, scan: &mut ScanMessage) -> Result<(), LengthMismatch> {
        let expected = self.samples * self.rows;
        if scan.ranges.len() != expected || scan.intensities.len() != expected {
            return Err(LengthMismatch {
                expected,
                ranges: scan.ranges.len(),
                intensities: scan.intensities.len(),
            });
        }
        if self.is_passthrough() || self.samples == 0 {
            return Ok(());
        }

        scan.ranges
            .par_chunks_mut(self.samples)
            .zip(scan.intensities.par_chunks_mut(self.samples))
            .for_each(|(ranges, intensities)| {
                for (h, (r, i)) in ranges.iter_mut().zip(intensities.iter_mut()).enumerate() {
                    if !self.keeps_index(h) {
                        *r = f64::NAN;
                        *i = f64::NAN;
                    } else if let Some(w) = self.range {
                        if *r < w.lower || *r > w.upper {
                            *r = f64::NAN;
                        }
                    }
                }
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::tests::planar_config, ValidLidarConfig};

    fn geometry() -> ScanGeometry {
        ValidLidarConfig::try_from(planar_config(360, -180., 180.))
            .unwrap()
            .geometry
    }

    #[test]
    fn indices_from_angles() {
        let filter = LaserFilter::new(
            &FilterConfig {
                angle: Some(FilterWindow::new(-90., 45.)),
                ..Default::default()
            },
            &geometry(),
        );
        assert_eq!((Some(90), Some(225)), filter.angle_bounds());
    }

    #[test]
    fn partial_window_bounds_follow_angle_step() {
        // 100 beams over [-100, 0] are 100/99 deg apart
        let geometry = ValidLidarConfig::try_from(planar_config(100, -100., 0.))
            .unwrap()
            .geometry;
        let filter = LaserFilter::new(
            &FilterConfig {
                angle: Some(FilterWindow::new(-50., -1.)),
                ..Default::default()
            },
            &geometry,
        );
        // Beam 49 looks at -50.51 deg, beam 98 at -1.01 deg
        assert_eq!((Some(50), Some(98)), filter.angle_bounds());
    }

    #[test]
    fn window_wider_than_scan_is_unbounded() {
        let filter = LaserFilter::new(
            &FilterConfig {
                angle: Some(FilterWindow::new(-180., 200.)),
                ..Default::default()
            },
            &geometry(),
        );
        assert_eq!((None, None), filter.angle_bounds());
        assert!(filter.is_passthrough());
    }

    #[test]
    fn range_window_masks_only_ranges() {
        let geometry = geometry();
        let filter = LaserFilter::new(
            &FilterConfig {
                range: Some(FilterWindow::new(1., 10.)),
                ..Default::default()
            },
            &geometry,
        );
        let mut scan = ScanMessage::new("lidar", &geometry);
        scan.ranges.fill(5.);
        scan.ranges[0] = 0.5;
        scan.ranges[1] = f64::INFINITY;
        filter.apply(&mut scan).unwrap();
        assert!(scan.ranges[0].is_nan());
        assert!(scan.ranges[1].is_nan());
        assert_eq!(5., scan.ranges[2]);
        assert_eq!(0., scan.intensities[0]);
    }

    #[test]
    fn length_mismatch_leaves_scan_untouched() {
        let geometry = geometry();
        let filter = LaserFilter::new(
            &FilterConfig {
                range: Some(FilterWindow::new(1., 10.)),
                ..Default::default()
            },
            &geometry,
        );
        let mut scan = ScanMessage::new("lidar", &geometry);
        scan.ranges = vec![0.5; 10];
        assert!(filter.apply(&mut scan).is_err());
        assert_eq!(vec![0.5; 10], scan.ranges);
    }
}
