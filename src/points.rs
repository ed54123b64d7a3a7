use crate::ScanMessage;

/// Direction of one beam in the sensor frame, angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarPoint {
    pub index: usize,
    pub azimuth: f64,
    pub elevation: f64,
}

impl PolarPoint {
    pub fn calc_xyz(&self, distance: f64) -> (f64, f64, f64) {
        let x = distance * self.azimuth.cos() * self.elevation.cos();
        let y = distance * self.azimuth.sin() * self.elevation.cos();
        let z = distance * self.elevation.sin();
        (x, y, z)
    }
}

/// Walks the beams of a scan in storage order, horizontal index first
#[derive(Debug, Clone)]
pub struct ScanPointIterator {
    h_pos: usize,
    v_pos: usize,
    count: usize,
    vertical_count: usize,
    angle_min: f64,
    angle_step: f64,
    vertical_angle_min: f64,
    vertical_angle_step: f64,
}

impl ScanPointIterator {
    pub fn new(scan: &ScanMessage) -> Self {
        Self {
            h_pos: 0,
            v_pos: 0,
            count: scan.count as usize,
            vertical_count: scan.vertical_count as usize,
            angle_min: scan.angle_min,
            angle_step: scan.angle_step,
            vertical_angle_min: scan.vertical_angle_min,
            vertical_angle_step: scan.vertical_angle_step,
        }
    }

    /// Cartesian coordinates of every beam with a finite return
    pub fn cartesian(scan: &ScanMessage) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        Self::new(scan).filter_map(|p| {
            let range = *scan.ranges.get(p.index)?;
            range.is_finite().then(|| p.calc_xyz(range))
        })
    }
}

impl Iterator for ScanPointIterator {
    type Item = PolarPoint;

    #[inline(always)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.h_pos >= self.count {
            self.h_pos = 0;
            self.v_pos += 1;
        }
        if self.v_pos >= self.vertical_count || self.count == 0 {
            return None;
        }
        let point = PolarPoint {
            index: self.v_pos * self.count + self.h_pos,
            azimuth: self.angle_min + self.h_pos as f64 * self.angle_step,
            elevation: if self.vertical_count > 1 {
                self.vertical_angle_min + self.v_pos as f64 * self.vertical_angle_step
            } else {
                0.
            },
        };
        self.h_pos += 1;
        Some(point)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;

    use super::*;
    use crate::{config::tests::planar_config, ValidLidarConfig};

    #[test]
    fn walks_all_beams() {
        let geometry = ValidLidarConfig::try_from(planar_config(4, -180., 180.))
            .unwrap()
            .geometry;
        let scan = ScanMessage::new("lidar", &geometry);
        let points = ScanPointIterator::new(&scan).collect::<Vec<_>>();
        assert_eq!(4, points.len());
        assert_eq!(3, points[3].index);
        assert_relative_eq!(-FRAC_PI_2, points[1].azimuth, epsilon = 1e-12);
    }

    #[test]
    fn skips_beams_without_return() {
        let geometry = ValidLidarConfig::try_from(planar_config(4, -180., 180.))
            .unwrap()
            .geometry;
        let mut scan = ScanMessage::new("lidar", &geometry);
        scan.ranges = vec![f64::NAN, 2., f64::INFINITY, 1.];
        let xyz = ScanPointIterator::cartesian(&scan).collect::<Vec<_>>();
        assert_eq!(2, xyz.len());
        assert_relative_eq!(-2., xyz[0].1, epsilon = 1e-12);
        assert_relative_eq!(1., xyz[1].1, epsilon = 1e-12);
    }
}
