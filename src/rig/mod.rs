use crate::{ScanGeometry, ANGLE_EPSILON};

mod row_window;

pub use row_window::*;

/// Horizontal field of view of each camera for multi-row scans
pub const NARROW_HFOV_DEG: f64 = 10.;
/// Horizontal field of view of each camera for planar scans
pub const WIDE_HFOV_DEG: f64 = 90.;
/// Vertical field of view used when the scan has a single row
pub const SINGLE_ROW_VFOV_DEG: f64 = 1.;

const DEG180: f64 = 180.;
const DEG360: f64 = 360.;

/// Per camera control info, fixed after setup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraControlInfo {
    pub index: usize,
    /// Rotation about the vertical axis, center of the camera's view
    pub rotation_deg: f64,
    /// Whether the camera sees any part of the scan window
    pub overlaps: bool,
}

/// Horizontal footprint of one camera in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraWindow {
    pub start: f64,
    pub end: f64,
}

impl CameraWindow {
    pub fn total(&self) -> f64 {
        self.end - self.start
    }

    fn shifted(self, by: f64) -> Self {
        Self {
            start: self.start + by,
            end: self.end + by,
        }
    }
}

/// The set of virtual depth cameras that together cover a full turn
#[derive(Debug, Clone)]
pub struct CameraRig {
    hfov: f64,
    vfov: f64,
    width: usize,
    height: usize,
    cameras: Box<[CameraControlInfo]>,
    row_window: RowWindow,
    geometry: ScanGeometry,
}

impl CameraRig {
    pub fn new(geometry: &ScanGeometry) -> Self {
        let horizontal = &geometry.horizontal;
        let vertical = &geometry.vertical;

        let (hfov, vfov) = if vertical.samples > 1 {
            (NARROW_HFOV_DEG, 2. * vertical.dominant_extreme())
        } else {
            (WIDE_HFOV_DEG, SINGLE_ROW_VFOV_DEG)
        };

        let width = ((hfov / horizontal.angle_step) - ANGLE_EPSILON).ceil().max(1.) as usize;
        // Rows include both vertical extremes
        let height = if vertical.samples > 1 {
            (((vfov / vertical.angle_step) - ANGLE_EPSILON).ceil() as usize + 1)
                .max(vertical.samples as usize)
        } else {
            1
        };

        let count = (DEG360 / hfov).ceil() as usize;
        let cameras = (0..count)
            .map(|index| {
                let rotation_deg = rotation_of(index, count, hfov, horizontal.angle.min);
                CameraControlInfo {
                    index,
                    rotation_deg,
                    overlaps: overlaps_window(
                        footprint(rotation_deg, hfov),
                        horizontal.angle.min,
                        horizontal.angle.max,
                    ),
                }
            })
            .collect::<Box<_>>();

        let row_window = RowWindow::new(height, vertical);

        log::info!(
            "Camera rig: {} cameras ({} overlapping), {hfov} x {vfov} deg, texture {width} x {height}",
            cameras.len(),
            cameras.iter().filter(|c| c.overlaps).count(),
        );

        Self {
            hfov,
            vfov,
            width,
            height,
            cameras,
            row_window,
            geometry: geometry.clone(),
        }
    }

    pub fn hfov(&self) -> f64 {
        self.hfov
    }

    pub fn vfov(&self) -> f64 {
        self.vfov
    }

    /// Texels per camera row
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows per camera texture
    pub fn height(&self) -> usize {
        self.height
    }

    /// Texels of one camera's range buffer
    pub fn texels_per_camera(&self) -> usize {
        self.width * self.height
    }

    pub fn cameras(&self) -> &[CameraControlInfo] {
        &self.cameras
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn row_window(&self) -> &RowWindow {
        &self.row_window
    }

    pub fn geometry(&self) -> &ScanGeometry {
        &self.geometry
    }

    /// Marks a camera as (not) contributing to the scan
    pub fn set_overlap(&mut self, index: usize, overlaps: bool) {
        if let Some(camera) = self.cameras.get_mut(index) {
            camera.overlaps = overlaps;
        }
    }

    /// Footprint of a camera, shifted by a turn when the scan window starts below zero
    /// and the footprint reaches past +180 deg.
    pub fn camera_window(&self, index: usize) -> Option<CameraWindow> {
        let camera = self.cameras.get(index)?;
        let window = footprint(camera.rotation_deg, self.hfov);
        if self.geometry.horizontal.angle.min < 0. && window.end > DEG180 {
            Some(window.shifted(-DEG360))
        } else {
            Some(window)
        }
    }
}

fn footprint(rotation_deg: f64, hfov: f64) -> CameraWindow {
    CameraWindow {
        start: rotation_deg - hfov * 0.5,
        end: rotation_deg + hfov * 0.5,
    }
}

/// Even counts get a half-FOV offset so coverage stays symmetric around 0 deg.
fn rotation_of(index: usize, count: usize, hfov: f64, angle_min: f64) -> f64 {
    if angle_min < 0. {
        (index as f64 - (count as f64 - 1.) * 0.5) * hfov
    } else {
        hfov * 0.5 + index as f64 * hfov
    }
}

/// A camera whose first column looks at the window end still feeds the last beam.
fn overlaps_window(window: CameraWindow, min: f64, max: f64) -> bool {
    let touches_end = (window.start - max).abs() < ANGLE_EPSILON && max > min;
    touches_end
        || [-DEG360, 0., DEG360].into_iter().any(|shift| {
            let w = window.shifted(shift);
            w.end.min(max) - w.start.max(min) > ANGLE_EPSILON
        })
}
