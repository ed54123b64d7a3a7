use std::sync::Arc;

use rayon::prelude::*;

use crate::{CameraRig, CapturedFrame, ScanMessage};

/// Where a camera row lands in a scan row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// First texel of the camera row to copy
    pub src_col: usize,
    /// First beam of the scan row to write
    pub dst_col: usize,
    pub len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Camera contains the start of the scan window
    StartSide,
    /// Camera lies within the scan window
    Middle,
    /// Camera contains the end of the scan window
    EndSide,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StitchError {
    #[error("Camera {camera} ([{start}, {end}] deg) doesn't match the scan window")]
    Unmatched { camera: usize, start: f64, end: f64 },
    #[error("Camera {camera}: copy of {len} texels from column {src} to beam {dst} is out of bounds")]
    OutOfBounds {
        camera: usize,
        src: isize,
        dst: isize,
        len: isize,
    },
    #[error("Camera {0} doesn't exist")]
    UnknownCamera(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum SegmentPlan {
    Idle,
    Copy(Segment),
    Skip(StitchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StitchReport {
    pub cameras_copied: usize,
    pub segments_skipped: usize,
}

/// Copies per camera ranges into a scan.
///
/// Camera windows are fixed, so the segment of every overlapping camera is planned once.
#[derive(Debug, Clone)]
pub struct Stitcher {
    rig: Arc<CameraRig>,
    plan: Box<[SegmentPlan]>,
}

impl Stitcher {
    pub fn new(rig: Arc<CameraRig>) -> Self {
        let plan = rig
            .cameras()
            .iter()
            .map(|camera| {
                if !camera.overlaps {
                    return SegmentPlan::Idle;
                }
                match plan_segment(&rig, camera.index) {
                    Ok(segment) => SegmentPlan::Copy(segment),
                    Err(e) => {
                        log::warn!("{e}, its ranges won't be stitched");
                        SegmentPlan::Skip(e)
                    }
                }
            })
            .collect();
        Self { rig, plan }
    }

    pub fn rig(&self) -> &CameraRig {
        &self.rig
    }

    /// Planned segment of a camera, `None` if it's not stitched
    pub fn segment(&self, camera: usize) -> Option<Segment> {
        match self.plan.get(camera)? {
            SegmentPlan::Copy(s) => Some(*s),
            _ => None,
        }
    }

    /// Resets `scan` to no returns, then copies every non-empty camera of `frame` into it.
    pub fn stitch(&self, frame: &CapturedFrame, scan: &mut ScanMessage) -> StitchReport {
        let samples = scan.count as usize;
        let width = self.rig.width();
        let rows = self.rig.row_window();

        scan.intensities.fill(0.);
        if samples == 0 {
            scan.reset_ranges();
            return StitchReport::default();
        }

        let mut report = StitchReport::default();
        let mut copies = Vec::with_capacity(self.plan.len());
        for (index, plan) in self.plan.iter().enumerate() {
            let src = frame.camera(index);
            if src.is_empty() {
                continue;
            }
            match plan {
                SegmentPlan::Copy(segment) => {
                    let last_row = rows.end().saturating_sub(1) * width;
                    if last_row + segment.src_col + segment.len > src.len()
                        || segment.dst_col + segment.len > samples
                    {
                        let e = StitchError::OutOfBounds {
                            camera: index,
                            src: segment.src_col as isize,
                            dst: segment.dst_col as isize,
                            len: segment.len as isize,
                        };
                        log::warn!("{e}, segment skipped");
                        report.segments_skipped += 1;
                        continue;
                    }
                    copies.push((*segment, src));
                    report.cameras_copied += 1;
                }
                SegmentPlan::Skip(e) => {
                    log::debug!("Skipping segment: {e}");
                    report.segments_skipped += 1;
                }
                SegmentPlan::Idle => {}
            }
        }

        scan.ranges
            .par_chunks_mut(samples)
            .enumerate()
            .for_each(|(v, row)| {
                row.fill(f64::NAN);
                if v >= rows.len() {
                    return;
                }
                let src_row = rows.camera_row(v) * width;
                for (segment, src) in &copies {
                    let from = src_row + segment.src_col;
                    let (Some(src), Some(dst)) = (
                        src.get(from..from + segment.len),
                        row.get_mut(segment.dst_col..segment.dst_col + segment.len),
                    ) else {
                        continue;
                    };
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d = *s as f64;
                    }
                }
            });

        report
    }
}

/// Classifies a camera's footprint against the horizontal scan window.
///
/// Texel `x` of a camera looks at `start + x * angle_step`, so columns are placed in beam
/// units of the horizontal axis.
pub fn plan_segment(rig: &CameraRig, camera: usize) -> Result<Segment, StitchError> {
    let window = rig
        .camera_window(camera)
        .ok_or(StitchError::UnknownCamera(camera))?;
    let axis = &rig.geometry().horizontal;
    let (start, end) = (axis.angle.min, axis.angle.max);
    let (s, e) = (window.start, window.end);
    let samples = axis.samples as isize;
    let width = rig.width() as isize;
    let beams = |offset: f64| offset.round() as isize;

    let (kind, src, dst) = if s <= start && start < e {
        (SegmentKind::StartSide, beams(-axis.beam_offset(s)), 0)
    } else if s > start && e < end {
        (SegmentKind::Middle, 0, beams(axis.beam_offset(s)))
    } else if s > start && end <= e {
        (SegmentKind::EndSide, 0, beams(axis.beam_offset(s)))
    } else {
        return Err(StitchError::Unmatched {
            camera,
            start: s,
            end: e,
        });
    };

    let len = (width - src).min(samples - dst);
    if len <= 0 || src < 0 || dst < 0 {
        return Err(StitchError::OutOfBounds {
            camera,
            src,
            dst,
            len,
        });
    }
    Ok(Segment {
        kind,
        src_col: src as usize,
        dst_col: dst as usize,
        len: len as usize,
    })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::{config::tests::planar_config, FrameBuffer, ValidLidarConfig};

    fn planar_rig(samples: u32, min: f64, max: f64) -> Arc<CameraRig> {
        let config = ValidLidarConfig::try_from(planar_config(samples, min, max)).unwrap();
        Arc::new(CameraRig::new(&config.geometry))
    }

    #[test_case(-180., 180.; "centered")]
    #[test_case(0., 360.; "positive")]
    fn full_turn_segments_tile_the_scan(min: f64, max: f64) {
        let rig = planar_rig(360, min, max);
        let segments = (0..4)
            .map(|i| {
                let s = plan_segment(&rig, i).unwrap();
                (s.dst_col, s.len)
            })
            .collect::<Vec<_>>();
        assert_eq!(vec![(0, 90), (90, 90), (180, 90), (270, 90)], segments);
    }

    #[test]
    fn classification() {
        let rig = planar_rig(181, 90., 270.);
        assert_eq!(SegmentKind::StartSide, plan_segment(&rig, 1).unwrap().kind);
        assert_eq!(SegmentKind::EndSide, plan_segment(&rig, 2).unwrap().kind);

        let rig = planar_rig(360, -180., 180.);
        assert_eq!(SegmentKind::Middle, plan_segment(&rig, 1).unwrap().kind);
    }

    #[test]
    fn partial_start_side_skips_leading_texels() {
        let rig = planar_rig(100, -100., 0.);
        let s = plan_segment(&rig, 0).unwrap();
        assert_eq!(SegmentKind::StartSide, s.kind);
        // Camera 0 covers [-180, -90], the scan starts 80 deg in
        assert!(s.src_col > 0);
        assert_eq!(0, s.dst_col);
        assert_eq!(rig.width() - s.src_col, s.len);
    }

    #[test]
    fn partial_window_end_side_is_aligned() {
        let rig = planar_rig(181, -90., 90.);
        let end = plan_segment(&rig, 2).unwrap();
        assert_eq!(
            (SegmentKind::EndSide, 0, 90, 90),
            (end.kind, end.src_col, end.dst_col, end.len)
        );
        // Camera 3 starts at the last beam
        let edge = plan_segment(&rig, 3).unwrap();
        assert_eq!((SegmentKind::EndSide, 180, 1), (edge.kind, edge.dst_col, edge.len));
    }

    #[test]
    fn oversized_segment_is_skipped_and_counted() {
        let rig = planar_rig(720, -180., 180.);
        let stitcher = Stitcher::new(rig.clone());
        // Frames of a coarser rig hold 90 texels per camera, segments need 180
        let pool = FrameBuffer::new(&planar_rig(360, -180., 180.));
        let frame = pool.try_acquire().unwrap();
        let mut scan = ScanMessage::new("lidar", rig.geometry());

        let report = stitcher.stitch(&frame, &mut scan);
        assert_eq!(
            StitchReport {
                cameras_copied: 0,
                segments_skipped: 4
            },
            report
        );
        assert!(scan.ranges.iter().all(|r| r.is_nan()));
    }

    #[test]
    fn camera_outside_window_is_unmatched() {
        // Camera 0 covers [-180, -90], entirely before the window
        let rig = planar_rig(100, -80., 80.);
        assert!(matches!(
            plan_segment(&rig, 0),
            Err(StitchError::Unmatched { camera: 0, .. })
        ));
        assert!(matches!(
            plan_segment(&rig, 9),
            Err(StitchError::UnknownCamera(9))
        ));
    }

    #[test]
    fn stitches_rows_and_resets_previous_values() {
        let rig = planar_rig(360, -180., 180.);
        let stitcher = Stitcher::new(rig.clone());
        let pool = FrameBuffer::new(&rig);
        let mut frame = pool.try_acquire().unwrap();
        for i in 0..4 {
            frame.camera_mut(i).unwrap().fill(i as f32 + 1.);
        }
        let mut scan = ScanMessage::new("lidar", rig.geometry());
        scan.ranges.fill(-1.);

        let report = stitcher.stitch(&frame, &mut scan);
        assert_eq!(4, report.cameras_copied);
        assert_eq!(1., scan.ranges[0]);
        assert_eq!(2., scan.ranges[90]);
        assert_eq!(4., scan.ranges[359]);
        assert_eq!(0, scan.ranges.iter().filter(|r| r.is_nan()).count());
    }
}
