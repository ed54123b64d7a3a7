use crate::ScanAxis;

/// Rows of a camera texture that end up in the scan.
///
/// Cameras are centered on the horizon and rendered tall enough for the vertical extreme
/// with the larger magnitude, so only part of the rows is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    start: usize,
    len: usize,
}

impl RowWindow {
    pub fn new(camera_height: usize, vertical: &ScanAxis) -> Self {
        let len = (vertical.samples as usize).min(camera_height);
        let start = if vertical.angle.min.abs() >= vertical.angle.max.abs() {
            0
        } else {
            camera_height - len
        };
        Self { start, len }
    }

    pub const fn start(&self) -> usize {
        self.start
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn end(&self) -> usize {
        self.start + self.len
    }

    /// Camera row feeding the given scan row
    pub const fn camera_row(&self, scan_row: usize) -> usize {
        self.start + scan_row
    }
}
