use itertools::iproduct;
use nalgebra::Point3;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Mutex, MutexGuard, PoisonError,
};

/// Depth buffer rows (sensor rows subsampled by two).
pub const ROWS: usize = 240;
/// Depth buffer columns (sensor columns subsampled by two).
pub const COLS: usize = 320;
/// Width of a raw disparity frame as delivered by the driver.
pub const RAW_WIDTH: usize = 640;
/// Height of a raw disparity frame.
pub const RAW_HEIGHT: usize = 480;

/// Metric distance at or below which a sample carries no reliable reading.
///
/// This is the distance a zero disparity converts to, so an all-zero frame
/// produces an empty point cloud.
pub const MIN_RELIABLE_DISTANCE: f64 = 100.0 / 3.33;

/// Convert one raw disparity sample to a calibrated metric distance.
pub fn disparity_to_metric(disparity: u16) -> f64 {
    100.0 / (-0.00307 * disparity as f64 + 3.33)
}

/// Project a depth sample at a grid position into viewer space.
pub fn project_sample(row: usize, col: usize, metric: f64) -> Point3<f32> {
    let z = metric * 14.0;
    let y = (row as f64 - 120.0) * (z - 10.0) * 0.005;
    let x = (col as f64 - 160.0) * (z - 10.0) * 0.005;
    Point3::new(x as f32, y as f32, z as f32)
}

/// One complete frame of metric distances, written wholesale by the
/// acquisition thread and read wholesale by the point-cloud builder.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthBuffer {
    data: Vec<f64>,
}

impl DepthBuffer {
    pub fn new() -> Self {
        Self {
            data: vec![0.0; ROWS * COLS],
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * COLS + col]
    }

    /// Overwrite the whole grid from a raw 640x480 disparity frame, keeping
    /// every other row and column.
    pub fn fill_from_raw(&mut self, raw: &[u16]) {
        for (row, col) in iproduct!(0..ROWS, 0..COLS) {
            let disparity = raw[row * 2 * RAW_WIDTH + col * 2];
            self.data[row * COLS + col] = disparity_to_metric(disparity);
        }
    }

    #[cfg(test)]
    fn set(&mut self, row: usize, col: usize, metric: f64) {
        self.data[row * COLS + col] = metric;
    }
}

impl Default for DepthBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the acquisition thread and the render thread.
///
/// Constructed once in `main` and handed to both sides through an `Arc`;
/// the depth buffer is the only mutable resource the two threads contend
/// on, and both hold the same mutex for a full grid scan.
#[derive(Debug)]
pub struct SharedState {
    depth: Mutex<DepthBuffer>,
    shutdown: AtomicBool,
    frames: AtomicU64,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            depth: Mutex::new(DepthBuffer::new()),
            shutdown: AtomicBool::new(false),
            frames: AtomicU64::new(0),
        }
    }

    /// Lock the depth buffer for one full scan.
    ///
    /// The buffer always holds one complete frame, so a poisoned lock still
    /// guards consistent data and is recovered rather than propagated.
    pub fn lock_depth(&self) -> MutexGuard<'_, DepthBuffer> {
        self.depth.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Convert a raw disparity frame and publish it to the shared buffer.
    ///
    /// Invoked by the driver's frame callback on the acquisition thread.
    pub fn ingest_raw(&self, raw: &[u16]) {
        {
            let mut buffer = self.lock_depth();
            buffer.fill_from_raw(raw);
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Pending export request, owned by the render thread.
#[derive(Debug, Default)]
pub struct ExportState {
    pending: bool,
}

impl ExportState {
    pub fn request(&mut self) {
        self.pending = true;
    }

    /// Consume the request, returning whether one was pending.
    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// The point cloud built from one depth frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point3<f32>>,
}

/// Build the displayable point cloud from the current depth buffer.
///
/// Samples at or below [`MIN_RELIABLE_DISTANCE`] are dropped; the rest are
/// emitted in row-major scan order. Pure in the buffer contents.
pub fn build_point_cloud(buffer: &DepthBuffer) -> PointCloud {
    let points = iproduct!(0..ROWS, 0..COLS)
        .filter_map(|(row, col)| {
            let metric = buffer.get(row, col);
            (metric > MIN_RELIABLE_DISTANCE).then(|| project_sample(row, col, metric))
        })
        .collect();
    PointCloud { points }
}
