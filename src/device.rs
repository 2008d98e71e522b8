use crate::data::{SharedState, RAW_HEIGHT, RAW_WIDTH};
use anyhow::{bail, Result};
use itertools::iproduct;
use log::{debug, info, warn};
use std::{sync::Arc, thread, time::Duration};

/// Depth stream resolution and bit-depth selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    /// 640x480 disparity frames, 11 bits per sample.
    Medium11Bit,
}

/// Instantaneous accelerometer reading in MKS units.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiltState {
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
}

/// The driver contract the acquisition loop consumes.
///
/// `process_events` blocks until the driver has work and delivers at most
/// one raw disparity frame to `on_frame`, synchronously on the calling
/// thread. The frame slice is only valid for the duration of the call. An
/// `Err` signals a fatal driver failure and ends acquisition.
pub trait DepthCamera {
    fn set_depth_mode(&mut self, mode: DepthMode) -> Result<()>;
    fn start_depth(&mut self) -> Result<()>;
    fn stop_depth(&mut self);
    fn process_events(&mut self, on_frame: &mut dyn FnMut(&[u16])) -> Result<()>;
    fn tilt_state(&mut self) -> TiltState;
}

/// Synthetic depth camera for running the viewer without hardware.
///
/// Produces a rippling surface with a dead spot in the middle, so both the
/// retained and the discarded sample paths are exercised.
pub struct SyntheticCamera {
    streaming: bool,
    tick: u64,
    frame: Vec<u16>,
}

impl SyntheticCamera {
    const FRAME_INTERVAL: Duration = Duration::from_millis(33);

    /// Open the camera at `index`. Only index 0 exists.
    pub fn open(index: u32) -> Result<Self> {
        if index != 0 {
            bail!("no depth camera at index {index}");
        }
        info!("opened synthetic depth camera");
        Ok(Self {
            streaming: false,
            tick: 0,
            frame: vec![0; RAW_WIDTH * RAW_HEIGHT],
        })
    }

    fn fill_frame(&mut self) {
        let t = self.tick as f64 * 0.05;
        for (row, col) in iproduct!(0..RAW_HEIGHT, 0..RAW_WIDTH) {
            let u = col as f64 / RAW_WIDTH as f64 - 0.5;
            let v = row as f64 / RAW_HEIGHT as f64 - 0.5;
            let disparity = if u * u + v * v < 0.01 {
                // simulated sensor dropout
                0.0
            } else {
                800.0 + ((u * 12.0 + t).sin() + (v * 9.0 - t).cos()) * 60.0
            };
            self.frame[row * RAW_WIDTH + col] = disparity as u16;
        }
        self.tick += 1;
    }
}

impl DepthCamera for SyntheticCamera {
    fn set_depth_mode(&mut self, mode: DepthMode) -> Result<()> {
        debug!("depth mode set to {mode:?}");
        Ok(())
    }

    fn start_depth(&mut self) -> Result<()> {
        self.streaming = true;
        Ok(())
    }

    fn stop_depth(&mut self) {
        self.streaming = false;
    }

    fn process_events(&mut self, on_frame: &mut dyn FnMut(&[u16])) -> Result<()> {
        // Pace the stream like a blocking driver poll.
        thread::sleep(Self::FRAME_INTERVAL);
        if self.streaming {
            self.fill_frame();
            on_frame(&self.frame);
        }
        Ok(())
    }

    fn tilt_state(&mut self) -> TiltState {
        TiltState {
            accel_x: 0.0,
            accel_y: -9.81,
            accel_z: 0.0,
        }
    }
}

/// Acquisition loop, run on its own thread for the life of the process.
///
/// Streams depth frames into the shared buffer until shutdown is requested
/// or the driver fails fatally. A failed stream start is tolerated; the
/// loop keeps polling and the viewer shows the last-known cloud.
pub fn run(mut camera: impl DepthCamera, shared: Arc<SharedState>) {
    if let Err(err) = camera.set_depth_mode(DepthMode::Medium11Bit) {
        warn!("failed to select depth mode: {err}");
    }
    if let Err(err) = camera.start_depth() {
        warn!("failed to start depth stream: {err}");
    }

    let state = shared.clone();
    let mut on_frame = move |raw: &[u16]| state.ingest_raw(raw);

    while !shared.shutdown_requested() {
        if let Err(err) = camera.process_events(&mut on_frame) {
            warn!("depth stream failed: {err}");
            break;
        }
        let tilt = camera.tilt_state();
        debug!(
            "frame: {} - mks acc: {} {} {}",
            shared.frame_count(),
            tilt.accel_x,
            tilt.accel_y,
            tilt.accel_z
        );
    }

    info!("shutting down depth stream");
    camera.stop_depth();
}
