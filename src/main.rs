mod data;
mod device;
mod export;
mod gui;

use anyhow::{Context, Result};
use clap::Parser;
use data::SharedState;
use device::SyntheticCamera;
use gui::App;
use kiss3d::{light::Light, window::Window};
use log::warn;
use std::{
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

/// The live depth-camera point cloud viewer.
#[derive(Parser)]
struct Opts {
    /// Depth camera index to open.
    #[clap(long, default_value = "0")]
    pub device: u32,

    /// Set the plotted point size.
    #[clap(long, default_value = "2.0")]
    pub point_size: f32,

    /// Target file for point cloud exports (press E in the viewer).
    #[clap(long, default_value = "kinect.ply")]
    pub export_path: PathBuf,
}

/// Grace period granted to the acquisition thread on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    env_logger::init();

    let Opts {
        device,
        point_size,
        export_path,
    } = Opts::parse();

    let shared = Arc::new(SharedState::new());

    let camera = SyntheticCamera::open(device).context("could not open device")?;
    let acquisition = {
        let shared = shared.clone();
        thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || device::run(camera, shared))
            .context("failed to spawn acquisition thread")?
    };

    let mut window = Window::new(env!("CARGO_BIN_NAME"));

    window.set_light(Light::StickToCamera);
    window.set_point_size(point_size);

    let state = App::new(shared.clone(), export_path);
    window.render_loop(state);

    shared.request_shutdown();
    let deadline = Instant::now() + SHUTDOWN_GRACE;
    while !acquisition.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    if acquisition.is_finished() {
        let _ = acquisition.join();
    } else {
        warn!("acquisition thread still running after {SHUTDOWN_GRACE:?}, exiting anyway");
    }

    Ok(())
}
