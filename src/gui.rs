use crate::{
    data::{build_point_cloud, ExportState, PointCloud, SharedState},
    export,
};
use anyhow::Result;
use kiss3d::{
    camera::{ArcBall, Camera},
    event::{Action, Key, WindowEvent},
    planar_camera::PlanarCamera,
    post_processing::PostProcessingEffect,
    text::Font,
    window::{State, Window},
};
use log::{error, info};
use nalgebra::{Point2, Point3, Vector3};
use std::{path::PathBuf, sync::Arc};

/// Scale applied to plotted points; exports keep the unscaled coordinates.
const SCENE_SCALE: f32 = 0.0002;

pub struct App {
    shared: Arc<SharedState>,
    export_path: PathBuf,
    export: ExportState,
    camera: ArcBall,
}

impl State for App {
    fn step(&mut self, window: &mut Window) {
        let result = self.try_step(window);
        if let Err(err) = result {
            eprintln!("Error: {err}");
            window.close();
        }
    }

    fn cameras_and_effect(
        &mut self,
    ) -> (
        Option<&mut dyn Camera>,
        Option<&mut dyn PlanarCamera>,
        Option<&mut dyn PostProcessingEffect>,
    ) {
        (Some(&mut self.camera), None, None)
    }
}

impl App {
    pub fn new(shared: Arc<SharedState>, export_path: PathBuf) -> Self {
        let eye = Point3::from([0.0f32, 0.0, -1.0]);
        let at = Point3::origin();
        let mut camera = ArcBall::new(eye, at);
        camera.set_up_axis(Vector3::from([0.0, -1.0, 0.0]));

        Self {
            shared,
            export_path,
            export: ExportState::default(),
            camera,
        }
    }

    fn try_step(&mut self, window: &mut Window) -> Result<()> {
        self.handle_events(window);

        // Scan the shared buffer under the lock, then release it before any
        // drawing or file I/O.
        let cloud = {
            let buffer = self.shared.lock_depth();
            build_point_cloud(&buffer)
        };

        self.render(window, &cloud);

        if self.export.take() {
            match export::write_ply(&cloud, &self.export_path) {
                Ok(()) => info!(
                    "exported {} points to {}",
                    cloud.points.len(),
                    self.export_path.display()
                ),
                Err(err) => error!("export failed: {err:#}"),
            }
        }

        Ok(())
    }

    fn handle_events(&mut self, window: &mut Window) {
        window.events().iter().for_each(|event| {
            if let WindowEvent::Key(Key::E, Action::Press, _) = event.value {
                self.export.request();
            }
        });
    }

    fn render(&mut self, window: &mut Window, cloud: &PointCloud) {
        let color = Point3::from([1.0f32; 3]);
        cloud.points.iter().for_each(|point| {
            let scaled = Point3::from(point.coords * SCENE_SCALE);
            window.draw_point(&scaled, &color);
        });

        window.draw_text(
            &format!(
                "frame: {}, points: {} (press E to export)",
                self.shared.frame_count(),
                cloud.points.len()
            ),
            &Point2::from([5.0; 2]),
            40.0,
            &Font::default(),
            &Point3::from([0.0, 204.0, 0.0]),
        );
    }
}
