//! Cull statistics demo.
//!
//! Culls a generated grid scene from an orbiting camera with several frames
//! in flight, logging per-frame queue sizes and traversal counters.
//!
//! ```sh
//! cargo run -p cull_stats -- 128
//! ```

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use log::{info, warn};

use umbra::prelude::*;
use umbra_dev_utils::{grid_scene, standard_passes};

const FRAMES: u64 = 16;
const ORBIT_RADIUS: f32 = 90.0;

fn orbit_camera(frame: FrameId) -> Camera {
    let angle = frame as f32 * 0.2;
    let eye = Vec3::new(angle.sin() * ORBIT_RADIUS, 25.0, angle.cos() * ORBIT_RADIUS);
    let mut camera = Camera::new_perspective(50.0, 16.0 / 9.0, 0.1, 400.0);
    camera.look_at(eye, Vec3::ZERO, Vec3::Y);
    camera
}

fn report(output: &FrameOutput) {
    let sizes: Vec<String> = output
        .queues
        .iter()
        .map(|(_, queue)| format!("{}={}", queue.name, queue.len()))
        .collect();
    let stats = &output.stats;
    info!(
        "Frame {:>3}: [{}] visited {} culled {} skipped {} prepared {} tasks {} delegated {}",
        output.frame,
        sizes.join(" "),
        stats.nodes_visited,
        stats.nodes_culled,
        stats.subtrees_skipped,
        stats.items_prepared,
        stats.tasks,
        stats.delegated,
    );
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let side: u32 = match std::env::args().nth(1) {
        Some(arg) => arg.parse().context("grid side must be a positive integer")?,
        None => 96,
    };

    let scene = Arc::new(grid_scene(side, 1.5));
    info!("Scene: {} nodes ({side}x{side} grid)", scene.len());

    let settings = CullSettings {
        frame_slots: 3,
        ..Default::default()
    };
    let mut pipeline = FramePipeline::new(settings)?;
    let started = Instant::now();

    for frame in 0..FRAMES {
        let request = FrameRequest::new(
            frame,
            Arc::clone(&scene),
            Arc::new(orbit_camera(frame)),
            standard_passes(),
        );

        loop {
            match pipeline.start_frame(request.clone()) {
                Ok(()) => break,
                Err(err) if err.is_backpressure() => {
                    let oldest = pipeline
                        .oldest_in_flight()
                        .context("backpressure with no frame in flight")?;
                    report(&pipeline.wait_finished(oldest)?);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    for output in pipeline.wait_all() {
        match output {
            Ok(output) => report(&output),
            Err(err) => warn!("Frame failed: {err}"),
        }
    }

    info!("{FRAMES} frames in {:.2?}", started.elapsed());
    Ok(())
}
