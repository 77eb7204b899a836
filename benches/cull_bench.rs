//! Cull pipeline benchmarks.
//!
//! Measures one full frame (traversal, merge and sort) over grid scenes of
//! increasing size, with and without worker threads.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use umbra::core::CameraProvider;
use umbra::cull::{CullSettings, FramePipeline, FrameRequest};
use umbra_dev_utils::{grid_scene, looking_at_origin, standard_passes};

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("cull_frame");
    let camera: Arc<dyn CameraProvider> = Arc::new(looking_at_origin(120.0, 1000.0));

    for side in [16_u32, 64, 128] {
        let scene = Arc::new(grid_scene(side, 1.5));

        for multithreading in [false, true] {
            let settings = CullSettings {
                multithreading,
                ..Default::default()
            };
            let Ok(mut pipeline) = FramePipeline::new(settings) else {
                continue;
            };
            let label = if multithreading { "parallel" } else { "inline" };
            let mut frame = 0;

            group.bench_with_input(BenchmarkId::new(label, side * side), &scene, |b, scene| {
                b.iter(|| {
                    let request = FrameRequest::new(
                        frame,
                        Arc::clone(scene),
                        Arc::clone(&camera),
                        standard_passes(),
                    );
                    frame += 1;
                    if pipeline.start_frame(request).is_ok() {
                        black_box(pipeline.wait_finished(frame - 1).ok());
                    }
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_frame);
criterion_main!(benches);
