use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::Vec3;

use umbra_core::{BoundingBox, Camera, CameraProvider, Intersection, PlaneState};

/// Camera that counts every bound test, including tests made by its clones.
#[derive(Debug, Clone)]
pub struct CountingCamera {
    inner: Camera,
    tests: Arc<AtomicUsize>,
}

impl CountingCamera {
    #[must_use]
    pub fn new(inner: Camera) -> Self {
        Self {
            inner,
            tests: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bound tests made so far by this camera and every clone of it.
    #[must_use]
    pub fn tests(&self) -> usize {
        self.tests.load(Ordering::SeqCst)
    }

    /// Shared handle to the counter, usable after the camera was boxed.
    #[must_use]
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.tests)
    }

    #[must_use]
    pub fn inner(&self) -> &Camera {
        &self.inner
    }
}

impl CameraProvider for CountingCamera {
    fn boxed_clone(&self) -> Box<dyn CameraProvider> {
        Box::new(self.clone())
    }

    fn test_volume(&mut self, bound: &BoundingBox) -> Intersection {
        self.tests.fetch_add(1, Ordering::SeqCst);
        self.inner.test_volume(bound)
    }

    fn near(&self) -> f32 {
        self.inner.near()
    }

    fn far(&self) -> f32 {
        self.inner.far()
    }

    fn position(&self) -> Vec3 {
        self.inner.position()
    }

    fn forward(&self) -> Vec3 {
        self.inner.forward()
    }

    fn plane_state(&self) -> PlaneState {
        self.inner.plane_state()
    }

    fn restore_plane_state(&mut self, state: PlaneState) {
        self.inner.restore_plane_state(state);
    }
}

/// Perspective camera on the +Z axis looking at the origin.
#[must_use]
pub fn looking_at_origin(distance: f32, far: f32) -> Camera {
    let mut camera = Camera::new_perspective(60.0, 1.0, 0.1, far);
    camera.look_at(Vec3::new(0.0, 0.0, distance), Vec3::ZERO, Vec3::Y);
    camera
}
