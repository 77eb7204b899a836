use std::fmt;

use glam::{Affine3A, Mat4, Vec3};

use crate::bounds::BoundingBox;
use crate::frustum::{Frustum, Intersection, PlaneMask};
use crate::sort::SortContext;

/// Opaque snapshot of a camera's incremental plane-test state.
///
/// Taken before descending into a subtree and restored afterwards so that
/// siblings never inherit another subtree's "already inside" planes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct PlaneState(pub PlaneMask);

/// Visibility oracle used by cull traversal.
///
/// Each cull task owns a private working clone (see [`CameraProvider::boxed_clone`]),
/// so implementations may keep mutable per-traversal state such as the
/// active plane mask without any synchronisation.
pub trait CameraProvider: Send + Sync + fmt::Debug {
    /// Copies this camera, including its current plane state, into a new box.
    fn boxed_clone(&self) -> Box<dyn CameraProvider>;

    /// Classifies `bound` against the view volume, narrowing the plane state.
    fn test_volume(&mut self, bound: &BoundingBox) -> Intersection;

    fn near(&self) -> f32;
    fn far(&self) -> f32;

    /// World-space eye position.
    fn position(&self) -> Vec3;

    /// Normalised world-space view direction.
    fn forward(&self) -> Vec3;

    fn plane_state(&self) -> PlaneState;
    fn restore_plane_state(&mut self, state: PlaneState);

    fn sort_context(&self) -> SortContext {
        SortContext {
            eye: self.position(),
            forward: self.forward(),
            near: self.near(),
            far: self.far(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Perspective,
    Orthographic,
}

/// Perspective or orthographic camera with a cached frustum.
#[derive(Debug, Clone)]
pub struct Camera {
    // === Projection ===
    pub projection_type: ProjectionType,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// Half height of the orthographic view volume.
    pub ortho_size: f32,

    // === Cached matrices ===
    world_matrix: Affine3A,
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,

    // === Traversal state ===
    active_planes: PlaneMask,
}

impl Camera {
    /// `fov` is in degrees.
    #[must_use]
    pub fn new_perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::with_projection(ProjectionType::Perspective, aspect, near, far);
        cam.fov = fov.to_radians();
        cam.update_projection_matrix();
        cam
    }

    #[must_use]
    pub fn new_orthographic(ortho_size: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self::with_projection(ProjectionType::Orthographic, aspect, near, far);
        cam.ortho_size = ortho_size;
        cam.update_projection_matrix();
        cam
    }

    fn with_projection(projection_type: ProjectionType, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            projection_type,
            fov: 60.0_f32.to_radians(),
            aspect,
            near,
            far,
            ortho_size: 10.0,

            world_matrix: Affine3A::IDENTITY,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),

            active_planes: PlaneMask::all(),
        }
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection_matrix = match self.projection_type {
            ProjectionType::Perspective => {
                Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
            }
            ProjectionType::Orthographic => {
                let w = self.ortho_size * self.aspect;
                let h = self.ortho_size;
                Mat4::orthographic_rh(-w, w, -h, h, self.near, self.far)
            }
        };

        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    pub fn update_view_projection(&mut self, world_transform: &Affine3A) {
        self.world_matrix = *world_transform;
        self.view_matrix = Mat4::from(*world_transform).inverse();
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }

    /// Places the camera at `eye` looking at `target`.
    pub fn look_at(&mut self, eye: Vec3, target: Vec3, up: Vec3) {
        let view = Mat4::look_at_rh(eye, target, up);
        let world = Affine3A::from_mat4(view.inverse());
        self.update_view_projection(&world);
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> &Mat4 {
        &self.view_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn world_matrix(&self) -> &Affine3A {
        &self.world_matrix
    }

    /// Planes that still need testing for the current subtree.
    #[inline]
    #[must_use]
    pub fn active_planes(&self) -> PlaneMask {
        self.active_planes
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new_perspective(60.0, 1.0, 0.1, 1000.0)
    }
}

impl CameraProvider for Camera {
    fn boxed_clone(&self) -> Box<dyn CameraProvider> {
        Box::new(self.clone())
    }

    fn test_volume(&mut self, bound: &BoundingBox) -> Intersection {
        self.frustum.classify_box(bound, &mut self.active_planes)
    }

    fn near(&self) -> f32 {
        self.near
    }

    fn far(&self) -> f32 {
        self.far
    }

    fn position(&self) -> Vec3 {
        Vec3::from(self.world_matrix.translation)
    }

    fn forward(&self) -> Vec3 {
        (-Vec3::from(self.world_matrix.matrix3.z_axis)).normalize_or(Vec3::NEG_Z)
    }

    fn plane_state(&self) -> PlaneState {
        PlaneState(self.active_planes)
    }

    fn restore_plane_state(&mut self, state: PlaneState) {
        self.active_planes = state.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_follows_look_at() {
        let mut cam = Camera::default();
        cam.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let forward = cam.forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
        assert!((cam.position() - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-5);
    }

    #[test]
    fn plane_state_round_trips_through_test() {
        let mut cam = Camera::default();
        let saved = cam.plane_state();
        let result = cam.test_volume(&BoundingBox::cube(Vec3::new(0.0, 0.0, -10.0), 0.5));
        assert_eq!(result, Intersection::Inside);
        assert_ne!(cam.plane_state(), saved);
        cam.restore_plane_state(saved);
        assert_eq!(cam.active_planes(), PlaneMask::all());
    }

    #[test]
    fn orthographic_camera_culls_outside_box() {
        let mut cam = Camera::new_orthographic(5.0, 1.0, 0.1, 100.0);
        assert_eq!(
            cam.test_volume(&BoundingBox::cube(Vec3::new(50.0, 0.0, -10.0), 1.0)),
            Intersection::Outside
        );
    }
}
