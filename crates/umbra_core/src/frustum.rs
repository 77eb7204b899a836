//! View Frustum
//!
//! Six planes extracted from a view-projection matrix with the
//! Gribb-Hartmann method. Classification of boxes is *incremental*: the
//! caller passes a [`PlaneMask`] of planes that still need testing, and the
//! test clears the bit of every plane the box lies completely inside of.
//! Descendants of that box (whose bounds nest inside it) can then skip those
//! planes entirely.

use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};

use crate::bounds::BoundingBox;

bitflags! {
    /// Frustum planes that still require testing for the current subtree.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PlaneMask: u8 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const BOTTOM = 1 << 2;
        const TOP    = 1 << 3;
        const NEAR   = 1 << 4;
        const FAR    = 1 << 5;
    }
}

impl Default for PlaneMask {
    fn default() -> Self {
        Self::all()
    }
}

/// Result of testing a volume against a frustum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Intersection {
    /// Completely outside at least one plane.
    Outside,
    /// Straddles at least one plane.
    #[default]
    Intersecting,
    /// Completely inside every plane.
    Inside,
}

impl Intersection {
    #[inline]
    #[must_use]
    pub fn is_visible(self) -> bool {
        self != Self::Outside
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Extracts planes from a `[0, 1]`-depth view-projection matrix.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0], // Left
            rows[3] - rows[0], // Right
            rows[3] + rows[1], // Bottom
            rows[3] - rows[1], // Top
            rows[2],           // Near (depth range 0..1)
            rows[3] - rows[2], // Far
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[inline]
    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Signed distance from `point` to plane `index` (positive = inside).
    #[inline]
    #[must_use]
    pub fn signed_distance(&self, index: usize, point: Vec3) -> f32 {
        let plane = self.planes[index];
        plane.truncate().dot(point) + plane.w
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        (0..6).all(|i| self.signed_distance(i, center) >= -radius)
    }

    /// Classifies `bound` against the planes still set in `mask`.
    ///
    /// Planes the box is fully inside of are removed from `mask`. When the
    /// mask becomes empty the box (and anything nested in it) is inside.
    /// On `Outside` the mask is left in an unspecified partially-updated
    /// state; callers restore it from a saved copy.
    pub fn classify_box(&self, bound: &BoundingBox, mask: &mut PlaneMask) -> Intersection {
        if bound.is_empty() {
            return Intersection::Outside;
        }

        let center = bound.center();
        let extents = bound.extents();

        for (index, flag) in PlaneMask::all().iter().enumerate() {
            if !mask.contains(flag) {
                continue;
            }

            let normal = self.planes[index].truncate();
            let radius = normal.abs().dot(extents);
            let distance = self.signed_distance(index, center);

            if distance + radius < 0.0 {
                return Intersection::Outside;
            }
            if distance - radius >= 0.0 {
                mask.remove(flag);
            }
        }

        if mask.is_empty() {
            Intersection::Inside
        } else {
            Intersection::Intersecting
        }
    }
}
