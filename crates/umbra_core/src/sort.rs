//! Sort Strategies & Sort Keys
//!
//! Every render queue owns one [`SortStrategy`]. Items compute an integer
//! [`SortKey`] per queue; queues are always sorted in *ascending* key order,
//! so each strategy encodes its direction into the key itself.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Integer ordering key. Smaller keys are submitted first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SortKey(pub i64);

impl SortKey {
    pub const MIN: Self = Self(i64::MIN);
    pub const MAX: Self = Self(i64::MAX);
}

/// Range that normalised front-to-back distances are spread over.
const FRONT_TO_BACK_RANGE: f64 = (1u64 << 40) as f64;
/// Numerator of the inverse-proportional back-to-front key.
const BACK_TO_FRONT_SCALE: f64 = (1u64 << 40) as f64;
/// Squared distances below this are treated as touching the eye.
const BACK_TO_FRONT_EPSILON: f32 = 1e-6;
/// Fixed-point scale for signed view depth.
const DEPTH_SCALE: f64 = 1024.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortStrategy {
    /// Nearest first; maximises early depth rejection for opaque geometry.
    #[default]
    FrontToBack,
    /// Farthest first; required for correct alpha blending.
    BackToFront,
    /// Signed depth along the view axis, most negative first. Used for
    /// orthographic passes where radial distance is meaningless.
    AbsoluteDepth,
    /// Constant key; order is decided by the tie-break alone.
    Unsorted,
}

/// Camera-derived values needed to compute sort keys.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SortContext {
    pub eye: Vec3,
    /// Normalised view direction.
    pub forward: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for SortContext {
    fn default() -> Self {
        Self {
            eye: Vec3::ZERO,
            forward: Vec3::NEG_Z,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl SortStrategy {
    /// Computes the key of a point for this strategy.
    #[must_use]
    pub fn key(self, point: Vec3, ctx: &SortContext) -> SortKey {
        match self {
            Self::FrontToBack => front_to_back_key(point.distance_squared(ctx.eye), ctx.far * ctx.far),
            Self::BackToFront => back_to_front_key(point.distance_squared(ctx.eye)),
            Self::AbsoluteDepth => depth_key((point - ctx.eye).dot(ctx.forward)),
            Self::Unsorted => SortKey(0),
        }
    }
}

/// Ascending clamped squared distance. Anything at or beyond the far plane
/// (and NaN) collapses onto [`SortKey::MAX`].
#[must_use]
pub fn front_to_back_key(distance_sq: f32, far_sq: f32) -> SortKey {
    if distance_sq.is_nan() || distance_sq >= far_sq || far_sq <= 0.0 {
        return SortKey::MAX;
    }
    let normalized = f64::from(distance_sq.max(0.0)) / f64::from(far_sq);
    SortKey((normalized * FRONT_TO_BACK_RANGE) as i64)
}

/// Inverse-proportional key: near items get large keys, far items small ones.
#[must_use]
pub fn back_to_front_key(distance_sq: f32) -> SortKey {
    if distance_sq.is_nan() || distance_sq < BACK_TO_FRONT_EPSILON {
        return SortKey::MAX;
    }
    let key = BACK_TO_FRONT_SCALE / f64::from(distance_sq);
    SortKey((key as i64).min(i64::MAX - 1))
}

#[must_use]
pub fn depth_key(depth: f32) -> SortKey {
    SortKey((f64::from(depth) * DEPTH_SCALE) as i64)
}
