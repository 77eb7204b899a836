//! Developer utilities shared by Umbra's tests, benches and demo apps.

pub mod camera;
pub mod fixtures;
pub mod items;

pub use camera::{CountingCamera, looking_at_origin};
pub use fixtures::{grid_scene, grouped_scene, mesh_leaf, opaque_pass, standard_passes};
pub use items::PanickingItem;
