//! Camera, node transforms and lighting.
//!
//! Pure math on `glam` types; nothing here touches the GPU.

pub mod camera;
pub mod light;
pub mod transform;

pub use camera::{FpsCamera, MoveInput, PITCH_LIMIT, Projection};
pub use light::PointLight;
pub use transform::{Transform, compose, normal_matrix};
