//! Windowing and input for the viewer.
//!
//! - [`Window`] wraps a winit window and creates the Vulkan [`Surface`]
//! - [`InputState`] collects keyboard and mouse events between frames
//! - [`ViewerActions`] maps raw input onto the viewer's controls

mod input;
mod window;

pub use input::{InputState, KeyCode, ViewerActions};
pub use window::{Surface, Window};
