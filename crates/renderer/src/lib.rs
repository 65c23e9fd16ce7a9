//! Frame orchestration and scene drawing.
//!
//! - [`FrameManager`] runs the acquire / record / submit / present cycle
//!   over [`MAX_FRAMES_IN_FLIGHT`] slots
//! - [`GpuScene`] holds the uploaded geometry, textures and material sets
//! - [`Renderer`] ties them to a window and a camera

pub mod depth_buffer;
pub mod error;
pub mod frame;
pub mod frame_manager;
pub mod gpu_scene;
pub mod renderer;
pub mod texture_arena;
pub mod ubo;

pub use error::{RenderError, RenderResult};
pub use frame::{FrameSlots, InvalidationReason, SwapchainInvalidation};
pub use frame_manager::{FrameContext, FrameManager, FrameOutcome, PresentOutcome};
pub use gpu_scene::{DrawRecord, GpuScene, MaterialBindings, build_draw_records};
pub use renderer::Renderer;
pub use texture_arena::{TextureArena, TextureKey};
pub use ubo::{FrameUniforms, UniformRing};

/// Maximum number of frames that can be in flight simultaneously.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;
