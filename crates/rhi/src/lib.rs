//! Vulkan layer for the viewer, built on `ash` and `gpu-allocator`.
//!
//! Every GPU object here is an RAII wrapper holding an `Arc<Device>`; dropping
//! the wrapper releases the object. The [`device::Device`] is the one explicit
//! context passed to everything that creates GPU state.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod render_pass;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod upload;
pub mod vertex;

pub use error::{RhiError, RhiResult};

pub use ash::vk;
