//! Error type for the Vulkan layer.

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// The Vulkan loader could not be found or opened.
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    #[error("No suitable GPU found")]
    NoSuitableGpu,

    #[error("Required extension missing: {0}")]
    MissingExtension(String),

    /// None of the candidate formats support the requested usage.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Shader error: {0}")]
    ShaderError(String),

    #[error("Surface error: {0}")]
    SurfaceError(String),

    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// A binding set was written before `finalize` created its sets.
    #[error("Binding set written before finalize (binding {binding})")]
    BindingSetNotFinalized { binding: u32 },

    /// A write addressed a set instance that does not exist.
    #[error("Binding set index {index} out of range ({count} instances)")]
    BindingOutOfRange { index: usize, count: usize },
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_result_converts() {
        let err: RhiError = vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.into();
        assert!(matches!(
            err,
            RhiError::VulkanError(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
        ));
    }

    #[test]
    fn test_binding_errors_display() {
        let err = RhiError::BindingOutOfRange { index: 3, count: 2 };
        assert_eq!(err.to_string(), "Binding set index 3 out of range (2 instances)");
        let err = RhiError::BindingSetNotFinalized { binding: 1 };
        assert!(err.to_string().contains("binding 1"));
    }
}
