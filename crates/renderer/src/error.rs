//! Errors surfaced by the renderer facade.

use thiserror::Error;

use vista_resources::ResourceError;
use vista_rhi::RhiError;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Rhi(#[from] RhiError),

    /// The scene could not be imported.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    /// Window or surface setup failed.
    #[error(transparent)]
    Platform(#[from] vista_core::Error),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vista_rhi::vk;

    #[test]
    fn test_conversions_keep_message() {
        let err: RenderError = RhiError::from(vk::Result::ERROR_DEVICE_LOST).into();
        assert!(matches!(err, RenderError::Rhi(_)));
        assert!(err.to_string().contains("ERROR_DEVICE_LOST"));

        let err: RenderError = ResourceError::FileNotFound(PathBuf::from("a.gltf")).into();
        assert!(matches!(err, RenderError::Resource(_)));
        assert!(err.to_string().contains("a.gltf"));
    }
}
