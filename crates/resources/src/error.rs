//! Error types for scene import.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal import errors. Problems confined to one primitive, texture or
/// node are logged and skipped instead.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The document could not be parsed or its buffers loaded.
    #[error("Failed to load glTF file '{path}': {message}")]
    GltfLoad { path: PathBuf, message: String },

    /// The document has no scene to traverse.
    #[error("glTF file '{0}' contains no scene")]
    NoScene(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// A primitive lacks an attribute it cannot be drawn without.
    #[error("Primitive is missing the {0} attribute")]
    MissingAttribute(&'static str),
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_file() {
        let err = ResourceError::FileNotFound(PathBuf::from("missing.gltf"));
        assert!(err.to_string().contains("missing.gltf"));

        let err = ResourceError::MissingAttribute("POSITION");
        assert_eq!(err.to_string(), "Primitive is missing the POSITION attribute");
    }
}
