//! Error type shared across crate boundaries.

use thiserror::Error;

/// Top-level error for the viewer.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan setup or runtime failure.
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window or surface creation failure.
    #[error("Window error: {0}")]
    Window(String),

    /// Shader binary missing or malformed.
    #[error("Shader error: {0}")]
    Shader(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or unreadable configuration.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_error_maps_to_config() {
        let err: Error = toml::from_str::<toml::Table>("= broken").unwrap_err().into();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_display_prefixes() {
        assert_eq!(
            Error::Shader("vert.spv".into()).to_string(),
            "Shader error: vert.spv"
        );
        assert_eq!(
            Error::Window("no display".into()).to_string(),
            "Window error: no display"
        );
    }
}
