//! Shared foundation for the vista crates.
//!
//! - [`Error`] / [`Result`] used at crate boundaries
//! - [`init_logging`] for the `tracing` subscriber
//! - [`Timer`] and [`FixedStep`] for the main loop
//! - [`ViewerConfig`] loaded from TOML

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    CameraConfig, RendererConfig, SceneConfig, ShaderConfig, SimulationConfig, ViewerConfig,
    WindowConfig,
};
pub use error::{Error, Result};
pub use logging::{DEFAULT_FILTER, init_logging, init_logging_with};
pub use timer::{FixedStep, Timer};
