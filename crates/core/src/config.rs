//! Viewer configuration loaded from TOML.
//!
//! Every section is optional; missing keys take the defaults below, so an
//! empty file (or no file at all) yields a runnable configuration.
//!
//! ```toml
//! [window]
//! width = 1600
//! height = 900
//!
//! [scene]
//! path = "assets/models/Sponza/glTF/Sponza.gltf"
//!
//! [camera]
//! move_speed = 0.1
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Environment variable naming a config file when no CLI path is given.
pub const CONFIG_ENV_VAR: &str = "VISTA_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "vista".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// glTF document to import at startup.
    pub path: PathBuf,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/models/Sponza/glTF/Sponza.gltf"),
        }
    }
}

/// Location of the precompiled SPIR-V stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub directory: PathBuf,
    pub vertex: String,
    pub fragment: String,
}

impl ShaderConfig {
    pub fn vertex_path(&self) -> PathBuf {
        self.directory.join(&self.vertex)
    }

    pub fn fragment_path(&self) -> PathBuf {
        self.directory.join(&self.fragment)
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("assets/shaders"),
            vertex: "vert.spv".to_string(),
            fragment: "frag.spv".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Enable the Khronos validation layer when it is installed.
    pub validation: bool,
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Initial camera placement and controller tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    /// Degrees around +Y; 0 looks down +X.
    pub yaw: f32,
    /// Degrees, clamped to ±89 by the camera.
    pub pitch: f32,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: [-9.0, 1.0, -0.5],
            yaw: 0.0,
            pitch: 0.0,
            fov_y_degrees: 103.0,
            near: 0.1,
            far: 1000.0,
            move_speed: 0.05,
            mouse_sensitivity: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Nominal step fed to the camera controller once per loop iteration.
    pub fixed_timestep: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 0.16,
        }
    }
}

/// Complete viewer configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub scene: SceneConfig,
    pub shaders: ShaderConfig,
    pub renderer: RendererConfig,
    pub camera: CameraConfig,
    pub simulation: SimulationConfig,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}

impl ViewerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ViewerConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or returns the defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Loads the config named by the first CLI argument or [`CONFIG_ENV_VAR`].
    pub fn from_env_or_args() -> Result<Self> {
        match Self::resolve_path(std::env::args().nth(1), std::env::var(CONFIG_ENV_VAR).ok()) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// The CLI argument takes precedence over the environment variable.
    pub fn resolve_path(arg: Option<String>, env: Option<String>) -> Option<PathBuf> {
        arg.or(env)
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if !(self.simulation.fixed_timestep > 0.0) {
            return Err(Error::Config(format!(
                "fixed_timestep must be positive, got {}",
                self.simulation.fixed_timestep
            )));
        }
        if !(self.camera.near > 0.0 && self.camera.near < self.camera.far) {
            return Err(Error::Config(format!(
                "camera planes must satisfy 0 < near < far, got near={} far={}",
                self.camera.near, self.camera.far
            )));
        }
        if !(self.camera.fov_y_degrees > 0.0 && self.camera.fov_y_degrees < 180.0) {
            return Err(Error::Config(format!(
                "fov_y_degrees must be in (0, 180), got {}",
                self.camera.fov_y_degrees
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = ViewerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.shaders.vertex_path(), PathBuf::from("assets/shaders/vert.spv"));
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config = ViewerConfig::from_toml_str(
            r#"
            log_filter = "warn"

            [window]
            width = 800

            [camera]
            move_speed = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.camera.move_speed, 2.5);
        assert_eq!(config.camera.mouse_sensitivity, 0.1);
        assert_eq!(config.log_filter.as_deref(), Some("warn"));
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = ViewerConfig::from_toml_str("[window]\nwidth = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_inverted_planes() {
        let err = ViewerConfig::from_toml_str("[camera]\nnear = 10.0\nfar = 1.0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_non_positive_timestep() {
        let err = ViewerConfig::from_toml_str("[simulation]\nfixed_timestep = 0.0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = ViewerConfig::from_toml_str("[window\nwidth = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_serialized_config_parses_back() {
        let mut config = ViewerConfig::default();
        config.window.title = "sponza".to_string();
        config.renderer.clear_color = [0.1, 0.2, 0.3, 1.0];

        let text = config.to_toml_string().unwrap();
        assert_eq!(ViewerConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ViewerConfig::load(Path::new("definitely/not/here.toml")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_resolve_path_precedence() {
        assert_eq!(
            ViewerConfig::resolve_path(Some("a.toml".into()), Some("b.toml".into())),
            Some(PathBuf::from("a.toml"))
        );
        assert_eq!(
            ViewerConfig::resolve_path(None, Some("b.toml".into())),
            Some(PathBuf::from("b.toml"))
        );
        assert_eq!(ViewerConfig::resolve_path(Some("  ".into()), None), None);
        assert_eq!(ViewerConfig::resolve_path(None, None), None);
    }
}
