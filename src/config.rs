//! Startup configuration.
//!
//! Read from `modelview.json` in the working directory when it exists. Every
//! field is optional in the file; missing ones take the defaults below.

use crate::assets::upload::DEFAULT_SWAP_DELAY;
use crate::ui::settings::{parse_hex_color, DEFAULT_BACKGROUND};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "modelview.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub surface: SurfaceConfig,
    pub orbit: OrbitConfig,
    pub lighting: LightingConfig,
    pub contact_shadow: ContactShadowConfig,
    pub view: ViewConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub dpr_min: f32,
    pub dpr_max: f32,
    pub camera_position: [f32; 3],
    pub fov_deg: f32,
    pub window_size: [f32; 2],
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            dpr_min: 1.0,
            dpr_max: 2.0,
            camera_position: [0.0, 0.0, 5.0],
            fov_deg: 50.0,
            window_size: [1280.0, 720.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub enable_rotate: bool,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.25,
            rotate_speed: 0.5,
            min_polar_angle: 0.0,
            max_polar_angle: std::f32::consts::PI / 1.5,
            enable_zoom: true,
            enable_pan: true,
            enable_rotate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentPreset {
    #[default]
    City,
    Studio,
    Sunset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    pub default_intensity: f32,
    pub spot_position: [f32; 3],
    pub spot_angle: f32,
    pub spot_penumbra: f32,
    pub environment: EnvironmentPreset,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            default_intensity: 0.5,
            spot_position: [10.0, 10.0, 10.0],
            spot_angle: 0.15,
            spot_penumbra: 1.0,
            environment: EnvironmentPreset::City,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactShadowConfig {
    pub height: f32,
    pub opacity: f32,
    pub scale: f32,
    pub blur: f32,
    pub far: f32,
    pub resolution: usize,
}

impl Default for ContactShadowConfig {
    fn default() -> Self {
        Self {
            height: -1.0,
            opacity: 0.4,
            scale: 10.0,
            blur: 1.5,
            far: 2.0,
            resolution: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub background: String,
    pub default_scale: f32,
    pub swap_delay_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            background: "#f0f0f0".to_string(),
            default_scale: 1.0,
            swap_delay_ms: DEFAULT_SWAP_DELAY.as_millis() as u64,
        }
    }
}

impl ViewConfig {
    pub fn background_rgb(&self) -> [u8; 3] {
        parse_hex_color(&self.background).unwrap_or_else(|| {
            log::warn!("Invalid background colour '{}'; using default", self.background);
            DEFAULT_BACKGROUND
        })
    }
}

impl ViewerConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: ViewerConfig = serde_json::from_str(&json)?;
        Ok(config.sanitized())
    }

    /// Loads `path` if present; any failure falls back to defaults.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::debug!("No config at {}; using defaults", path.display());
            return Self::default();
        }
        match Self::load_from_file(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(err) => {
                log::warn!("Failed to load config {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    fn sanitized(mut self) -> Self {
        let surface = &mut self.surface;
        surface.dpr_min = surface.dpr_min.max(0.5);
        surface.dpr_max = surface.dpr_max.max(surface.dpr_min);
        surface.fov_deg = surface.fov_deg.clamp(1.0, 179.0);

        let orbit = &mut self.orbit;
        orbit.damping_factor = orbit.damping_factor.clamp(0.0, 1.0);
        orbit.min_polar_angle = orbit.min_polar_angle.clamp(0.0, std::f32::consts::PI);
        orbit.max_polar_angle = orbit
            .max_polar_angle
            .clamp(orbit.min_polar_angle, std::f32::consts::PI);

        self.contact_shadow.resolution = self.contact_shadow.resolution.clamp(16, 1024);
        self
    }
}
