//! Configuration parsing and management for facedriver

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, FacedriverError};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tracking: TrackingConfig,
    pub applier: ApplierConfig,
    pub model: ModelConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FacedriverError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::ReadFile(format!("{}: {}", path.as_ref().display(), e))
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, FacedriverError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()).into())
    }

    /// Load configuration from default paths
    pub fn load() -> Result<Self, FacedriverError> {
        let paths = [
            PathBuf::from("config.toml"),
            PathBuf::from("config/default.toml"),
        ];

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), FacedriverError> {
        if self.tracking.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tracking.port".to_string(),
                message: "Port must be greater than 0".to_string(),
            }
            .into());
        }

        // A zero threshold would divide by zero in the blink mapping
        if self.applier.eye_open_threshold <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "applier.eye_open_threshold".to_string(),
                message: "Eye open threshold must be greater than 0".to_string(),
            }
            .into());
        }

        if !(0.0..=1.0).contains(&self.applier.smoothing) {
            return Err(ConfigError::InvalidValue {
                field: "applier.smoothing".to_string(),
                message: "Smoothing must be between 0.0 and 1.0".to_string(),
            }
            .into());
        }

        if self.applier.max_fit_error < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "applier.max_fit_error".to_string(),
                message: "Maximum fit error must not be negative".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// OpenSeeFace UDP intake configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// UDP port to receive tracking data on
    pub port: u16,
    /// Listen address for the UDP socket
    pub listen_address: String,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            port: 11573,
            listen_address: "127.0.0.1".to_string(),
        }
    }
}

/// Tracking-to-avatar mapping configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplierConfig {
    /// Subject (face) id to consume from multi-face tracking
    pub face_id: i32,
    /// Samples with a 3D fit error above this value are skipped
    pub max_fit_error: f32,
    /// Eye openness at or above this value counts as fully open
    pub eye_open_threshold: f32,
    /// Multiplier for the mouth-open feature
    pub mouth_open_multiplier: f32,
    /// Multiplier for the mouth-wide feature
    pub mouth_wide_multiplier: f32,
    /// Enable head bone rotation
    pub head_tracking: bool,
    /// How to derive the head orientation from a sample
    pub rotation_mode: RotationMode,
    /// Scales the converted Euler angles (Simple/OpenCv modes)
    pub rotation_multiplier: f32,
    /// Static Euler offset in degrees, added after scaling (Simple/OpenCv modes)
    pub rotation_offset: [f32; 3],
    /// Invert the target orientation before smoothing (Simple/OpenCv modes)
    pub apply_inverse: bool,
    /// Rotation smoothing factor: 0.0 = instant snap, 1.0 = frozen
    pub smoothing: f32,
}

impl Default for ApplierConfig {
    fn default() -> Self {
        Self {
            face_id: 0,
            max_fit_error: 100.0,
            eye_open_threshold: 0.2,
            mouth_open_multiplier: 1.0,
            mouth_wide_multiplier: 1.0,
            head_tracking: true,
            rotation_mode: RotationMode::Simple,
            rotation_multiplier: 1.0,
            rotation_offset: [0.0, 0.0, 0.0],
            apply_inverse: false,
            smoothing: 0.6,
        }
    }
}

/// Head rotation conversion mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// Negate pitch and roll of the sample's Euler triple
    Simple,
    /// Negate yaw of the sample's Euler triple (OpenCV axis convention)
    Opencv,
    /// Use the sample quaternion directly, x and z sign-flipped
    Raw,
}

impl Default for RotationMode {
    fn default() -> Self {
        Self::Simple
    }
}

/// Avatar model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the VRM model loaded at startup
    pub path: String,
    /// Accepted model file extension
    pub extension: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "assets/model.vrm".to_string(),
            extension: "vrm".to_string(),
        }
    }
}
