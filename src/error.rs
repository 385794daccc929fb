//! Error types for facedriver

use thiserror::Error;

/// Main error type for facedriver
#[derive(Error, Debug)]
pub enum FacedriverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tracking error: {0}")]
    Tracking(#[from] TrackingError),

    #[error("Avatar error: {0}")]
    Avatar(#[from] AvatarError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Tracking receiver errors
#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("Receiver error: {0}")]
    Receiver(String),

    #[error("Frame parse error: {0}")]
    Parse(String),
}

/// Avatar load and rig errors
#[derive(Error, Debug)]
pub enum AvatarError {
    #[error("Model file not found: {0}")]
    NotFound(String),

    #[error("Unexpected model extension: {path} (expected .{expected})")]
    BadExtension { path: String, expected: String },

    #[error("Failed to read model file: {0}")]
    Read(String),

    #[error("Failed to parse model: {0}")]
    Parse(String),

    #[error("Model has no humanoid bone map")]
    NoHumanoid,
}

/// Result type alias for facedriver operations
pub type Result<T> = std::result::Result<T, FacedriverError>;
