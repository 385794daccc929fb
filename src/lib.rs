//! Facedriver - OpenSeeFace-to-VRM tracking service
//!
//! A headless Rust service that:
//! - Receives OpenSeeFace tracking frames over UDP
//! - Loads VRM avatar models and resolves their humanoid bone map
//! - Drives blink/mouth expression weights and smoothed head rotation

pub mod applier;
pub mod avatar;
pub mod config;
pub mod error;
pub mod tracking;

pub use config::Config;
pub use error::{FacedriverError, Result};

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use tracking::TrackingStore;

/// Application state shared across all components
#[derive(Debug)]
pub struct AppState {
    /// Current configuration
    pub config: RwLock<Config>,
    /// Latest tracking sample per subject
    pub tracking: Arc<TrackingStore>,
    /// Shutdown signal
    pub shutdown_tx: broadcast::Sender<()>,
}

impl AppState {
    /// Create a new application state with the given configuration
    pub fn new(config: Config) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);

        Arc::new(Self {
            config: RwLock::new(config),
            tracking: Arc::new(TrackingStore::new()),
            shutdown_tx,
        })
    }

    /// Subscribe to shutdown signal
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signal shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
