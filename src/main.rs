//! Facedriver - OpenSeeFace-to-VRM tracking service
//!
//! Main entry point for the CLI application.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use facedriver::{
    applier::TrackingApplier,
    avatar::{AvatarRig, ModelLoader},
    config::Config,
    tracking::OsfReceiver,
    AppState,
};

/// Facedriver - drives a VRM avatar from OpenSeeFace tracking data
#[derive(Parser, Debug)]
#[command(name = "facedriver", version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Avatar model path (overrides config)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Tracking UDP port (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .init();

    info!("Starting {} v{}", facedriver::NAME, facedriver::VERSION);

    // Load configuration
    let mut config = if let Some(ref path) = args.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.model.path = model.display().to_string();
    }
    if let Some(port) = args.port {
        config.tracking.port = port;
    }

    config.validate()?;

    info!("Tracking port: {}", config.tracking.port);
    info!("Avatar model: {}", config.model.path);

    let model_path = PathBuf::from(&config.model.path);

    // Create shared application state
    let state = AppState::new(config);

    // Loaded rigs flow from the loader task to the applier task; load
    // requests are serialized through a single queue so two loads can never
    // race
    let (rig_tx, rig_rx) = tokio::sync::mpsc::channel::<AvatarRig>(1);
    let (load_tx, load_rx) = tokio::sync::mpsc::channel::<PathBuf>(8);

    // Start OpenSeeFace receiver
    let osf_state = Arc::clone(&state);
    tokio::spawn(async move {
        if let Err(e) = run_osf_tracking(osf_state).await {
            error!("OSF tracking error: {}", e);
        }
    });

    // Start model loader
    let loader_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_model_loader(loader_state, load_rx, rig_tx).await;
    });

    // Start the applier tick loop
    let applier_state = Arc::clone(&state);
    tokio::spawn(async move {
        run_applier(applier_state, rig_rx).await;
    });

    // Queue the startup model
    if let Err(e) = load_tx.send(model_path).await {
        error!("Failed to queue startup model load: {}", e);
    }

    // Wait for Ctrl+C / SIGTERM
    shutdown_signal().await;
    info!("Shutdown signal received");
    state.shutdown();

    // Give tasks a moment to clean up
    tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;

    info!("Facedriver stopped");
    Ok(())
}

async fn run_osf_tracking(state: Arc<AppState>) -> facedriver::Result<()> {
    let config = state.config.read().await;
    let tracking_config = config.tracking.clone();
    drop(config);

    let mut shutdown_rx = state.subscribe_shutdown();

    let mut receiver = OsfReceiver::new(&tracking_config, Arc::clone(&state.tracking));
    receiver.start()?;

    info!("OSF tracking started (port: {})", tracking_config.port);

    loop {
        tokio::select! {
            result = receiver.process() => {
                if let Err(e) = result {
                    error!("OSF receive error: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
                }
            }
            _ = shutdown_rx.recv() => {
                info!("OSF tracking shutting down");
                break;
            }
        }

        // Small yield to avoid busy-spinning when no data arrives
        tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
    }

    receiver.stop();
    Ok(())
}

/// Consume load requests one at a time and hand finished rigs to the applier.
///
/// A failed load is logged and dropped; whatever rig the applier currently
/// holds stays in place.
async fn run_model_loader(
    state: Arc<AppState>,
    mut load_rx: tokio::sync::mpsc::Receiver<PathBuf>,
    rig_tx: tokio::sync::mpsc::Sender<AvatarRig>,
) {
    let config = state.config.read().await;
    let loader = ModelLoader::new(&config.model);
    drop(config);

    let mut shutdown_rx = state.subscribe_shutdown();

    loop {
        tokio::select! {
            request = load_rx.recv() => {
                let path = match request {
                    Some(p) => p,
                    None => break,
                };

                info!("Loading avatar model: {}", path.display());
                match loader.load(&path).await {
                    Ok(rig) => {
                        info!("Avatar model loaded: {}", path.display());
                        if rig_tx.send(rig).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to load avatar model: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Model loader shutting down");
                break;
            }
        }
    }
}

/// Tick loop that drives the rig from the latest tracking sample.
///
/// The rig and applier live on this task only; a newly loaded rig arriving
/// through `rig_rx` replaces the current one and re-initializes the applier.
async fn run_applier(state: Arc<AppState>, mut rig_rx: tokio::sync::mpsc::Receiver<AvatarRig>) {
    let config = state.config.read().await;
    let applier_config = config.applier.clone();
    drop(config);

    let mut shutdown_rx = state.subscribe_shutdown();

    let mut applier = TrackingApplier::new(applier_config);
    let mut rig: Option<AvatarRig> = None;

    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(16));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Pick up replacement rigs, keeping only the newest
                let mut replaced = false;
                while let Ok(new_rig) = rig_rx.try_recv() {
                    rig = Some(new_rig);
                    replaced = true;
                }
                if replaced {
                    applier.avatar_assigned();
                }

                if let Some(ref mut rig) = rig {
                    let sample = state.tracking.latest(applier.face_id()).await;
                    applier.apply(rig, sample.as_ref());
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Applier shutting down");
                break;
            }
        }
    }
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
