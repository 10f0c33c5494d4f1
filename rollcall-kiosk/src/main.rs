//! Rollcall Kiosk - Main entry point
//!
//! Loads configuration, wires the HTTP backend and snapshot camera into the
//! capture orchestrator, and serves the kiosk control API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_kiosk::api::{self, AdminInfo, AppContext};
use rollcall_kiosk::backend::HttpBackend;
use rollcall_kiosk::camera::HttpSnapshotCamera;
use rollcall_kiosk::config::{ConfigOverrides, KioskConfig};
use rollcall_kiosk::events::{KioskEventBus, EVENT_BUS_CAPACITY};
use rollcall_kiosk::gate::AccessGate;
use rollcall_kiosk::{Collaborators, Mode};

/// Command-line arguments for rollcall-kiosk
#[derive(Parser, Debug)]
#[command(name = "rollcall-kiosk")]
#[command(about = "Attendance capture kiosk (QR / roll number + face probe)")]
#[command(version)]
struct Args {
    /// Path to TOML config file (overrides ROLLCALL_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the control API
    #[arg(short, long, env = "ROLLCALL_KIOSK_PORT")]
    port: Option<u16>,

    /// Attendance backend base URL
    #[arg(long, env = "ROLLCALL_BACKEND_URL")]
    backend_url: Option<String>,

    /// Operating mode at startup
    #[arg(long, value_parser = parse_mode, env = "ROLLCALL_MODE")]
    mode: Option<Mode>,
}

fn parse_mode(value: &str) -> std::result::Result<Mode, String> {
    match value.to_ascii_lowercase().as_str() {
        "auto" => Ok(Mode::Auto),
        "manual" => Ok(Mode::Manual),
        other => Err(format!("unknown mode '{}' (expected auto or manual)", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = KioskConfig::load(
        args.config.as_deref(),
        ConfigOverrides {
            port: args.port,
            backend_url: args.backend_url.clone(),
            mode: args.mode,
        },
    )
    .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "rollcall_kiosk={level},rollcall_common={level},tower_http=info",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting rollcall-kiosk v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        "Backend: {}, camera: {}, mode: {}",
        config.backend.base_url, config.camera.snapshot_url, config.kiosk.mode
    );

    let backend = Arc::new(
        HttpBackend::new(&config.backend.base_url, config.request_timeout())
            .context("Failed to create backend client")?,
    );
    let camera = Arc::new(
        HttpSnapshotCamera::new(&config.camera.snapshot_url, config.camera_timeout())
            .context("Failed to create camera client")?,
    );

    let events = KioskEventBus::new(EVENT_BUS_CAPACITY);
    let (orchestrator, orchestrator_task) = rollcall_kiosk::spawn(
        config.kiosk.mode,
        Collaborators {
            recognition: backend.clone(),
            presence: backend,
            camera,
        },
        config.timing(),
        events,
    );

    let ctx = AppContext::new(
        orchestrator.clone(),
        AccessGate::new(config.kiosk.admin_pin.clone()),
        config.display_offset()?,
        AdminInfo {
            backend_url: config.backend.base_url.clone(),
            snapshot_url: config.camera.snapshot_url.clone(),
            probe_interval_ms: config.kiosk.probe_interval_ms,
            result_dwell_ms: config.kiosk.result_dwell_ms,
        },
    );

    let served = api::run(ctx, config.listen_addr(), shutdown_signal()).await;

    orchestrator.shutdown();
    if let Err(e) = orchestrator_task.await {
        warn!("Orchestrator task ended abnormally: {}", e);
    }

    served.context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
