//! Ground-control daemon for a drone-mounted WiFi camera rig.
//!
//! Usage:
//!   camrig -c /etc/camrig/camrig.conf
//!   camrig -c /etc/camrig/camrig.conf --stderr   # log to stderr

mod camera;
mod capture;
mod config;
mod download;
mod error;
mod flight;
mod geotag;
mod liveview;
mod ping;
mod player;
mod retry;
mod telemetry;
mod util;
mod wifi;

use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use crate::config::RigConfig;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "camrig", about = "camrig — ground-control client for a drone camera rig")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", default_value = "/etc/camrig/camrig.conf")]
    config: PathBuf,

    /// Log to stderr instead of syslog (useful for debugging).
    #[arg(long)]
    stderr: bool,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("camrig: config error: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = config::validate_config(&cfg) {
        eprintln!("camrig: config validation: {e}");
        process::exit(1);
    }

    let use_syslog = cfg.log_syslog && !cli.stderr;
    setup_logging(use_syslog).expect("failed to set up logging");

    // Write PID file
    if let Err(e) = util::write_pid_file(&cfg.pid_file) {
        error!("cannot write PID file {}: {e}", cfg.pid_file.display());
    }

    let cfg = Arc::new(cfg);
    info!("camrig starting (camera {})", cfg.camera_ip);

    let result = run(Arc::clone(&cfg)).await;
    util::remove_pid_file(&cfg.pid_file);
    if let Err(e) = result {
        error!("camrig: {e:#}");
        process::exit(1);
    }
    info!("camrig stopped");
}

async fn run(cfg: Arc<RigConfig>) -> anyhow::Result<()> {
    // Bring the board onto the camera's network.  Non-fatal: the interfaces
    // file may already be correct from a previous run.
    if let Err(e) = wifi::apply_camera_network(&cfg).await {
        error!("wifi template: {e}");
    }

    ping::wait_until_reachable(
        &cfg.camera_ip,
        cfg.ping_count,
        Duration::from_secs(cfg.ping_interval_s),
    )
    .await
    .context("waiting for camera")?;

    let camera = camera::CameraClient::from_config(&cfg).context("building camera client")?;
    camera.configure().await.context("configuring camera")?;
    info!("camera configured for remote shooting");

    let vehicle = telemetry::spawn_telemetry_reader(&cfg.telemetry_url);
    let player = player::Player::from_config(&cfg);
    let camera_online = Arc::new(AtomicBool::new(true));

    if cfg.liveview {
        let cfg2 = Arc::clone(&cfg);
        let camera2 = camera.clone();
        let player2 = player.clone();
        let online2 = Arc::clone(&camera_online);
        tokio::spawn(async move {
            liveview::run(cfg2, camera2, player2, online2).await;
        });
    }

    flight::run(&cfg, &camera, &player, vehicle, camera_online).await?;
    Ok(())
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool) -> anyhow::Result<()> {
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_DAEMON,
            hostname: None,
            process:  "camrig".into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(log::LevelFilter::Info))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }
    Ok(())
}
