//! Camera reachability via the system `ping`.
//!
//! The camera exposes no cheap API endpoint before it is fully up, so the
//! daemon probes the bare IP the way the stock tooling does.

use std::time::Duration;

use log::{debug, info};
use tokio::process::Command;

use crate::error::Result;

/// Send `count` echo requests to `ip`.  Reachable iff ping exits zero.
///
/// A spawn failure (ping binary missing) is an error, not "unreachable".
pub async fn probe(ip: &str, count: u32) -> Result<bool> {
    let status = Command::new("ping")
        .args(["-c", &count.to_string(), ip])
        .status()
        .await?;
    debug!("ping {ip} → {status}");
    Ok(status.success())
}

/// Probe in a loop until the camera answers, sleeping `interval` between
/// failed probes.
pub async fn wait_until_reachable(ip: &str, count: u32, interval: Duration) -> Result<()> {
    info!("waiting for camera at {ip}");
    loop {
        if probe(ip, count).await? {
            info!("camera at {ip} is answering");
            return Ok(());
        }
        debug!("camera at {ip} not reachable yet");
        tokio::time::sleep(interval).await;
    }
}
