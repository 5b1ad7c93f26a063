//! Live video stream supervision.
//!
//! The operator watches the camera's liveview on the ground-station monitor
//! for the whole flight.  The player blocking on the stream doubles as the
//! link watchdog: a player that exits on its own means the camera dropped
//! off the network, so the supervisor clears the camera-online flag (which
//! pauses capture triggering), plays the connection-lost clip, pings until
//! the camera is back, and restarts the stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::camera::CameraClient;
use crate::config::RigConfig;
use crate::ping;
use crate::player::{self, Player, CONNECTION_LOST_CLIP};

/// Delay before probing after a stream drop, so a camera that is merely
/// rebooting its WiFi isn't declared back too early.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Supervise the liveview stream until the player is deliberately stopped.
pub async fn run(
    cfg:    Arc<RigConfig>,
    camera: CameraClient,
    player: Player,
    online: Arc<AtomicBool>,
) {
    loop {
        let url = match camera.start_liveview().await {
            Ok(url) => url,
            Err(e) => {
                warn!("startLiveview failed: {e}");
                if !recover(&cfg, &player, &online).await {
                    break;
                }
                continue;
            }
        };

        info!("starting liveview on {url}");
        match player.play_stream(&url).await {
            Ok(status) if player::exited_by_signal(&status) => {
                info!("liveview player terminated by signal; stopping supervision");
                break;
            }
            Ok(status) => {
                debug!("liveview player exited with {status}");
                warn!("camera connection lost");
                if !recover(&cfg, &player, &online).await {
                    break;
                }
            }
            Err(e) => {
                // Spawn failure: the player binary is absent, which no amount
                // of reconnecting will fix.
                error!("{e}");
                online.store(false, Ordering::SeqCst);
                break;
            }
        }
    }
}

/// Bring the camera link back: flag offline, loop the connection-lost clip,
/// ping until the camera answers, flag online.  Returns false when recovery
/// itself is impossible.
async fn recover(cfg: &RigConfig, player: &Player, online: &Arc<AtomicBool>) -> bool {
    online.store(false, Ordering::SeqCst);

    let clip = match player.spawn_clip(CONNECTION_LOST_CLIP) {
        Ok(child) => Some(child),
        Err(e) => {
            warn!("{e}");
            None
        }
    };

    tokio::time::sleep(SETTLE_DELAY).await;
    debug!("waiting for camera to answer again");

    let reachable = ping::wait_until_reachable(
        &cfg.camera_ip,
        cfg.ping_count,
        Duration::from_secs(cfg.ping_interval_s),
    )
    .await;

    if let Some(child) = clip {
        player::stop(child).await;
    }

    match reachable {
        Ok(()) => {
            online.store(true, Ordering::SeqCst);
            info!("camera is back; restarting liveview");
            true
        }
        Err(e) => {
            error!("cannot probe camera: {e}");
            false
        }
    }
}
