//! Mission loop.
//!
//! Polls the shared vehicle state: while the vehicle is armed and flying,
//! captures are triggered every `trigger_distance_m` metres of ground
//! travel; on the armed → disarmed transition the post-flight download and
//! geotag pass runs.  SIGINT drains any remaining shots before exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};

use crate::camera::CameraClient;
use crate::capture::{self, CaptureLog};
use crate::config::RigConfig;
use crate::download;
use crate::error::Result;
use crate::player::Player;
use crate::telemetry::{Position, SharedVehicleState, VehicleState};

/// Mean Earth radius (WGS-84), metres.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance between two fixes, metres.
pub fn haversine_m(a: &Position, b: &Position) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

/// Whether a capture is due at `pos` given the previous shot position.
fn capture_due(
    last_shot:      Option<&Position>,
    pos:            &Position,
    min_alt_m:      f64,
    trigger_dist_m: f64,
) -> bool {
    if pos.alt_rel_m < min_alt_m {
        return false;
    }
    last_shot.map_or(true, |prev| haversine_m(prev, pos) >= trigger_dist_m)
}

/// Run the mission loop until SIGINT.
pub async fn run(
    cfg:           &RigConfig,
    camera:        &CameraClient,
    player:        &Player,
    vehicle:       SharedVehicleState,
    camera_online: Arc<AtomicBool>,
) -> Result<()> {
    let mut log = CaptureLog::new();
    let mut last_shot: Option<Position> = None;
    let mut was_armed = false;
    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.trigger_poll_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!(
        "mission loop running: one shot every {:.0}m above {:.0}m",
        cfg.trigger_distance_m, cfg.min_trigger_alt_m
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                info!("interrupted");
                break;
            }
        }

        let state: VehicleState = vehicle
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();

        if state.armed {
            if let Some(pos) = state.position {
                if capture_due(
                    last_shot.as_ref(),
                    &pos,
                    cfg.min_trigger_alt_m,
                    cfg.trigger_distance_m,
                ) {
                    if camera_online.load(Ordering::SeqCst) {
                        if capture::take_picture(camera, player, Some(pos), &mut log)
                            .await
                            .is_ok()
                        {
                            last_shot = Some(pos);
                        }
                    } else {
                        debug!("capture due but camera offline");
                    }
                }
            }
        } else if was_armed {
            info!("flight ended with {} pictures", log.len());
            run_download(cfg, &mut log).await;
            last_shot = None;
        }
        was_armed = state.armed;
    }

    // A cancelled flight still yields its images.
    if !log.is_empty() {
        info!("downloading {} pictures before exit", log.len());
        run_download(cfg, &mut log).await;
    }
    Ok(())
}

async fn run_download(cfg: &RigConfig, log: &mut CaptureLog) {
    match download::download_mission(cfg, log).await {
        Ok(0) => {}
        Ok(n) => info!("downloaded {n} pictures"),
        Err(e) => error!("post-flight download failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(latitude: f64, longitude: f64, alt_rel_m: f64) -> Position {
        Position {
            latitude,
            longitude,
            alt_msl_m: alt_rel_m + 500.0,
            alt_rel_m,
        }
    }

    #[test]
    fn haversine_matches_known_distances() {
        // One degree of latitude is ~111.2 km.
        let a = at(48.0, 11.0, 0.0);
        let b = at(49.0, 11.0, 0.0);
        let d = haversine_m(&a, &b);
        assert!((d - 111_195.0).abs() < 200.0, "d={d}");

        // Zero distance to itself.
        assert_eq!(haversine_m(&a, &a), 0.0);
    }

    #[test]
    fn haversine_scales_longitude_by_latitude() {
        let equator = haversine_m(&at(0.0, 10.0, 0.0), &at(0.0, 11.0, 0.0));
        let north = haversine_m(&at(60.0, 10.0, 0.0), &at(60.0, 11.0, 0.0));
        assert!((north / equator - 0.5).abs() < 0.01, "ratio={}", north / equator);
    }

    #[test]
    fn first_qualifying_fix_triggers() {
        assert!(capture_due(None, &at(48.0, 11.0, 10.0), 2.0, 25.0));
    }

    #[test]
    fn low_altitude_suppresses_capture() {
        assert!(!capture_due(None, &at(48.0, 11.0, 1.0), 2.0, 25.0));
    }

    #[test]
    fn capture_waits_for_trigger_distance() {
        let prev = at(48.0, 11.0, 50.0);
        // ~11 m east at this latitude
        let near = at(48.0, 11.00015, 50.0);
        // ~45 m east
        let far = at(48.0, 11.0006, 50.0);
        assert!(!capture_due(Some(&prev), &near, 2.0, 25.0));
        assert!(capture_due(Some(&prev), &far, 2.0, 25.0));
    }
}
