//! Vehicle telemetry over MAVLink.
//!
//! Reads the common-dialect stream from the autopilot (UDP by default),
//! tracks the latest global position and the armed flag, and stores them in
//! a shared `Arc<Mutex<VehicleState>>`.
//!
//! The reader runs in a `spawn_blocking` task so it never blocks the async
//! runtime.  Connection and read failures are retried with a delay; until a
//! fix arrives the position stays `None`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, info, warn};
use mavlink::common::{MavAutopilot, MavMessage, MavModeFlag};

/// Latest global position fix, metres and decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude:  f64,
    pub longitude: f64,
    /// Altitude above mean sea level.
    pub alt_msl_m: f64,
    /// Altitude above the launch point.
    pub alt_rel_m: f64,
}

/// Latest vehicle state as seen on the telemetry link.
#[derive(Debug, Clone, Default)]
pub struct VehicleState {
    pub position: Option<Position>,
    pub armed:    bool,
}

pub type SharedVehicleState = Arc<Mutex<VehicleState>>;

/// Spawns the background telemetry reader.  State is updated in-place.
/// Returns a handle to the shared vehicle state.
pub fn spawn_telemetry_reader(url: &str) -> SharedVehicleState {
    let state: SharedVehicleState = Arc::new(Mutex::new(VehicleState::default()));
    let state_clone = Arc::clone(&state);
    let url = url.to_string();

    tokio::task::spawn_blocking(move || {
        telemetry_reader_loop(&url, state_clone);
    });

    state
}

fn telemetry_reader_loop(url: &str, state: SharedVehicleState) {
    loop {
        let conn = match mavlink::connect::<MavMessage>(url) {
            Ok(c) => c,
            Err(e) => {
                warn!("telemetry connect on {url} failed: {e}");
                std::thread::sleep(Duration::from_secs(5));
                continue;
            }
        };
        info!("telemetry listening on {url}");

        loop {
            match conn.recv() {
                Ok((_header, msg)) => apply_message(&msg, &state),
                Err(e) => {
                    warn!("telemetry read error: {e}");
                    break;
                }
            }
        }
    }
}

/// Fold one MAVLink message into the shared state.
fn apply_message(msg: &MavMessage, state: &SharedVehicleState) {
    match msg {
        MavMessage::GLOBAL_POSITION_INT(data) => {
            let pos = Position {
                latitude:  data.lat as f64 / 1e7,
                longitude: data.lon as f64 / 1e7,
                alt_msl_m: data.alt as f64 / 1000.0,
                alt_rel_m: data.relative_alt as f64 / 1000.0,
            };
            debug!(
                "position fix: lat={:.6} lon={:.6} alt={:.1}m rel={:.1}m",
                pos.latitude, pos.longitude, pos.alt_msl_m, pos.alt_rel_m
            );
            if let Ok(mut guard) = state.lock() {
                guard.position = Some(pos);
            }
        }
        // GCS stations also emit heartbeats; only the autopilot's carries the
        // armed flag we care about.
        MavMessage::HEARTBEAT(data) if data.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID => {
            let armed = data.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
            if let Ok(mut guard) = state.lock() {
                if guard.armed != armed {
                    info!("vehicle {}", if armed { "armed" } else { "disarmed" });
                }
                guard.armed = armed;
            }
        }
        _ => {}
    }
}
