//! Rig configuration file parser.
//!
//! Parses a flat `key = value` format, one key per line, `#` comments.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, RigError};

// Default interval/threshold constants
const API_PORT:         u16 = 8080;
const TRIGGER_DIST_M:   f64 = 25.0;
const MIN_TRIGGER_ALT:  f64 = 2.0;
const TRIGGER_POLL_MS:  u64 = 500;
const PING_COUNT:       u32 = 2;
const PING_INTERVAL_S:  u64 = 2;
const RETRY_ATTEMPTS:   u32 = 3;
const RETRY_INITIAL_MS: u64 = 500;
const RETRY_MAX_MS:     u64 = 10_000;

/// Download retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts:  u32,
    pub initial_delay: Duration,
    pub max_delay:     Duration,
    pub jitter:        bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts:  RETRY_ATTEMPTS,
            initial_delay: Duration::from_millis(RETRY_INITIAL_MS),
            max_delay:     Duration::from_millis(RETRY_MAX_MS),
            jitter:        true,
        }
    }
}

/// Full rig configuration.
#[derive(Debug, Clone)]
pub struct RigConfig {
    // ── Camera ────────────────────────────────────────────────────────────────
    /// Camera IP address on its own WiFi network.
    pub camera_ip: String,
    /// Vendor HTTP API port (default 8080).
    pub camera_api_port: u16,
    /// SSID of the camera's network.
    pub camera_ssid: String,
    /// Pre-shared key of the camera's network.
    pub camera_psk: String,
    // ── WiFi template ─────────────────────────────────────────────────────────
    /// Template with `%WIFI_SSID%` / `%WIFI_PASSWD%` placeholders.
    pub wifi_template: PathBuf,
    /// System interfaces file the template is rendered into.
    pub wifi_interfaces: PathBuf,
    // ── Pictures ──────────────────────────────────────────────────────────────
    /// Root directory for per-mission picture directories.
    pub picture_dir: PathBuf,
    /// Base name of a mission directory; a numeric suffix is appended.
    pub mission_dir_name: String,
    // ── Telemetry ─────────────────────────────────────────────────────────────
    /// MAVLink connection address (e.g. `udpin:0.0.0.0:14550`).
    pub telemetry_url: String,
    // ── Capture trigger ───────────────────────────────────────────────────────
    /// Ground distance between consecutive shots, metres.
    pub trigger_distance_m: f64,
    /// No shots below this relative altitude, metres.
    pub min_trigger_alt_m: f64,
    /// Flight-loop poll period.
    pub trigger_poll_ms: u64,
    // ── Liveview / player ─────────────────────────────────────────────────────
    /// Mirror the camera's live video stream to the local player.
    pub liveview: bool,
    /// Media player binary.
    pub player_cmd: String,
    /// Extra player arguments, whitespace-separated.
    pub player_args: String,
    /// Directory holding the status clips.
    pub clip_dir: PathBuf,
    // ── Connectivity ──────────────────────────────────────────────────────────
    /// Echo requests per reachability probe.
    pub ping_count: u32,
    /// Delay between failed probes.
    pub ping_interval_s: u64,
    // ── Downloads ─────────────────────────────────────────────────────────────
    pub retry: RetryConfig,
    // ── Process ───────────────────────────────────────────────────────────────
    pub pid_file:   PathBuf,
    pub log_syslog: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            camera_ip:          String::new(),
            camera_api_port:    API_PORT,
            camera_ssid:        String::new(),
            camera_psk:         String::new(),
            wifi_template:      PathBuf::from("/etc/camrig/interfaces.template"),
            wifi_interfaces:    PathBuf::from("/etc/network/interfaces"),
            picture_dir:        PathBuf::new(),
            mission_dir_name:   "mission".to_string(),
            telemetry_url:      "udpin:0.0.0.0:14550".to_string(),
            trigger_distance_m: TRIGGER_DIST_M,
            min_trigger_alt_m:  MIN_TRIGGER_ALT,
            trigger_poll_ms:    TRIGGER_POLL_MS,
            liveview:           true,
            player_cmd:         "omxplayer".to_string(),
            player_args:        "-o hdmi".to_string(),
            clip_dir:           PathBuf::from("/usr/share/camrig/clips"),
            ping_count:         PING_COUNT,
            ping_interval_s:    PING_INTERVAL_S,
            retry:              RetryConfig::default(),
            pid_file:           PathBuf::from("/var/run/camrig.pid"),
            log_syslog:         true,
        }
    }
}

impl RigConfig {
    /// Base URL of the camera's HTTP API.
    pub fn camera_endpoint(&self) -> String {
        format!("http://{}:{}", self.camera_ip, self.camera_api_port)
    }
}

fn parse_bool(val: &str) -> bool {
    val == "true" || val == "1" || val == "yes"
}

/// Parse `path` as a `camrig.conf` key=value configuration file.
pub fn load_config(path: &Path) -> Result<RigConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| RigError::Config(format!("cannot read {}: {e}", path.display())))?;
    let mut cfg = RigConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let key = match parts.next() {
            Some(k) => k.trim().to_ascii_lowercase(),
            None => continue,
        };
        let val = match parts.next() {
            Some(v) => v.trim().to_string(),
            None => continue,
        };
        if val.is_empty() {
            continue;
        }

        match key.as_str() {
            "camera_ip"          => cfg.camera_ip          = val,
            "camera_api_port"    => cfg.camera_api_port    = val.parse().unwrap_or(API_PORT),
            "camera_ssid"        => cfg.camera_ssid        = val,
            "camera_psk"         => cfg.camera_psk         = val,
            "wifi_template"      => cfg.wifi_template      = PathBuf::from(&val),
            "wifi_interfaces"    => cfg.wifi_interfaces    = PathBuf::from(&val),
            "picture_dir"        => cfg.picture_dir        = PathBuf::from(&val),
            "mission_dir_name"   => cfg.mission_dir_name   = val,
            "telemetry_url"      => cfg.telemetry_url      = val,
            "trigger_distance_m" => cfg.trigger_distance_m = val.parse().unwrap_or(TRIGGER_DIST_M),
            "min_trigger_alt_m"  => cfg.min_trigger_alt_m  = val.parse().unwrap_or(MIN_TRIGGER_ALT),
            "trigger_poll_ms"    => cfg.trigger_poll_ms    = val.parse().unwrap_or(TRIGGER_POLL_MS),
            "liveview"           => cfg.liveview           = parse_bool(&val),
            "player_cmd"         => cfg.player_cmd         = val,
            "player_args"        => cfg.player_args        = val,
            "clip_dir"           => cfg.clip_dir           = PathBuf::from(&val),
            "ping_count"         => cfg.ping_count         = val.parse().unwrap_or(PING_COUNT),
            "ping_interval_s"    => cfg.ping_interval_s    = val.parse().unwrap_or(PING_INTERVAL_S),
            "retry_max_attempts" => cfg.retry.max_attempts = val.parse().unwrap_or(RETRY_ATTEMPTS),
            "retry_initial_delay_ms" => {
                cfg.retry.initial_delay =
                    Duration::from_millis(val.parse().unwrap_or(RETRY_INITIAL_MS));
            }
            "retry_max_delay_ms" => {
                cfg.retry.max_delay =
                    Duration::from_millis(val.parse().unwrap_or(RETRY_MAX_MS));
            }
            "retry_jitter"       => cfg.retry.jitter       = parse_bool(&val),
            "pid_file"           => cfg.pid_file           = PathBuf::from(&val),
            "log_syslog"         => cfg.log_syslog         = parse_bool(&val),
            _ => {} // ignore unknown keys
        }
    }

    Ok(cfg)
}

/// Validate that required fields are populated.
pub fn validate_config(cfg: &RigConfig) -> Result<()> {
    if cfg.camera_ip.is_empty() {
        return Err(RigError::Config("camera_ip is required".into()));
    }
    if cfg.picture_dir.as_os_str().is_empty() {
        return Err(RigError::Config("picture_dir is required".into()));
    }
    if cfg.trigger_distance_m <= 0.0 {
        return Err(RigError::Config("trigger_distance_m must be positive".into()));
    }
    if cfg.mission_dir_name.is_empty() {
        return Err(RigError::Config("mission_dir_name must not be empty".into()));
    }
    Ok(())
}
