//! In-flight shot log.
//!
//! Every successful capture is recorded with its postview URL, the picture's
//! on-camera file name and the vehicle position at shutter time; the log is
//! drained by the post-flight download pass.

use std::sync::OnceLock;

use chrono::{DateTime, Local};
use log::{error, info};
use regex::Regex;

use crate::camera::CameraClient;
use crate::error::{Result, RigError};
use crate::player::{Player, CAPTURE_ERROR_CLIP, PICTURE_TAKEN_CLIP};
use crate::telemetry::Position;

/// One picture taken during the flight.
#[derive(Debug, Clone)]
pub struct CaptureRecord {
    /// Postview URL on the camera's HTTP server.
    pub postview_url: String,
    /// On-camera file name, e.g. `DSC00042.JPG`.
    pub file_name: String,
    /// Vehicle position at shutter time, if telemetry had a fix.
    pub position: Option<Position>,
    pub taken_at: DateTime<Local>,
}

#[derive(Debug, Default)]
pub struct CaptureLog {
    records: Vec<CaptureRecord>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: CaptureRecord) {
        self.records.push(record);
    }

    /// Take all records, leaving the log empty.
    pub fn drain(&mut self) -> Vec<CaptureRecord> {
        std::mem::take(&mut self.records)
    }
}

/// Extract the on-camera file name from a postview URL.
pub fn picture_file_name(url: &str) -> Option<String> {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    let re = NAME_RE.get_or_init(|| Regex::new(r"DSC[^/\\]*\.JPG").expect("static pattern"));
    re.find(url).map(|m| m.as_str().to_string())
}

/// Take one picture and append it to the log.
///
/// The shutter clip starts immediately for operator feedback; a failed
/// capture plays the error clip instead and leaves no record.
pub async fn take_picture(
    camera:   &CameraClient,
    player:   &Player,
    position: Option<Position>,
    log:      &mut CaptureLog,
) -> Result<()> {
    player.play_clip(PICTURE_TAKEN_CLIP);

    match shoot(camera, position).await {
        Ok(record) => {
            info!(
                "picture taken: {} ({})",
                record.file_name,
                record
                    .position
                    .map(|p| format!("lat={:.6} lon={:.6}", p.latitude, p.longitude))
                    .unwrap_or_else(|| "no fix".to_string())
            );
            log.push(record);
            Ok(())
        }
        Err(e) => {
            error!("taking picture failed: {e}");
            player.play_clip(CAPTURE_ERROR_CLIP);
            Err(e)
        }
    }
}

async fn shoot(camera: &CameraClient, position: Option<Position>) -> Result<CaptureRecord> {
    let postview_url = camera.act_take_picture().await?;
    let file_name = picture_file_name(&postview_url).ok_or_else(|| {
        RigError::Protocol(format!("postview URL has no picture name: {postview_url}"))
    })?;
    Ok(CaptureRecord {
        postview_url,
        file_name,
        position,
        taken_at: Local::now(),
    })
}
