//! Post-flight image download and geotag pass.
//!
//! Pictures stay on the camera's card during the flight; after landing they
//! are pulled over WiFi into a fresh per-mission directory and tagged with
//! the positions recorded at shutter time.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use crate::capture::CaptureLog;
use crate::config::RigConfig;
use crate::error::{Result, RigError};
use crate::geotag;
use crate::retry;

/// Pick the directory for a new mission under `root`.
///
/// Existing directories named `<base>` or `<base><n>` claim suffixes (the
/// bare name counts as 0); the new mission gets `<base><max+1>`, or the bare
/// name when none exist yet.
pub fn next_mission_dir(root: &Path, base: &str) -> Result<PathBuf> {
    let mut max_suffix: Option<u32> = None;

    if root.is_dir() {
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(rest) = name.strip_prefix(base) else {
                continue;
            };
            let suffix = if rest.is_empty() { Some(0) } else { rest.parse::<u32>().ok() };
            if let Some(n) = suffix {
                max_suffix = Some(max_suffix.map_or(n, |m| m.max(n)));
            }
        }
    }

    Ok(match max_suffix {
        None => root.join(base),
        Some(n) => root.join(format!("{base}{}", n + 1)),
    })
}

/// Drain the shot log: download every picture into a new mission directory
/// and geotag the ones that have a position.
///
/// Per-picture failures are logged and skipped so one bad transfer doesn't
/// strand the rest of the flight.  Returns the number of pictures
/// downloaded; with an empty log nothing is created and 0 is returned.
pub async fn download_mission(cfg: &RigConfig, log: &mut CaptureLog) -> Result<usize> {
    let records = log.drain();
    if records.is_empty() {
        return Ok(0);
    }

    let dir = next_mission_dir(&cfg.picture_dir, &cfg.mission_dir_name)?;
    tokio::fs::create_dir_all(&dir).await?;
    info!("downloading {} pictures into {}", records.len(), dir.display());

    let http = Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(RigError::Http)?;

    let mut downloaded = 0;
    for record in &records {
        let target = dir.join(&record.file_name);
        let result = retry::with_backoff(&cfg.retry, || {
            download_one(&http, &record.postview_url, &target)
        })
        .await;

        let size = match result {
            Ok(size) => size,
            Err(e) => {
                warn!("downloading {} failed: {e}", record.file_name);
                continue;
            }
        };
        info!(
            "downloaded {} ({size} bytes, taken {})",
            target.display(),
            record.taken_at.format("%H:%M:%S")
        );
        downloaded += 1;

        match record.position {
            Some(pos) => {
                let path = target.clone();
                let tagged = tokio::task::spawn_blocking(move || geotag::write_gps(&path, &pos))
                    .await
                    .map_err(RigError::Join)
                    .and_then(|r| r);
                if let Err(e) = tagged {
                    warn!("geotagging {} failed: {e}", record.file_name);
                }
            }
            None => debug!("no position for {}; not geotagging", record.file_name),
        }
    }

    Ok(downloaded)
}

/// Stream one postview URL to `target`, returning the byte count.
async fn download_one(http: &Client, url: &str, target: &Path) -> Result<u64> {
    let resp = http.get(url).send().await?.error_for_status()?;
    let mut stream = resp.bytes_stream();
    let mut file = tokio::fs::File::create(target).await?;
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
