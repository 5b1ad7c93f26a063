//! Media player process control.
//!
//! The rig gives the operator feedback on the ground-station monitor by
//! running a media player: the camera's live stream while everything is up,
//! and short status clips for shutter, capture failure and lost connection.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::{debug, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::config::RigConfig;
use crate::error::{Result, RigError};

pub const PICTURE_TAKEN_CLIP:   &str = "picture_taken.mp4";
pub const CONNECTION_LOST_CLIP: &str = "connection_lost.mp4";
pub const CAPTURE_ERROR_CLIP:   &str = "capture_error.mp4";

#[derive(Debug, Clone)]
pub struct Player {
    cmd:      String,
    args:     Vec<String>,
    clip_dir: PathBuf,
}

impl Player {
    pub fn new(cmd: String, args: &str, clip_dir: PathBuf) -> Self {
        Self {
            cmd,
            args: args.split_whitespace().map(String::from).collect(),
            clip_dir,
        }
    }

    pub fn from_config(cfg: &RigConfig) -> Self {
        Self::new(cfg.player_cmd.clone(), &cfg.player_args, cfg.clip_dir.clone())
    }

    /// Play a network stream, blocking until the player exits.
    ///
    /// A spawn failure (player binary absent) is an error; a player that ran
    /// and exited, however it exited, is an `Ok` status for the caller to
    /// inspect.
    pub async fn play_stream(&self, url: &str) -> Result<ExitStatus> {
        debug!("launching {} on {url}", self.cmd);
        Command::new(&self.cmd)
            .args(&self.args)
            .arg("--live")
            .arg(url)
            .stdout(Stdio::null())
            .status()
            .await
            .map_err(|e| RigError::Player(format!("cannot run {}: {e}", self.cmd)))
    }

    /// Start a status clip without waiting for it.  The returned child may be
    /// killed early (the connection-lost clip plays until the link is back).
    pub fn spawn_clip(&self, name: &str) -> Result<Child> {
        let clip = self.clip_dir.join(name);
        Command::new(&self.cmd)
            .args(&self.args)
            .arg(&clip)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RigError::Player(format!("cannot play {}: {e}", clip.display())))
    }

    /// Fire-and-forget variant for short clips; failures only warn.
    pub fn play_clip(&self, name: &str) {
        match self.spawn_clip(name) {
            Ok(mut child) => {
                tokio::spawn(async move {
                    let _ = child.wait().await;
                });
            }
            Err(e) => warn!("{e}"),
        }
    }
}

/// Stop a player child: SIGTERM first so it can restore the display, then
/// SIGKILL if it lingers.
pub async fn stop(mut child: Child) {
    if let Some(pid) = child.id() {
        let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        if tokio::time::timeout(Duration::from_secs(2), child.wait())
            .await
            .is_ok()
        {
            return;
        }
    }
    let _ = child.kill().await;
}

/// True when the player was terminated by a signal rather than exiting on
/// its own.  A signal means the operator or the system stopped it; a plain
/// exit during liveview means the stream died.
pub fn exited_by_signal(status: &ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;
    status.signal().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_split_on_whitespace() {
        let player = Player::new("omxplayer".into(), "-o  hdmi --no-osd", PathBuf::from("/clips"));
        assert_eq!(player.args, vec!["-o", "hdmi", "--no-osd"]);
    }

    #[tokio::test]
    async fn play_stream_reports_missing_binary() {
        let player = Player::new(
            "/nonexistent/player".into(),
            "",
            PathBuf::from("/clips"),
        );
        assert!(matches!(
            player.play_stream("http://example/stream").await,
            Err(RigError::Player(_))
        ));
    }

    #[tokio::test]
    async fn normal_exit_is_not_a_signal() {
        // `true` ignores the extra --live/url arguments and exits zero.
        let player = Player::new("true".into(), "", PathBuf::from("/"));
        let status = player.play_stream("http://example/stream").await.unwrap();
        assert!(status.success());
        assert!(!exited_by_signal(&status));
    }

    #[tokio::test]
    async fn killed_child_reads_as_signal_exit() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        child.start_kill().unwrap();
        let status = child.wait().await.unwrap();
        assert!(exited_by_signal(&status));
    }
}
