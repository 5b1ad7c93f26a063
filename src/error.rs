//! Error types for the camera rig daemon.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RigError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("camera API error {code}: {message}")]
    Camera { code: i64, message: String },

    #[error("Protocol: {0}")]
    Protocol(String),

    #[error("Config: {0}")]
    Config(String),

    #[error("Template: {0}")]
    Template(String),

    #[error("Player: {0}")]
    Player(String),

    #[error("Exif: {0}")]
    Exif(String),
}

pub type Result<T> = std::result::Result<T, RigError>;
