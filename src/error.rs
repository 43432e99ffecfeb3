use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("{api} request failed: {reason}")]
    Transport { api: &'static str, reason: String },
    #[error("{api} returned an error: {error}")]
    Api { api: &'static str, error: String },
    #[error("artifact not found: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("report page could not be created: {0}")]
    ReportCreation(String),
    #[error("config invalid: {0}")]
    InvalidConfig(String),
    #[error("another digest run holds the lock at {}", .0.display())]
    RunLocked(PathBuf),
}

impl DigestError {
    pub fn transport(api: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            api,
            reason: err.to_string(),
        }
    }

    pub fn api(api: &'static str, error: Option<String>) -> Self {
        Self::Api {
            api,
            error: error.unwrap_or_else(|| "unknown error".to_string()),
        }
    }
}
