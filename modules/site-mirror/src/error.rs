use std::path::PathBuf;

use sitegrab_common::{PipelineError, Stage};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Mirror cancelled")]
    Cancelled,
}

impl MirrorError {
    pub(crate) fn network(url: &url::Url, err: reqwest::Error) -> Self {
        MirrorError::Network {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MirrorError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<MirrorError> for PipelineError {
    fn from(err: MirrorError) -> Self {
        match err {
            MirrorError::Cancelled => PipelineError::Cancelled {
                stage: Stage::Fetch,
            },
            other => PipelineError::FetchFailed(other.to_string()),
        }
    }
}
