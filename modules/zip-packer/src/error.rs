use std::io;
use std::path::PathBuf;

use sitegrab_common::{PipelineError, Stage};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackError>;

#[derive(Debug, Error)]
pub enum PackError {
    #[error("I/O error during {operation} at {}: {source}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Directory walk failed at {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Zip error during {operation}: {source}")]
    Zip {
        operation: &'static str,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Source directory {} is missing or not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("Source directory {} contains nothing to archive", .0.display())]
    EmptySource(PathBuf),

    #[error("Archive cancelled")]
    Cancelled,

    #[error("Archive task failed: {0}")]
    Task(String),
}

impl PackError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        PackError::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(operation: &'static str, source: zip::result::ZipError) -> Self {
        PackError::Zip { operation, source }
    }
}

impl From<PackError> for PipelineError {
    fn from(err: PackError) -> Self {
        match err {
            PackError::Cancelled => PipelineError::Cancelled {
                stage: Stage::Archive,
            },
            other => PipelineError::ArchiveFailed(other.to_string()),
        }
    }
}
