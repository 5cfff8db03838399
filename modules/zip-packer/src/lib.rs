pub mod error;
pub mod packer;

pub use error::{PackError, Result};
pub use packer::{pack_directory, pack_to_writer, COMPRESSION_LEVEL};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sitegrab_common::{ArchiveReport, ArchiveRequest, Archiver};

/// [`Archiver`] that runs [`pack_directory`] on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipPacker;

impl ZipPacker {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Archiver for ZipPacker {
    async fn archive(
        &self,
        request: &ArchiveRequest,
        cancel: &CancellationToken,
    ) -> sitegrab_common::Result<ArchiveReport> {
        let source = request.source_dir.clone();
        let dest = request.dest.clone();
        let cancel = cancel.clone();

        let report = tokio::task::spawn_blocking(move || pack_directory(&source, &dest, &cancel))
            .await
            .map_err(|e| PackError::Task(e.to_string()))??;
        Ok(report)
    }
}
