// Trait boundaries for the external collaborators of the pipeline.
// Production wires in the HTTP mirror, the zip packer and the Drive uploader;
// tests substitute in-memory doubles.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Result;
use crate::intake::HostId;

/// Mirror `url` into `dest`, following links whose URL contains `host`.
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    pub url: Url,
    pub host: HostId,
    pub dest: PathBuf,
    pub max_depth: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MirrorReport {
    pub pages: usize,
    pub assets: usize,
    pub bytes: u64,
    pub skipped: usize,
}

#[async_trait]
pub trait MirrorFetcher: Send + Sync {
    /// Errors are reported as `PipelineError::FetchFailed`.
    async fn mirror(&self, request: &MirrorRequest, cancel: &CancellationToken)
        -> Result<MirrorReport>;
}

/// Package the contents of `source_dir` into the archive at `dest`.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub source_dir: PathBuf,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub files: usize,
    pub bytes: u64,
}

#[async_trait]
pub trait Archiver: Send + Sync {
    /// Must only return once the archive is fully flushed to `dest`.
    /// Errors are reported as `PipelineError::ArchiveFailed`.
    async fn archive(&self, request: &ArchiveRequest, cancel: &CancellationToken)
        -> Result<ArchiveReport>;
}

/// Short-lived credential for one upload.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    pub name: String,
}

/// The uploaded archive as the storage service sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub id: String,
    pub public: bool,
    pub download_url: String,
}

#[async_trait]
pub trait RemoteUploader: Send + Sync {
    /// Obtain a fresh access token. Errors are `TokenRefreshFailed` or `ReauthRequired`.
    async fn authorize(&self) -> Result<AccessToken>;

    /// Create the remote object and make it readable by anyone with the link.
    /// Errors are `UploadFailed`.
    async fn upload(&self, token: &AccessToken, request: &UploadRequest) -> Result<RemoteObject>;
}
