// Counting test doubles for the pipeline collaborators.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sitegrab_common::{
    AccessToken, ArchiveReport, ArchiveRequest, Archiver, MirrorFetcher, MirrorReport,
    MirrorRequest, PipelineError, RemoteObject, RemoteUploader, Result, StageTimeouts,
    UploadRequest,
};
use sitegrab_server::Pipeline;
use zip_packer::ZipPacker;

pub const CONSENT_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth?prompt=consent";

#[derive(Clone, Copy)]
pub enum Fetch {
    Succeed,
    Fail,
    Hang,
}

pub struct MockFetcher {
    behavior: Fetch,
    pub calls: AtomicUsize,
    pub dest: Mutex<Option<PathBuf>>,
}

impl MockFetcher {
    pub fn new(behavior: Fetch) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            dest: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MirrorFetcher for MockFetcher {
    async fn mirror(&self, request: &MirrorRequest, _cancel: &CancellationToken) -> Result<MirrorReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.dest.lock().unwrap() = Some(request.dest.clone());

        // Partial output is on disk before any failure.
        std::fs::write(request.dest.join("index.html"), "<html>home</html>").unwrap();
        match self.behavior {
            Fetch::Succeed => {
                std::fs::create_dir_all(request.dest.join("img")).unwrap();
                std::fs::write(request.dest.join("img/logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
                Ok(MirrorReport {
                    pages: 1,
                    assets: 1,
                    bytes: 21,
                    skipped: 0,
                })
            }
            Fetch::Fail => Err(PipelineError::FetchFailed(
                "Network error fetching https://www.example.com/: connection refused".to_string(),
            )),
            Fetch::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(MirrorReport::default())
            }
        }
    }
}

/// Real zip packer with a call counter.
#[derive(Default)]
pub struct CountingArchiver {
    pub calls: AtomicUsize,
}

impl CountingArchiver {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Archiver for CountingArchiver {
    async fn archive(&self, request: &ArchiveRequest, cancel: &CancellationToken) -> Result<ArchiveReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ZipPacker::new().archive(request, cancel).await
    }
}

#[derive(Clone, Copy)]
pub enum Auth {
    Grant,
    Reauth,
}

pub struct MockUploader {
    auth: Auth,
    pub authorize_calls: AtomicUsize,
    pub uploads: Mutex<Vec<(String, u64)>>,
}

impl MockUploader {
    pub fn new(auth: Auth) -> Arc<Self> {
        Arc::new(Self {
            auth,
            authorize_calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        })
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<(String, u64)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteUploader for MockUploader {
    async fn authorize(&self) -> Result<AccessToken> {
        let n = self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        match self.auth {
            Auth::Grant => Ok(AccessToken(format!("token-{n}"))),
            Auth::Reauth => Err(PipelineError::ReauthRequired {
                consent_url: CONSENT_URL.to_string(),
            }),
        }
    }

    async fn upload(&self, _token: &AccessToken, request: &UploadRequest) -> Result<RemoteObject> {
        let size = std::fs::metadata(&request.path).map(|m| m.len()).unwrap_or(0);
        self.uploads.lock().unwrap().push((request.name.clone(), size));
        Ok(RemoteObject {
            id: "file-1".to_string(),
            public: true,
            download_url: "https://drive.google.com/uc?id=file-1&export=download".to_string(),
        })
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub fetcher: Arc<MockFetcher>,
    pub archiver: Arc<CountingArchiver>,
    pub uploader: Arc<MockUploader>,
}

impl Harness {
    pub fn new(fetch: Fetch, auth: Auth) -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            fetcher: MockFetcher::new(fetch),
            archiver: Arc::new(CountingArchiver::default()),
            uploader: MockUploader::new(auth),
        }
    }

    pub fn downloads(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline_with(StageTimeouts::default())
    }

    pub fn pipeline_with(&self, timeouts: StageTimeouts) -> Pipeline {
        Pipeline::new(
            self.downloads(),
            1,
            timeouts,
            self.fetcher.clone(),
            self.archiver.clone(),
            self.uploader.clone(),
        )
    }
}

/// Entries left under `dir` (0 if it does not exist).
pub fn leftover_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
}
