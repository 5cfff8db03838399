// Fetch jobs and their on-disk workspace.
//
// Working paths are keyed by host *and* job id, so two concurrent requests for
// the same site never share a directory. The human-readable `<host>.zip` name
// is only applied when the archive is handed to storage.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::intake::{HostId, Target};

/// One request's worth of work.
#[derive(Debug, Clone)]
pub struct FetchJob {
    pub id: Uuid,
    pub target: Target,
    pub work_dir: PathBuf,
    pub archive_path: PathBuf,
}

impl FetchJob {
    pub fn new(downloads_dir: &Path, target: Target) -> Self {
        let id = Uuid::new_v4();
        let stem = format!("{}-{}", target.host, short_id(&id));
        Self {
            id,
            work_dir: downloads_dir.join(&stem),
            archive_path: downloads_dir.join(format!("{stem}.zip")),
            target,
        }
    }

    pub fn host(&self) -> &HostId {
        &self.target.host
    }

    /// Name the archive is published under.
    pub fn archive_file_name(&self) -> String {
        self.target.host.archive_file_name()
    }
}

fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

/// Owns a job's working directory and archive file and removes both when dropped.
///
/// Removal is best effort: failures are logged, never propagated, so that
/// cleanup runs on success, error, cancellation and unwind alike.
#[derive(Debug)]
pub struct JobWorkspace {
    work_dir: PathBuf,
    archive_path: PathBuf,
    keep: bool,
}

impl JobWorkspace {
    /// Create the working directory. Leftovers from an earlier job with the
    /// same paths are removed first.
    pub async fn create(job: &FetchJob) -> io::Result<Self> {
        let workspace = Self {
            work_dir: job.work_dir.clone(),
            archive_path: job.archive_path.clone(),
            keep: false,
        };
        remove_path_async(&workspace.work_dir).await;
        remove_path_async(&workspace.archive_path).await;
        tokio::fs::create_dir_all(&workspace.work_dir).await?;
        Ok(workspace)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// Leave the files on disk when the workspace is dropped.
    pub fn keep(&mut self) {
        self.keep = true;
    }

    /// Remove the working directory and archive now.
    pub async fn cleanup(mut self) {
        remove_path_async(&self.work_dir).await;
        remove_path_async(&self.archive_path).await;
        self.keep = true;
    }

    fn remove_all(&self) {
        remove_path(&self.work_dir);
        remove_path(&self.archive_path);
    }
}

impl Drop for JobWorkspace {
    fn drop(&mut self) {
        if !self.keep {
            self.remove_all();
        }
    }
}

fn remove_path(path: &Path) {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) => Err(e),
    };
    log_removal(path, result);
}

async fn remove_path_async(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    log_removal(path, result);
}

fn log_removal(path: &Path, result: io::Result<()>) {
    match result {
        Ok(()) => debug!(path = %path.display(), "Removed job path"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove job path"),
    }
}
