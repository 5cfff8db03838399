// The request pipeline: intake → fetch → archive → authorize → upload.
//
// Stages run strictly in order. Each one is bounded by its configured timeout
// and aborts as soon as the request's cancellation token fires. The job's
// workspace is dropped on every exit path, which removes its files.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use sitegrab_common::{
    parse_target, ArchiveReport, ArchiveRequest, Archiver, FetchJob, JobWorkspace, MirrorFetcher,
    MirrorReport, MirrorRequest, PipelineError, RemoteObject, RemoteUploader, Result, Stage,
    StageTimeouts, UploadRequest,
};

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub job_id: Uuid,
    pub archive_name: String,
    pub mirror: MirrorReport,
    pub archive: ArchiveReport,
    pub remote: RemoteObject,
}

pub struct Pipeline {
    downloads_dir: PathBuf,
    max_depth: u32,
    timeouts: StageTimeouts,
    fetcher: Arc<dyn MirrorFetcher>,
    archiver: Arc<dyn Archiver>,
    uploader: Arc<dyn RemoteUploader>,
}

impl Pipeline {
    pub fn new(
        downloads_dir: PathBuf,
        max_depth: u32,
        timeouts: StageTimeouts,
        fetcher: Arc<dyn MirrorFetcher>,
        archiver: Arc<dyn Archiver>,
        uploader: Arc<dyn RemoteUploader>,
    ) -> Self {
        Self {
            downloads_dir,
            max_depth,
            timeouts,
            fetcher,
            archiver,
            uploader,
        }
    }

    pub fn downloads_dir(&self) -> &std::path::Path {
        &self.downloads_dir
    }

    /// Run one download request end to end.
    ///
    /// `raw_url` is the submitted form value. Nothing touches the network or
    /// the filesystem until it has been validated.
    pub async fn run(&self, raw_url: Option<&str>, cancel: &CancellationToken) -> Result<Delivered> {
        let target = parse_target(raw_url)?;
        let job = FetchJob::new(&self.downloads_dir, target);
        info!(job_id = %job.id, host = %job.host(), url = %job.target.url, "Starting download job");

        let workspace = JobWorkspace::create(&job).await.map_err(|e| {
            PipelineError::FetchFailed(format!(
                "creating working directory {}: {e}",
                job.work_dir.display()
            ))
        })?;

        let result = self.run_stages(&job, &workspace, cancel).await;
        match &result {
            Ok(delivered) => info!(
                job_id = %job.id,
                file_id = %delivered.remote.id,
                pages = delivered.mirror.pages,
                assets = delivered.mirror.assets,
                archive_bytes = delivered.archive.bytes,
                "Download job complete"
            ),
            Err(e) => warn!(job_id = %job.id, stage = %e.stage(), error = %e, "Download job failed"),
        }

        workspace.cleanup().await;
        result
    }

    async fn run_stages(
        &self,
        job: &FetchJob,
        workspace: &JobWorkspace,
        cancel: &CancellationToken,
    ) -> Result<Delivered> {
        let mirror_request = MirrorRequest {
            url: job.target.url.clone(),
            host: job.host().clone(),
            dest: workspace.work_dir().to_path_buf(),
            max_depth: self.max_depth,
        };
        let fetch_cancel = cancel.child_token();
        let mirror = bounded(
            Stage::Fetch,
            self.timeouts.crawl,
            &fetch_cancel,
            self.fetcher.mirror(&mirror_request, &fetch_cancel),
        )
        .await?;

        let archive_request = ArchiveRequest {
            source_dir: workspace.work_dir().to_path_buf(),
            dest: workspace.archive_path().to_path_buf(),
        };
        let archive_cancel = cancel.child_token();
        let archive = bounded(
            Stage::Archive,
            self.timeouts.archive,
            &archive_cancel,
            self.archiver.archive(&archive_request, &archive_cancel),
        )
        .await?;

        // A fresh token for every upload; nothing is reused between requests.
        let token = bounded(
            Stage::Authorize,
            self.timeouts.token,
            &cancel.child_token(),
            self.uploader.authorize(),
        )
        .await?;

        let archive_name = job.archive_file_name();
        let upload_request = UploadRequest {
            path: workspace.archive_path().to_path_buf(),
            name: archive_name.clone(),
        };
        let remote = bounded(
            Stage::Upload,
            self.timeouts.upload,
            &cancel.child_token(),
            self.uploader.upload(&token, &upload_request),
        )
        .await?;

        Ok(Delivered {
            job_id: job.id,
            archive_name,
            mirror,
            archive,
            remote,
        })
    }
}

/// Run `fut` under a deadline, giving up early if `cancel` fires.
///
/// On timeout `cancel` is cancelled too, so work the stage moved off-task
/// (blocking threads, spawned tasks) sees it and stops. Pass a per-stage
/// child token, not the request's own.
pub async fn bounded<T, F>(
    stage: Stage,
    limit: Duration,
    cancel: &CancellationToken,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PipelineError::Cancelled { stage }),
        outcome = tokio::time::timeout(limit, fut) => match outcome {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(PipelineError::TimedOut { stage, after: limit })
            }
        },
    }
}
