mod common;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use common::{leftover_entries, Auth, Fetch, Harness, CONSENT_URL};
use sitegrab_common::{PipelineError, Stage, StageTimeouts};

#[tokio::test]
async fn successful_run_uploads_named_archive_and_cleans_up() {
    let h = Harness::new(Fetch::Succeed, Auth::Grant);

    let delivered = h
        .pipeline()
        .run(Some("https://www.Example.com/"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(delivered.archive_name, "example.com.zip");
    assert_eq!(delivered.archive.files, 2);
    assert_eq!(
        delivered.remote.download_url,
        "https://drive.google.com/uc?id=file-1&export=download"
    );
    assert!(delivered.remote.public);

    // Working directory was unique to the job.
    let dest = h.fetcher.dest.lock().unwrap().clone().unwrap();
    let dir_name = dest.file_name().unwrap().to_string_lossy().into_owned();
    assert!(dir_name.starts_with("example.com-"), "{dir_name}");
    assert_eq!(dest.parent().unwrap(), h.downloads());

    let uploads = h.uploader.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "example.com.zip");
    assert!(uploads[0].1 > 0, "archive was written before upload");

    assert_eq!(leftover_entries(&h.downloads()), 0);
}

#[tokio::test]
async fn missing_or_empty_url_is_rejected_before_any_work() {
    let h = Harness::new(Fetch::Succeed, Auth::Grant);
    let pipeline = h.pipeline();

    for input in [None, Some(""), Some("   ")] {
        let err = pipeline.run(input, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidInput(_)), "{input:?}: {err}");
        assert_eq!(err.title(), "Invalid URL!");
    }

    let err = pipeline
        .run(Some("not a url"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::MalformedUrl { .. }), "{err}");

    assert_eq!(h.fetcher.calls(), 0);
    assert!(!h.downloads().exists());
}

#[tokio::test]
async fn crawl_failure_skips_archive_and_upload_and_removes_files() {
    let h = Harness::new(Fetch::Fail, Auth::Grant);

    let err = h
        .pipeline()
        .run(Some("https://www.example.com"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::FetchFailed(_)), "{err}");
    assert_eq!(err.stage(), Stage::Fetch);
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.archiver.calls(), 0);
    assert_eq!(h.uploader.authorize_calls(), 0);
    assert!(h.uploader.uploads().is_empty());

    let dest = h.fetcher.dest.lock().unwrap().clone().unwrap();
    assert!(!dest.exists(), "partial crawl output must be removed");
    assert_eq!(leftover_entries(&h.downloads()), 0);
}

#[tokio::test]
async fn expired_authorization_surfaces_consent_url() {
    let h = Harness::new(Fetch::Succeed, Auth::Reauth);

    let err = h
        .pipeline()
        .run(Some("https://example.com"), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        PipelineError::ReauthRequired { consent_url } => assert_eq!(consent_url, CONSENT_URL),
        other => panic!("expected ReauthRequired, got {other}"),
    }
    assert_eq!(h.archiver.calls(), 1);
    assert!(h.uploader.uploads().is_empty());
    assert_eq!(leftover_entries(&h.downloads()), 0);
}

#[tokio::test]
async fn every_run_refreshes_the_token() {
    let h = Harness::new(Fetch::Succeed, Auth::Grant);
    let pipeline = h.pipeline();

    for _ in 0..2 {
        pipeline
            .run(Some("https://example.com"), &CancellationToken::new())
            .await
            .unwrap();
    }

    assert_eq!(h.uploader.authorize_calls(), 2);
    assert_eq!(h.uploader.uploads().len(), 2);
}

#[tokio::test]
async fn hung_crawl_times_out_and_cleans_up() {
    let h = Harness::new(Fetch::Hang, Auth::Grant);
    let timeouts = StageTimeouts {
        crawl: Duration::from_millis(50),
        ..StageTimeouts::default()
    };

    let err = h
        .pipeline_with(timeouts)
        .run(Some("https://example.com"), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::TimedOut { stage: Stage::Fetch, .. }),
        "{err}"
    );
    assert_eq!(h.archiver.calls(), 0);
    assert_eq!(leftover_entries(&h.downloads()), 0);
}

#[tokio::test]
async fn cancellation_stops_the_job_and_cleans_up() {
    let h = Harness::new(Fetch::Hang, Auth::Grant);
    let pipeline = h.pipeline();
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = pipeline
        .run(Some("https://example.com"), &cancel)
        .await
        .unwrap_err();

    assert!(
        matches!(err, PipelineError::Cancelled { stage: Stage::Fetch }),
        "{err}"
    );
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(leftover_entries(&h.downloads()), 0);
}

#[tokio::test]
async fn concurrent_jobs_for_same_host_do_not_collide() {
    let h = Harness::new(Fetch::Succeed, Auth::Grant);
    let pipeline = h.pipeline();
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        pipeline.run(Some("https://example.com"), &cancel),
        pipeline.run(Some("https://www.example.com"), &cancel),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.job_id, b.job_id);
    assert_eq!(a.archive_name, b.archive_name);
    assert_eq!(h.uploader.uploads().len(), 2);
    assert_eq!(leftover_entries(&h.downloads()), 0);
}
