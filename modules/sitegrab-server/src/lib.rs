pub mod keepalive;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod templates;

pub use pipeline::{bounded, Delivered, Pipeline};
pub use routes::build_router;
pub use state::AppState;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use drive_client::{DriveUploader, GoogleEndpoints};
use site_mirror::{HttpMirror, MirrorOptions};
use sitegrab_common::Config;
use zip_packer::ZipPacker;

/// Wire the production collaborators from configuration.
pub fn build_state(config: &Config, shutdown: CancellationToken) -> Result<Arc<AppState>> {
    let mirror = HttpMirror::new(MirrorOptions::from_settings(&config.crawl))
        .context("Failed to build mirror HTTP client")?;

    let api_client = reqwest::Client::builder()
        .build()
        .context("Failed to build Google API client")?;
    let uploader = DriveUploader::from_settings(api_client, &config.google, GoogleEndpoints::default());
    let session = uploader.session().clone();

    let pipeline = Pipeline::new(
        config.downloads_dir.clone(),
        config.crawl.max_depth,
        config.timeouts,
        Arc::new(mirror),
        Arc::new(ZipPacker::new()),
        Arc::new(uploader),
    );

    Ok(Arc::new(AppState {
        pipeline,
        session,
        shutdown,
    }))
}
