use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use drive_client::OAuthSession;

use crate::pipeline::Pipeline;

pub struct AppState {
    pub pipeline: Pipeline,
    /// Shared with the Drive uploader so a completed consent flow takes effect immediately.
    pub session: Arc<OAuthSession>,
    /// Parent of every request's cancellation token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}
