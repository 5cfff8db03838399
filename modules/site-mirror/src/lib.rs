pub mod crawler;
pub mod error;
pub mod links;
pub mod paths;

pub use crawler::{CrawlRequest, HttpMirror, LinkFilter, MirrorOptions};
pub use error::{MirrorError, Result};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use sitegrab_common::{CrawlSettings, MirrorFetcher, MirrorReport, MirrorRequest};

impl MirrorOptions {
    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            request_timeout: settings.request_timeout,
            max_pages: settings.max_pages,
        }
    }
}

#[async_trait]
impl MirrorFetcher for HttpMirror {
    async fn mirror(
        &self,
        request: &MirrorRequest,
        cancel: &CancellationToken,
    ) -> sitegrab_common::Result<MirrorReport> {
        let crawl = CrawlRequest {
            start: request.url.clone(),
            dest: request.dest.clone(),
            max_depth: request.max_depth,
            filter: LinkFilter::contains(request.host.as_str()),
        };
        Ok(self.crawl(&crawl, cancel).await?)
    }
}
