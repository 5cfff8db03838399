// Breadth-first site mirror.
//
// Phase 1 fetches resources and writes them verbatim. Phase 2 rewrites
// references in saved HTML/CSS that resolve to other saved resources.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use sitegrab_common::MirrorReport;

use crate::error::{MirrorError, Result};
use crate::links::{css_links, html_links, rewrite_css, rewrite_html, Link, LinkKind};
use crate::paths::{local_path, relative_link, PathAllocator};

/// Decides which discovered URLs are fetched.
#[derive(Clone)]
pub struct LinkFilter(Arc<dyn Fn(&Url) -> bool + Send + Sync>);

impl LinkFilter {
    /// Accept URLs whose text contains `needle` (typically the host identifier).
    pub fn contains(needle: impl Into<String>) -> Self {
        let needle = needle.into();
        Self(Arc::new(move |url: &Url| url.as_str().contains(&needle)))
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn allows(&self, url: &Url) -> bool {
        (self.0)(url)
    }
}

impl std::fmt::Debug for LinkFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LinkFilter(..)")
    }
}

#[derive(Debug, Clone)]
pub struct MirrorOptions {
    pub user_agent: String,
    pub request_timeout: Duration,
    /// Hard cap on fetched resources (pages and assets).
    pub max_pages: usize,
}

impl Default for MirrorOptions {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".to_string(),
            request_timeout: Duration::from_secs(30),
            max_pages: 500,
        }
    }
}

/// What to mirror and where.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub start: Url,
    pub dest: PathBuf,
    pub max_depth: u32,
    pub filter: LinkFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Html,
    Css,
    Other,
}

#[derive(Debug)]
struct Pending {
    url: Url,
    depth: u32,
    kind: LinkKind,
}

#[derive(Debug)]
struct Saved {
    base: Url,
    path: PathBuf,
    format: Format,
}

pub struct HttpMirror {
    client: reqwest::Client,
    options: MirrorOptions,
}

impl HttpMirror {
    pub fn new(options: MirrorOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent.clone())
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| MirrorError::Client(e.to_string()))?;

        Ok(Self { client, options })
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    /// Mirror `request.start` into `request.dest`.
    ///
    /// Network and filesystem errors abort the crawl. A non-2xx response
    /// aborts only for the start URL; for anything else it is skipped and
    /// the reference keeps pointing at the live site.
    pub async fn crawl(
        &self,
        request: &CrawlRequest,
        cancel: &CancellationToken,
    ) -> Result<MirrorReport> {
        info!(
            url = %request.start,
            dest = %request.dest.display(),
            max_depth = request.max_depth,
            "Starting mirror"
        );

        let mut report = MirrorReport::default();
        let mut queue = VecDeque::new();
        let mut seen = HashSet::new();
        // Every URL (requested and post-redirect) that resolved to a saved file.
        let mut local: HashMap<String, PathBuf> = HashMap::new();
        let mut saved: Vec<Saved> = Vec::new();
        let mut paths = PathAllocator::new();

        seen.insert(request.start.to_string());
        queue.push_back(Pending {
            url: request.start.clone(),
            depth: 0,
            kind: LinkKind::Page,
        });

        // Redirects on the start URL move the root of the local layout.
        let mut root = request.start.clone();
        let mut fetched = 0usize;
        while let Some(pending) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            if fetched >= self.options.max_pages {
                warn!(
                    max_pages = self.options.max_pages,
                    remaining = queue.len() + 1,
                    "Resource cap reached, stopping crawl"
                );
                break;
            }
            fetched += 1;

            let is_start = pending.depth == 0 && pending.kind == LinkKind::Page;
            let response = self
                .client
                .get(pending.url.clone())
                .send()
                .await
                .map_err(|e| MirrorError::network(&pending.url, e))?;

            let status = response.status();
            if !status.is_success() {
                if is_start {
                    return Err(MirrorError::Status {
                        url: pending.url.to_string(),
                        status: status.as_u16(),
                    });
                }
                warn!(url = %pending.url, status = status.as_u16(), "Skipping resource");
                report.skipped += 1;
                continue;
            }

            let final_url = {
                let mut u = response.url().clone();
                u.set_fragment(None);
                u
            };
            // Redirected onto something already saved.
            if let Some(existing) = local.get(final_url.as_str()).cloned() {
                debug!(url = %pending.url, path = %existing.display(), "Already saved via another URL");
                local.insert(pending.url.to_string(), existing);
                continue;
            }
            let format = detect_format(
                response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok()),
                &final_url,
            );
            let body = response
                .bytes()
                .await
                .map_err(|e| MirrorError::network(&pending.url, e))?;

            if is_start {
                root = final_url.clone();
            }
            let relative = paths.claim(&local_path(&final_url, &root, format == Format::Html));
            write_file(&request.dest, &relative, &body).await?;
            debug!(url = %pending.url, path = %relative.display(), bytes = body.len(), "Saved resource");

            report.bytes += body.len() as u64;
            match pending.kind {
                LinkKind::Page => report.pages += 1,
                LinkKind::Asset => report.assets += 1,
            }
            local.insert(pending.url.to_string(), relative.clone());
            local.insert(final_url.to_string(), relative.clone());
            seen.insert(final_url.to_string());

            let discovered: Vec<Link> = match (format, pending.kind) {
                (Format::Html, LinkKind::Page) => html_links(&body, &final_url),
                (Format::Css, _) => css_links(&body, &final_url),
                _ => Vec::new(),
            };

            for link in discovered {
                if !request.filter.allows(&link.url) {
                    continue;
                }
                let depth = match link.kind {
                    LinkKind::Page => pending.depth + 1,
                    LinkKind::Asset => pending.depth,
                };
                if link.kind == LinkKind::Page && depth > request.max_depth {
                    continue;
                }
                if seen.insert(link.url.to_string()) {
                    queue.push_back(Pending {
                        url: link.url,
                        depth,
                        kind: link.kind,
                    });
                }
            }

            if format != Format::Other {
                saved.push(Saved {
                    base: final_url,
                    path: relative,
                    format,
                });
            }
        }

        for doc in &saved {
            if cancel.is_cancelled() {
                return Err(MirrorError::Cancelled);
            }
            rewrite_saved(&request.dest, doc, &local).await?;
        }

        info!(
            url = %request.start,
            pages = report.pages,
            assets = report.assets,
            skipped = report.skipped,
            bytes = report.bytes,
            "Mirror complete"
        );
        Ok(report)
    }
}

fn detect_format(content_type: Option<&str>, url: &Url) -> Format {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    if content_type.contains("text/html") || content_type.contains("application/xhtml") {
        return Format::Html;
    }
    if content_type.contains("text/css") || url.path().to_ascii_lowercase().ends_with(".css") {
        return Format::Css;
    }
    Format::Other
}

async fn write_file(root: &Path, relative: &Path, body: &[u8]) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MirrorError::io(parent, e))?;
    }
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| MirrorError::io(&path, e))
}

async fn rewrite_saved(root: &Path, doc: &Saved, local: &HashMap<String, PathBuf>) -> Result<()> {
    let path = root.join(&doc.path);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| MirrorError::io(&path, e))?;

    let resolve = |url: &Url| {
        local
            .get(url.as_str())
            .map(|target| relative_link(&doc.path, target))
    };
    let rewritten = match doc.format {
        Format::Html => rewrite_html(&bytes, &doc.base, resolve),
        Format::Css => rewrite_css(&bytes, &doc.base, resolve),
        Format::Other => return Ok(()),
    };

    if rewritten != bytes {
        tokio::fs::write(&path, rewritten)
            .await
            .map_err(|e| MirrorError::io(&path, e))?;
    }
    Ok(())
}
