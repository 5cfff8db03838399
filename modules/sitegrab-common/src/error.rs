use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Intake,
    Fetch,
    Archive,
    Authorize,
    Upload,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Fetch => "fetch",
            Stage::Archive => "archive",
            Stage::Authorize => "authorize",
            Stage::Upload => "upload",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-level failures. Collaborator errors are flattened into the
/// stage they happened in; `ReauthRequired` is the only variant callers act on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed URL {url:?}: {source}")]
    MalformedUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("archive failed: {0}")]
    ArchiveFailed(String),

    #[error("access token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("re-authorization required")]
    ReauthRequired { consent_url: String },

    #[error("upload failed: {0}")]
    UploadFailed(String),

    #[error("{stage} stage timed out after {}s", .after.as_secs())]
    TimedOut { stage: Stage, after: Duration },

    #[error("{stage} stage cancelled")]
    Cancelled { stage: Stage },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidInput(_)
            | PipelineError::MalformedUrl { .. }
            | PipelineError::UnsupportedScheme(_) => Stage::Intake,
            PipelineError::FetchFailed(_) => Stage::Fetch,
            PipelineError::ArchiveFailed(_) => Stage::Archive,
            PipelineError::TokenRefreshFailed(_) | PipelineError::ReauthRequired { .. } => {
                Stage::Authorize
            }
            PipelineError::UploadFailed(_) => Stage::Upload,
            PipelineError::TimedOut { stage, .. } | PipelineError::Cancelled { stage } => *stage,
        }
    }

    /// Short page title for the error view.
    pub fn title(&self) -> &'static str {
        match self.stage() {
            Stage::Intake => "Invalid URL!",
            _ => "Error downloading website!",
        }
    }

    /// What the user can do about it. Never includes internal detail.
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::InvalidInput(_) => {
                "Please enter the address of the website you want to download.".to_string()
            }
            PipelineError::MalformedUrl { .. } => {
                "That doesn't look like a valid web address. Include the scheme, e.g. https://example.com.".to_string()
            }
            PipelineError::UnsupportedScheme(scheme) => {
                format!("Only http:// and https:// addresses can be downloaded, not {scheme}://.")
            }
            PipelineError::FetchFailed(_) => {
                "We couldn't crawl that website. Check that the address is reachable and try again.".to_string()
            }
            PipelineError::ArchiveFailed(_) => {
                "The website was downloaded but packaging it into a zip file failed. Please try again.".to_string()
            }
            PipelineError::TokenRefreshFailed(_) | PipelineError::ReauthRequired { .. } => {
                "The website was packaged but the storage account could not be authorized. Please try again later.".to_string()
            }
            PipelineError::UploadFailed(_) => {
                "The website was packaged but uploading the archive failed. Please try again.".to_string()
            }
            PipelineError::TimedOut { stage, .. } => format!(
                "The {} step took too long and was stopped. Try a smaller site or try again later.",
                stage
            ),
            PipelineError::Cancelled { stage } => {
                format!("The request was cancelled during the {stage} step.")
            }
        }
    }
}
