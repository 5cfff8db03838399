pub mod config;
pub mod error;
pub mod intake;
pub mod job;
pub mod traits;

pub use config::{Config, ConfigError, CrawlSettings, GoogleSettings, StageTimeouts};
pub use error::{PipelineError, Result, Stage};
pub use intake::{parse_target, HostId, Target};
pub use job::{FetchJob, JobWorkspace};
pub use traits::{
    AccessToken, ArchiveReport, ArchiveRequest, Archiver, MirrorFetcher, MirrorReport, MirrorRequest,
    RemoteObject, RemoteUploader, UploadRequest,
};
