use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Application configuration loaded from environment variables.
/// Everything the server needs is resolved here so a bad deployment fails
/// before the listener binds, not on the first request.
#[derive(Debug, Clone)]
pub struct Config {
    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Local scratch space for working directories and archives
    pub downloads_dir: PathBuf,

    pub crawl: CrawlSettings,
    pub timeouts: StageTimeouts,
    pub google: GoogleSettings,

    // Heartbeat
    pub keep_alive_url: Option<String>,
    pub keep_alive_interval: Duration,
}

/// Settings for the mirror fetcher. Shared by `serve` and the local `mirror` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub max_depth: u32,
    pub max_pages: usize,
    pub user_agent: String,
    pub request_timeout: Duration,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_depth: 1,
            max_pages: 500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Upper bound on each pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub crawl: Duration,
    pub archive: Duration,
    pub token: Duration,
    pub upload: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            crawl: Duration::from_secs(900),
            archive: Duration::from_secs(300),
            token: Duration::from_secs(30),
            upload: Duration::from_secs(900),
        }
    }
}

/// OAuth client credentials and the Drive destination.
#[derive(Clone, PartialEq, Eq)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: String,
    pub folder_id: String,
}

impl fmt::Debug for GoogleSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleSettings")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("refresh_token", &"<redacted>")
            .field("folder_id", &self.folder_id)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let google = GoogleSettings {
            client_id: env.required("CLIENT_ID")?,
            client_secret: env.required("CLIENT_SECRET")?,
            redirect_uri: env.required("REDIRECT_URI")?,
            refresh_token: env.required("REFRESH_TOKEN")?,
            folder_id: env.required("DRIVE_FOLDER_ID")?,
        };

        let keep_alive_url = env.optional("KEEP_ALIVE_URL");
        if let Some(ref raw) = keep_alive_url {
            if url::Url::parse(raw).is_err() {
                return Err(ConfigError::Invalid {
                    key: "KEEP_ALIVE_URL",
                    expected: "an absolute URL",
                    value: raw.clone(),
                });
            }
        }

        let config = Self {
            web_host: env.optional("WEB_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            web_port: env.parse_or("WEB_PORT", 3000, "a port number")?,
            downloads_dir: env
                .optional("DOWNLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("downloads")),
            crawl: CrawlSettings::from_env_lookup(&env)?,
            timeouts: StageTimeouts {
                crawl: env.seconds_or("CRAWL_TIMEOUT_SECS", 900)?,
                archive: env.seconds_or("ARCHIVE_TIMEOUT_SECS", 300)?,
                token: env.seconds_or("TOKEN_TIMEOUT_SECS", 30)?,
                upload: env.seconds_or("UPLOAD_TIMEOUT_SECS", 900)?,
            },
            google,
            keep_alive_url,
            keep_alive_interval: env.seconds_or("KEEP_ALIVE_INTERVAL_SECS", 13 * 60)?,
        };

        Ok(config)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.web_host, self.web_port)
    }

    /// Log a summary of the loaded configuration with secrets previewed.
    pub fn log_summary(&self) {
        fn preview(val: &str) -> String {
            let n = val.chars().take(5).map(char::len_utf8).sum::<usize>();
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  WEB: {}", self.bind_addr());
        tracing::info!("  DOWNLOADS_DIR: {}", self.downloads_dir.display());
        tracing::info!(
            "  CRAWL: depth={} max_pages={} user_agent={:?}",
            self.crawl.max_depth,
            self.crawl.max_pages,
            self.crawl.user_agent
        );
        tracing::info!("  CLIENT_ID: {}", preview(&self.google.client_id));
        tracing::info!("  CLIENT_SECRET: {}", preview(&self.google.client_secret));
        tracing::info!("  REFRESH_TOKEN: {}", preview(&self.google.refresh_token));
        tracing::info!("  DRIVE_FOLDER_ID: {}", self.google.folder_id);
        tracing::info!(
            "  KEEP_ALIVE_URL: {}",
            self.keep_alive_url.as_deref().unwrap_or("<not set>")
        );
    }
}

impl CrawlSettings {
    /// Crawl settings alone; used by the local `mirror` command which needs no credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env_lookup(&Env {
            lookup: |key: &str| std::env::var(key).ok(),
        })
    }

    fn from_env_lookup<F>(env: &Env<F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_pages: usize = env.parse_or("CRAWL_MAX_PAGES", defaults.max_pages, "a positive integer")?;
        if max_pages == 0 {
            return Err(ConfigError::Invalid {
                key: "CRAWL_MAX_PAGES",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            max_depth: env.parse_or("CRAWL_MAX_DEPTH", defaults.max_depth, "a non-negative integer")?,
            max_pages,
            user_agent: env.optional("CRAWL_USER_AGENT").unwrap_or(defaults.user_agent),
            request_timeout: env.seconds_or("CRAWL_REQUEST_TIMEOUT_SECS", 30)?,
        })
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &'static str) -> Result<String, ConfigError> {
        self.optional(key).ok_or(ConfigError::Missing(key))
    }

    fn parse_or<T: FromStr>(
        &self,
        key: &'static str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match self.optional(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key,
                expected,
                value: raw,
            }),
        }
    }

    fn seconds_or(&self, key: &'static str, default: u64) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parse_or(key, default, "a positive number of seconds")?;
        if secs == 0 {
            return Err(ConfigError::Invalid {
                key,
                expected: "a positive number of seconds",
                value: "0".to_string(),
            });
        }
        Ok(Duration::from_secs(secs))
    }
}
