// Request intake: validate the submitted URL and derive the host identifier.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::error::{PipelineError, Result};

/// Anything outside this set is replaced before the identifier touches the filesystem.
static UNSAFE_HOST_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9.\-]").expect("valid regex"));

/// Normalized domain name used to name working directories and archives.
/// Always lower-case, without a leading `www.`, and safe as a single path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostId(String);

impl HostId {
    /// Derive the identifier from a URL host.
    pub fn from_host(host: &str) -> Result<Self> {
        let lower = host.to_lowercase();
        let stripped = lower.strip_prefix("www.").unwrap_or(&lower);
        let sanitized = UNSAFE_HOST_CHARS.replace_all(stripped, "_").into_owned();

        if sanitized.is_empty() || sanitized.starts_with('.') || sanitized.chars().all(|c| c == '.') {
            return Err(PipelineError::InvalidInput(format!(
                "host {host:?} cannot be used as an identifier"
            )));
        }

        Ok(Self(sanitized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name presented to the user for the finished archive.
    pub fn archive_file_name(&self) -> String {
        format!("{}.zip", self.0)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HostId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A validated target website.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: Url,
    pub host: HostId,
}

/// Validate a raw form value. Nothing here touches the network.
pub fn parse_target(raw: Option<&str>) -> Result<Target> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(PipelineError::InvalidInput("no URL was submitted".to_string()));
    }

    let url = Url::parse(trimmed).map_err(|source| PipelineError::MalformedUrl {
        url: trimmed.to_string(),
        source,
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(PipelineError::UnsupportedScheme(url.scheme().to_string()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| PipelineError::InvalidInput(format!("{trimmed:?} has no host")))?;
    let host = HostId::from_host(host)?;

    Ok(Target { url, host })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_prefix() {
        let target = parse_target(Some("https://www.example.com")).unwrap();
        assert_eq!(target.host.as_str(), "example.com");
        assert_eq!(target.url.as_str(), "https://www.example.com/");
    }

    #[test]
    fn host_is_case_normalized() {
        let target = parse_target(Some("https://WWW.Example.COM/Path")).unwrap();
        assert_eq!(target.host.as_str(), "example.com");
    }

    #[test]
    fn only_leading_www_is_stripped() {
        let target = parse_target(Some("http://docs.www.example.com")).unwrap();
        assert_eq!(target.host.as_str(), "docs.www.example.com");

        let target = parse_target(Some("http://wwwexample.com")).unwrap();
        assert_eq!(target.host.as_str(), "wwwexample.com");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let target = parse_target(Some("  https://example.org/a  ")).unwrap();
        assert_eq!(target.host.as_str(), "example.org");
    }

    #[test]
    fn missing_or_empty_input_is_invalid() {
        assert!(matches!(parse_target(None), Err(PipelineError::InvalidInput(_))));
        assert!(matches!(parse_target(Some("")), Err(PipelineError::InvalidInput(_))));
        assert!(matches!(parse_target(Some("   ")), Err(PipelineError::InvalidInput(_))));
    }

    #[test]
    fn unparsable_input_is_malformed() {
        assert!(matches!(
            parse_target(Some("not a url")),
            Err(PipelineError::MalformedUrl { .. })
        ));
        assert!(matches!(
            parse_target(Some("example.com")),
            Err(PipelineError::MalformedUrl { .. })
        ));
    }

    #[test]
    fn non_http_schemes_are_rejected() {
        assert!(matches!(
            parse_target(Some("ftp://example.com/file")),
            Err(PipelineError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            parse_target(Some("file:///etc/passwd")),
            Err(PipelineError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn identifier_is_a_safe_path_segment() {
        let target = parse_target(Some("http://[::1]:8080/")).unwrap();
        assert_eq!(target.host.as_str(), "___1_");
        assert!(!target.host.as_str().contains('/'));

        let target = parse_target(Some("http://127.0.0.1:9000/")).unwrap();
        assert_eq!(target.host.as_str(), "127.0.0.1");
    }

    #[test]
    fn dot_only_hosts_are_rejected() {
        assert!(HostId::from_host("..").is_err());
        assert!(HostId::from_host("www.").is_err());
        assert!(HostId::from_host(".hidden").is_err());
    }

    #[test]
    fn archive_name_uses_identifier() {
        let host = HostId::from_host("www.example.com").unwrap();
        assert_eq!(host.archive_file_name(), "example.com.zip");
    }
}
