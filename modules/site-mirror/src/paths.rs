// Mapping from URLs to file paths inside the mirror directory.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Directory for resources served from a host other than the start URL's.
pub const EXTERNAL_DIR: &str = "_external";

const MAX_SEGMENT_LEN: usize = 120;

static UNSAFE_SEGMENT_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._\-~]").expect("valid regex"));

fn sanitize_segment(raw: &str) -> String {
    let cleaned = UNSAFE_SEGMENT_CHARS.replace_all(raw, "_");
    let mut cleaned: String = cleaned.chars().take(MAX_SEGMENT_LEN).collect();
    if cleaned.chars().all(|c| c == '.') {
        cleaned = "_".repeat(cleaned.len().max(1));
    }
    cleaned
}

fn host_key(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}_{port}"),
        None => host.to_string(),
    }
}

fn is_html_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".html") || lower.ends_with(".htm")
}

/// Local path (relative to the mirror root) for a resource.
///
/// Resources on the start URL's host keep the site's structure at the root;
/// other hosts live under `_external/<host>/`. Directory-like URLs become
/// `index.html`, HTML documents without an HTML extension gain one, and a
/// query string is folded into the file name.
pub fn local_path(url: &Url, root: &Url, is_html: bool) -> PathBuf {
    let mut path = PathBuf::new();
    if host_key(url) != host_key(root) {
        path.push(EXTERNAL_DIR);
        path.push(sanitize_segment(&host_key(url)));
    }

    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.collect())
        .unwrap_or_default();
    let last = segments.pop().unwrap_or_default();
    for segment in segments.into_iter().filter(|s| !s.is_empty()) {
        path.push(sanitize_segment(segment));
    }

    let mut name = if last.is_empty() {
        "index.html".to_string()
    } else {
        sanitize_segment(last)
    };

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        let query = sanitize_segment(query);
        name = match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{query}.{ext}"),
            _ => format!("{name}_{query}"),
        };
    }

    if is_html && !is_html_name(&name) {
        name.push_str(".html");
    }

    path.push(name);
    path
}

/// Hands out unique on-disk paths for one mirror.
///
/// Distinct URLs can map to the same [`local_path`] (`/about` served as HTML
/// and `/about.html`), and an extensionless file can sit where a later URL
/// needs a directory (`/avatar` then `/avatar/big.png`). A clashing file name
/// gets a numeric suffix before its extension; a directory component that is
/// already taken by a file is replaced by the first `<name>_<n>` that is not.
#[derive(Debug, Default)]
pub struct PathAllocator {
    files: HashSet<PathBuf>,
    dirs: HashSet<PathBuf>,
}

impl PathAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a path for `wanted`, adjusted as needed so it neither
    /// overwrites an earlier file nor collides with a file/directory.
    pub fn claim(&mut self, wanted: &Path) -> PathBuf {
        let mut parts: Vec<String> = wanted
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let name = parts.pop().unwrap_or_else(|| "index.html".to_string());

        let mut dir = PathBuf::new();
        for part in parts {
            let mut n = 0;
            let next = loop {
                let candidate = dir.join(suffixed_dir(&part, n));
                if !self.files.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            self.dirs.insert(next.clone());
            dir = next;
        }

        let mut n = 0;
        let file = loop {
            let candidate = dir.join(suffixed_file(&name, n));
            if !self.files.contains(&candidate) && !self.dirs.contains(&candidate) {
                break candidate;
            }
            n += 1;
        };
        self.files.insert(file.clone());
        file
    }
}

fn suffixed_dir(name: &str, n: usize) -> String {
    match n {
        0 => name.to_string(),
        n => format!("{name}_{n}"),
    }
}

fn suffixed_file(name: &str, n: usize) -> String {
    if n == 0 {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{n}.{ext}"),
        _ => format!("{name}_{n}"),
    }
}

/// Relative reference from the file at `from` to the file at `to`, both
/// relative to the mirror root, using `/` separators.
pub fn relative_link(from: &Path, to: &Path) -> String {
    let from_dir: Vec<Component> = from
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    let to_parts: Vec<Component> = to.components().collect();

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    parts.extend(std::iter::repeat("..".to_string()).take(from_dir.len() - common));
    parts.extend(
        to_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}
