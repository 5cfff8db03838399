// Link discovery and rewriting for HTML and CSS.
//
// Only `href`/`src` attributes and CSS `url(...)`/`@import` references are
// considered. URLs in scripts, data attributes and plain text are ignored.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::bytes::{Captures, Regex};
use url::Url;

// Patterns run over raw bytes with Unicode off, so documents in any
// ASCII-compatible charset pass through byte for byte.

/// Opening tags with their attribute text.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?-u)(?is)<([a-z][a-z0-9\-]*)(\s[^>]*)?>").expect("valid regex")
});

/// `href` / `src` attributes, double-, single- or un-quoted. Group 1 is
/// everything up to the value.
static URL_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?-u)(?i)(\b(?:href|src)\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid regex")
});

static REL_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?-u)(?i)\brel\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid regex")
});

/// `url(...)` with optional quotes, and quoted `@import` targets.
static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?-u)(?i)(url\(\s*)(["']?)([^"')]+?)(["']?\s*\))|(@import\s+)(["'])([^"']+)(["'])"#,
    )
    .expect("valid regex")
});

/// How a discovered link participates in the crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkKind {
    /// A navigable document; subject to the depth limit.
    Page,
    /// A resource needed to render a page (image, script, stylesheet, ...).
    Asset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: Url,
    pub kind: LinkKind,
}

/// Resolve a raw reference against `base`. Returns an absolute http(s) URL
/// with the fragment stripped, or `None` for in-page anchors and
/// non-fetchable schemes (`data:`, `mailto:`, `javascript:` ...).
pub fn resolve_link(raw: &str, base: &Url) -> Option<Url> {
    let raw = raw.trim().replace("&amp;", "&");
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }

    let mut resolved = base.join(&raw).ok()?;
    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved)
}

fn kind_for(tag: &str, attrs: &[u8]) -> Option<LinkKind> {
    match tag {
        "a" | "area" | "iframe" | "frame" => Some(LinkKind::Page),
        "img" | "script" | "source" | "video" | "audio" | "embed" | "track" | "input" => {
            Some(LinkKind::Asset)
        }
        "link" => {
            let rel = REL_ATTR_RE
                .captures(attrs)
                .and_then(|c| c.get(1).or(c.get(2)).or(c.get(3)))
                .map(|m| String::from_utf8_lossy(m.as_bytes()).to_lowercase())
                .unwrap_or_default();
            let wanted = ["stylesheet", "icon", "preload", "manifest", "apple-touch-icon"];
            rel.split_whitespace()
                .any(|r| wanted.contains(&r))
                .then_some(LinkKind::Asset)
        }
        _ => None,
    }
}

/// The attribute value, if it is valid UTF-8. Anything else cannot be a URL
/// we would fetch.
fn attr_value<'h>(caps: &Captures<'h>) -> Option<&'h str> {
    let value = caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4))?;
    std::str::from_utf8(value.as_bytes()).ok()
}

fn css_value<'h>(caps: &Captures<'h>) -> Option<&'h str> {
    let value = caps.get(3).or_else(|| caps.get(7))?;
    std::str::from_utf8(value.as_bytes()).ok()
}

/// Extract fetchable links from an HTML document. Deduplicates, keeping the
/// first classification seen for a URL.
pub fn html_links(html: &[u8], base: &Url) -> Vec<Link> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for tag in TAG_RE.captures_iter(html) {
        let name = String::from_utf8_lossy(&tag[1]).to_ascii_lowercase();
        let attrs = tag.get(2).map(|m| m.as_bytes()).unwrap_or_default();
        let Some(kind) = kind_for(&name, attrs) else {
            continue;
        };

        for attr in URL_ATTR_RE.captures_iter(attrs) {
            if let Some(url) = attr_value(&attr).and_then(|raw| resolve_link(raw, base)) {
                if seen.insert(url.to_string()) {
                    links.push(Link { url, kind });
                }
            }
        }
    }

    // Inline <style> blocks and style="" attributes.
    for link in css_links(html, base) {
        if seen.insert(link.url.to_string()) {
            links.push(link);
        }
    }

    links
}

/// Extract `url(...)` and `@import` references from a stylesheet.
pub fn css_links(css: &[u8], base: &Url) -> Vec<Link> {
    let mut seen = HashSet::new();
    CSS_URL_RE
        .captures_iter(css)
        .filter_map(|caps| resolve_link(css_value(&caps)?, base))
        .filter(|url| seen.insert(url.to_string()))
        .map(|url| Link {
            url,
            kind: LinkKind::Asset,
        })
        .collect()
}

/// Re-point `href`/`src` attributes inside tags (and embedded CSS
/// references) at local copies. `local` maps an absolute URL to a relative
/// path, or `None` to leave the reference untouched. Fragments and the
/// original quoting are preserved, and bytes outside rewritten references
/// are copied unchanged.
pub fn rewrite_html<F>(html: &[u8], base: &Url, local: F) -> Vec<u8>
where
    F: Fn(&Url) -> Option<String>,
{
    let with_attrs = TAG_RE.replace_all(html, |tag: &Captures| {
        let Some(attrs) = tag.get(2) else {
            return tag[0].to_vec();
        };
        let rewritten = URL_ATTR_RE.replace_all(attrs.as_bytes(), |caps: &Captures| {
            match attr_value(caps).and_then(|raw| localize(raw, base, &local)) {
                Some(path) => {
                    let quote: &[u8] = if caps.get(2).is_some() {
                        b"\""
                    } else if caps.get(3).is_some() {
                        b"'"
                    } else {
                        b""
                    };
                    [&caps[1], quote, path.as_bytes(), quote].concat()
                }
                None => caps[0].to_vec(),
            }
        });
        if let Cow::Borrowed(_) = rewritten {
            return tag[0].to_vec();
        }

        let whole = tag.get_match();
        let (head, tail) = (
            &html[whole.start()..attrs.start()],
            &html[attrs.end()..whole.end()],
        );
        [head, &rewritten[..], tail].concat()
    });

    rewrite_css(&with_attrs, base, local)
}

/// Re-point `url(...)` and `@import` references at local copies.
pub fn rewrite_css<F>(css: &[u8], base: &Url, local: F) -> Vec<u8>
where
    F: Fn(&Url) -> Option<String>,
{
    CSS_URL_RE
        .replace_all(css, |caps: &Captures| {
            let path = css_value(caps).and_then(|raw| localize(raw, base, &local));
            match path {
                Some(path) if caps.get(3).is_some() => {
                    [&caps[1], &caps[2], path.as_bytes(), &caps[4]].concat()
                }
                Some(path) => [&caps[5], &caps[6], path.as_bytes(), &caps[8]].concat(),
                None => caps[0].to_vec(),
            }
        })
        .into_owned()
}

fn localize<F>(raw: &str, base: &Url, local: &F) -> Option<String>
where
    F: Fn(&Url) -> Option<String>,
{
    let target = resolve_link(raw, base)?;
    let path = local(&target)?;
    let fragment = raw
        .split_once('#')
        .map(|(_, frag)| format!("#{frag}"))
        .unwrap_or_default();
    Some(format!("{path}{fragment}"))
}
