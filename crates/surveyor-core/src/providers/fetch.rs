//! Page fetching and plain-text extraction over HTTP.
//!
//! Extraction is two-pass: the main-content region (`<article>` or
//! `<main>`) is preferred when it carries enough text; otherwise the whole
//! document body is flattened.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;

use super::{ContentFetcher, ExtractedContent};

/// Minimum characters for the main-content pass to be accepted.
const MAIN_CONTENT_MIN_CHARS: usize = 200;
/// Minimum characters for the full-text pass to be accepted.
const FULL_TEXT_MIN_CHARS: usize = 100;

pub const METHOD_MAIN_CONTENT: &str = "main-content";
pub const METHOD_FULL_TEXT: &str = "full-text";

static NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript|svg|nav|footer|header)\b.*?</(script|style|noscript|svg|nav|footer|header)\s*>")
        .expect("noise pattern is valid")
});
static MAIN_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(article|main)\b[^>]*>(.*?)</(article|main)\s*>")
        .expect("main region pattern is valid")
});
static BLOCK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?(p|div|br|li|h[1-6]|tr|section)\b[^>]*>").expect("block pattern is valid")
});
static ANY_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));
static INLINE_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{a0}]+").expect("space pattern is valid"));

/// [`ContentFetcher`] that downloads a page and flattens it to text.
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("surveyor/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build fetch HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<ExtractedContent>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("failed to fetch {url}"))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            tracing::debug!(url, status = %status, "fetch returned non-200, nothing extracted");
            return Ok(None);
        }

        let html = response
            .text()
            .await
            .with_context(|| format!("failed to read body of {url}"))?;

        Ok(extract_text(&html).map(|(content, method)| ExtractedContent {
            url: url.to_string(),
            content,
            method: method.to_string(),
            content_type: None,
        }))
    }
}

/// Extract readable text from an HTML document, returning the text and the
/// method that produced it.
pub fn extract_text(html: &str) -> Option<(String, &'static str)> {
    let cleaned = NOISE.replace_all(html, " ");

    let main: String = MAIN_REGION
        .captures_iter(&cleaned)
        .filter_map(|c| c.get(2))
        .map(|m| flatten(m.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    if main.chars().count() > MAIN_CONTENT_MIN_CHARS {
        return Some((main, METHOD_MAIN_CONTENT));
    }

    let full = flatten(&cleaned);
    if full.chars().count() > FULL_TEXT_MIN_CHARS {
        return Some((full, METHOD_FULL_TEXT));
    }

    None
}

/// Strip tags, decode common entities and collapse whitespace line by line.
fn flatten(fragment: &str) -> String {
    let with_breaks = BLOCK_TAG.replace_all(fragment, "\n");
    let text = ANY_TAG.replace_all(&with_breaks, " ");
    let text = decode_entities(&text);
    text.lines()
        .map(|line| INLINE_SPACE.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paragraph(words: usize) -> String {
        std::iter::repeat_n("espresso", words).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn prefers_article_region_when_long_enough() {
        let html = format!(
            "<html><body><nav>menu menu</nav><article><p>{}</p></article>\
             <div>sidebar text</div></body></html>",
            paragraph(40)
        );
        let (text, method) = extract_text(&html).expect("should extract");
        assert_eq!(method, METHOD_MAIN_CONTENT);
        assert!(!text.contains("sidebar"));
        assert!(!text.contains("menu"));
    }

    #[test]
    fn falls_back_to_full_text() {
        let html = format!(
            "<html><body><script>var x = 1;</script><div>{}</div></body></html>",
            paragraph(20)
        );
        let (text, method) = extract_text(&html).expect("should extract");
        assert_eq!(method, METHOD_FULL_TEXT);
        assert!(!text.contains("var x"));
    }

    #[test]
    fn short_pages_yield_nothing() {
        assert!(extract_text("<html><body><p>hi</p></body></html>").is_none());
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(flatten("<p>fish &amp; chips&nbsp;&lt;3</p>"), "fish & chips <3");
    }
}
