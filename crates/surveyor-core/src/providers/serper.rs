//! Web and social search through the Serper API.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{KeyRotator, SearchChannel, SearchHit, SearchProvider};

pub const DEFAULT_BASE_URL: &str = "https://google.serper.dev";

/// Site filter appended to social-channel queries.
const SOCIAL_SITES: &str =
    "(site:instagram.com OR site:youtube.com OR site:tiktok.com OR site:reddit.com)";

/// Host suffix to platform label.
const PLATFORMS: &[(&str, &str)] = &[
    ("instagram.com", "Instagram"),
    ("youtube.com", "YouTube"),
    ("youtu.be", "YouTube"),
    ("tiktok.com", "TikTok"),
    ("reddit.com", "Reddit"),
];

#[derive(Debug, Serialize)]
struct SerperRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperOrganic>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
}

/// [`SearchProvider`] backed by Serper, rotating across configured keys.
#[derive(Debug)]
pub struct SerperSearch {
    client: reqwest::Client,
    base_url: String,
    keys: KeyRotator,
    results_per_query: u32,
}

impl SerperSearch {
    pub fn new(base_url: impl Into<String>, keys: KeyRotator, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build search HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            keys,
            results_per_query: 10,
        })
    }
}

#[async_trait]
impl SearchProvider for SerperSearch {
    async fn search(&self, query: &str, channel: SearchChannel) -> Result<Vec<SearchHit>> {
        let Some(key) = self.keys.next() else {
            bail!("no search API key configured (set SERPER_API_KEY)");
        };

        let q = match channel {
            SearchChannel::Web => query.to_string(),
            SearchChannel::Social => format!("{query} {SOCIAL_SITES}"),
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url.trim_end_matches('/')))
            .header("X-API-KEY", key)
            .json(&SerperRequest {
                q: &q,
                num: self.results_per_query,
            })
            .send()
            .await
            .with_context(|| format!("search request failed for {query:?}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("search returned HTTP {status} for {query:?}");
        }

        let body: SerperResponse = response
            .json()
            .await
            .context("search response is not valid JSON")?;

        Ok(body
            .organic
            .into_iter()
            .map(|o| {
                let platform = match channel {
                    SearchChannel::Social => platform_for(&o.link),
                    SearchChannel::Web => None,
                };
                SearchHit {
                    title: o.title,
                    url: o.link,
                    snippet: o.snippet,
                    platform,
                }
            })
            .collect())
    }
}

/// Label the social platform a URL belongs to.
fn platform_for(link: &str) -> Option<String> {
    let host = url::Url::parse(link).ok()?.host_str()?.to_lowercase();
    PLATFORMS
        .iter()
        .find(|(suffix, _)| host == *suffix || host.ends_with(&format!(".{suffix}")))
        .map(|(_, label)| (*label).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_detection_matches_hosts() {
        assert_eq!(
            platform_for("https://www.instagram.com/p/abc/").as_deref(),
            Some("Instagram")
        );
        assert_eq!(
            platform_for("https://youtu.be/xyz").as_deref(),
            Some("YouTube")
        );
        assert_eq!(platform_for("https://notinstagram.com/"), None);
        assert_eq!(platform_for("not a url"), None);
    }

    #[tokio::test]
    async fn search_without_keys_fails_fast() {
        let search = SerperSearch::new(
            "http://127.0.0.1:9",
            KeyRotator::new(Vec::new()),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = search.search("coffee", SearchChannel::Web).await.unwrap_err();
        assert!(err.to_string().contains("no search API key"), "{err}");
    }
}
