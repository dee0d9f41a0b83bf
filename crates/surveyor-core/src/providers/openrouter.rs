//! Plan generation through an OpenAI-compatible chat-completions endpoint
//! (OpenRouter by default).

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::PlanGenerator;

/// Default chat-completions base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model used for planning.
pub const DEFAULT_MODEL: &str = "qwen/qwen-2.5-72b-instruct";

/// Settings for [`OpenRouterPlanner`].
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// API key. `None` disables the planner (it reports "unavailable").
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Request timeout for a single completion.
    pub timeout: Duration,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// [`PlanGenerator`] backed by a chat-completions API in JSON mode.
#[derive(Debug, Clone)]
pub struct OpenRouterPlanner {
    client: reqwest::Client,
    config: OpenRouterConfig,
}

impl OpenRouterPlanner {
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("failed to build planner HTTP client")?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl PlanGenerator for OpenRouterPlanner {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn generate(&self, prompt: &str) -> Result<Option<serde_json::Value>> {
        let Some(api_key) = self.config.api_key.as_deref() else {
            tracing::debug!("planner API key not configured, generator unavailable");
            return Ok(None);
        };

        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .context("planner request failed")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("planner returned HTTP {status}: {text}");
        }

        let reply: ChatResponse = response
            .json()
            .await
            .context("planner response is not a chat completion")?;

        let Some(content) = reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
        else {
            return Ok(None);
        };

        let value = parse_plan_content(&content)?;
        Ok(Some(value))
    }
}

/// Parse the model's message body as JSON, tolerating a Markdown code fence
/// around it.
fn parse_plan_content(content: &str) -> Result<serde_json::Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(unfenced.trim()).context("planner reply is not valid JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let v = parse_plan_content(r#"{"team": []}"#).unwrap();
        assert!(v["team"].is_array());
    }

    #[test]
    fn parses_fenced_json() {
        let v = parse_plan_content("```json\n{\"search_queries\": [\"a\"]}\n```").unwrap();
        assert_eq!(v["search_queries"][0], "a");
    }

    #[test]
    fn rejects_prose() {
        assert!(parse_plan_content("Here is your plan!").is_err());
    }

    #[tokio::test]
    async fn missing_api_key_means_unavailable() {
        let planner = OpenRouterPlanner::new(OpenRouterConfig::default()).unwrap();
        let out = planner.generate("anything").await.unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let planner = OpenRouterPlanner::new(OpenRouterConfig {
            base_url: "http://localhost:9/v1/".into(),
            ..OpenRouterConfig::default()
        })
        .unwrap();
        assert_eq!(planner.endpoint(), "http://localhost:9/v1/chat/completions");
    }
}
