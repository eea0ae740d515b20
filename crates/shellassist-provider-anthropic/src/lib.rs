//! Anthropic-style `POST /v1/messages` adapter (spec.md §4.3).
//!
//! The system message is hoisted out of the `messages` array into a
//! top-level `system` block with `cache_control: {type: "ephemeral"}` so
//! the (mostly static) system prompt is eligible for Anthropic's
//! prompt-caching — the daemon sends the same system prompt on nearly every
//! call, which is exactly the repeated-prefix case prompt caching targets.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shellassist_core::config::ConfigView;
use shellassist_core::provider::{ChatMessage, ProviderClient, ProviderError, Role, Timeouts};

const MAX_IDLE_PER_HOST: usize = 2;
const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f64 = 0.3;
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_BETA: &str = "prompt-caching-2024-07-31";

#[derive(Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct SystemBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
    cache_control: CacheControl,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: Vec<SystemBlock<'a>>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "user", // unreachable after hoisting; kept exhaustive
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Adapter for the Anthropic Messages API.
#[derive(Debug)]
pub struct AnthropicAdapter {
    http: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()
            .expect("failed to build reqwest client");
        Self { http }
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for AnthropicAdapter {
    async fn call(
        &self,
        messages: &[ChatMessage],
        model: &str,
        timeout: Timeouts,
        config: &ConfigView,
    ) -> Result<String, ProviderError> {
        let system_text = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .unwrap_or("");

        let system = if system_text.is_empty() {
            Vec::new()
        } else {
            vec![SystemBlock {
                kind: "text",
                text: system_text,
                cache_control: CacheControl { kind: "ephemeral" },
            }]
        };

        let non_system: Vec<WireMessage<'_>> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| WireMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();

        let body = MessagesRequest {
            model,
            system,
            messages: non_system,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let url = format!("{}/v1/messages", config.provider.api_base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("x-api-key", &config.provider.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("anthropic-beta", ANTHROPIC_BETA)
            .json(&body)
            .timeout(timeout.overall())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .next()
            .map(|b| b.text)
            .unwrap_or_default();
        Ok(text.trim().to_string())
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Network(err.to_string())
    }
}
