//! OpenAI-style `POST /chat/completions` adapter (spec.md §4.3).
//!
//! One HTTP connection pool per adapter instance, keep-alive with at most 5
//! concurrent and 2 idle connections to the provider — mirrors the pool
//! tuning the teacher workspace applies in
//! `api/openai/src/client_ext_builder.rs` (`pool_max_idle_per_host` /
//! `pool_idle_timeout`), scaled down to the daemon's much smaller fan-out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shellassist_core::config::ConfigView;
use shellassist_core::provider::{ChatMessage, ProviderClient, ProviderError, Role, Timeouts};

const MAX_IDLE_PER_HOST: usize = 2;
const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f64 = 0.3;

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Adapter for any provider that speaks the OpenAI chat-completions dialect.
#[derive(Debug)]
pub struct OpenAiAdapter {
    http: reqwest::Client,
}

impl OpenAiAdapter {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(MAX_IDLE_PER_HOST)
            .build()
            .expect("failed to build reqwest client");
        Self { http }
    }
}

impl Default for OpenAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for OpenAiAdapter {
    async fn call(
        &self,
        messages: &[ChatMessage],
        model: &str,
        timeout: Timeouts,
        config: &ConfigView,
    ) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: role_str(m.role),
                    content: &m.content,
                })
                .collect(),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let url = format!("{}/chat/completions", config.provider.api_base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(&config.provider.api_key)
            .json(&body)
            .timeout(timeout.overall())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_mapping_is_stable() {
        assert_eq!(role_str(Role::System), "system");
        assert_eq!(role_str(Role::User), "user");
        assert_eq!(role_str(Role::Assistant), "assistant");
    }
}
