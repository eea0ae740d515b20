//! Selects the concrete provider adapter from [`ConfigView::provider`] at
//! startup and on every `reload_config`. A tagged enum plus a small `match`
//! is the polymorphism the spec's "Polymorphism" design note calls for — no
//! inheritance hierarchy, no trait object required at this seam either, but
//! we still implement [`ProviderClient`] so the façade's generic-over-the-
//! capability code doesn't need to know this enum exists.

use async_trait::async_trait;
use shellassist_core::config::{ConfigView, ProviderName};
use shellassist_core::provider::{ChatMessage, ProviderClient, ProviderError, Timeouts};
use shellassist_provider_anthropic::AnthropicAdapter;
use shellassist_provider_openai::OpenAiAdapter;

/// Wraps both concrete adapters. Constructed once per daemon process;
/// `call` dispatches on `config.provider.name` for every request, so
/// `reload_config` switching providers takes effect on the very next call
/// without rebuilding this wrapper.
#[derive(Debug, Default)]
pub struct ProviderAdapter {
    openai: OpenAiAdapter,
    anthropic: AnthropicAdapter,
}

#[async_trait]
impl ProviderClient for ProviderAdapter {
    async fn call(
        &self,
        messages: &[ChatMessage],
        model: &str,
        timeout: Timeouts,
        config: &ConfigView,
    ) -> Result<String, ProviderError> {
        match config.provider.name {
            ProviderName::Openai => self.openai.call(messages, model, timeout, config).await,
            ProviderName::Anthropic => self.anthropic.call(messages, model, timeout, config).await,
        }
    }
}
