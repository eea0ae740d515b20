//! The capability every provider adapter (C3) exposes to the façade: one
//! `call` operation, normalized across the OpenAI- and Anthropic-style
//! dialects. Per the spec's "Polymorphism" design note, the two concrete
//! adapters are meant to be unified behind a tagged variant rather than an
//! inheritance hierarchy; `shellassistd::provider` does exactly that by
//! matching on [`crate::config::ProviderName`] to pick which
//! [`ProviderClient`] implementation to construct. The trait here exists so
//! the façade (and its tests) can depend on the capability without linking
//! both provider crates.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ConfigView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-request-type connect/read/write/pool deadlines (spec §4.7).
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
    pub pool: Duration,
}

impl Timeouts {
    pub const AUTOCOMPLETE: Timeouts = Timeouts {
        connect: Duration::from_secs(1),
        read: Duration::from_secs(3),
        write: Duration::from_secs(1),
        pool: Duration::from_secs(1),
    };
    pub const NATURAL_LANGUAGE: Timeouts = Timeouts {
        connect: Duration::from_secs(2),
        read: Duration::from_secs(12),
        write: Duration::from_secs(1),
        pool: Duration::from_secs(1),
    };
    pub const HISTORY_SEARCH: Timeouts = Timeouts {
        connect: Duration::from_secs(2),
        read: Duration::from_secs(8),
        write: Duration::from_secs(1),
        pool: Duration::from_secs(1),
    };

    /// The single deadline that bounds the whole call — connect + read is
    /// the dominant cost; `reqwest` exposes one overall timeout knob.
    pub fn overall(&self) -> Duration {
        self.connect + self.read + self.write + self.pool
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP status {0}")]
    Http(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

/// Normalizes one provider's chat-completion dialect behind a single call.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    async fn call(
        &self,
        messages: &[ChatMessage],
        model: &str,
        timeout: Timeouts,
        config: &ConfigView,
    ) -> Result<String, ProviderError>;
}
