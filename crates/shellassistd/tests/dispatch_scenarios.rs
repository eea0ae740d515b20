//! End-to-end dispatcher scenarios from spec.md §8, driven directly against
//! [`shellassistd::dispatcher::dispatch_line`] with a scripted fake
//! provider — no real socket or HTTP call involved.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use shellassist_core::config::{ConfigHandle, ConfigView, ProviderConfig, ProviderName, UiConfig};
use shellassist_core::facade::LlmFacade;
use shellassist_core::provider::{ChatMessage, ProviderClient, ProviderError, Timeouts};
use shellassist_core::rate_limit::RateLimiter;
use shellassist_core::session::SessionBuffer;
use shellassistd::dispatcher::dispatch_line;
use shellassistd::state::AppState;

fn test_config() -> ConfigView {
    ConfigView {
        provider: ProviderConfig {
            name: ProviderName::Openai,
            api_key: "test-key".to_string(),
            api_base_url: "http://127.0.0.1:0".to_string(),
            model: "gpt-4o".to_string(),
            autocomplete_model: String::new(),
        },
        ui: UiConfig {
            autocomplete_delay_ms: 200,
            autocomplete_delay_short_ms: 100,
            autocomplete_delay_threshold: 8,
            autocomplete_min_chars: 3,
            nl_hotkey: "^G".to_string(),
            history_search_hotkey: "^R".to_string(),
            cheat_sheet_hotkey: "^_".to_string(),
            history_search_limit: 500,
            error_correction: true,
            proactive_suggestions: true,
            proactive_output_lines: 50,
            proactive_capture_blocklist: vec![],
        },
    }
}

/// A provider whose replies are prescripted and whose failure/latency
/// behavior is controlled per test.
struct ScriptedProvider {
    reply: Mutex<String>,
    fail: std::sync::atomic::AtomicBool,
    calls: AtomicUsize,
    latency_ms: Mutex<f64>,
}

impl ScriptedProvider {
    fn reply(text: &str) -> Self {
        Self {
            reply: Mutex::new(text.to_string()),
            fail: std::sync::atomic::AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            latency_ms: Mutex::new(0.0),
        }
    }

    fn always_fails() -> Self {
        let p = Self::reply("");
        p.fail.store(true, Ordering::SeqCst);
        p
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn call(
        &self,
        _messages: &[ChatMessage],
        _model: &str,
        _timeout: Timeouts,
        _config: &ConfigView,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Timeout);
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

fn new_state(provider: Arc<ScriptedProvider>) -> (Arc<AppState>, Arc<ScriptedProvider>) {
    let config_handle = Arc::new(ConfigHandle::new(test_config()));
    let facade = LlmFacade::new(provider.clone(), config_handle);
    let state = Arc::new(AppState {
        facade,
        session: Mutex::new(SessionBuffer::new()),
        rate_limiter: Mutex::new(RateLimiter::default()),
        last_activity: Mutex::new(Instant::now()),
        config_path: std::path::PathBuf::from("/nonexistent/shellassist-test.toml"),
    });
    (state, provider)
}

#[tokio::test]
async fn autocomplete_leading_space_before_operator_suffix() {
    let (state, _provider) = new_state(Arc::new(ScriptedProvider::reply("-i input.mp4")));
    let line = r#"{"type": "complete", "buffer": "ffmpeg", "cwd": "/tmp", "history": []}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::Complete { suggestion, .. } => {
            assert_eq!(suggestion, " -i input.mp4");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn code_fence_is_stripped() {
    let (state, _provider) = new_state(Arc::new(ScriptedProvider::reply("```bash\nls -la\n```")));
    let line = r#"{"type": "complete", "buffer": "", "cwd": "/tmp", "history": []}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::Complete { suggestion, .. } => {
            assert_eq!(suggestion, "ls -la");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn dangerous_suggestion_is_annotated() {
    let (state, _provider) = new_state(Arc::new(ScriptedProvider::reply("rm -rf /")));
    let line = r#"{"type": "nl", "prompt": "wipe the root disk"}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::Nl { command, warning, .. } => {
            assert_eq!(command, "rm -rf /");
            assert!(warning.is_some());
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn history_search_returns_parsed_results() {
    let (state, _provider) = new_state(Arc::new(ScriptedProvider::reply(
        r#"[{"command":"docker run postgres","score":0.95}]"#,
    )));
    let line = r#"{"type": "history_search", "query": "docker postgres", "history": ["docker run postgres", "ls", "git status"]}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::HistorySearch { results, .. } => {
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].command, "docker run postgres");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn circuit_opens_after_three_failures_and_suppresses_further_calls() {
    let (state, provider) = new_state(Arc::new(ScriptedProvider::always_fails()));
    for _ in 0..3 {
        let line = r#"{"type": "complete", "buffer": "git ", "cwd": "/tmp", "history": []}"#;
        let response = dispatch_line(&state, line).await.unwrap();
        match response {
            shellassist_core::protocol::Response::Complete { suggestion, .. } => {
                assert_eq!(suggestion, "");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
    let calls_after_three = provider.calls();
    assert_eq!(calls_after_three, 3);

    for _ in 0..5 {
        let line = r#"{"type": "complete", "buffer": "docker ", "cwd": "/tmp", "history": []}"#;
        let response = dispatch_line(&state, line).await.unwrap();
        match response {
            shellassist_core::protocol::Response::Complete { suggestion, .. } => {
                assert_eq!(suggestion, "");
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }
    // Circuit stays open inside the cooldown window: no further outbound calls.
    assert_eq!(provider.calls(), calls_after_three);
}

#[tokio::test]
async fn proactive_suggestion_skipped_under_high_latency() {
    let provider = Arc::new(ScriptedProvider::reply("git status"));
    let (state, _provider) = new_state(provider.clone());
    for _ in 0..10 {
        state.facade.seed_latency_sample_for_test(3000.0);
    }
    assert!(state.facade.is_high_latency());

    let line = r#"{"type": "complete", "buffer": "", "cwd": "/tmp", "history": [], "last_command": "npm install", "last_output": "npm ERR! missing script"}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::Complete { suggestion, .. } => {
            assert_eq!(suggestion, "");
        }
        other => panic!("unexpected response: {other:?}"),
    }
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn proactive_suggestion_runs_normally_under_low_latency() {
    let provider = Arc::new(ScriptedProvider::reply("git status"));
    let (state, _provider) = new_state(provider.clone());
    assert!(!state.facade.is_high_latency());

    let line = r#"{"type": "complete", "buffer": "", "cwd": "/tmp", "history": [], "last_command": "npm install", "last_output": "npm ERR! missing script"}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::Complete { suggestion, .. } => {
            assert_eq!(suggestion, "git status");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn unknown_request_type_yields_tagged_error() {
    let (state, _provider) = new_state(Arc::new(ScriptedProvider::reply("")));
    let line = r#"{"type": "frobnicate"}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::Error { message, .. } => {
            assert_eq!(message, "Unknown request type: frobnicate");
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_line_is_discarded_without_a_response() {
    let (state, _provider) = new_state(Arc::new(ScriptedProvider::reply("")));
    let response = dispatch_line(&state, "not json at all").await;
    assert!(response.is_none());
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (state, _provider) = new_state(Arc::new(ScriptedProvider::reply("ls -la")));
    let line = r#"{"type": "complete", "buffer": "", "cwd": "/tmp", "history": [], "request_id": "abc123"}"#;
    let response = dispatch_line(&state, line).await.unwrap();
    match response {
        shellassist_core::protocol::Response::Complete { request_id, .. } => {
            assert_eq!(request_id.as_deref(), Some("abc123"));
        }
        other => panic!("unexpected response: {other:?}"),
    }
}
