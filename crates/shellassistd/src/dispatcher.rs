//! Request dispatcher (C9): parses line-framed JSON, routes by kind,
//! assembles the response. Ported line-for-line in semantics from the
//! `aish/daemon.py` `_handle_*` methods (see SPEC_FULL.md §4.9).

use std::sync::Arc;

use serde_json::Value;
use shellassist_core::prompts;
use shellassist_core::protocol::{HistoryResult, Request, Response};
use shellassist_core::provider::{ChatMessage, Timeouts};
use shellassist_core::safety;

use crate::state::AppState;

/// Leading characters that indicate the suggestion starts a new shell
/// operator (pipe, redirect, logical-and, etc.); when the user's buffer
/// ends on a word character and the suggestion starts with one of these, a
/// single space is inserted between them. (spec.md §4.9 step (b))
const OPERATOR_TRIGGERS: &[char] = &['-', '|', '>', '&', ';', '<', '(', ')'];

/// Decode one line of input and dispatch it, producing exactly one response
/// line. Never panics across the request boundary; a programmer error
/// inside a handler becomes a tagged `{type: "error"}` response instead of
/// propagating.
pub async fn dispatch_line(state: &Arc<AppState>, line: &str) -> Option<Response> {
    let value: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed JSON request line");
            return None;
        }
    };

    state.touch_activity();

    let request = match Request::from_value(&value) {
        Some(r) => r,
        None => {
            tracing::warn!("discarding non-object JSON request line");
            return None;
        }
    };

    Some(dispatch(state, request).await)
}

async fn dispatch(state: &Arc<AppState>, request: Request) -> Response {
    let request_id = request.request_id().map(str::to_string);
    match request {
        Request::Complete {
            cwd,
            shell,
            history,
            buffer,
            last_command,
            last_output,
            exit_status,
            ..
        } => {
            handle_complete(
                state,
                request_id,
                cwd,
                shell,
                history,
                buffer,
                last_command,
                last_output,
                exit_status,
            )
            .await
        }
        Request::Nl {
            cwd,
            shell,
            history,
            prompt,
            buffer,
            ..
        } => handle_nl(state, request_id, cwd, shell, history, prompt, buffer).await,
        Request::ErrorCorrect {
            cwd,
            shell,
            failed_command,
            exit_status,
            stderr,
            ..
        } => {
            handle_error_correct(
                state,
                request_id,
                cwd,
                shell,
                failed_command,
                exit_status,
                stderr,
            )
            .await
        }
        Request::HistorySearch {
            shell,
            history,
            query,
            ..
        } => handle_history_search(state, request_id, shell, history, query).await,
        Request::ReloadConfig { .. } => handle_reload_config(state, request_id),
        Request::Unknown { kind, .. } => Response::Error {
            request_id,
            message: format!("Unknown request type: {kind}"),
        },
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_complete(
    state: &Arc<AppState>,
    request_id: Option<String>,
    cwd: String,
    shell: String,
    history: Vec<String>,
    buffer: String,
    last_command: String,
    last_output: String,
    exit_status: i64,
) -> Response {
    if buffer.is_empty() && !last_output.is_empty() {
        proactive_path(state, request_id, cwd, shell, history, last_command, last_output).await
    } else {
        autocomplete_path(
            state,
            request_id,
            cwd,
            shell,
            history,
            buffer,
            last_command,
            last_output,
            exit_status,
        )
        .await
    }
}

#[allow(clippy::too_many_arguments)]
async fn autocomplete_path(
    state: &Arc<AppState>,
    request_id: Option<String>,
    cwd: String,
    shell: String,
    history: Vec<String>,
    buffer: String,
    last_command: String,
    _last_output: String,
    exit_status: i64,
) -> Response {
    let _ = last_command;
    if !state.rate_limiter.lock().unwrap().allow() {
        tracing::debug!("autocomplete dropped: rate limit exceeded");
        return Response::Complete {
            request_id,
            suggestion: String::new(),
            warning: None,
        };
    }

    let history = safety::sanitize_history(&history);
    let system = prompts::autocomplete_system();
    let user = prompts::autocomplete_user(&buffer, &cwd, &history, &shell, exit_status);
    let messages = [ChatMessage::system(system), ChatMessage::user(user)];

    let config = state.facade.config();
    let model = config.provider.effective_autocomplete_model().to_string();
    let cache_key = [buffer.as_str(), cwd.as_str()];
    let cache_key_parts = ["autocomplete", cache_key[0], cache_key[1]];

    let raw = state
        .facade
        .complete(&messages, &model, Timeouts::AUTOCOMPLETE, Some(&cache_key_parts))
        .await;

    let suggestion = postprocess_suggestion(&raw, Some(&buffer));
    let warning = safety::check_dangerous(&format!("{buffer}{suggestion}")).map(str::to_string);

    Response::Complete {
        request_id,
        suggestion,
        warning,
    }
}

async fn proactive_path(
    state: &Arc<AppState>,
    request_id: Option<String>,
    cwd: String,
    shell: String,
    history: Vec<String>,
    last_command: String,
    last_output: String,
) -> Response {
    if state.facade.is_high_latency() {
        tracing::debug!("proactive suggestion skipped: provider is high-latency");
        return Response::Complete {
            request_id,
            suggestion: String::new(),
            warning: None,
        };
    }

    let sanitized_output = safety::redact(&last_output);
    {
        let mut session = state.session.lock().unwrap();
        session.add(last_command.clone(), sanitized_output.clone());
    }

    let session_text = state.session.lock().unwrap().format_for_prompt();
    let history = safety::sanitize_history(&history);
    let system = prompts::proactive_system(&session_text);
    let user = prompts::proactive_user(&cwd, &history, &last_command, &sanitized_output, &shell);
    let messages = [ChatMessage::system(system), ChatMessage::user(user)];

    let config = state.facade.config();
    let model = config.provider.effective_autocomplete_model().to_string();
    let output_hash = format!("{:x}", md5_like_hash(&sanitized_output));
    let cache_key_parts = ["proactive", last_command.as_str(), cwd.as_str(), output_hash.as_str()];

    let raw = state
        .facade
        .complete(&messages, &model, Timeouts::AUTOCOMPLETE, Some(&cache_key_parts))
        .await;

    let suggestion = postprocess_suggestion(&raw, None);
    let warning = safety::check_dangerous(&suggestion).map(str::to_string);

    Response::Complete {
        request_id,
        suggestion,
        warning,
    }
}

/// Cheap stable digest for the proactive cache key's `hash(last_output)`
/// component; collisions only cost an extra cache miss, never correctness.
fn md5_like_hash(text: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

async fn handle_nl(
    state: &Arc<AppState>,
    request_id: Option<String>,
    cwd: String,
    shell: String,
    history: Vec<String>,
    prompt: String,
    buffer: String,
) -> Response {
    if prompt.is_empty() {
        return Response::Nl {
            request_id,
            command: String::new(),
            warning: None,
        };
    }

    let history = safety::sanitize_history(&history);
    let system = prompts::autocomplete_system();
    let user = prompts::nl_command_user(&prompt, &cwd, &buffer, &history, &shell);
    let messages = [ChatMessage::system(system), ChatMessage::user(user)];

    let config = state.facade.config();
    let model = config.provider.model.clone();
    let raw = state
        .facade
        .complete_with_retry(
            &messages,
            &model,
            Timeouts::NATURAL_LANGUAGE,
            1,
            std::time::Duration::from_millis(500),
        )
        .await;

    let command = postprocess_suggestion(&raw, None);
    let warning = safety::check_dangerous(&command).map(str::to_string);

    Response::Nl {
        request_id,
        command,
        warning,
    }
}

async fn handle_error_correct(
    state: &Arc<AppState>,
    request_id: Option<String>,
    cwd: String,
    shell: String,
    failed_command: String,
    exit_status: i64,
    stderr: String,
) -> Response {
    if failed_command.is_empty() {
        return Response::ErrorCorrect {
            request_id,
            suggestion: String::new(),
        };
    }

    let stderr = safety::redact(&stderr);
    let system = prompts::autocomplete_system();
    let user = prompts::error_correction_user(&failed_command, exit_status, &stderr, &cwd, &shell);
    let messages = [ChatMessage::system(system), ChatMessage::user(user)];

    let config = state.facade.config();
    let model = config.provider.effective_autocomplete_model().to_string();
    let raw = state
        .facade
        .complete(&messages, &model, Timeouts::AUTOCOMPLETE, None)
        .await;

    Response::ErrorCorrect {
        request_id,
        suggestion: raw.trim_end().to_string(),
    }
}

async fn handle_history_search(
    state: &Arc<AppState>,
    request_id: Option<String>,
    shell: String,
    history: Vec<String>,
    query: String,
) -> Response {
    if query.is_empty() || history.is_empty() {
        return Response::HistorySearch {
            request_id,
            results: Vec::new(),
        };
    }

    let history = safety::sanitize_history(&history);
    let system = prompts::autocomplete_system();
    let user = prompts::history_search_user(&query, &history, &shell);
    let messages = [ChatMessage::system(system), ChatMessage::user(user)];

    let config = state.facade.config();
    let model = config.provider.model.clone();
    let raw = state
        .facade
        .complete_with_retry(
            &messages,
            &model,
            Timeouts::HISTORY_SEARCH,
            1,
            std::time::Duration::from_millis(500),
        )
        .await;

    let results = parse_history_results(&raw);
    Response::HistorySearch { request_id, results }
}

/// Parse the model's JSON-array reply; any parse error or non-array value
/// is discarded as an empty result list (spec.md §4.9).
fn parse_history_results(raw: &str) -> Vec<HistoryResult> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| serde_json::from_value::<HistoryResult>(v).ok())
            .take(10)
            .collect(),
        _ => Vec::new(),
    }
}

fn handle_reload_config(state: &Arc<AppState>, request_id: Option<String>) -> Response {
    match shellassist_core::config::ConfigView::load(&state.config_path) {
        Ok(new_view) => {
            state.facade.reload_config(new_view);
            tracing::info!("configuration reloaded");
            Response::ReloadConfig {
                request_id,
                ok: true,
                message: None,
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "configuration reload failed");
            Response::ReloadConfig {
                request_id,
                ok: false,
                message: Some(e.to_string()),
            }
        }
    }
}

/// Shared post-processing pipeline for `complete`/`nl` outputs (spec.md
/// §4.9), applied in the documented order: (a) trim trailing whitespace,
/// (b) (autocomplete-only, when `buffer` is given) insert a leading space
/// before an operator-starting suggestion, (c) strip markdown code fences,
/// (d) keep only the first line.
fn postprocess_suggestion(raw: &str, buffer: Option<&str>) -> String {
    let trimmed = raw.trim_end().to_string();
    let space_inserted = match buffer {
        Some(buffer) => maybe_insert_leading_space(buffer, trimmed),
        None => trimmed,
    };
    let fenced_stripped = strip_code_fence(&space_inserted);
    fenced_stripped.split('\n').next().unwrap_or("").to_string()
}

/// Strip a leading/trailing ```` ```lang\n...\n``` ```` fence if present.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let without_lang = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
        let without_trailing = without_lang.strip_suffix("```").unwrap_or(without_lang);
        return without_trailing.trim_end().to_string();
    }
    text.to_string()
}

fn maybe_insert_leading_space(buffer: &str, suggestion: String) -> String {
    let buffer_last = buffer.chars().last();
    let suggestion_first = suggestion.chars().next();
    let needs_space = match (buffer_last, suggestion_first) {
        (Some(b), Some(s)) => {
            (b.is_alphanumeric() || b == '_' || b == '-') && OPERATOR_TRIGGERS.contains(&s)
        }
        _ => false,
    };
    if needs_space {
        format!(" {suggestion}")
    } else {
        suggestion
    }
}
