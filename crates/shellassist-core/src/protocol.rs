//! Wire-level request/response types.
//!
//! Requests and responses are newline-delimited JSON objects. Clients may
//! omit any field; missing fields take the defaults documented per variant.
//! Unknown fields are ignored rather than rejected, so requests are decoded
//! from a generic [`serde_json::Value`] instead of via `#[serde(deny_unknown_fields)]`
//! — a future shell integration that adds a field should not break the
//! daemon (see the "Dynamic records on the wire" design note).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single `{command, score}` history-search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResult {
    pub command: String,
    pub score: f64,
}

/// A decoded client request.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Complete {
        request_id: Option<String>,
        cwd: String,
        shell: String,
        history: Vec<String>,
        buffer: String,
        last_command: String,
        last_output: String,
        exit_status: i64,
    },
    Nl {
        request_id: Option<String>,
        cwd: String,
        shell: String,
        history: Vec<String>,
        prompt: String,
        buffer: String,
    },
    ErrorCorrect {
        request_id: Option<String>,
        cwd: String,
        shell: String,
        failed_command: String,
        exit_status: i64,
        stderr: String,
    },
    HistorySearch {
        request_id: Option<String>,
        shell: String,
        history: Vec<String>,
        query: String,
    },
    ReloadConfig {
        request_id: Option<String>,
    },
    /// Any `type` the daemon does not recognize.
    Unknown {
        request_id: Option<String>,
        kind: String,
    },
}

impl Request {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Request::Complete { request_id, .. }
            | Request::Nl { request_id, .. }
            | Request::ErrorCorrect { request_id, .. }
            | Request::HistorySearch { request_id, .. }
            | Request::ReloadConfig { request_id }
            | Request::Unknown { request_id, .. } => request_id.as_deref(),
        }
    }

    /// Decode a single request line from a generic JSON value. Returns
    /// `None` only if `value` is not a JSON object at all (malformed-line
    /// handling happens one layer up, at JSON parsing).
    pub fn from_value(value: &Value) -> Option<Request> {
        let obj = value.as_object()?;
        let get_str = |key: &str, default: &str| -> String {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or(default)
                .to_string()
        };
        let get_opt_str = |key: &str| -> Option<String> {
            obj.get(key).and_then(Value::as_str).map(str::to_string)
        };
        let get_i64 = |key: &str, default: i64| -> i64 {
            obj.get(key).and_then(Value::as_i64).unwrap_or(default)
        };
        let get_history = |key: &str| -> Vec<String> {
            obj.get(key)
                .and_then(Value::as_array)
                .map(|arr| {
                    arr.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };

        let request_id = get_opt_str("request_id");
        let cwd = get_str("cwd", "");
        let shell = get_str("shell", "zsh");
        let history = get_history("history");

        let kind = obj.get("type").and_then(Value::as_str).unwrap_or("");
        Some(match kind {
            "complete" => Request::Complete {
                request_id,
                cwd,
                shell,
                history,
                buffer: get_str("buffer", ""),
                last_command: get_str("last_command", ""),
                last_output: get_str("last_output", ""),
                exit_status: get_i64("exit_status", 0),
            },
            "nl" => Request::Nl {
                request_id,
                cwd,
                shell,
                history,
                prompt: get_str("prompt", ""),
                buffer: get_str("buffer", ""),
            },
            "error_correct" => Request::ErrorCorrect {
                request_id,
                cwd,
                shell,
                failed_command: get_str("failed_command", ""),
                exit_status: get_i64("exit_status", 1),
                stderr: get_str("stderr", ""),
            },
            "history_search" => Request::HistorySearch {
                request_id,
                shell,
                history,
                query: get_str("query", ""),
            },
            "reload_config" => Request::ReloadConfig { request_id },
            other => Request::Unknown {
                request_id,
                kind: other.to_string(),
            },
        })
    }
}

/// A server response, ready to be newline-framed and written to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    #[serde(rename = "complete")]
    Complete {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        suggestion: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    #[serde(rename = "nl")]
    Nl {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        command: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    #[serde(rename = "error_correct")]
    ErrorCorrect {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        suggestion: String,
    },
    #[serde(rename = "history_search")]
    HistorySearch {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        results: Vec<HistoryResult>,
    },
    #[serde(rename = "reload_config")]
    ReloadConfig {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "error")]
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        request_id: Option<String>,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_complete_with_defaults() {
        let v = json!({"type": "complete", "buffer": "ffmpeg"});
        let req = Request::from_value(&v).unwrap();
        match req {
            Request::Complete {
                buffer,
                shell,
                history,
                exit_status,
                ..
            } => {
                assert_eq!(buffer, "ffmpeg");
                assert_eq!(shell, "zsh");
                assert!(history.is_empty());
                assert_eq!(exit_status, 0);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn unknown_type_decodes_to_unknown() {
        let v = json!({"type": "frobnicate"});
        let req = Request::from_value(&v).unwrap();
        assert!(matches!(req, Request::Unknown { .. }));
    }

    #[test]
    fn echoes_request_id() {
        let v = json!({"type": "nl", "prompt": "list files", "request_id": "abc123"});
        let req = Request::from_value(&v).unwrap();
        assert_eq!(req.request_id(), Some("abc123"));
    }

    #[test]
    fn response_complete_omits_absent_request_id_and_warning() {
        let resp = Response::Complete {
            request_id: None,
            suggestion: "-la".to_string(),
            warning: None,
        };
        let s = serde_json::to_string(&resp).unwrap();
        assert!(!s.contains("request_id"));
        assert!(!s.contains("warning"));
        assert!(s.contains("\"type\":\"complete\""));
    }
}
