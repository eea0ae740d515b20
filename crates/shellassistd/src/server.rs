//! Socket server (C10): binds the local stream socket, accepts connections,
//! frames request/response lines, and runs the idle-shutdown watchdog.
//! Grounded in `astrid-kernel/src/socket.rs`'s bind/stale-cleanup/per-
//! connection-`tokio::spawn` shape, generalized from its length-prefixed
//! binary framing to this daemon's newline-delimited JSON framing.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use crate::dispatcher::dispatch_line;
use crate::state::AppState;

const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const IDLE_SHUTDOWN_AFTER: Duration = Duration::from_secs(30 * 60);
const SOCKET_MODE: u32 = 0o600;

/// Remove a stale socket file left behind by a crashed previous instance.
fn unlink_stale(path: &Path) {
    if path.exists() {
        if let Err(e) = std::fs::remove_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove stale socket");
        }
    }
}

fn write_pid_file(path: &Path) -> std::io::Result<()> {
    std::fs::write(path, std::process::id().to_string())
}

/// Bind the socket, write the PID file, and run the accept loop until a
/// shutdown signal or idle timeout fires. Cleans up both files on the way
/// out.
pub async fn run(state: Arc<AppState>, socket_path: PathBuf, pid_path: PathBuf) -> anyhow::Result<()> {
    unlink_stale(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket_path)?;
    std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(SOCKET_MODE))?;
    write_pid_file(&pid_path)?;
    tracing::info!(path = %socket_path.display(), "listening on local socket");

    let result = accept_loop(state, listener).await;

    let _ = std::fs::remove_file(&socket_path);
    let _ = std::fs::remove_file(&pid_path);
    tracing::info!("socket and PID file removed, daemon stopped");
    result
}

async fn accept_loop(state: Arc<AppState>, listener: UnixListener) -> anyhow::Result<()> {
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut idle_ticker = tokio::time::interval(IDLE_CHECK_INTERVAL);
    idle_ticker.tick().await; // first tick fires immediately; consume it

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let conn_state = Arc::clone(&state);
                        tokio::spawn(async move {
                            handle_connection(conn_state, stream).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept connection");
                    }
                }
            }
            _ = idle_ticker.tick() => {
                if state.idle_for() >= IDLE_SHUTDOWN_AFTER {
                    tracing::info!("idle timeout reached, shutting down");
                    return Ok(());
                }
            }
            () = &mut shutdown => {
                tracing::info!("shutdown signal received, draining connections");
                return Ok(());
            }
        }
    }
}

/// Requests on one connection are processed strictly in order: the next
/// line isn't read until the previous response has been written, and no
/// response is emitted for malformed lines. The connection lives until the
/// client closes it or an I/O error occurs.
async fn handle_connection(state: Arc<AppState>, stream: UnixStream) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "connection read error");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = dispatch_line(&state, &line).await {
            let mut payload = match serde_json::to_string(&response) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to serialize response");
                    continue;
                }
            };
            payload.push('\n');
            if let Err(e) = write_half.write_all(payload.as_bytes()).await {
                tracing::warn!(error = %e, "connection write error");
                break;
            }
        }
    }
}

#[cfg(unix)]
fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    use tokio::signal::unix::{signal, SignalKind};
    async move {
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shellassist_core::config::{ConfigHandle, ConfigView, ProviderConfig, ProviderName, UiConfig};
    use shellassist_core::facade::LlmFacade;
    use shellassist_core::provider::{ChatMessage, ProviderClient, ProviderError, Timeouts};
    use shellassist_core::rate_limit::RateLimiter;
    use shellassist_core::session::SessionBuffer;
    use std::sync::Mutex;
    use std::time::Instant;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader};

    struct Echo;
    #[async_trait]
    impl ProviderClient for Echo {
        async fn call(
            &self,
            _messages: &[ChatMessage],
            _model: &str,
            _timeout: Timeouts,
            _config: &ConfigView,
        ) -> Result<String, ProviderError> {
            Ok("ls -la".to_string())
        }
    }

    fn test_state() -> Arc<AppState> {
        let config = ConfigView {
            provider: ProviderConfig {
                name: ProviderName::Openai,
                api_key: String::new(),
                api_base_url: String::new(),
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
        };
        Arc::new(AppState {
            facade: LlmFacade::new(Arc::new(Echo), Arc::new(ConfigHandle::new(config))),
            session: Mutex::new(SessionBuffer::new()),
            rate_limiter: Mutex::new(RateLimiter::default()),
            last_activity: Mutex::new(Instant::now()),
            config_path: PathBuf::from("/nonexistent/shellassist-test.toml"),
        })
    }

    #[tokio::test]
    async fn two_requests_on_one_connection_get_responses_in_order() {
        let state = test_state();
        let (server_side, mut client_side) = UnixStream::pair().unwrap();

        let handle = tokio::spawn(async move {
            handle_connection(state, server_side).await;
        });

        client_side
            .write_all(b"{\"type\": \"complete\", \"buffer\": \"\", \"cwd\": \"/tmp\", \"history\": [], \"request_id\": \"1\"}\n")
            .await
            .unwrap();
        client_side
            .write_all(b"{\"type\": \"complete\", \"buffer\": \"\", \"cwd\": \"/tmp\", \"history\": [], \"request_id\": \"2\"}\n")
            .await
            .unwrap();
        client_side.shutdown().await.unwrap();

        let mut reader = TokioBufReader::new(client_side);
        let mut first = String::new();
        reader.read_line(&mut first).await.unwrap();
        let mut second = String::new();
        reader.read_line(&mut second).await.unwrap();

        assert!(first.contains("\"request_id\":\"1\""));
        assert!(second.contains("\"request_id\":\"2\""));
        handle.abort();
    }

    #[tokio::test]
    async fn malformed_line_gets_no_response_but_connection_stays_open() {
        let state = test_state();
        let (server_side, mut client_side) = UnixStream::pair().unwrap();

        let handle = tokio::spawn(async move {
            handle_connection(state, server_side).await;
        });

        client_side.write_all(b"not json\n").await.unwrap();
        client_side
            .write_all(b"{\"type\": \"complete\", \"buffer\": \"\", \"cwd\": \"/tmp\", \"history\": [], \"request_id\": \"ok\"}\n")
            .await
            .unwrap();

        let mut reader = TokioBufReader::new(client_side);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.contains("\"request_id\":\"ok\""));
        handle.abort();
    }

    #[test]
    fn socket_is_created_with_owner_only_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("shellassist.sock");
        let pid_path = dir.path().join("shellassist.pid");

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let listener = UnixListener::bind(&socket_path).unwrap();
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(SOCKET_MODE)).unwrap();
            write_pid_file(&pid_path).unwrap();
            drop(listener);
        });

        let meta = std::fs::metadata(&socket_path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, SOCKET_MODE);
        assert!(pid_path.exists());
    }
}
