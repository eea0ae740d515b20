//! `shellassistd` — persistent, user-local shell-assistant daemon.
//!
//! No command-line flags are part of the core (spec.md §6): the daemon is
//! started with no arguments by its external CLI collaborator and
//! terminates on `SIGTERM`/`SIGINT` or after 30 minutes idle.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use shellassist_core::config::{config_dir, default_config_path, pid_path, socket_path, ConfigHandle, ConfigView};
use shellassist_core::facade::LlmFacade;
use shellassist_core::rate_limit::RateLimiter;
use shellassist_core::session::SessionBuffer;

use shellassistd::provider::ProviderAdapter;
use shellassistd::server;
use shellassistd::state::AppState;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    std::fs::create_dir_all(config_dir())?;
    let config_path = default_config_path();
    let config = ConfigView::load(&config_path)?;
    tracing::info!(
        provider = ?config.provider.name,
        model = %config.provider.model,
        "loaded configuration"
    );

    let config_handle = Arc::new(ConfigHandle::new(config));
    let facade = LlmFacade::new(Arc::new(ProviderAdapter::default()), config_handle);

    let state = Arc::new(AppState {
        facade,
        session: Mutex::new(SessionBuffer::new()),
        rate_limiter: Mutex::new(RateLimiter::default()),
        last_activity: Mutex::new(Instant::now()),
        config_path,
    });

    server::run(state, socket_path(), pid_path()).await
}
