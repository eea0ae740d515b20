//! Shared daemon state: everything a connection handler needs to dispatch a
//! request. Each piece of mutable shared state is a separate mutex, per
//! spec.md §5 — contention is negligible since every operation is O(1)
//! relative to its own bounded state.

use std::sync::Mutex;
use std::time::Instant;

use shellassist_core::facade::LlmFacade;
use shellassist_core::rate_limit::RateLimiter;
use shellassist_core::session::SessionBuffer;

pub struct AppState {
    pub facade: LlmFacade,
    pub session: Mutex<SessionBuffer>,
    pub rate_limiter: Mutex<RateLimiter>,
    pub last_activity: Mutex<Instant>,
    pub config_path: std::path::PathBuf,
}

impl AppState {
    pub fn touch_activity(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> std::time::Duration {
        self.last_activity.lock().unwrap().elapsed()
    }
}
