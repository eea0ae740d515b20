//! Process-wide sliding-window rate limiter, applied only to `complete`
//! requests (autocomplete is high-volume; the other kinds are not).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);
const DEFAULT_RPM: usize = 60;

pub struct RateLimiter {
    rpm: usize,
    timestamps: VecDeque<Instant>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RPM)
    }
}

impl RateLimiter {
    pub fn new(rpm: usize) -> Self {
        Self {
            rpm,
            timestamps: VecDeque::new(),
        }
    }

    /// Evict timestamps older than the window, then admit the request if
    /// under the limit.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        while let Some(&front) = self.timestamps.front() {
            if now.duration_since(front) > WINDOW {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        if self.timestamps.len() >= self.rpm {
            return false;
        }
        self.timestamps.push_back(now);
        true
    }
}
