use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Expired windows are swept once the map grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    attempts: u32,
}

/// Fixed-window limit on login attempts per key.
///
/// An attempt is reserved before the password is checked, so concurrent
/// requests for the same key cannot all slip past the limit. A successful
/// login calls [`AttemptLimiter::reset`].
pub struct AttemptLimiter {
    max_attempts: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl AttemptLimiter {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        AttemptLimiter {
            max_attempts,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves one attempt for `key`. Returns false once the window is used up.
    pub fn try_begin(&self, key: &str) -> bool {
        self.try_begin_at(key, Instant::now())
    }

    pub fn reset(&self, key: &str) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    fn try_begin_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if windows.len() >= PRUNE_THRESHOLD && !windows.contains_key(key) {
            let span = self.window;
            windows.retain(|_, window| now.duration_since(window.started) < span);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            attempts: 0,
        });
        if now.duration_since(window.started) >= self.window {
            window.started = now;
            window.attempts = 0;
        }
        if window.attempts >= self.max_attempts {
            return false;
        }
        window.attempts += 1;
        true
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
