use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

const WINDOW_SECS: i64 = 120;
const MAX_ATTEMPTS: u32 = 3;
const MAX_TRACKED_CLIENTS: usize = 10_000;

#[derive(Clone, Debug)]
struct Window {
    started: i64,
    count: u32,
}

/// Per-client submission gate: at most `max_attempts` admissions per
/// `window_secs` window. The async mutex serializes concurrent checks for
/// the same key, so a burst can never admit more than the cap.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window_secs: i64,
    max_attempts: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_policy(WINDOW_SECS, MAX_ATTEMPTS)
    }

    pub fn with_policy(window_secs: i64, max_attempts: u32) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window_secs,
            max_attempts,
        }
    }

    pub async fn admit(&self, key: &str) -> bool {
        self.admit_at(key, Utc::now().timestamp()).await
    }

    /// Admission check at an explicit clock reading. An expired window is
    /// restarted at count 1; a rejection neither resets nor extends the
    /// current window.
    pub async fn admit_at(&self, key: &str, now: i64) -> bool {
        let mut windows = self.windows.lock().await;
        if windows.len() > MAX_TRACKED_CLIENTS {
            let horizon = now - self.window_secs;
            windows.retain(|_, w| w.started > horizon);
        }
        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now - entry.started >= self.window_secs {
            entry.started = now;
            entry.count = 0;
        }
        if entry.count >= self.max_attempts {
            return false;
        }
        entry.count += 1;
        true
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn fourth_attempt_in_window_is_rejected() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.admit_at("10.0.0.1", 1_000).await);
        }
        assert!(!limiter.admit_at("10.0.0.1", 1_000).await);
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.admit_at("10.0.0.1", 1_000).await);
        }
        assert!(!limiter.admit_at("10.0.0.1", 1_119).await);
        // now >= started + 120: a fresh window opens and admits again
        assert!(limiter.admit_at("10.0.0.1", 1_120).await);
    }

    #[tokio::test]
    async fn rejections_do_not_extend_the_window() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.admit_at("10.0.0.1", 1_000).await);
        }
        // hammering at the end of the window must not push expiry out
        for _ in 0..5 {
            assert!(!limiter.admit_at("10.0.0.1", 1_119).await);
        }
        assert!(limiter.admit_at("10.0.0.1", 1_120).await);
    }

    #[tokio::test]
    async fn keys_are_tracked_independently() {
        let limiter = RateLimiter::new();
        for _ in 0..3 {
            assert!(limiter.admit_at("10.0.0.1", 1_000).await);
        }
        assert!(!limiter.admit_at("10.0.0.1", 1_000).await);
        assert!(limiter.admit_at("10.0.0.2", 1_000).await);
    }

    #[tokio::test]
    async fn oversize_table_sweeps_expired_entries() {
        let limiter = RateLimiter::new();
        for i in 0..=MAX_TRACKED_CLIENTS {
            limiter.admit_at(&format!("client-{}", i), 1_000).await;
        }
        assert!(limiter.tracked_clients().await > MAX_TRACKED_CLIENTS);
        // every entry above has expired by now, so the sweep empties the
        // table before inserting the new key
        assert!(limiter.admit_at("fresh-client", 1_000 + WINDOW_SECS).await);
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[tokio::test]
    async fn concurrent_burst_never_admits_more_than_the_cap() {
        let limiter = Arc::new(RateLimiter::new());
        let mut tasks = Vec::new();
        for _ in 0..20 {
            let limiter = limiter.clone();
            tasks.push(tokio::spawn(
                async move { limiter.admit("10.0.0.1").await },
            ));
        }
        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 3);
    }
}
