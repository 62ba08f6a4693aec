use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Counts failed attempts per key (a lowercased email) inside a fixed window.
pub struct AttemptLimiter {
    /// key -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    max_failures: u32,
    window: Duration,
}

impl AttemptLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// 5 failures per 15 minutes.
    pub fn for_logins() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// 5 wrong OTPs per 15 minutes.
    pub fn for_otps() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }

    /// Ok if another attempt is allowed, otherwise the seconds until the
    /// window resets. Does not count the attempt; call `record_failure()`.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();

        let Some(entry) = self.entries.get(&key.to_lowercase()) else {
            return Ok(());
        };

        let (count, start) = entry.value();

        if now.duration_since(*start) > self.window {
            return Ok(());
        }

        if *count >= self.max_failures {
            let elapsed = now.duration_since(*start).as_secs();
            return Err(self.window.as_secs().saturating_sub(elapsed));
        }

        Ok(())
    }

    pub fn record_failure(&self, key: &str) {
        let now = Instant::now();

        let mut entry = self.entries.entry(key.to_lowercase()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    pub fn reset(&self, key: &str) {
        self.entries.remove(&key.to_lowercase());
    }

    /// Drop entries whose window has passed.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window;
        self.entries.retain(|_, (_, start)| now.duration_since(*start) < window);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_max_failures() {
        let limiter = AttemptLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("Someone@Example.com").is_ok());
            limiter.record_failure("someone@example.com");
        }
        let retry_after = limiter.check("SOMEONE@example.com").unwrap_err();
        assert!(retry_after <= 60);
        assert!(limiter.check("other@example.com").is_ok());
    }

    #[test]
    fn reset_clears_the_key() {
        let limiter = AttemptLimiter::new(1, Duration::from_secs(60));
        limiter.record_failure("a@example.com");
        assert!(limiter.check("a@example.com").is_err());
        limiter.reset("a@example.com");
        assert!(limiter.check("a@example.com").is_ok());
    }

    #[test]
    fn expired_windows_are_forgotten() {
        let limiter = AttemptLimiter::new(1, Duration::ZERO);
        limiter.record_failure("a@example.com");
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("a@example.com").is_ok());
        limiter.cleanup();
        assert!(limiter.is_empty());
    }
}
