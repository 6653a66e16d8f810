//! Clock & Nonce Store: replay detection and the admission rate window.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::VecDeque;
use uuid::Uuid;

use warden_types::RejectionKind;

const NONCE_CACHE_CAPACITY: usize = 1000;
const RATE_WINDOW_SECONDS: i64 = 60;
const RATE_WINDOW_CAPACITY: usize = 100;
const FRESHNESS_TOLERANCE_SECONDS: i64 = 60;

/// The bounded in-memory replay guard. Evicted best-effort by LRU; the
/// persisted audit chain remains the authoritative idempotency ledger.
pub struct NonceCache {
    entries: Mutex<LruCache<Uuid, DateTime<Utc>>>,
}

impl Default for NonceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
        }
    }

    pub fn contains(&self, command_id: Uuid) -> bool {
        self.entries.lock().contains(&command_id)
    }

    /// Inserted only once every subsequent gate has passed, never on first
    /// sight of a `command_id`.
    pub fn insert(&self, command_id: Uuid, now: DateTime<Utc>) {
        let mut entries = self.entries.lock();
        if entries.len() >= NONCE_CACHE_CAPACITY {
            entries.pop_lru();
        }
        entries.put(command_id, now);
    }
}

/// Sliding 60-second admission-attempt window.
pub struct RateWindow {
    attempts: Mutex<VecDeque<DateTime<Utc>>>,
}

impl Default for RateWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl RateWindow {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(VecDeque::new()),
        }
    }

    /// Records one admission attempt at `now`, rejecting with
    /// `RATE_LIMITED` once the window is already at capacity.
    pub fn check_and_record(&self, now: DateTime<Utc>) -> Result<(), RejectionKind> {
        let mut attempts = self.attempts.lock();
        let cutoff = now - ChronoDuration::seconds(RATE_WINDOW_SECONDS);
        while attempts.front().map(|t| *t <= cutoff).unwrap_or(false) {
            attempts.pop_front();
        }
        if attempts.len() >= RATE_WINDOW_CAPACITY {
            return Err(RejectionKind::RateLimited);
        }
        attempts.push_back(now);
        Ok(())
    }
}

/// `now()` view plus the bounded nonce cache and rate window.
pub struct Freshness {
    pub nonces: NonceCache,
    pub rate_window: RateWindow,
}

impl Default for Freshness {
    fn default() -> Self {
        Self::new()
    }
}

impl Freshness {
    pub fn new() -> Self {
        Self {
            nonces: NonceCache::new(),
            rate_window: RateWindow::new(),
        }
    }

    pub fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Checks `issued_at`/`expires_at` against `now`: `|now − issued_at| =
    /// 60 s` is accepted; more than that is rejected as skewed.
    pub fn check_temporal(
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RejectionKind> {
        let tolerance = ChronoDuration::seconds(FRESHNESS_TOLERANCE_SECONDS);

        if issued_at - now > tolerance {
            return Err(RejectionKind::Skewed);
        }
        if now >= expires_at {
            return Err(RejectionKind::Expired);
        }
        if now - issued_at > tolerance {
            return Err(RejectionKind::Expired);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_sixty_seconds_future_is_accepted() {
        let now = Utc::now();
        let issued_at = now + ChronoDuration::seconds(60);
        let expires_at = now + ChronoDuration::minutes(5);
        assert!(Freshness::check_temporal(issued_at, expires_at, now).is_ok());
    }

    #[test]
    fn past_sixty_seconds_future_is_skewed() {
        let now = Utc::now();
        let issued_at = now + ChronoDuration::seconds(61);
        let expires_at = now + ChronoDuration::minutes(5);
        assert_eq!(
            Freshness::check_temporal(issued_at, expires_at, now),
            Err(RejectionKind::Skewed)
        );
    }

    #[test]
    fn past_expiry_is_expired() {
        let now = Utc::now();
        let issued_at = now - ChronoDuration::minutes(10);
        let expires_at = now - ChronoDuration::seconds(1);
        assert_eq!(
            Freshness::check_temporal(issued_at, expires_at, now),
            Err(RejectionKind::Expired)
        );
    }

    #[test]
    fn rate_window_accepts_up_to_capacity_then_rejects() {
        let window = RateWindow::new();
        let now = Utc::now();
        for _ in 0..100 {
            assert!(window.check_and_record(now).is_ok());
        }
        assert_eq!(window.check_and_record(now), Err(RejectionKind::RateLimited));
    }

    #[test]
    fn nonce_cache_round_trips() {
        let cache = NonceCache::new();
        let id = Uuid::new_v4();
        assert!(!cache.contains(id));
        cache.insert(id, Utc::now());
        assert!(cache.contains(id));
    }
}
