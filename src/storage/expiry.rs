//! Expiration Manager
//!
//! Every key carries an [`Expiration`]. Its lifecycle is a small state
//! machine evaluated against the current time:
//!
//! ```text
//!            EXPIRE / PEXPIRE               deadline passes
//!   NO_TTL ───────────────────> TTL_SET ───────────────────> EXPIRED
//!     ▲                          │  ▲ │
//!     │         PERSIST          │  │ │ EXPIRE again
//!     └──────────────────────────┘  └─┘ (new deadline)
//! ```
//!
//! `EXPIRED` is terminal for that key instance. The store checks deadlines
//! lazily on every access, so no read ever sees an expired document. The
//! [`ExpirySweeper`] is the active half: a background task that reclaims
//! keys nobody touches again.
//!
//! ## Adaptive Frequency
//!
//! The sweeper halves its interval while a large share of keys is expiring
//! and doubles it again once sweeps come back empty, bounded by
//! `min_interval` and `max_interval`.

use crate::storage::DocumentStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Expiration attached to a key record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    #[default]
    Never,
    At(Instant),
}

/// The state of an [`Expiration`] at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryState {
    NoTtl,
    TtlSet(Instant),
    Expired,
}

impl Expiration {
    /// Deadline `ttl` from `now`, or `None` if the deadline is not representable.
    pub fn after(now: Instant, ttl: Duration) -> Option<Self> {
        now.checked_add(ttl).map(Expiration::At)
    }

    pub fn state(&self, now: Instant) -> ExpiryState {
        match *self {
            Expiration::Never => ExpiryState::NoTtl,
            Expiration::At(deadline) if now >= deadline => ExpiryState::Expired,
            Expiration::At(deadline) => ExpiryState::TtlSet(deadline),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.state(now) == ExpiryState::Expired
    }

    /// The time left, `None` if no TTL is set.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match *self {
            Expiration::Never => None,
            Expiration::At(deadline) => Some(deadline.saturating_duration_since(now)),
        }
    }
}

/// TTL report for a live key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key exists and has no TTL.
    Persistent,
    /// The key expires after this much time.
    Remaining(Duration),
}

impl Ttl {
    /// Whole seconds left, rounded up, or `-1` for a persistent key.
    pub fn as_secs(&self) -> i64 {
        match self {
            Ttl::Persistent => -1,
            Ttl::Remaining(left) => saturate(left.as_millis().div_ceil(1000)),
        }
    }

    /// Milliseconds left, or `-1` for a persistent key.
    pub fn as_millis(&self) -> i64 {
        match self {
            Ttl::Persistent => -1,
            Ttl::Remaining(left) => saturate(left.as_millis()),
        }
    }
}

fn saturate(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval the sweeper starts with (default: 100ms)
    pub base_interval: Duration,

    /// Fastest the sweeper will run (default: 10ms)
    pub min_interval: Duration,

    /// Slowest the sweeper will run (default: 1s)
    pub max_interval: Duration,

    /// Speed up when more than this fraction of keys expired in one sweep
    pub speedup_threshold: f64,

    /// Slow down when less than this fraction expired and nothing was reclaimed
    pub slowdown_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
        }
    }
}

impl ExpiryConfig {
    /// The interval to wait after a sweep that reclaimed `expired` of
    /// `keys_before` keys.
    pub fn next_interval(&self, current: Duration, expired: u64, keys_before: u64) -> Duration {
        if keys_before == 0 {
            return current;
        }
        let rate = expired as f64 / keys_before as f64;
        if rate > self.speedup_threshold {
            (current / 2).max(self.min_interval)
        } else if rate < self.slowdown_threshold && expired == 0 {
            (current * 2).min(self.max_interval)
        } else {
            current
        }
    }
}

/// A handle to the running expiry sweeper.
///
/// Dropping the handle stops the background task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current tokio runtime.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use patchkv::storage::{DocumentStore, ExpiryConfig, ExpirySweeper};
    /// use std::sync::Arc;
    ///
    /// let store = Arc::new(DocumentStore::new());
    /// let sweeper = ExpirySweeper::start(Arc::clone(&store), ExpiryConfig::default());
    ///
    /// // ...
    ///
    /// drop(sweeper);
    /// ```
    pub fn start(store: Arc<DocumentStore>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(store, config, shutdown_rx));

        info!("Background expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("Background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    store: Arc<DocumentStore>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let keys_before = store.len();
        let expired = store.purge_expired();

        let next = config.next_interval(current_interval, expired, keys_before);
        if next < current_interval {
            debug!(
                expired = expired,
                new_interval_ms = next.as_millis(),
                "High expiry rate, speeding up sweeper"
            );
        } else if next > current_interval {
            trace!(
                new_interval_ms = next.as_millis(),
                "Low expiry rate, slowing down sweeper"
            );
        }
        current_interval = next;

        if expired > 0 {
            debug!(
                expired = expired,
                keys_remaining = store.len(),
                "Expired keys reclaimed"
            );
        }
    }
}

/// Starts the expiry sweeper with the default configuration.
pub fn start_expiry_sweeper(store: Arc<DocumentStore>) -> ExpirySweeper {
    ExpirySweeper::start(store, ExpiryConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Path, Value};

    #[test]
    fn test_expiration_states() {
        let now = Instant::now();
        assert_eq!(Expiration::Never.state(now), ExpiryState::NoTtl);

        let later = now + Duration::from_secs(5);
        assert_eq!(Expiration::At(later).state(now), ExpiryState::TtlSet(later));
        assert_eq!(Expiration::At(later).state(later), ExpiryState::Expired);
        assert!(Expiration::after(now, Duration::ZERO).unwrap().is_expired(now));
        assert_eq!(Expiration::after(now, Duration::MAX), None);
    }

    #[test]
    fn test_remaining_and_ttl_rounding() {
        let now = Instant::now();
        let expiration = Expiration::after(now, Duration::from_millis(1500)).unwrap();
        let left = expiration.remaining(now).unwrap();
        assert_eq!(Ttl::Remaining(left).as_secs(), 2);
        assert_eq!(Ttl::Remaining(left).as_millis(), 1500);
        assert_eq!(Ttl::Persistent.as_secs(), -1);
        assert_eq!(Expiration::Never.remaining(now), None);
    }

    #[test]
    fn test_huge_ttl_reports_saturate() {
        let left = Duration::from_millis(i64::MAX as u64 - 1);
        assert_eq!(Ttl::Remaining(left).as_millis(), i64::MAX - 1);
        assert_eq!(Ttl::Remaining(left).as_secs(), (i64::MAX - 1) / 1000 + 1);

        let beyond = Duration::from_secs(u64::MAX);
        assert_eq!(Ttl::Remaining(beyond).as_millis(), i64::MAX);
        assert_eq!(Ttl::Remaining(beyond).as_secs(), i64::MAX);
    }

    #[test]
    fn test_next_interval() {
        let config = ExpiryConfig::default();
        let base = config.base_interval;

        assert_eq!(config.next_interval(base, 0, 0), base);
        assert_eq!(config.next_interval(base, 50, 100), base / 2);
        assert_eq!(config.next_interval(base, 0, 100), base * 2);
        assert_eq!(config.next_interval(base, 5, 100), base);
        assert_eq!(
            config.next_interval(config.min_interval, 100, 100),
            config.min_interval
        );
        assert_eq!(
            config.next_interval(config.max_interval, 0, 100),
            config.max_interval
        );
    }

    #[tokio::test]
    async fn test_sweeper_reclaims_expired_keys() {
        let store = Arc::new(DocumentStore::new());
        let root = Path::root();

        for i in 0..10 {
            let key = format!("session:{}", i);
            store.set(&key, &root, Value::from(i)).unwrap();
            store.expire(&key, Duration::from_millis(50));
        }
        store.set("persistent", &root, Value::from(true)).unwrap();
        assert_eq!(store.len(), 11);

        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };
        let _sweeper = ExpirySweeper::start(Arc::clone(&store), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(store.len(), 1);
        assert!(store.exists("persistent"));
        assert!(store.stats().expired >= 10);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let store = Arc::new(DocumentStore::new());
        let config = ExpiryConfig {
            base_interval: Duration::from_millis(10),
            ..Default::default()
        };

        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&store), config);
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        store.set("k", &Path::root(), Value::from(1)).unwrap();
        store.expire("k", Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;

        // Nobody reclaimed it, but reads still treat it as absent.
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k", &Path::root()).unwrap(), None);
    }
}
