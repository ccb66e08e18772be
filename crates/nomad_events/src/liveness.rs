use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::model::UnixNanos;

/// Shared timestamp of the last heartbeat seen on the event stream.
///
/// Cloning shares the underlying value, so the filter and a watchdog task can each hold one.
#[derive(Debug, Clone)]
pub struct Liveness {
    last_seen: Arc<AtomicI64>,
}

impl Liveness {
    pub fn new(started_at: UnixNanos) -> Self {
        Self {
            last_seen: Arc::new(AtomicI64::new(started_at.as_i64())),
        }
    }

    pub fn touch(&self) {
        self.touch_at(UnixNanos::now());
    }

    pub fn touch_at(&self, at: UnixNanos) {
        self.last_seen.fetch_max(at.as_i64(), Ordering::SeqCst);
    }

    pub fn last_seen(&self) -> UnixNanos {
        UnixNanos(self.last_seen.load(Ordering::SeqCst))
    }

    /// Time since the last heartbeat, as observed at `now`.
    pub fn silence(&self, now: UnixNanos) -> Duration {
        let gap = now.saturating_sub(self.last_seen());
        Duration::from_nanos(u64::try_from(gap).unwrap_or(0))
    }

    pub fn is_stale(&self, now: UnixNanos, timeout: Duration) -> bool {
        self.silence(now) > timeout
    }
}

#[cfg(feature = "tokio")]
mod watchdog {
    use std::time::Duration;

    use tokio::task::JoinHandle;

    use super::Liveness;
    use crate::model::UnixNanos;

    /// Fires once the stream has gone without a heartbeat for longer than `timeout`.
    #[derive(Debug, Clone)]
    pub struct Watchdog {
        liveness: Liveness,
        timeout: Duration,
        check_interval: Duration,
    }

    impl Watchdog {
        pub fn new(liveness: Liveness, timeout: Duration) -> Self {
            let check_interval = (timeout / 4).max(Duration::from_millis(10));
            Self {
                liveness,
                timeout,
                check_interval,
            }
        }

        pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
            self.check_interval = check_interval;
            self
        }

        /// Resolves with the observed silence once the liveness timestamp goes stale.
        pub async fn expired(&self) -> Duration {
            let mut ticker = tokio::time::interval(self.check_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let silence = self.liveness.silence(UnixNanos::now());
                if silence > self.timeout {
                    tracing::warn!(
                        silence_ms = silence.as_millis() as u64,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "no heartbeat received within timeout"
                    );
                    return silence;
                }
            }
        }

        pub fn spawn(self) -> JoinHandle<Duration> {
            tokio::spawn(async move { self.expired().await })
        }
    }

}

#[cfg(feature = "tokio")]
pub use watchdog::Watchdog;
