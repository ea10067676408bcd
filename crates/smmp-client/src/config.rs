//! Client configuration.

use std::time::Duration;

/// Default first retransmission delay.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Default retransmission delay ceiling. Once the doubled delay would
/// exceed this, the delivery expires instead of rescheduling.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(600);

/// Default backoff multiplier.
pub const DEFAULT_MULTIPLIER: u32 = 2;

/// Default capacity of the duplicate-delivery suppression window.
pub const DEFAULT_DEDUP_CAPACITY: usize = 4096;

/// Default time-to-live for tracked deliveries whose sender gave none.
///
/// Must outlast [`RetryPolicy::schedule_span`] of the default schedule,
/// whose final resend fires 635 seconds after the initial send; a
/// shorter default would expire the delivery before its last
/// retransmission.
pub const DEFAULT_TTL: Duration = Duration::from_secs(660);

/// Exponential backoff schedule for retransmissions.
///
/// With the defaults a tracked message is resent at 5, 10, 20, 40, 80,
/// 160 and 320 seconds after the initial send, then expires.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retransmission.
    pub initial_delay: Duration,
    /// Ceiling on the retransmission delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after each retransmission.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// The delay to use after a retransmission that waited `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(self.multiplier.max(1))
    }

    /// Time from the initial send to the final scheduled resend.
    ///
    /// A delivery's time-to-live should exceed this, otherwise the tail
    /// of the schedule never runs. With a multiplier of 1 or less the
    /// delay never reaches the ceiling, so the span is unbounded.
    pub fn schedule_span(&self) -> Duration {
        if self.multiplier <= 1 {
            return Duration::MAX;
        }
        let mut span = Duration::ZERO;
        let mut delay = self.initial_delay;
        while delay <= self.max_delay {
            span += delay;
            delay = self.next_delay(delay);
        }
        span
    }
}

/// Tunable parameters for an SMMP connection.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Retransmission schedule for acknowledged sends.
    pub retry: RetryPolicy,
    /// Size of the duplicate-delivery suppression window.
    pub dedup_capacity: usize,
    /// Time-to-live applied to tracked deliveries sent without one.
    pub default_ttl: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfig {
    /// Configuration with the production defaults.
    pub fn new() -> Self {
        Self {
            retry: RetryPolicy::default(),
            dedup_capacity: DEFAULT_DEDUP_CAPACITY,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Replace the retransmission schedule.
    ///
    /// Keep `default_ttl` longer than the new policy's
    /// [`schedule_span`](RetryPolicy::schedule_span), or set per-send
    /// deadlines accordingly.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the duplicate suppression window size.
    pub fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    /// Replace the default delivery time-to-live.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schedule_expires_after_seven_resends() {
        let policy = RetryPolicy::default();
        let mut delay = policy.initial_delay;
        let mut resends = 0;
        while delay <= policy.max_delay {
            resends += 1;
            delay = policy.next_delay(delay);
        }
        assert_eq!(resends, 7);
    }

    #[test]
    fn default_ttl_outlasts_the_backoff_schedule() {
        // 5 + 10 + 20 + 40 + 80 + 160 + 320 seconds to the last resend.
        let span = RetryPolicy::default().schedule_span();
        assert_eq!(span, Duration::from_secs(635));
        assert!(DEFAULT_TTL > span);
    }

    #[test]
    fn schedule_span_is_unbounded_without_growth() {
        let policy = RetryPolicy {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(600),
            multiplier: 1,
        };
        assert_eq!(policy.schedule_span(), Duration::MAX);
    }

    #[test]
    fn builders_override_defaults() {
        let config = ClientConfig::new()
            .with_dedup_capacity(16)
            .with_default_ttl(Duration::from_secs(30))
            .with_retry(RetryPolicy {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(80),
                multiplier: 2,
            });
        assert_eq!(config.dedup_capacity, 16);
        assert_eq!(config.default_ttl, Duration::from_secs(30));
        assert_eq!(config.retry.initial_delay, Duration::from_millis(10));
    }
}
