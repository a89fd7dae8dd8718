//! Per-adapter pacing policy.
//!
//! A [`RateGovernor`] tracks two independent streaks for one adapter run:
//! consecutive throttle responses and consecutive duplicate saves. Throttles
//! escalate from a growing backoff to a fatal stop; duplicates escalate to an
//! early "source already synced" stop.

use rand::Rng;
use std::time::Duration;

use crate::config::{PacingConfig, SleepWindow};

/// What the caller should do after a throttle response.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleDecision {
    /// Sleep for the given duration, then retry the same request.
    Backoff(Duration),
    /// Too many throttles in a row; abandon the adapter run.
    Fatal,
}

#[derive(Debug, Clone)]
pub struct RateGovernor {
    consecutive_throttles: u32,
    consecutive_duplicates: u32,
    max_throttles: u32,
    duplicate_threshold: u32,
    backoff: SleepWindow,
}

impl RateGovernor {
    pub fn new(pacing: &PacingConfig) -> Self {
        Self {
            consecutive_throttles: 0,
            consecutive_duplicates: 0,
            max_throttles: pacing.max_consecutive_throttles,
            duplicate_threshold: pacing.duplicate_stop_threshold,
            backoff: pacing.backoff,
        }
    }

    pub fn consecutive_throttles(&self) -> u32 {
        self.consecutive_throttles
    }

    pub fn consecutive_duplicates(&self) -> u32 {
        self.consecutive_duplicates
    }

    /// Any non-throttled response clears the throttle streak.
    pub fn record_response(&mut self) {
        self.consecutive_throttles = 0;
    }

    /// Register a 403/429. Fatal once the streak exceeds the threshold;
    /// otherwise the backoff is a random base scaled by the streak length.
    pub fn record_throttle(&mut self) -> ThrottleDecision {
        self.consecutive_throttles += 1;
        if self.consecutive_throttles > self.max_throttles {
            return ThrottleDecision::Fatal;
        }
        let base = jitter(self.backoff);
        ThrottleDecision::Backoff(base * self.consecutive_throttles)
    }

    /// Register the result of one save. A new insert clears the duplicate streak.
    pub fn record_save(&mut self, inserted: bool) {
        if inserted {
            self.consecutive_duplicates = 0;
        } else {
            self.consecutive_duplicates += 1;
        }
    }

    /// True once enough duplicates in a row suggest the rest is a re-scan.
    pub fn check_duplicate_stop(&self) -> bool {
        self.consecutive_duplicates >= self.duplicate_threshold
    }
}

/// A uniformly random duration inside `window`.
pub fn jitter(window: SleepWindow) -> Duration {
    if window.max_secs <= window.min_secs {
        return Duration::from_secs_f64(window.min_secs.max(0.0));
    }
    let secs = rand::rng().random_range(window.min_secs..=window.max_secs);
    Duration::from_secs_f64(secs)
}

/// Sleep for a random duration inside `window`. Zero windows return at once.
pub async fn pause(window: SleepWindow) {
    let delay = jitter(window);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_pacing() -> PacingConfig {
        PacingConfig {
            backoff: SleepWindow::new(1.0, 2.0),
            ..PacingConfig::default()
        }
    }

    #[test]
    fn fourth_consecutive_throttle_is_fatal() {
        let mut governor = RateGovernor::new(&quick_pacing());
        for _ in 0..3 {
            assert!(matches!(governor.record_throttle(), ThrottleDecision::Backoff(_)));
        }
        assert_eq!(governor.record_throttle(), ThrottleDecision::Fatal);
    }

    #[test]
    fn success_resets_throttle_streak() {
        let mut governor = RateGovernor::new(&quick_pacing());
        for _ in 0..3 {
            governor.record_throttle();
        }
        governor.record_response();
        assert_eq!(governor.consecutive_throttles(), 0);
        assert!(matches!(governor.record_throttle(), ThrottleDecision::Backoff(_)));
    }

    #[test]
    fn backoff_grows_with_streak() {
        let mut governor = RateGovernor::new(&quick_pacing());
        let ThrottleDecision::Backoff(first) = governor.record_throttle() else {
            panic!("expected backoff");
        };
        governor.record_throttle();
        let ThrottleDecision::Backoff(third) = governor.record_throttle() else {
            panic!("expected backoff");
        };
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_secs(2));
        assert!(third >= Duration::from_secs(3) && third <= Duration::from_secs(6));
    }

    #[test]
    fn fifty_duplicates_trigger_stop() {
        let mut governor = RateGovernor::new(&quick_pacing());
        for _ in 0..49 {
            governor.record_save(false);
        }
        assert!(!governor.check_duplicate_stop());
        governor.record_save(false);
        assert!(governor.check_duplicate_stop());
    }

    #[test]
    fn new_save_resets_duplicate_streak() {
        let mut governor = RateGovernor::new(&quick_pacing());
        for _ in 0..49 {
            governor.record_save(false);
        }
        governor.record_save(true);
        assert_eq!(governor.consecutive_duplicates(), 0);
        assert!(!governor.check_duplicate_stop());
    }

    #[test]
    fn counters_are_independent() {
        let mut governor = RateGovernor::new(&quick_pacing());
        governor.record_throttle();
        governor.record_throttle();
        for _ in 0..10 {
            governor.record_save(false);
        }
        governor.record_save(true);
        assert_eq!(governor.consecutive_throttles(), 2);

        governor.record_response();
        assert_eq!(governor.consecutive_duplicates(), 0);
        governor.record_save(false);
        governor.record_response();
        assert_eq!(governor.consecutive_duplicates(), 1);
    }

    #[test]
    fn zero_window_has_no_delay() {
        assert!(jitter(SleepWindow::zero()).is_zero());
        let d = jitter(SleepWindow::new(0.5, 0.75));
        assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(750));
    }
}
