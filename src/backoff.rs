//! Exponential backoff with cap and jitter.

use std::time::Duration;

/// Delay curve applied between retryable attempts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    /// Delay after the first failed attempt.
    pub base: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Growth factor per attempt. Must be at least `1.0`.
    pub multiplier: f64,
    /// Fraction in `[0, 1]` of the delay that may be randomly shaved off.
    pub jitter: f64,
}

impl Backoff {
    /// No waiting between attempts.
    pub const fn none() -> Self {
        Self {
            base: Duration::ZERO,
            max: Duration::ZERO,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    /// Doubling curve from `base` up to `max` with 20% jitter.
    pub const fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            multiplier: 2.0,
            jitter: 0.2,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Capped delay before the attempt following `attempt`, without jitter.
    ///
    /// `attempt` is the 1-based index of the attempt that just failed.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.base.as_secs_f64() * self.multiplier.powi(exp);
        let max = self.max.as_secs_f64();
        if !scaled.is_finite() || scaled >= max {
            return self.max;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Delay before the attempt following `attempt`, with jitter applied.
    ///
    /// Jitter only shortens the delay, so the result stays within
    /// `[ceiling * (1 - jitter), ceiling]`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if self.jitter <= 0.0 || ceiling.is_zero() {
            return ceiling;
        }
        let shave = self.jitter.min(1.0) * fastrand::f64();
        ceiling.mul_f64(1.0 - shave)
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(format!(
                "backoff multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(format!(
                "backoff jitter must be within [0, 1], got {}",
                self.jitter
            ));
        }
        if self.base > self.max {
            return Err(format!(
                "backoff base {:?} exceeds backoff max {:?}",
                self.base, self.max
            ));
        }
        Ok(())
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(250), Duration::from_secs(8))
    }
}
