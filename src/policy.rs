use std::time::Duration;

use crate::{backoff::Backoff, Result, TransportError};

/// Attempt count used by the legacy blanket policy (1 try + 6 retries).
pub const LEGACY_MAX_ATTEMPTS: u32 = 7;

/// Per-attempt timeout used by the legacy blanket policy.
pub const LEGACY_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a request may be resent after a failure whose delivery is unknown.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RetrySafety {
    /// Reads and other calls with no server-side effect.
    #[default]
    SafeToRetry,
    /// Money movement and state changes. Resent only when the request
    /// carries an idempotency key or the failure proves it was never processed.
    RequiresIdempotencyKey,
}

/// Immutable retry configuration for one logical call.
///
/// Construct through [`RetryPolicy::builder`] or a preset; both validate
/// before any request is issued.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    per_attempt_timeout: Duration,
    backoff: Backoff,
    safety: RetrySafety,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// The uniform policy every operation historically used: 7 attempts,
    /// 30 s each, no backoff, retried regardless of the operation.
    pub fn legacy() -> Self {
        Self {
            max_attempts: LEGACY_MAX_ATTEMPTS,
            per_attempt_timeout: LEGACY_ATTEMPT_TIMEOUT,
            backoff: Backoff::none(),
            safety: RetrySafety::SafeToRetry,
        }
    }

    /// Policy for lookups and other side-effect-free calls.
    pub fn read_only() -> Self {
        Self {
            max_attempts: LEGACY_MAX_ATTEMPTS,
            per_attempt_timeout: LEGACY_ATTEMPT_TIMEOUT,
            backoff: Backoff::default(),
            safety: RetrySafety::SafeToRetry,
        }
    }

    /// Policy for transfers, locks and other state-changing calls.
    pub fn money_movement() -> Self {
        Self {
            safety: RetrySafety::RequiresIdempotencyKey,
            ..Self::read_only()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn safety(&self) -> RetrySafety {
        self.safety
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::read_only()
    }
}

/// Builder for [`RetryPolicy`]. Starts from [`RetryPolicy::read_only`].
#[derive(Clone, Debug)]
pub struct RetryPolicyBuilder {
    max_attempts: u32,
    per_attempt_timeout: Duration,
    backoff: Backoff,
    safety: RetrySafety,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        let base = RetryPolicy::read_only();
        Self {
            max_attempts: base.max_attempts,
            per_attempt_timeout: base.per_attempt_timeout,
            backoff: base.backoff,
            safety: base.safety,
        }
    }
}

impl RetryPolicyBuilder {
    /// Total attempts including the first one.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = timeout;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn safety(mut self, safety: RetrySafety) -> Self {
        self.safety = safety;
        self
    }

    /// Validates and freezes the policy.
    pub fn build(self) -> Result<RetryPolicy> {
        if self.max_attempts == 0 {
            return Err(TransportError::InvalidPolicy(
                "max_attempts must be at least 1".to_owned(),
            ));
        }
        if self.per_attempt_timeout.is_zero() {
            return Err(TransportError::InvalidPolicy(
                "per_attempt_timeout must be greater than zero".to_owned(),
            ));
        }
        self.backoff.validate().map_err(TransportError::InvalidPolicy)?;

        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            per_attempt_timeout: self.per_attempt_timeout,
            backoff: self.backoff,
            safety: self.safety,
        })
    }
}
