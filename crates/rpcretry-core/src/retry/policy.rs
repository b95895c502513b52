use std::collections::BTreeSet;
use std::time::Duration;

use super::error::{ValidationError, ValidationErrorKind};
use crate::status::Code;

/// Upper bound on `max_attempts`; keeps a bad document from producing a runaway loop.
pub const MAX_ATTEMPTS_CEILING: u32 = 1000;

/// Randomization applied to computed backoff delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Use the exact exponential delay (reproducible).
    #[default]
    None,
    /// Draw uniformly from `[0, delay]`.
    Full,
}

/// Immutable retry policy, validated at construction.
///
/// Built once (usually from a service-config document) and shared read-only
/// across calls, typically behind an `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    backoff_multiplier: f64,
    retryable_codes: BTreeSet<Code>,
    jitter: Jitter,
}

impl RetryPolicy {
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Single-attempt policy used when no retry policy applies to a method.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(100),
            backoff_multiplier: 1.0,
            retryable_codes: BTreeSet::new(),
            jitter: Jitter::None,
        }
    }

    /// Maximum number of attempts (including the first).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn retryable_codes(&self) -> &BTreeSet<Code> {
        &self.retryable_codes
    }

    pub fn is_retryable(&self, code: Code) -> bool {
        self.retryable_codes.contains(&code)
    }

    pub fn jitter(&self) -> Jitter {
        self.jitter
    }

    /// Copy of this policy with a different jitter mode.
    pub fn with_jitter(&self, jitter: Jitter) -> Self {
        Self {
            jitter,
            ..self.clone()
        }
    }
}

/// Collects raw policy fields and validates them in [`RetryPolicyBuilder::build`].
///
/// Field names in errors follow the service-config document (`maxAttempts`,
/// `initialBackoff`, ...) so they can be prefixed with the entry path.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    max_attempts: i64,
    initial_backoff: Duration,
    max_backoff: Duration,
    backoff_multiplier: f64,
    retryable_codes: BTreeSet<Code>,
    code_tokens: Vec<String>,
    jitter: Jitter,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            retryable_codes: BTreeSet::new(),
            code_tokens: Vec::new(),
            jitter: Jitter::None,
        }
    }
}

impl RetryPolicyBuilder {
    pub fn max_attempts(mut self, attempts: i64) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.max_backoff = backoff;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn retryable_code(mut self, code: Code) -> Self {
        self.retryable_codes.insert(code);
        self
    }

    pub fn retryable_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = Code>,
    {
        self.retryable_codes.extend(codes);
        self
    }

    /// Add codes by name or number; unknown tokens fail at `build`.
    pub fn retryable_code_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.code_tokens.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<RetryPolicy, ValidationError> {
        if self.max_attempts < 1 || self.max_attempts > MAX_ATTEMPTS_CEILING as i64 {
            return Err(ValidationError::new(
                "maxAttempts",
                ValidationErrorKind::OutOfRange {
                    value: self.max_attempts.to_string(),
                    expected: "1..=1000",
                },
            ));
        }
        if self.initial_backoff.is_zero() {
            return Err(ValidationError::new(
                "initialBackoff",
                ValidationErrorKind::OutOfRange {
                    value: format!("{:?}", self.initial_backoff),
                    expected: "greater than zero",
                },
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ValidationError::new(
                "backoffMultiplier",
                ValidationErrorKind::OutOfRange {
                    value: self.backoff_multiplier.to_string(),
                    expected: "finite and at least 1",
                },
            ));
        }

        let mut retryable_codes = self.retryable_codes;
        for token in &self.code_tokens {
            let code = token.parse::<Code>().map_err(|_| {
                ValidationError::new(
                    "retryableStatusCodes",
                    ValidationErrorKind::UnknownCode(token.clone()),
                )
            })?;
            retryable_codes.insert(code);
        }

        let mut max_backoff = self.max_backoff;
        if max_backoff < self.initial_backoff {
            tracing::warn!(
                initial_backoff_ms = self.initial_backoff.as_millis() as u64,
                max_backoff_ms = max_backoff.as_millis() as u64,
                "maxBackoff below initialBackoff; clamping to initialBackoff"
            );
            max_backoff = self.initial_backoff;
        }

        Ok(RetryPolicy {
            max_attempts: self.max_attempts as u32,
            initial_backoff: self.initial_backoff,
            max_backoff,
            backoff_multiplier: self.backoff_multiplier,
            retryable_codes,
            jitter: self.jitter,
        })
    }
}
