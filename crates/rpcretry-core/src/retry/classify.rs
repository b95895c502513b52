//! Classify a call result against the retry policy in effect.

use crate::retry::policy::RetryPolicy;
use crate::status::{Code, Status};

/// What the executor should do with an attempt's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    /// Failure whose code is in the policy's retryable set.
    RetryableFailure(Code),
    /// Any other failure; surfaced immediately.
    FatalFailure(Code),
}

/// Classify a failure status. Deadline-exceeded gets no special treatment:
/// it is retryable only when listed in the policy.
pub fn classify_status(status: &Status, policy: &RetryPolicy) -> Classification {
    let code = status.code();
    if policy.is_retryable(code) {
        Classification::RetryableFailure(code)
    } else {
        Classification::FatalFailure(code)
    }
}

/// Classify an attempt result.
pub fn classify<T>(result: &Result<T, Status>, policy: &RetryPolicy) -> Classification {
    match result {
        Ok(_) => Classification::Success,
        Err(status) => classify_status(status, policy),
    }
}
