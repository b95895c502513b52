//! Error types for policy validation and terminal call failures.

use crate::status::{Code, Status};

/// Policy or service-config document rejected at construction time.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid {field}: {kind}")]
pub struct ValidationError {
    /// Location of the offending value, e.g. `methodConfig[0].retryPolicy.maxAttempts`.
    pub field: String,
    pub kind: ValidationErrorKind,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationErrorKind {
    #[error("value is required")]
    Missing,
    #[error("{value} is out of range ({expected})")]
    OutOfRange { value: String, expected: &'static str },
    #[error("unrecognized status code {0:?}")]
    UnknownCode(String),
    #[error("malformed duration {0:?} (expected decimal seconds such as \"0.1s\")")]
    MalformedDuration(String),
    #[error("selector {0} appears more than once")]
    DuplicateSelector(String),
    #[error("a method selector requires a service")]
    MethodWithoutService,
    #[error("malformed document: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    /// Prefix the field path, e.g. `maxAttempts` -> `methodConfig[2].retryPolicy.maxAttempts`.
    pub fn within(mut self, prefix: &str) -> Self {
        self.field = format!("{}.{}", prefix, self.field);
        self
    }
}

/// Terminal failure of a logical call. Exactly one is produced per failed session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    /// Remote failure whose code is not retryable under the policy in effect.
    #[error("call failed after {attempts} attempt(s): {status}")]
    Fatal { attempts: u32, status: Status },
    /// Every allowed attempt failed with a retryable code; `last` is the final cause.
    #[error("retry attempts exhausted after {attempts} attempt(s): {last}")]
    AttemptsExhausted { attempts: u32, last: Status },
    /// The overall call deadline elapsed, mid-attempt or between attempts.
    #[error("deadline exceeded after {attempts} attempt(s)")]
    DeadlineExceeded { attempts: u32, last: Option<Status> },
    /// The caller cancelled the call.
    #[error("call cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },
}

impl CallError {
    /// Number of attempts started before the call terminated.
    pub fn attempts(&self) -> u32 {
        match self {
            CallError::Fatal { attempts, .. }
            | CallError::AttemptsExhausted { attempts, .. }
            | CallError::DeadlineExceeded { attempts, .. }
            | CallError::Cancelled { attempts } => *attempts,
        }
    }

    /// Status code surfaced to the caller.
    pub fn code(&self) -> Code {
        match self {
            CallError::Fatal { status, .. } => status.code(),
            CallError::AttemptsExhausted { last, .. } => last.code(),
            CallError::DeadlineExceeded { .. } => Code::DeadlineExceeded,
            CallError::Cancelled { .. } => Code::Cancelled,
        }
    }

    /// Underlying remote status, when one was observed.
    pub fn status(&self) -> Option<&Status> {
        match self {
            CallError::Fatal { status, .. } => Some(status),
            CallError::AttemptsExhausted { last, .. } => Some(last),
            CallError::DeadlineExceeded { last, .. } => last.as_ref(),
            CallError::Cancelled { .. } => None,
        }
    }
}
