//! Per-call bookkeeping: the attempts made and the single final outcome.

use std::sync::Arc;

use tokio::time::Instant;

use super::error::CallError;
use super::policy::RetryPolicy;
use crate::status::Status;

/// Result of one attempt as seen by interceptors and the attempt log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure(Status),
}

impl AttemptOutcome {
    pub fn from_result<T>(result: &Result<T, Status>) -> Self {
        match result {
            Ok(_) => AttemptOutcome::Success,
            Err(status) => AttemptOutcome::Failure(status.clone()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Success)
    }
}

/// One try of a logical call.
#[derive(Debug, Clone)]
pub struct CallAttempt {
    /// 1-based.
    pub attempt_number: u32,
    pub started_at: Instant,
    pub ended_at: Instant,
    pub outcome: AttemptOutcome,
}

/// Sequence of attempts for one logical call, owned by the executor.
///
/// `final_outcome` is written once; later writes are ignored.
#[derive(Debug)]
pub struct CallSession<T> {
    policy: Arc<RetryPolicy>,
    deadline: Option<Instant>,
    attempts: Vec<CallAttempt>,
    final_outcome: Option<Result<T, CallError>>,
}

impl<T> CallSession<T> {
    pub fn new(policy: Arc<RetryPolicy>, deadline: Option<Instant>) -> Self {
        Self {
            policy,
            deadline,
            attempts: Vec::new(),
            final_outcome: None,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn attempts(&self) -> &[CallAttempt] {
        &self.attempts
    }

    pub fn is_finished(&self) -> bool {
        self.final_outcome.is_some()
    }

    pub fn final_outcome(&self) -> Option<&Result<T, CallError>> {
        self.final_outcome.as_ref()
    }

    pub(crate) fn record(&mut self, attempt: CallAttempt) {
        debug_assert!(!self.is_finished(), "attempt recorded after terminal state");
        self.attempts.push(attempt);
    }

    pub(crate) fn finish(&mut self, outcome: Result<T, CallError>) {
        if self.final_outcome.is_some() {
            tracing::warn!("call session already finished; ignoring second outcome");
            return;
        }
        self.final_outcome = Some(outcome);
    }

    /// Hand the final outcome to the caller, consuming the session.
    pub fn into_result(self) -> Result<T, CallError> {
        let attempts = self.attempts.len() as u32;
        self.final_outcome.unwrap_or_else(|| {
            Err(CallError::Fatal {
                attempts,
                status: Status::internal("call session ended without an outcome"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;

    #[test]
    fn final_outcome_is_set_once() {
        let mut s: CallSession<&str> = CallSession::new(Arc::new(RetryPolicy::no_retry()), None);
        s.finish(Ok("first"));
        s.finish(Err(CallError::Cancelled { attempts: 0 }));
        assert_eq!(s.into_result(), Ok("first"));
    }

    #[test]
    fn unfinished_session_reports_internal() {
        let s: CallSession<()> = CallSession::new(Arc::new(RetryPolicy::no_retry()), None);
        let err = s.into_result().unwrap_err();
        assert_eq!(err.code(), Code::Internal);
    }
}
