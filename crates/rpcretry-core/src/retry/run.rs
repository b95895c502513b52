//! Retry loop: attempt, classify, back off, until a terminal state.
//!
//! One session runs on a single task and its attempts are strictly
//! sequential. Suspension happens only while an attempt is in flight and
//! while backing off; both race against the call deadline and the caller's
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::backoff;
use super::classify::{classify_status, Classification};
use super::deadline::{DeadlineTracker, Remaining};
use super::error::CallError;
use super::options::CallOptions;
use super::policy::RetryPolicy;
use super::session::{AttemptOutcome, CallAttempt, CallSession};
use crate::intercept::{AttemptContext, InterceptorChain};
use crate::invoker::CallInvoker;
use crate::metadata::{Metadata, PREVIOUS_ATTEMPTS_KEY};
use crate::method::MethodPath;
use crate::status::Status;

/// Drives one logical call through the retry state machine.
pub struct RetryExecutor<'a, I> {
    invoker: &'a I,
    interceptors: &'a InterceptorChain,
}

#[derive(Clone, Copy)]
enum Step {
    Attempt,
    BackOff(Duration),
}

enum Suspend<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

impl<'a, I: CallInvoker> RetryExecutor<'a, I> {
    pub fn new(invoker: &'a I, interceptors: &'a InterceptorChain) -> Self {
        Self {
            invoker,
            interceptors,
        }
    }

    /// Run the call and return the finished session.
    ///
    /// `deadline` is the absolute deadline for the whole call, already
    /// resolved from the caller's options and any configured default.
    pub async fn run(
        &self,
        method: &MethodPath,
        request: &I::Request,
        policy: Arc<RetryPolicy>,
        deadline: Option<Instant>,
        options: &CallOptions,
    ) -> CallSession<I::Response> {
        let tracker = DeadlineTracker::new(deadline);
        let mut session = CallSession::new(Arc::clone(&policy), deadline);
        let mut attempt = 0u32;
        let mut last_failure: Option<Status> = None;
        let mut step = Step::Attempt;

        loop {
            match step {
                Step::BackOff(delay) => {
                    tracing::debug!(
                        method = %method,
                        next_attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "backing off"
                    );
                    match suspend(tokio::time::sleep(delay), None, options.cancel.as_ref()).await {
                        Suspend::Done(()) => step = Step::Attempt,
                        Suspend::Cancelled => {
                            tracing::info!(method = %method, attempts = attempt, "call cancelled during backoff");
                            session.finish(Err(CallError::Cancelled { attempts: attempt }));
                            return session;
                        }
                        // Backoff sleeps carry no timeout of their own.
                        Suspend::TimedOut => step = Step::Attempt,
                    }
                }
                Step::Attempt => {
                    attempt += 1;
                    if attempt > policy.max_attempts() {
                        let attempts = attempt - 1;
                        let last = last_failure
                            .take()
                            .unwrap_or_else(|| Status::internal("no attempt was made"));
                        session.finish(Err(CallError::AttemptsExhausted { attempts, last }));
                        return session;
                    }

                    let timeout = match tracker.attempt_timeout(options.per_attempt_timeout) {
                        Remaining::Expired => {
                            tracing::warn!(method = %method, attempts = attempt - 1, "deadline expired before attempt");
                            session.finish(Err(CallError::DeadlineExceeded {
                                attempts: attempt - 1,
                                last: last_failure.take(),
                            }));
                            return session;
                        }
                        Remaining::Budget(t) => Some(t),
                        Remaining::Unbounded => None,
                    };

                    let ctx = AttemptContext {
                        method: method.clone(),
                        attempt,
                        policy: Arc::clone(&policy),
                        started_at: Instant::now(),
                        timeout,
                        metadata: attempt_metadata(&options.metadata, attempt),
                    };
                    tracing::debug!(method = %method, attempt, timeout_ms = timeout.map(|t| t.as_millis() as u64), "attempting");

                    let cancel = options.cancel.as_ref();
                    let result = self
                        .interceptors
                        .around(&ctx, || self.attempt(&ctx, request, cancel))
                        .await;

                    session.record(CallAttempt {
                        attempt_number: attempt,
                        started_at: ctx.started_at,
                        ended_at: Instant::now(),
                        outcome: AttemptOutcome::from_result(&result),
                    });

                    let status = match result {
                        Ok(response) => {
                            tracing::debug!(method = %method, attempt, "call succeeded");
                            session.finish(Ok(response));
                            return session;
                        }
                        Err(status) => status,
                    };

                    if cancel.is_some_and(CancellationToken::is_cancelled) {
                        tracing::info!(method = %method, attempts = attempt, "call cancelled mid-attempt");
                        session.finish(Err(CallError::Cancelled { attempts: attempt }));
                        return session;
                    }
                    if tracker.is_expired() {
                        tracing::warn!(method = %method, attempts = attempt, code = %status.code(), "deadline expired during attempt");
                        session.finish(Err(CallError::DeadlineExceeded {
                            attempts: attempt,
                            last: Some(status),
                        }));
                        return session;
                    }

                    match classify_status(&status, &policy) {
                        Classification::RetryableFailure(code) if attempt >= policy.max_attempts() => {
                            tracing::warn!(method = %method, attempts = attempt, %code, "retry attempts exhausted");
                            session.finish(Err(CallError::AttemptsExhausted {
                                attempts: attempt,
                                last: status,
                            }));
                            return session;
                        }
                        Classification::RetryableFailure(_) => {
                            let delay = backoff::next_delay(attempt + 1, &policy);
                            let outlasts_deadline = match tracker.remaining() {
                                Remaining::Unbounded => false,
                                Remaining::Budget(left) => delay >= left,
                                Remaining::Expired => true,
                            };
                            if outlasts_deadline {
                                tracing::warn!(
                                    method = %method,
                                    attempts = attempt,
                                    delay_ms = delay.as_millis() as u64,
                                    "backoff would outlast the deadline"
                                );
                                session.finish(Err(CallError::DeadlineExceeded {
                                    attempts: attempt,
                                    last: Some(status),
                                }));
                                return session;
                            }
                            last_failure = Some(status);
                            step = Step::BackOff(delay);
                        }
                        _ => {
                            tracing::warn!(method = %method, attempts = attempt, code = %status.code(), "non-retryable failure");
                            session.finish(Err(CallError::Fatal {
                                attempts: attempt,
                                status,
                            }));
                            return session;
                        }
                    }
                }
            }
        }
    }

    /// Run the call and hand its final outcome to the caller.
    pub async fn call(
        &self,
        method: &MethodPath,
        request: &I::Request,
        policy: Arc<RetryPolicy>,
        deadline: Option<Instant>,
        options: &CallOptions,
    ) -> Result<I::Response, CallError> {
        self.run(method, request, policy, deadline, options)
            .await
            .into_result()
    }

    /// One round trip, bounded by the attempt timeout and the cancel token.
    async fn attempt(
        &self,
        ctx: &AttemptContext,
        request: &I::Request,
        cancel: Option<&CancellationToken>,
    ) -> Result<I::Response, Status> {
        match suspend(self.invoker.invoke(ctx, request), ctx.timeout, cancel).await {
            Suspend::Done(result) => result,
            Suspend::TimedOut => Err(Status::deadline_exceeded(format!(
                "attempt {} timed out after {}ms",
                ctx.attempt,
                ctx.timeout.map_or(0, |t| t.as_millis())
            ))),
            Suspend::Cancelled => Err(Status::cancelled("call cancelled by caller")),
        }
    }
}

/// Request metadata for `attempt`; the previous-attempts header is set on retries only.
fn attempt_metadata(base: &Metadata, attempt: u32) -> Metadata {
    let mut md = base.clone();
    md.remove(PREVIOUS_ATTEMPTS_KEY);
    if attempt > 1 {
        md.insert(PREVIOUS_ATTEMPTS_KEY, (attempt - 1).to_string());
    }
    md
}

/// Await `fut`, abandoning it on timeout or cancellation.
async fn suspend<F: std::future::Future>(
    fut: F,
    timeout: Option<Duration>,
    cancel: Option<&CancellationToken>,
) -> Suspend<F::Output> {
    let bounded = async {
        match timeout {
            Some(t) => tokio::time::timeout(t, fut).await.ok(),
            None => Some(fut.await),
        }
    };
    let outcome = match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => return Suspend::Cancelled,
            out = bounded => out,
        },
        None => bounded.await,
    };
    match outcome {
        Some(value) => Suspend::Done(value),
        None => Suspend::TimedOut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_attempt_carries_no_previous_attempts_header() {
        let mut base = Metadata::new();
        base.insert("x-client", "demo");
        base.insert(PREVIOUS_ATTEMPTS_KEY, "9");
        let md = attempt_metadata(&base, 1);
        assert_eq!(md.get(PREVIOUS_ATTEMPTS_KEY), None);
        assert_eq!(md.get("x-client"), Some("demo"));
    }

    #[test]
    fn retries_count_prior_attempts() {
        let md = attempt_metadata(&Metadata::new(), 4);
        assert_eq!(md.previous_attempts(), Some(3));
    }
}
