//! Observe-only interceptor that logs timing and status of each attempt.

use super::{AttemptContext, Interceptor};
use crate::retry::AttemptOutcome;

/// Logs attempt start, elapsed time and final status via `tracing`, and
/// notes when a failure code is in the call's retryable set. The executor
/// still decides whether a retry happens (the deadline may end the call).
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for LoggingInterceptor {
    fn before(&self, ctx: &AttemptContext) {
        tracing::info!(
            method = %ctx.method,
            attempt = ctx.attempt,
            max_attempts = ctx.policy.max_attempts(),
            timeout_ms = ctx.timeout.map(|t| t.as_millis() as u64),
            "making request"
        );
    }

    fn after(&self, ctx: &AttemptContext, outcome: &AttemptOutcome) {
        let elapsed_ms = ctx.elapsed().as_millis() as u64;
        match outcome {
            AttemptOutcome::Success => {
                tracing::info!(
                    method = %ctx.method,
                    attempt = ctx.attempt,
                    elapsed_ms,
                    "request succeeded"
                );
            }
            AttemptOutcome::Failure(status) => {
                tracing::warn!(
                    method = %ctx.method,
                    attempt = ctx.attempt,
                    elapsed_ms,
                    code = %status.code(),
                    message = status.message(),
                    "request failed"
                );
                if ctx.policy.is_retryable(status.code())
                    && ctx.attempt < ctx.policy.max_attempts()
                {
                    tracing::info!(code = %status.code(), "status is retryable");
                }
            }
        }
    }
}
