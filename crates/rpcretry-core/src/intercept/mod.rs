//! Interceptor chain wrapping every attempt.
//!
//! Interceptors see each attempt on the way in (`before`, registration order)
//! and on the way out (`after`, reverse order). They receive shared
//! references only, so they can observe an outcome but never replace it.

mod logging;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::metadata::Metadata;
use crate::method::MethodPath;
use crate::retry::{AttemptOutcome, RetryPolicy};
use crate::status::Status;

pub use logging::LoggingInterceptor;

/// What an interceptor (and the invoker) knows about one attempt.
#[derive(Debug, Clone)]
pub struct AttemptContext {
    pub method: MethodPath,
    /// 1-based.
    pub attempt: u32,
    /// Policy in effect for the call.
    pub policy: Arc<RetryPolicy>,
    pub started_at: Instant,
    /// Per-attempt timeout, already bounded by the call deadline.
    pub timeout: Option<Duration>,
    pub metadata: Metadata,
}

impl AttemptContext {
    pub fn previous_attempts(&self) -> u32 {
        self.attempt.saturating_sub(1)
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Hooks run around a single attempt.
pub trait Interceptor: Send + Sync {
    fn before(&self, _ctx: &AttemptContext) {}

    fn after(&self, _ctx: &AttemptContext, _outcome: &AttemptOutcome) {}
}

/// Ordered list of interceptors.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run `call` wrapped by every interceptor and return its result unchanged.
    pub async fn around<T, F, Fut>(&self, ctx: &AttemptContext, call: F) -> Result<T, Status>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Status>>,
    {
        for interceptor in &self.interceptors {
            interceptor.before(ctx);
        }
        let result = call().await;
        let outcome = AttemptOutcome::from_result(&result);
        for interceptor in self.interceptors.iter().rev() {
            interceptor.after(ctx, &outcome);
        }
        result
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptorChain")
            .field("len", &self.interceptors.len())
            .finish()
    }
}
