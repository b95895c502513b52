use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::metadata::Metadata;

/// Caller-supplied options for one logical call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Relative budget for the whole call, measured from call start.
    pub timeout: Option<Duration>,
    /// Absolute deadline for the whole call. The earlier of this and `timeout` wins.
    pub deadline: Option<Instant>,
    /// Cap on a single attempt, independent of the overall deadline.
    pub per_attempt_timeout: Option<Duration>,
    /// Base request metadata sent with every attempt.
    pub metadata: Metadata,
    /// Aborts an in-flight attempt or backoff when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_per_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.per_attempt_timeout = Some(timeout);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Absolute deadline for a call starting at `start`.
    ///
    /// `default_timeout` (e.g. from the method config) is used only when the
    /// caller set neither a timeout nor a deadline. A timeout too large to
    /// land on the clock means no deadline.
    pub fn effective_deadline(
        &self,
        start: Instant,
        default_timeout: Option<Duration>,
    ) -> Option<Instant> {
        let relative = self
            .timeout
            .or(if self.deadline.is_none() {
                default_timeout
            } else {
                None
            })
            .and_then(|t| start.checked_add(t));
        match (relative, self.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earlier_of_timeout_and_deadline_wins() {
        let start = Instant::now();
        let opts = CallOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_deadline(start + Duration::from_secs(2));
        assert_eq!(
            opts.effective_deadline(start, None),
            Some(start + Duration::from_secs(2))
        );
    }

    #[test]
    fn default_timeout_only_when_caller_sets_none() {
        let start = Instant::now();
        let default = Some(Duration::from_secs(1));
        assert_eq!(
            CallOptions::new().effective_deadline(start, default),
            Some(start + Duration::from_secs(1))
        );
        assert_eq!(
            CallOptions::new()
                .with_timeout(Duration::from_secs(3))
                .effective_deadline(start, default),
            Some(start + Duration::from_secs(3))
        );
        assert_eq!(CallOptions::new().effective_deadline(start, None), None);
    }

    #[test]
    fn unrepresentable_timeout_is_unbounded() {
        let start = Instant::now();
        assert_eq!(
            CallOptions::new()
                .with_timeout(Duration::MAX)
                .effective_deadline(start, None),
            None
        );
        assert_eq!(
            CallOptions::new().effective_deadline(start, Some(Duration::MAX)),
            None
        );
        // An explicit deadline still applies.
        let deadline = start + Duration::from_secs(1);
        assert_eq!(
            CallOptions::new()
                .with_timeout(Duration::MAX)
                .with_deadline(deadline)
                .effective_deadline(start, None),
            Some(deadline)
        );
    }
}
