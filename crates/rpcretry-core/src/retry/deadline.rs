//! Remaining time budget of one logical call.

use std::time::Duration;

use tokio::time::Instant;

/// Budget left before the call deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// No deadline and no attempt cap.
    Unbounded,
    Budget(Duration),
    Expired,
}

/// Tracks an optional absolute deadline across all attempts of a call.
#[derive(Debug, Clone, Copy)]
pub struct DeadlineTracker {
    deadline: Option<Instant>,
}

impl DeadlineTracker {
    pub fn new(deadline: Option<Instant>) -> Self {
        Self { deadline }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Remaining budget as of `now`. A zero budget counts as expired.
    pub fn remaining_at(&self, now: Instant) -> Remaining {
        match self.deadline {
            None => Remaining::Unbounded,
            Some(deadline) if deadline <= now => Remaining::Expired,
            Some(deadline) => Remaining::Budget(deadline - now),
        }
    }

    pub fn remaining(&self) -> Remaining {
        self.remaining_at(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == Remaining::Expired
    }

    /// Timeout for the next attempt: `min(remaining, cap)`.
    pub fn attempt_timeout_at(&self, now: Instant, cap: Option<Duration>) -> Remaining {
        match (self.remaining_at(now), cap) {
            (Remaining::Expired, _) => Remaining::Expired,
            (Remaining::Unbounded, None) => Remaining::Unbounded,
            (Remaining::Unbounded, Some(cap)) => Remaining::Budget(cap),
            (Remaining::Budget(left), None) => Remaining::Budget(left),
            (Remaining::Budget(left), Some(cap)) => Remaining::Budget(left.min(cap)),
        }
    }

    pub fn attempt_timeout(&self, cap: Option<Duration>) -> Remaining {
        self.attempt_timeout_at(Instant::now(), cap)
    }
}
