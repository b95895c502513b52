//! Retry policy, backoff and the retry executor.
//!
//! The pieces are kept separate so the pure parts (policy validation,
//! backoff schedule, outcome classification, deadline budget) can be tested
//! without a runtime, and the executor just wires them together.

mod backoff;
mod classify;
mod deadline;
mod error;
mod options;
mod policy;
mod run;
mod session;

pub use backoff::{delay_for, full_jitter, next_delay, schedule};
pub use classify::{classify, classify_status, Classification};
pub use deadline::{DeadlineTracker, Remaining};
pub use error::{CallError, ValidationError, ValidationErrorKind};
pub use options::CallOptions;
pub use policy::{Jitter, RetryPolicy, RetryPolicyBuilder, MAX_ATTEMPTS_CEILING};
pub use run::RetryExecutor;
pub use session::{AttemptOutcome, CallAttempt, CallSession};
