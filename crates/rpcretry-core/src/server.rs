//! In-process greeter server used by tests and the CLI demo.
//!
//! Requests are served by a bounded worker pool. The attempt number comes
//! from the previous-attempts metadata header, so the scripted status for a
//! given attempt is deterministic even when calls run concurrently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::intercept::AttemptContext;
use crate::invoker::CallInvoker;
use crate::status::{Code, Status};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelloReply {
    pub message: String,
}

/// Which status to answer with for a given attempt.
#[derive(Debug, Clone)]
pub enum ResponseScript {
    /// Every attempt fails with this status.
    AlwaysFail(Code),
    /// The first `failures` attempts fail with `code`; later attempts succeed.
    FailFirst { failures: u32, code: Code },
    /// Attempt n answers with `codes[n - 1]` (`OK` = success); the last entry
    /// repeats for later attempts. An empty list always succeeds.
    Sequence(Vec<Code>),
}

impl ResponseScript {
    pub fn code_for(&self, attempt: u32) -> Code {
        match self {
            ResponseScript::AlwaysFail(code) => *code,
            ResponseScript::FailFirst { failures, code } => {
                if attempt <= *failures {
                    *code
                } else {
                    Code::Ok
                }
            }
            ResponseScript::Sequence(codes) => {
                let idx = (attempt.max(1) as usize - 1).min(codes.len().saturating_sub(1));
                codes.get(idx).copied().unwrap_or(Code::Ok)
            }
        }
    }
}

impl Default for ResponseScript {
    fn default() -> Self {
        ResponseScript::AlwaysFail(Code::Unavailable)
    }
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Requests served concurrently; others wait for a worker.
    pub max_workers: usize,
    /// Simulated processing time per request.
    pub processing_delay: Duration,
    pub script: ResponseScript,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_workers: 1,
            processing_delay: Duration::from_millis(10),
            script: ResponseScript::default(),
        }
    }
}

/// Greeter that answers `SayHello` according to its script.
#[derive(Debug)]
pub struct SimulatedServer {
    workers: Semaphore,
    processing_delay: Duration,
    script: ResponseScript,
    requests: AtomicU64,
    observed_attempts: Mutex<Vec<u32>>,
}

impl SimulatedServer {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            workers: Semaphore::new(options.max_workers.max(1)),
            processing_delay: options.processing_delay,
            script: options.script,
            requests: AtomicU64::new(0),
            observed_attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn shared(options: ServerOptions) -> Arc<Self> {
        Arc::new(Self::new(options))
    }

    /// Total requests received.
    pub fn requests_served(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Attempt numbers seen, in arrival order.
    pub fn observed_attempts(&self) -> Vec<u32> {
        self.observed_attempts
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    fn observe(&self, attempt: u32) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut seen) = self.observed_attempts.lock() {
            seen.push(attempt);
        }
    }
}

#[async_trait]
impl CallInvoker for SimulatedServer {
    type Request = HelloRequest;
    type Response = HelloReply;

    async fn invoke(
        &self,
        ctx: &AttemptContext,
        request: &HelloRequest,
    ) -> Result<HelloReply, Status> {
        let _permit = self
            .workers
            .acquire()
            .await
            .map_err(|_| Status::unavailable("server shutting down"))?;

        let attempt = ctx.metadata.attempt_number();
        self.observe(attempt);
        tracing::debug!(method = %ctx.method, attempt, name = %request.name, "server received request");

        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        match self.script.code_for(attempt) {
            Code::Ok => Ok(HelloReply {
                message: format!("Hello, {}!", request.name),
            }),
            Code::Unavailable => Err(Status::unavailable(
                "Server is currently unavailable. Please retry.",
            )),
            code => Err(Status::new(
                code,
                format!("scripted {} on attempt {}", code, attempt),
            )),
        }
    }
}
