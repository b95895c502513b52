//! Shared fixtures for integration tests: the greeter service config, a
//! simulated server builder and an interceptor that records hook order.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use rpcretry_core::intercept::{AttemptContext, Interceptor};
use rpcretry_core::retry::{AttemptOutcome, RetryPolicy};
use rpcretry_core::server::{HelloRequest, ResponseScript, ServerOptions, SimulatedServer};
use rpcretry_core::{Code, MethodPath};

pub const GREETER_CONFIG: &str = r#"{
    "methodConfig": [
        {
            "name": [{"service": "helloworld.Greeter", "method": "SayHello"}],
            "retryPolicy": {
                "maxAttempts": 5,
                "initialBackoff": "0.1s",
                "maxBackoff": "1s",
                "backoffMultiplier": 2,
                "retryableStatusCodes": ["UNAVAILABLE"]
            }
        }
    ]
}"#;

pub fn say_hello() -> MethodPath {
    MethodPath::new("helloworld.Greeter", "SayHello")
}

pub fn hello() -> HelloRequest {
    HelloRequest {
        name: "you".to_string(),
    }
}

pub fn policy(
    max_attempts: i64,
    initial: Duration,
    max: Duration,
    multiplier: f64,
    codes: &[Code],
) -> Arc<RetryPolicy> {
    Arc::new(
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_backoff(initial)
            .max_backoff(max)
            .backoff_multiplier(multiplier)
            .retryable_codes(codes.iter().copied())
            .build()
            .expect("valid test policy"),
    )
}

pub fn reference_policy() -> Arc<RetryPolicy> {
    policy(
        5,
        Duration::from_millis(100),
        Duration::from_secs(1),
        2.0,
        &[Code::Unavailable],
    )
}

pub fn server(script: ResponseScript, processing_delay: Duration) -> Arc<SimulatedServer> {
    SimulatedServer::shared(ServerOptions {
        max_workers: 1,
        processing_delay,
        script,
    })
}

/// Appends `<name>.before#<attempt>` / `<name>.after#<attempt>:<code>` to a shared log.
pub struct OrderRecorder {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
}

impl OrderRecorder {
    pub fn new(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            log: Arc::clone(log),
        })
    }
}

impl Interceptor for OrderRecorder {
    fn before(&self, ctx: &AttemptContext) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}.before#{}", self.name, ctx.attempt));
    }

    fn after(&self, ctx: &AttemptContext, outcome: &AttemptOutcome) {
        let code = match outcome {
            AttemptOutcome::Success => Code::Ok,
            AttemptOutcome::Failure(status) => status.code(),
        };
        self.log
            .lock()
            .unwrap()
            .push(format!("{}.after#{}:{}", self.name, ctx.attempt, code));
    }
}
