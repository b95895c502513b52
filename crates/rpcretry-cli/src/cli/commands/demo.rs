//! `rpcretry demo` – call the in-process greeter server through a retrying channel.

use anyhow::{anyhow, bail, Context, Result};
use rpcretry_core::config::{self, ClientConfig};
use rpcretry_core::retry::{AttemptOutcome, CallOptions};
use rpcretry_core::server::{HelloRequest, ResponseScript, SimulatedServer};
use rpcretry_core::service_config::{self, ServiceConfig};
use rpcretry_core::{Channel, Code, LoggingInterceptor, MethodPath};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Service config used when neither the command line nor the client config names one.
pub const GREETER_SERVICE_CONFIG: &str = r#"{
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

#[derive(Debug)]
pub struct DemoArgs {
    pub service_config: Option<PathBuf>,
    pub status: Code,
    pub fail_attempts: Option<u32>,
    pub timeout: Option<f64>,
    pub workers: Option<usize>,
    pub no_retries: bool,
    pub name: String,
}

impl DemoArgs {
    fn script(&self) -> ResponseScript {
        match self.fail_attempts {
            Some(failures) => ResponseScript::FailFirst {
                failures,
                code: self.status,
            },
            None => ResponseScript::AlwaysFail(self.status),
        }
    }
}

fn resolve_service_config(
    cfg: &ClientConfig,
    config_path: &Path,
    explicit: Option<&Path>,
) -> Result<ServiceConfig> {
    if let Some(path) = explicit {
        println!("Using service config: {}", path.display());
        return config::load_service_config_file(path);
    }
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    if let Some(loaded) = cfg.load_service_config(base_dir)? {
        println!("Using service config from {}", config_path.display());
        return Ok(loaded);
    }
    println!("Using service config: {}", GREETER_SERVICE_CONFIG);
    service_config::parse(GREETER_SERVICE_CONFIG).context("built-in service config")
}

fn timeout_from_secs(secs: f64) -> Result<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        bail!("--timeout must be a positive number of seconds, got {secs}");
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|err| anyhow!("--timeout {secs} is out of range: {err}"))
}

pub async fn run_demo(cfg: &ClientConfig, config_path: &Path, args: DemoArgs) -> Result<()> {
    let service_config = resolve_service_config(cfg, config_path, args.service_config.as_deref())?;

    let mut server_cfg = cfg.server_config();
    if let Some(workers) = args.workers {
        server_cfg.max_workers = workers;
    }
    if server_cfg.max_workers == 0 {
        bail!("server needs at least one worker");
    }
    let server = SimulatedServer::shared(server_cfg.to_options(args.script()));
    tracing::info!(
        workers = server_cfg.max_workers,
        delay_ms = server_cfg.processing_delay_ms,
        "simulated greeter server started"
    );

    let channel = Channel::builder(Arc::clone(&server))
        .service_config(service_config)
        .enable_retries(cfg.enable_retries && !args.no_retries)
        .jitter(cfg.jitter_mode())
        .interceptor(Arc::new(LoggingInterceptor::new()))
        .build();

    let timeout = match args.timeout {
        Some(secs) => Some(timeout_from_secs(secs)?),
        None => cfg.default_timeout(),
    };
    let cancel = CancellationToken::new();
    let mut options = CallOptions::new().with_cancellation(cancel.clone());
    if let Some(timeout) = timeout {
        options = options.with_timeout(timeout);
    }

    // Ctrl-C cancels the call between or during attempts.
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let method = MethodPath::new("helloworld.Greeter", "SayHello");
    let request = HelloRequest { name: args.name };
    println!("Starting RPC call...");
    let session = channel.unary_session(&method, &request, options).await;
    ctrl_c.abort();

    let first_start = session.attempts().first().map(|a| a.started_at);
    for attempt in session.attempts() {
        let offset = first_start
            .map(|start| attempt.started_at - start)
            .unwrap_or_default();
        let took = attempt.ended_at - attempt.started_at;
        let result = match &attempt.outcome {
            AttemptOutcome::Success => Code::Ok.to_string(),
            AttemptOutcome::Failure(status) => status.to_string(),
        };
        println!(
            "  attempt {} at +{:.2}s ({:.2}s): {}",
            attempt.attempt_number,
            offset.as_secs_f64(),
            took.as_secs_f64(),
            result
        );
    }

    match session.into_result() {
        Ok(reply) => println!("Greeter client received: {}", reply.message),
        Err(err) => {
            println!("RPC failed with status: {}", err.code());
            if let Some(status) = err.status() {
                println!("Error details: {}", status.message());
            }
            println!("Debug error string: {}", err);
        }
    }
    println!("Server handled {} request(s)", server.requests_served());
    Ok(())
}
