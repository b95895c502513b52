//! `rpcretry backoff` – print the delays a method's retry policy would use.

use anyhow::{anyhow, Result};
use rpcretry_core::retry::{schedule, RetryPolicy};
use rpcretry_core::{config, MethodPath};
use std::path::Path;
use std::time::Duration;

fn render(policy: &RetryPolicy) -> Vec<String> {
    let mut total = Duration::ZERO;
    let mut lines = vec!["attempt 1: immediately".to_string()];
    for (i, delay) in schedule(policy).into_iter().enumerate() {
        total += delay;
        lines.push(format!(
            "attempt {}: after {:.3}s (total {:.3}s)",
            i + 2,
            delay.as_secs_f64(),
            total.as_secs_f64()
        ));
    }
    lines
}

pub fn run_backoff(path: &Path, method: &str) -> Result<()> {
    let method = MethodPath::parse(method)
        .ok_or_else(|| anyhow!("method must look like /service/method, got {method:?}"))?;
    let cfg = config::load_service_config_file(path)?;
    let Some(policy) = cfg.retry_policy(&method) else {
        println!("{method}: no retry policy (single attempt)");
        return Ok(());
    };
    println!("{method}: up to {} attempt(s)", policy.max_attempts());
    for line in render(&policy) {
        println!("  {line}");
    }
    Ok(())
}
