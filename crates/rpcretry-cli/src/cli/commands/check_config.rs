//! `rpcretry check-config` – validate a service-config document.

use anyhow::Result;
use rpcretry_core::config;
use rpcretry_core::service_config::MethodConfig;
use std::path::Path;

fn describe(config: &MethodConfig) -> String {
    let names: Vec<String> = config.names.iter().map(|n| n.to_string()).collect();
    let mut line = names.join(", ");
    if let Some(timeout) = config.timeout {
        line.push_str(&format!("  timeout={:.3}s", timeout.as_secs_f64()));
    }
    match &config.retry_policy {
        Some(policy) => {
            let codes: Vec<&str> = policy.retryable_codes().iter().map(|c| c.as_str()).collect();
            line.push_str(&format!(
                "  maxAttempts={} initialBackoff={:.3}s maxBackoff={:.3}s multiplier={} retryable=[{}]",
                policy.max_attempts(),
                policy.initial_backoff().as_secs_f64(),
                policy.max_backoff().as_secs_f64(),
                policy.backoff_multiplier(),
                codes.join(",")
            ));
        }
        None => line.push_str("  (no retry policy)"),
    }
    line
}

pub fn run_check_config(path: &Path) -> Result<()> {
    let cfg = config::load_service_config_file(path)?;
    if cfg.method_configs().is_empty() {
        println!("{}: valid, no method configs", path.display());
        return Ok(());
    }
    println!(
        "{}: valid, {} method config(s)",
        path.display(),
        cfg.method_configs().len()
    );
    for method_config in cfg.method_configs() {
        println!("  {}", describe(method_config));
    }
    Ok(())
}
