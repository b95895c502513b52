//! CLI for the rpcretry demonstration client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rpcretry_core::{config, Code};
use std::path::PathBuf;

use commands::{run_backoff, run_check_config, run_demo, DemoArgs};

/// Top-level CLI for the rpcretry demo.
#[derive(Debug, Parser)]
#[command(name = "rpcretry")]
#[command(about = "rpcretry: policy-driven retries for unary calls", long_about = None)]
pub struct Cli {
    /// Client config file (default: ~/.config/rpcretry/config.toml, created if missing).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Call SayHello on the in-process greeter server through a retrying channel.
    Demo {
        /// JSON service-config document (overrides the client config).
        #[arg(long, value_name = "PATH")]
        service_config: Option<PathBuf>,

        /// Status code the server answers with while failing.
        #[arg(long, default_value = "UNAVAILABLE", value_name = "CODE")]
        status: Code,

        /// Fail only the first N attempts, then succeed (default: always fail).
        #[arg(long, value_name = "N")]
        fail_attempts: Option<u32>,

        /// Overall call timeout in seconds.
        #[arg(long, value_name = "SECS")]
        timeout: Option<f64>,

        /// Server worker pool size.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,

        /// Disable retries on the channel (single attempt per call).
        #[arg(long)]
        no_retries: bool,

        /// Name sent in the request.
        #[arg(long, default_value = "you")]
        name: String,
    },

    /// Parse and validate a service-config document and print its policies.
    CheckConfig {
        /// Path to the JSON document.
        path: PathBuf,
    },

    /// Print the backoff schedule a method would follow.
    Backoff {
        /// Path to the JSON document.
        path: PathBuf,

        /// Full method name, e.g. /helloworld.Greeter/SayHello.
        method: String,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Demo {
                service_config,
                status,
                fail_attempts,
                timeout,
                workers,
                no_retries,
                name,
            } => {
                let config_path = match cli.config {
                    Some(path) => path,
                    None => config::config_path()?,
                };
                let cfg = config::load_or_init_at(&config_path)?;
                tracing::debug!("loaded config: {:?}", cfg);
                let args = DemoArgs {
                    service_config,
                    status,
                    fail_attempts,
                    timeout,
                    workers,
                    no_retries,
                    name,
                };
                run_demo(&cfg, &config_path, args).await?;
            }
            CliCommand::CheckConfig { path } => run_check_config(&path)?,
            CliCommand::Backoff { path, method } => run_backoff(&path, &method)?,
        }

        Ok(())
    }
}
