//! CLI command handlers, one file per command.

mod backoff;
mod check_config;
mod demo;

pub use backoff::run_backoff;
pub use check_config::run_check_config;
pub use demo::{run_demo, DemoArgs};
