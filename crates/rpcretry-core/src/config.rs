use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::Jitter;
use crate::server::{ResponseScript, ServerOptions};
use crate::service_config::{self, ServiceConfig};

/// Simulated server settings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Worker pool size; requests beyond this wait for a free worker.
    pub max_workers: usize,
    /// Simulated processing time per request in milliseconds.
    pub processing_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_workers: 1,
            processing_delay_ms: 10,
        }
    }
}

impl ServerConfig {
    pub fn to_options(&self, script: ResponseScript) -> ServerOptions {
        ServerOptions {
            max_workers: self.max_workers,
            processing_delay: Duration::from_millis(self.processing_delay_ms),
            script,
        }
    }
}

/// Client configuration loaded from `~/.config/rpcretry/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Channel option: apply retry policies from the service config.
    pub enable_retries: bool,
    /// Path to a JSON service-config document. Relative paths resolve
    /// against the config file's directory.
    #[serde(default)]
    pub service_config: Option<PathBuf>,
    /// Default overall call timeout in seconds (None = no deadline).
    #[serde(default)]
    pub default_timeout_secs: Option<f64>,
    /// Randomize backoff delays (full jitter). Off by default for reproducible runs.
    #[serde(default)]
    pub jitter: bool,
    /// Optional simulated server section; built-in defaults when missing.
    #[serde(default)]
    pub server: Option<ServerConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            enable_retries: true,
            service_config: None,
            default_timeout_secs: None,
            jitter: false,
            server: None,
        }
    }
}

impl ClientConfig {
    pub fn jitter_mode(&self) -> Jitter {
        if self.jitter {
            Jitter::Full
        } else {
            Jitter::None
        }
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }

    pub fn server_config(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Load the configured service-config document, if one is set.
    pub fn load_service_config(&self, base_dir: &Path) -> Result<Option<ServiceConfig>> {
        let Some(path) = &self.service_config else {
            return Ok(None);
        };
        let path = if path.is_relative() {
            base_dir.join(path)
        } else {
            path.clone()
        };
        load_service_config_file(&path).map(Some)
    }
}

/// Read and validate a JSON service-config document from disk.
pub fn load_service_config_file(path: &Path) -> Result<ServiceConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading service config {}", path.display()))?;
    let cfg = service_config::parse(&data)
        .with_context(|| format!("invalid service config {}", path.display()))?;
    Ok(cfg)
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rpcretry")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ClientConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

pub fn load_or_init_at(path: &Path) -> Result<ClientConfig> {
    if !path.exists() {
        let default_cfg = ClientConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: ClientConfig =
        toml::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(cfg)
}
