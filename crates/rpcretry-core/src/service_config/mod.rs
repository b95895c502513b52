//! Service-config document: method selectors mapped to retry policies.
//!
//! The document is supplied out-of-band when a channel is built and parsed
//! once. Lookups pick the most specific selector: `(service, method)`, then
//! `(service)`, then the empty `{}` selector that applies to every method.
//! The matching entry wins as a whole, so an exact entry without a
//! `retryPolicy` disables retries for that method even when a broader entry
//! has one.

mod parse;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::method::MethodPath;
use crate::retry::{Jitter, RetryPolicy};

pub use parse::{parse, parse_duration};

/// `name` entry of a method config. Both fields empty = all methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSelector {
    pub service: Option<String>,
    pub method: Option<String>,
}

impl MethodSelector {
    pub fn all() -> Self {
        Self {
            service: None,
            method: None,
        }
    }

    pub fn service(service: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            method: None,
        }
    }

    pub fn method(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: Some(service.into()),
            method: Some(method.into()),
        }
    }
}

impl fmt::Display for MethodSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.service, &self.method) {
            (Some(s), Some(m)) => write!(f, "{s}/{m}"),
            (Some(s), None) => write!(f, "{s}/*"),
            _ => f.write_str("*"),
        }
    }
}

/// One `methodConfig` entry.
#[derive(Debug, Clone)]
pub struct MethodConfig {
    pub names: Vec<MethodSelector>,
    pub retry_policy: Option<Arc<RetryPolicy>>,
    /// Default overall timeout for calls that set none.
    pub timeout: Option<Duration>,
}

/// Parsed, validated service-config document.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    configs: Vec<MethodConfig>,
    index: HashMap<MethodSelector, usize>,
}

impl ServiceConfig {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn method_configs(&self) -> &[MethodConfig] {
        &self.configs
    }

    /// Most specific method config for `path`, if any.
    pub fn method_config(&self, path: &MethodPath) -> Option<&MethodConfig> {
        let candidates = [
            MethodSelector::method(&path.service, &path.method),
            MethodSelector::service(&path.service),
            MethodSelector::all(),
        ];
        candidates
            .iter()
            .find_map(|selector| self.index.get(selector))
            .and_then(|&i| self.configs.get(i))
    }

    pub fn retry_policy(&self, path: &MethodPath) -> Option<Arc<RetryPolicy>> {
        self.method_config(path)
            .and_then(|c| c.retry_policy.as_ref().map(Arc::clone))
    }

    pub fn timeout(&self, path: &MethodPath) -> Option<Duration> {
        self.method_config(path).and_then(|c| c.timeout)
    }

    /// Copy of this config with every policy's jitter mode replaced.
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        for config in &mut self.configs {
            if let Some(policy) = &config.retry_policy {
                config.retry_policy = Some(Arc::new(policy.with_jitter(jitter)));
            }
        }
        self
    }
}
