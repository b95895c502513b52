//! JSON service-config document: raw serde shape and field conversion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::{MethodConfig, MethodSelector, ServiceConfig};
use crate::retry::{RetryPolicy, ValidationError, ValidationErrorKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServiceConfig {
    #[serde(default)]
    method_config: Vec<RawMethodConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMethodConfig {
    #[serde(default)]
    name: Vec<RawName>,
    #[serde(default)]
    retry_policy: Option<RawRetryPolicy>,
    #[serde(default)]
    timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawName {
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRetryPolicy {
    max_attempts: Option<i64>,
    initial_backoff: Option<String>,
    max_backoff: Option<String>,
    backoff_multiplier: Option<f64>,
    #[serde(default)]
    retryable_status_codes: Vec<RawCode>,
}

/// Codes may be given by name or by number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCode {
    Name(String),
    Number(i64),
}

impl RawCode {
    fn into_token(self) -> String {
        match self {
            RawCode::Name(name) => name,
            RawCode::Number(n) => n.to_string(),
        }
    }
}

/// Parse and validate a service-config document.
pub fn parse(json: &str) -> Result<ServiceConfig, ValidationError> {
    let raw: RawServiceConfig = serde_json::from_str(json).map_err(|e| {
        ValidationError::new("serviceConfig", ValidationErrorKind::Malformed(e.to_string()))
    })?;

    let mut configs = Vec::with_capacity(raw.method_config.len());
    let mut index = HashMap::new();

    for (i, entry) in raw.method_config.into_iter().enumerate() {
        let path = format!("methodConfig[{i}]");
        if entry.name.is_empty() {
            return Err(ValidationError::new(
                format!("{path}.name"),
                ValidationErrorKind::Missing,
            ));
        }

        let mut names = Vec::with_capacity(entry.name.len());
        for (j, name) in entry.name.into_iter().enumerate() {
            let selector = selector_from(name)
                .map_err(|e| e.within(&format!("{path}.name[{j}]")))?;
            if index.insert(selector.clone(), i).is_some() {
                return Err(ValidationError::new(
                    format!("{path}.name[{j}]"),
                    ValidationErrorKind::DuplicateSelector(selector.to_string()),
                ));
            }
            names.push(selector);
        }

        let retry_policy = entry
            .retry_policy
            .map(policy_from)
            .transpose()
            .map_err(|e| e.within(&format!("{path}.retryPolicy")))?
            .map(Arc::new);

        let timeout = entry
            .timeout
            .map(|t| parse_duration(&t))
            .transpose()
            .map_err(|kind| ValidationError::new(format!("{path}.timeout"), kind))?;

        configs.push(MethodConfig {
            names,
            retry_policy,
            timeout,
        });
    }

    Ok(ServiceConfig { configs, index })
}

fn selector_from(raw: RawName) -> Result<MethodSelector, ValidationError> {
    let service = raw.service.filter(|s| !s.is_empty());
    let method = raw.method.filter(|m| !m.is_empty());
    if service.is_none() && method.is_some() {
        return Err(ValidationError::new(
            "method",
            ValidationErrorKind::MethodWithoutService,
        ));
    }
    Ok(MethodSelector { service, method })
}

fn policy_from(raw: RawRetryPolicy) -> Result<RetryPolicy, ValidationError> {
    let max_attempts = raw
        .max_attempts
        .ok_or_else(|| ValidationError::new("maxAttempts", ValidationErrorKind::Missing))?;
    let initial_backoff = required_duration("initialBackoff", raw.initial_backoff)?;
    let max_backoff = required_duration("maxBackoff", raw.max_backoff)?;
    let backoff_multiplier = raw.backoff_multiplier.ok_or_else(|| {
        ValidationError::new("backoffMultiplier", ValidationErrorKind::Missing)
    })?;

    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .initial_backoff(initial_backoff)
        .max_backoff(max_backoff)
        .backoff_multiplier(backoff_multiplier)
        .retryable_code_tokens(raw.retryable_status_codes.into_iter().map(RawCode::into_token))
        .build()
}

fn required_duration(field: &str, value: Option<String>) -> Result<Duration, ValidationError> {
    let value = value.ok_or_else(|| ValidationError::new(field, ValidationErrorKind::Missing))?;
    parse_duration(&value).map_err(|kind| ValidationError::new(field, kind))
}

/// Largest whole-second count a protobuf JSON duration may carry (10,000 years).
pub const MAX_DURATION_SECS: u64 = 315_576_000_000;

/// Parse a protobuf JSON duration: decimal seconds with an `s` suffix,
/// e.g. `"1s"`, `"0.1s"`, `"2.500s"`. At most nine fractional digits and
/// no more than [`MAX_DURATION_SECS`] whole seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ValidationErrorKind> {
    let malformed = || ValidationErrorKind::MalformedDuration(s.to_string());
    let body = s.strip_suffix('s').ok_or_else(malformed)?;
    let (whole, frac) = match body.split_once('.') {
        Some((w, f)) => (w, f),
        None => (body, ""),
    };
    if whole.is_empty()
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !frac.bytes().all(|b| b.is_ascii_digit())
        || frac.len() > 9
        || (body.contains('.') && frac.is_empty())
    {
        return Err(malformed());
    }
    let secs: u64 = whole.parse().map_err(|_| malformed())?;
    if secs > MAX_DURATION_SECS {
        return Err(malformed());
    }
    let nanos: u32 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}").parse().map_err(|_| malformed())?
    };
    Ok(Duration::new(secs, nanos))
}
