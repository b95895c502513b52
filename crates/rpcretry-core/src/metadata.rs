//! Per-attempt call metadata (request headers).

use std::collections::BTreeMap;

/// Header carrying how many attempts preceded this one. Advisory only; it
/// lets the remote side report which attempt it is serving.
pub const PREVIOUS_ATTEMPTS_KEY: &str = "grpc-previous-rpc-attempts";

/// Ordered key/value headers. Keys are stored lower-case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: BTreeMap<String, String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
        self.entries.insert(key.to_ascii_lowercase(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(&key.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prior attempt count, or `None` when the header is absent or unparsable.
    pub fn previous_attempts(&self) -> Option<u32> {
        self.get(PREVIOUS_ATTEMPTS_KEY)?.trim().parse().ok()
    }

    /// 1-based attempt number implied by the header (missing header = first attempt).
    pub fn attempt_number(&self) -> u32 {
        self.previous_attempts().map_or(1, |n| n.saturating_add(1))
    }
}
