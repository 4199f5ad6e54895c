//! Degrades free-form metadata values before they reach a log line. Unlike
//! a PII scrubber that hunts for patterns in prose, this assumes any value
//! placed in a metadata map (tags, policy strings, authorized contexts)
//! might be sensitive and truncates/hashes it by default.
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct RedactionConfig {
    /// Values longer than this are hashed instead of shown.
    pub max_visible_len: usize,
    /// Keys that are always hashed regardless of length (e.g. "policy").
    pub always_hash: Vec<String>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            max_visible_len: 32,
            always_hash: vec!["policy".to_string(), "authorized_context".to_string()],
        }
    }
}

/// Redact a single value: short values pass through unchanged, long values
/// are replaced by a correlation hash so two occurrences can still be
/// compared without exposing content.
pub fn redact_value(key: &str, value: &str, config: &RedactionConfig) -> String {
    if config.always_hash.iter().any(|k| k == key) || value.len() > config.max_visible_len {
        format!("sha256:{}", hash8(value))
    } else {
        value.to_string()
    }
}

pub fn redact_metadata(
    metadata: &HashMap<String, String>,
    config: &RedactionConfig,
) -> HashMap<String, String> {
    metadata
        .iter()
        .map(|(k, v)| (k.clone(), redact_value(k, v, config)))
        .collect()
}

fn hash8(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    general_purpose::STANDARD.encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_pass_through() {
        let config = RedactionConfig::default();
        assert_eq!(redact_value("env", "prod", &config), "prod");
    }

    #[test]
    fn long_values_are_hashed() {
        let config = RedactionConfig::default();
        let long = "x".repeat(64);
        assert!(redact_value("description", &long, &config).starts_with("sha256:"));
    }

    #[test]
    fn always_hash_keys_are_hashed_even_when_short() {
        let config = RedactionConfig::default();
        assert!(redact_value("policy", "allow", &config).starts_with("sha256:"));
    }
}
