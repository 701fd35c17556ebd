//! # Engine Configuration
//!
//! Knobs that change how strictly a document is accepted and how much work is
//! done per request. Deserializable so hosts can keep it next to their own config.

use serde::{Deserialize, Serialize};

/// Configuration for loading and per-request validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Promote every load warning to a fatal inconsistency.
    pub strict: bool,
    /// Run schema checks on outbound responses. `writeOnly` stripping happens either way.
    pub validate_responses: bool,
    /// Fail requests that carry query parameters the operation does not declare.
    pub reject_unknown_query_parameters: bool,
    /// Skip header parameters named `Accept`, `Content-Type` or `Authorization`.
    /// When disabled, declaring one is a load error.
    pub ignore_reserved_headers: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strict: false,
            validate_responses: true,
            reject_unknown_query_parameters: false,
            ignore_reserved_headers: true,
        }
    }
}

impl EngineConfig {
    /// Everything fatal, everything checked.
    pub fn strict() -> Self {
        Self {
            strict: true,
            validate_responses: true,
            reject_unknown_query_parameters: true,
            ignore_reserved_headers: false,
        }
    }

    /// Warnings stay warnings and responses are passed through unchecked.
    pub fn permissive() -> Self {
        Self {
            strict: false,
            validate_responses: false,
            reject_unknown_query_parameters: false,
            ignore_reserved_headers: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"strict": true}"#).unwrap();
        assert!(config.strict);
        assert!(config.validate_responses);
        assert!(config.ignore_reserved_headers);
    }

    #[test]
    fn test_presets_differ() {
        assert_ne!(EngineConfig::strict(), EngineConfig::permissive());
        assert!(!EngineConfig::permissive().validate_responses);
    }
}
