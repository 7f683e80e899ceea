use crate::error::{DomcastError, DomcastResult};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_DEPTH: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Recursion bound for typecasting nested arguments.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Turn all-digit strings into integers before they reach the wire.
    #[serde(default = "default_numeric_strings")]
    pub numeric_strings: bool,
    #[serde(default)]
    pub pretty: bool,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn default_numeric_strings() -> bool {
    true
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            numeric_strings: default_numeric_strings(),
            pretty: false,
        }
    }
}

impl BuildConfig {
    pub fn from_json_str(input: &str) -> DomcastResult<Self> {
        serde_json::from_str(input).map_err(|e| DomcastError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = BuildConfig::from_json_str("{}").expect("parse");
        assert_eq!(cfg, BuildConfig::default());
        assert_eq!(cfg.max_depth, 4);
        assert!(cfg.numeric_strings);
    }

    #[test]
    fn camel_case_fields() {
        let cfg = BuildConfig::from_json_str(r#"{"maxDepth": 2, "numericStrings": false, "pretty": true}"#)
            .expect("parse");
        assert_eq!(cfg.max_depth, 2);
        assert!(!cfg.numeric_strings);
        assert!(cfg.pretty);
    }

    #[test]
    fn malformed_document_is_config_error() {
        let err = BuildConfig::from_json_str(r#"{"maxDepth": "deep"}"#).expect_err("must fail");
        assert_eq!(err.code(), "DOMCAST_E_CONFIG");
    }
}
