#![deny(missing_docs)]

//! # Document Input
//!
//! Reads OAS documents and engine configuration from disk. YAML is a superset
//! of JSON, so one parser covers both.

use crate::error::CliResult;
use oasbind_core::{EngineConfig, OperationSet};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Parses a YAML or JSON file into a JSON tree.
pub fn read_tree(path: &Path) -> CliResult<Value> {
    let text = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

/// Reads the engine configuration, falling back to defaults.
pub fn read_config(path: Option<&Path>, strict: bool) -> CliResult<EngineConfig> {
    let mut config = match path {
        Some(path) => serde_yaml::from_str(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    config.strict |= strict;
    Ok(config)
}

/// Loads a document into an operation set, logging every warning.
pub fn load(path: &Path, config: EngineConfig) -> CliResult<OperationSet> {
    let document = read_tree(path)?;
    let set = OperationSet::load(&document, config)?;
    for warning in set.warnings() {
        warn!("{warning}");
    }
    info!(path = %path.display(), operations = set.len(), "document loaded");
    Ok(set)
}
