#![deny(missing_docs)]

//! # CLI Errors
//!
//! Error types for the CLI crate.

use derive_more::{Display, From};
use oasbind_core::SpecError;

/// Main error enum for CLI operations.
#[derive(Debug, Display, From)]
pub enum CliError {
    /// IO Error wrapper.
    #[from]
    #[display("IO Error: {}", _0)]
    Io(std::io::Error),

    /// The document or config file is not valid YAML/JSON.
    #[from]
    #[display("Parse Error: {}", _0)]
    Yaml(serde_yaml::Error),

    /// Output could not be encoded.
    #[from]
    #[display("JSON Error: {}", _0)]
    Json(serde_json::Error),

    /// The document was rejected at load.
    #[from]
    #[display("Contract Error: {}", _0)]
    Spec(SpecError),

    /// General failure message.
    #[display("Operation failed: {}", _0)]
    General(String),
}

impl std::error::Error for CliError {}

/// Result type alias.
pub type CliResult<T> = Result<T, CliError>;
