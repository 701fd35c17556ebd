#![deny(missing_docs)]

//! # Signature Command
//!
//! Prints the projected handler signatures of a document as JSON.

use crate::document::load;
use crate::error::{CliError, CliResult};
use oasbind_core::{project_operation_signature, EngineConfig};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Arguments for the signature command.
#[derive(clap::Args, Debug, Clone)]
pub struct SignatureArgs {
    /// Path to the OpenAPI document (YAML or JSON).
    pub spec: PathBuf,

    /// Only print this operation.
    #[clap(long)]
    pub operation: Option<String>,
}

/// Executes the signature command, returning the JSON document.
pub fn execute(args: &SignatureArgs, config: EngineConfig) -> CliResult<Value> {
    let set = load(&args.spec, config)?;
    let mut out = Map::new();
    match &args.operation {
        Some(id) => {
            let op = set
                .get(id)
                .ok_or_else(|| CliError::General(format!("no operation '{id}'")))?;
            out.insert(id.clone(), serde_json::to_value(project_operation_signature(op))?);
        }
        None => {
            for op in set.iter() {
                out.insert(
                    op.operation_id.clone(),
                    serde_json::to_value(project_operation_signature(op))?,
                );
            }
        }
    }
    Ok(Value::Object(out))
}
