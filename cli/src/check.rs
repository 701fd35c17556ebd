#![deny(missing_docs)]

//! # Check Command
//!
//! Loads a document and prints one line per operation. Any load error fails
//! the command.

use crate::document::load;
use crate::error::{CliError, CliResult};
use oasbind_core::{EngineConfig, OperationModel};
use std::path::PathBuf;

/// Arguments for the check command.
#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    /// Path to the OpenAPI document (YAML or JSON).
    pub spec: PathBuf,

    /// Fail when the document produced warnings.
    #[clap(long)]
    pub deny_warnings: bool,
}

/// One summary line for an operation.
pub fn describe(op: &OperationModel) -> String {
    let params: Vec<String> = op
        .parameters
        .iter()
        .map(|p| {
            let marker = if p.required { "" } else { "?" };
            format!("{}{marker}: {}", p.name, p.descriptor)
        })
        .collect();
    let body = match op.body.as_ref().and_then(|b| b.descriptor()) {
        Some(descriptor) => format!(" body={descriptor}"),
        None => String::new(),
    };
    let responses: Vec<String> = op.responses.keys().map(ToString::to_string).collect();
    format!(
        "{} {} [{}] ({}){} -> {}",
        op.method,
        op.path,
        op.operation_id,
        params.join(", "),
        body,
        responses.join("|")
    )
}

/// Executes the check command, returning the printed lines.
pub fn execute(args: &CheckArgs, config: EngineConfig) -> CliResult<Vec<String>> {
    let set = load(&args.spec, config)?;
    if args.deny_warnings && !set.warnings().is_empty() {
        return Err(CliError::General(format!(
            "{} warning(s) reported",
            set.warnings().len()
        )));
    }
    Ok(set.iter().map(|op| describe(op)).collect())
}
