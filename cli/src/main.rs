#![deny(missing_docs)]

//! # OAS Bind CLI
//!
//! Command Line Interface for inspecting OpenAPI contracts.
//!
//! Supported Commands:
//! - `check`: Loads a document and summarizes every operation.
//! - `signature`: Prints the projected handler signatures as JSON.

use crate::error::CliResult;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod check;
mod document;
mod error;
mod signature;

#[derive(Parser, Debug)]
#[clap(author, version, about = "OpenAPI contract inspection")]
struct Cli {
    /// Engine configuration file (YAML or JSON).
    #[clap(long, global = true, env = "OASBIND_CONFIG")]
    config: Option<PathBuf>,

    /// Treat every load warning as an error.
    #[clap(long, global = true)]
    strict: bool,

    /// Log at debug level.
    #[clap(short, long, global = true)]
    verbose: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a document and summarize its operations.
    Check(check::CheckArgs),
    /// Print projected handler signatures.
    Signature(signature::SignatureArgs),
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = document::read_config(cli.config.as_deref(), cli.strict)?;

    match &cli.command {
        Commands::Check(args) => {
            for line in check::execute(args, config)? {
                println!("{line}");
            }
        }
        Commands::Signature(args) => {
            let output = signature::execute(args, config)?;
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
