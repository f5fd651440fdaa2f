//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler.

pub mod completions;
pub mod rehearse;
pub mod run;
pub mod schedule;
pub mod validate;
pub mod version;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands};
use crate::config::{ConfigLoader, UmbraConfig};
use crate::error::UmbraError;

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), UmbraError> {
    match cli.command {
        Commands::Run(args) => run::run(&args, cancel).await,
        Commands::Rehearse(args) => rehearse::run(&args, cancel).await,
        Commands::Schedule(args) => schedule::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

/// Loads a configuration file, logging its warnings.
fn load_config(path: &Path) -> Result<Arc<UmbraConfig>, UmbraError> {
    tracing::info!(config = %path.display(), "loading configuration");
    let load_result = ConfigLoader::with_defaults().load(path)?;

    for warning in &load_result.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    Ok(load_result.config)
}
