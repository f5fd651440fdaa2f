//! `validate`: checks configuration files without touching the camera.

use std::path::Path;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::config::{ConfigLoader, LoadWarning};
use crate::error::{ConfigError, Severity, UmbraError, ValidationIssue};

/// Outcome for one file.
#[derive(Debug)]
struct FileReport {
    path: String,
    result: Result<Vec<LoadWarning>, ConfigError>,
}

/// Validates every file, reports all of them, then fails on the first bad one.
///
/// # Errors
///
/// Returns the first file's [`ConfigError`]. With `--strict`, warnings are
/// promoted to a validation error.
pub fn run(args: &ValidateArgs) -> Result<(), UmbraError> {
    let loader = ConfigLoader::with_defaults();
    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| check_file(&loader, path, args.strict))
        .collect();

    match args.format {
        OutputFormat::Human => {
            for report in &reports {
                print_human(report);
            }
        }
        OutputFormat::Json => {
            let value: Vec<serde_json::Value> = reports.iter().map(to_json).collect();
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    match reports.into_iter().find_map(|r| r.result.err()) {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

fn check_file(loader: &ConfigLoader, path: &Path, strict: bool) -> FileReport {
    let result = loader.load(path).and_then(|loaded| {
        if strict && !loaded.warnings.is_empty() {
            return Err(ConfigError::ValidationError {
                path: path.display().to_string(),
                errors: loaded.warnings.iter().map(promote).collect(),
            });
        }
        Ok(loaded.warnings)
    });
    if let Err(e) = &result {
        tracing::debug!(path = %path.display(), error = %e, "configuration rejected");
    }
    FileReport {
        path: path.display().to_string(),
        result,
    }
}

fn promote(warning: &LoadWarning) -> ValidationIssue {
    ValidationIssue {
        path: warning.location.clone().unwrap_or_default(),
        message: warning.message.clone(),
        severity: Severity::Error,
    }
}

fn print_human(report: &FileReport) {
    match &report.result {
        Ok(warnings) if warnings.is_empty() => println!("{}: ok", report.path),
        Ok(warnings) => {
            println!("{}: ok, {} warning(s)", report.path, warnings.len());
            for warning in warnings {
                println!("  warning: {warning}");
            }
        }
        Err(ConfigError::ValidationError { errors, .. }) => {
            println!("{}: invalid", report.path);
            for issue in errors {
                println!("  {issue}");
            }
        }
        Err(e) => println!("{}: {e}", report.path),
    }
}

fn to_json(report: &FileReport) -> serde_json::Value {
    match &report.result {
        Ok(warnings) => serde_json::json!({
            "path": report.path,
            "valid": true,
            "warnings": warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }),
        Err(ConfigError::ValidationError { errors, .. }) => serde_json::json!({
            "path": report.path,
            "valid": false,
            "errors": errors
                .iter()
                .map(|i| serde_json::json!({ "path": i.path, "message": i.message }))
                .collect::<Vec<_>>(),
        }),
        Err(e) => serde_json::json!({
            "path": report.path,
            "valid": false,
            "errors": [{ "message": e.to_string() }],
        }),
    }
}
