//! Error types for `umbra`
//!
//! Every failure the sequencer can hit maps onto one of the domain enums
//! below, and the top-level [`UmbraError`] maps each of them onto a process
//! exit code.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `umbra` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution (includes a normal stop after fourth contact)
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Camera control error outside the sequence loop
    pub const CAMERA_ERROR: i32 = 4;

    /// Fatal precondition failure detected before the sequence loop
    pub const PRECONDITION_FAILED: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `umbra` operations.
///
/// This enum aggregates all domain-specific errors and provides
/// a unified interface for error handling and exit code mapping.
#[derive(Debug, Error)]
pub enum UmbraError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Camera control error
    #[error(transparent)]
    Camera(#[from] CameraError),

    /// Notification delivery error
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Startup precondition failed
    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl UmbraError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Camera(_) => ExitCode::CAMERA_ERROR,
            Self::Precondition(_) => ExitCode::PRECONDITION_FAILED,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Notify(_) => ExitCode::ERROR,
        }
    }

    /// Short, stable category name used for metrics labels and events.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Camera(_) => "camera",
            Self::Notify(_) => "notify",
            Self::Precondition(_) => "precondition",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {}", summarize(errors))]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced in {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Where it was referenced
        location: String,
    },
}

fn summarize(issues: &[ValidationIssue]) -> String {
    match issues {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [first, rest @ ..] => format!("{first} (and {} more)", rest.len()),
    }
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "eclipse.contacts.c3")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Error - validation failure that prevents configuration from being used
    Error,
    /// Warning - potential issue that does not prevent configuration loading
    Warning,
}

// ============================================================================
// Camera Errors
// ============================================================================

/// Camera control errors.
///
/// All of these are transient from the sequence loop's point of view: the
/// failing iteration is reported and the next tick carries on.
#[derive(Debug, Error)]
pub enum CameraError {
    /// The camera control utility could not be started
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The camera control utility exited unsuccessfully (device busy, etc.)
    #[error("camera command exited with {}: {stderr}", code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    NonZeroExit {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured stderr
        stderr: String,
    },

    /// The camera reported something we could not interpret
    #[error("unexpected camera response: {0}")]
    InvalidResponse(String),

    /// Output directory could not be prepared
    #[error("cannot prepare output directory {path}: {source}")]
    OutputDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Notification Errors
// ============================================================================

/// Notification sink errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Speech synthesiser could not be started
    #[error("failed to start speech synthesiser '{program}': {source}")]
    SpawnFailed {
        /// Program that failed to start
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing to the synthesiser failed
    #[error("speech delivery failed: {0}")]
    Delivery(#[from] std::io::Error),

    /// The synthesiser was already closed
    #[error("notifier is closed")]
    Closed,
}

// ============================================================================
// Precondition Errors
// ============================================================================

/// Fatal checks performed once before the sequence loop starts.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// A camera setting is not in the mode the sequence requires
    #[error("camera {setting} is '{actual}', expected '{expected}'")]
    CameraMode {
        /// Setting name (e.g. "focus mode")
        setting: String,
        /// Required value
        expected: String,
        /// Reported value
        actual: String,
    },

    /// The camera could not be queried
    #[error("cannot query camera {setting}: {source}")]
    CameraUnavailable {
        /// Setting name
        setting: String,
        /// Underlying camera error
        #[source]
        source: CameraError,
    },
}

// ============================================================================
// Tests
// ============================================================================
