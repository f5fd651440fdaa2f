//! Shared integration-test harness for running the `umbra` binary as a
//! child process.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};

/// Helpers around the compiled `umbra` binary.
pub struct UmbraProcess;

impl UmbraProcess {
    /// Runs `umbra` with `args` and waits for it to exit.
    ///
    /// Speech is disabled and logging is kept at warnings so stderr stays
    /// readable in assertion messages.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_umbra"))
            .args(args)
            .env("UMBRA_NO_SPEECH", "1")
            .env("UMBRA_LOG_LEVEL", "warn")
            .env_remove("UMBRA_CONFIG")
            .output()
            .expect("failed to run umbra")
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    /// Returns a fixture path as `&str`-friendly `String`.
    #[must_use]
    pub fn fixture(name: &str) -> String {
        Self::fixture_path(name).display().to_string()
    }
}

/// Parses stdout as a single JSON document.
#[allow(clippy::missing_panics_doc)]
#[must_use]
pub fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("stdout is not JSON: {e}\n{stdout}"))
}
