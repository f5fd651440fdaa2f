//! Startup checks
//!
//! Run once before the control loop. Only the focus check can stop the
//! sequence; everything else is a warning the operator hears and carries
//! on from.

use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::camera::{Camera, CameraSetting};
use crate::config::CameraSection;
use crate::error::{PreconditionError, UmbraError};
use crate::notify::Notifier;
use crate::schedule::ContactSchedule;

/// What to do after the checks passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightOutcome {
    /// Enter the control loop.
    Ready,
    /// Fourth contact is already over.
    NothingToDo,
}

/// Result of a successful preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    /// Whether to run the loop.
    pub outcome: PreflightOutcome,
    /// Warnings raised along the way.
    pub warnings: Vec<String>,
}

/// Inputs to the startup checks.
pub struct Preflight<'a> {
    /// Configured eclipse date.
    pub date: NaiveDate,
    /// Contact schedule.
    pub schedule: &'a ContactSchedule,
    /// Required focus mode and expected drive mode.
    pub camera_section: &'a CameraSection,
    /// Camera to query.
    pub camera: &'a dyn Camera,
    /// Where to speak warnings.
    pub notifier: &'a dyn Notifier,
}

impl std::fmt::Debug for Preflight<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preflight")
            .field("date", &self.date)
            .field("schedule", self.schedule)
            .field("backend", &self.camera.backend())
            .finish_non_exhaustive()
    }
}

impl Preflight<'_> {
    /// Runs every check at `now`, printing the contact list to `out`.
    ///
    /// # Errors
    ///
    /// Returns [`UmbraError::Precondition`] when the camera is not in the
    /// required focus mode or cannot be asked, and [`UmbraError::Io`] when
    /// `out` cannot be written.
    pub async fn run(
        &self,
        now: DateTime<Utc>,
        out: &mut (dyn Write + Send),
    ) -> Result<PreflightReport, UmbraError> {
        if now > self.schedule.c4() {
            self.say("It is after fourth contact. Nothing to do. Goodbye!")
                .await;
            return Ok(PreflightReport {
                outcome: PreflightOutcome::NothingToDo,
                warnings: Vec::new(),
            });
        }

        let mut warnings = Vec::new();

        let today = now.date_naive();
        if self.date != today {
            warn!(eclipse = %self.date, %today, "eclipse date is not today");
            writeln!(
                out,
                "!!!! Warning: Eclipse does not seem to be today, i.e. {today} !!!!"
            )?;
            self.say("Warning, eclipse does not seem to be today! Please check!")
                .await;
            warnings.push(format!("eclipse date {} is not today ({today})", self.date));
        }

        if let Some(required) = &self.camera_section.focus_mode {
            self.check_focus(required).await?;
        }

        if let Some(expected) = &self.camera_section.drive_mode
            && let Some(warning) = self.check_drive(expected).await
        {
            warnings.push(warning);
        }

        self.say("Please check that the camera is in manual mode").await;
        self.say("Please check the times of the contacts printed").await;
        for (i, at) in self.schedule.contacts().iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let minutes = (*at - now).num_milliseconds() as f64 / 60_000.0;
            writeln!(
                out,
                "C{} at {} UTC in {minutes:.2} minutes",
                i + 1,
                at.format("%a %b %e %H:%M:%S %Y"),
            )?;
        }
        out.flush()?;

        self.say("Entering sequence loop").await;
        info!(warnings = warnings.len(), "preflight complete");
        Ok(PreflightReport {
            outcome: PreflightOutcome::Ready,
            warnings,
        })
    }

    async fn check_focus(&self, required: &str) -> Result<(), PreconditionError> {
        let setting = CameraSetting::FocusMode;
        let result = match self.camera.current_value(setting).await {
            Ok(actual) if actual.trim() == required => return Ok(()),
            Ok(actual) => PreconditionError::CameraMode {
                setting: setting.to_string(),
                expected: required.to_owned(),
                actual,
            },
            Err(source) => PreconditionError::CameraUnavailable {
                setting: setting.to_string(),
                source,
            },
        };
        error!(error = %result, "focus check failed");
        self.say("Camera seems to be in auto-focus. Please manually focus. Goodbye!")
            .await;
        Err(result)
    }

    async fn check_drive(&self, expected: &str) -> Option<String> {
        let setting = CameraSetting::DriveMode;
        match self.camera.current_value(setting).await {
            Ok(actual) if actual.trim() == expected => None,
            Ok(actual) => {
                warn!(%actual, expected, "unexpected drive mode");
                self.say(&format!(
                    "Camera not in {expected} drive mode. Please check that this is intended!"
                ))
                .await;
                Some(format!("drive mode is '{actual}', expected '{expected}'"))
            }
            Err(e) => {
                warn!(error = %e, "cannot read drive mode");
                Some(format!("cannot read drive mode: {e}"))
            }
        }
    }

    async fn say(&self, text: &str) {
        if let Err(e) = self.notifier.say(text).await {
            warn!(error = %e, text, "notification failed");
        }
    }
}
