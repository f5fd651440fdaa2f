//! Camera control sink
//!
//! The control loop hands fully resolved [`CaptureRequest`]s to a
//! [`Camera`]. Two backends exist:
//!
//! - [`Gphoto2Camera`] shells out to the `gphoto2` utility
//! - [`DryRunCamera`] only logs what it would have done
//!
//! Both render the same `gphoto2` command line through [`Gphoto2Command`],
//! which also owns the mapping from [`Bracketing`] to device wire values.

pub mod dry_run;
pub mod gphoto;

pub use dry_run::DryRunCamera;
pub use gphoto::{Gphoto2Camera, Gphoto2Command};

use std::fmt;

use crate::error::CameraError;
use crate::phase::{Bracketing, CaptureRequest};

/// Camera settings queried during preflight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraSetting {
    /// Autofocus / manual focus switch.
    FocusMode,
    /// Single shot / continuous drive.
    DriveMode,
}

impl CameraSetting {
    /// Human-readable name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FocusMode => "focus mode",
            Self::DriveMode => "drive mode",
        }
    }
}

impl fmt::Display for CameraSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A device that can take pictures.
///
/// Calls block the control loop for as long as the device takes; there is
/// no timeout.
#[async_trait::async_trait]
pub trait Camera: Send + Sync {
    /// Reads the current value of a setting, e.g. `"Manual"`.
    ///
    /// # Errors
    ///
    /// Returns a [`CameraError`] when the device cannot be queried or the
    /// answer cannot be read.
    async fn current_value(&self, setting: CameraSetting) -> Result<String, CameraError>;

    /// Switches automatic exposure bracketing.
    ///
    /// # Errors
    ///
    /// Returns a [`CameraError`] when the device rejects the change.
    async fn set_bracketing(&self, mode: Bracketing) -> Result<(), CameraError>;

    /// Takes (and downloads) one shot, which is three frames when
    /// bracketing is on.
    ///
    /// # Errors
    ///
    /// Returns a [`CameraError`] on any device failure. Failures are
    /// transient as far as the sequence is concerned.
    async fn capture(&self, request: &CaptureRequest) -> Result<(), CameraError>;

    /// Backend name for logs and events.
    fn backend(&self) -> &'static str;
}
