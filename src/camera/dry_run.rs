//! Dry-run backend: logs the `gphoto2` command it would have run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::info;

use super::{Camera, CameraSetting, Gphoto2Command};
use crate::clock::Clock;
use crate::error::CameraError;
use crate::phase::{Bracketing, CaptureRequest};

/// A camera that never touches hardware.
///
/// Each capture takes `latency` on the supplied clock, so rehearsals on a
/// simulated clock see the same throughput limits a real body imposes.
pub struct DryRunCamera {
    command: Gphoto2Command,
    clock: Arc<dyn Clock>,
    latency: Duration,
    captures: AtomicU64,
}

impl DryRunCamera {
    /// Creates a dry-run camera.
    #[must_use]
    pub fn new(command: Gphoto2Command, clock: Arc<dyn Clock>, latency: Duration) -> Self {
        Self {
            command,
            clock,
            latency,
            captures: AtomicU64::new(0),
        }
    }

    /// Number of captures taken so far.
    #[must_use]
    pub fn captures(&self) -> u64 {
        self.captures.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for DryRunCamera {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DryRunCamera")
            .field("command", &self.command)
            .field("latency", &self.latency)
            .field("captures", &self.captures())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Camera for DryRunCamera {
    async fn current_value(&self, setting: CameraSetting) -> Result<String, CameraError> {
        Ok(match setting {
            CameraSetting::FocusMode => "Manual",
            CameraSetting::DriveMode => "Single",
        }
        .to_string())
    }

    async fn set_bracketing(&self, mode: Bracketing) -> Result<(), CameraError> {
        let args = Gphoto2Command::bracketing_args(mode);
        info!(command = %self.command.render(&args), "dry run: set bracketing");
        Ok(())
    }

    async fn capture(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        let args = self.command.capture_args(request);
        info!(command = %self.command.render(&args), "dry run: capture");
        if !self.latency.is_zero() {
            self.clock.sleep(self.latency).await;
        }
        self.captures.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "dry-run"
    }
}
