//! `gphoto2` backend
//!
//! Every capture is one `gphoto2` invocation that sets aperture, shutter
//! speed, ISO and bracketing, then captures and downloads. With bracketing
//! on, the capture flag is repeated so all three frames are pulled off the
//! card.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tracing::{debug, info, warn};

use super::{Camera, CameraSetting};
use crate::error::CameraError;
use crate::phase::{Bracketing, CaptureRequest};

const APERTURE: &str = "/main/capturesettings/aperture";
const SHUTTER_SPEED: &str = "/main/capturesettings/shutterspeed";
const ISO: &str = "/main/imgsettings/iso";
const BRACKETING: &str = "/main/capturesettings/aeb";
const FOCUS_MODE: &str = "/main/capturesettings/focusmode";
const DRIVE_MODE: &str = "/main/capturesettings/drivemode";

/// Device wire value of the `aeb` setting for a bracketing mode.
#[must_use]
pub const fn aeb_index(mode: Bracketing) -> u8 {
    match mode {
        Bracketing::Off => 0,
        Bracketing::Third => 1,
        Bracketing::TwoThirds => 2,
        Bracketing::One => 3,
        Bracketing::OneAndThird => 4,
        Bracketing::OneAndTwoThirds => 5,
        Bracketing::Two => 6,
    }
}

const fn config_path(setting: CameraSetting) -> &'static str {
    match setting {
        CameraSetting::FocusMode => FOCUS_MODE,
        CameraSetting::DriveMode => DRIVE_MODE,
    }
}

/// Extracts the value from the `Current: ...` line of `--get-config` output.
#[must_use]
pub fn parse_current(output: &str) -> Option<&str> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Current:"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Command Builder
// ============================================================================

/// Renders `gphoto2` argument vectors.
#[derive(Debug, Clone)]
pub struct Gphoto2Command {
    binary: PathBuf,
    output_dir: PathBuf,
    filename: String,
}

impl Gphoto2Command {
    /// Creates a builder.
    ///
    /// `filename` may contain `{timestamp}` (unix seconds of the request)
    /// and `{phase}`; `%n` is left for `gphoto2` to number the frames.
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
            filename: filename.into(),
        }
    }

    /// Path of the `gphoto2` executable.
    #[must_use]
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Directory captures are downloaded into.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Download path for a request, with the template expanded.
    #[must_use]
    pub fn target(&self, request: &CaptureRequest) -> PathBuf {
        let name = self
            .filename
            .replace("{timestamp}", &request.timestamp.timestamp().to_string())
            .replace("{phase}", request.phase.name());
        self.output_dir.join(name)
    }

    /// Arguments for one capture.
    #[must_use]
    pub fn capture_args(&self, request: &CaptureRequest) -> Vec<String> {
        let s = &request.setting;
        let mut args = vec![
            "--set-config-value".to_string(),
            format!("{APERTURE}={}", s.aperture),
            "--set-config-value".to_string(),
            format!("{SHUTTER_SPEED}={}", s.speed),
            "--set-config-value".to_string(),
            format!("{ISO}={}", s.iso),
            "--set-config".to_string(),
            format!("{BRACKETING}={}", aeb_index(request.bracketing)),
            "--set-config".to_string(),
            "capturetarget=0".to_string(),
            "--force-overwrite".to_string(),
            "--filename".to_string(),
            self.target(request).to_string_lossy().into_owned(),
            "--no-keep".to_string(),
        ];
        for _ in 0..request.bracketing.frames() {
            args.push("--capture-image-and-download".to_string());
        }
        args
    }

    /// Arguments that switch bracketing.
    #[must_use]
    pub fn bracketing_args(mode: Bracketing) -> Vec<String> {
        vec![
            "--set-config".to_string(),
            format!("{BRACKETING}={}", aeb_index(mode)),
        ]
    }

    /// Arguments that query a setting.
    #[must_use]
    pub fn get_config_args(setting: CameraSetting) -> Vec<String> {
        vec!["--get-config".to_string(), config_path(setting).to_string()]
    }

    /// Shell-quoted command line, for logs.
    #[must_use]
    pub fn render(&self, args: &[String]) -> String {
        let binary = self.binary.to_string_lossy();
        let words = std::iter::once(&*binary).chain(args.iter().map(String::as_str));
        shlex::try_join(words).unwrap_or_else(|_| {
            let mut line = binary.to_string();
            for arg in args {
                line.push(' ');
                line.push_str(arg);
            }
            line
        })
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Camera driven through the `gphoto2` command line utility.
#[derive(Debug)]
pub struct Gphoto2Camera {
    command: Gphoto2Command,
}

impl Gphoto2Camera {
    /// Creates the backend, making sure the output directory exists.
    ///
    /// # Errors
    ///
    /// Returns [`CameraError::OutputDir`] if the directory cannot be created.
    pub fn new(command: Gphoto2Command) -> Result<Self, CameraError> {
        std::fs::create_dir_all(command.output_dir()).map_err(|source| CameraError::OutputDir {
            path: command.output_dir().to_path_buf(),
            source,
        })?;
        Ok(Self { command })
    }

    async fn run(&self, args: &[String]) -> Result<String, CameraError> {
        debug!(command = %self.command.render(args), "running gphoto2");

        let output = tokio::process::Command::new(self.command.binary())
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| CameraError::SpawnFailed {
                program: self.command.binary().display().to_string(),
                source,
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(CameraError::NonZeroExit {
                code: output.status.code(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            warn!(stderr = %stderr, "gphoto2 produced stderr output");
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait::async_trait]
impl Camera for Gphoto2Camera {
    async fn current_value(&self, setting: CameraSetting) -> Result<String, CameraError> {
        let stdout = self.run(&Gphoto2Command::get_config_args(setting)).await?;
        parse_current(&stdout).map(str::to_string).ok_or_else(|| {
            CameraError::InvalidResponse(format!("no 'Current:' line for {setting}"))
        })
    }

    async fn set_bracketing(&self, mode: Bracketing) -> Result<(), CameraError> {
        self.run(&Gphoto2Command::bracketing_args(mode)).await?;
        Ok(())
    }

    async fn capture(&self, request: &CaptureRequest) -> Result<(), CameraError> {
        // the template may name subdirectories, e.g. `{phase}/`
        if let Some(dir) = self.command.target(request).parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| CameraError::OutputDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }
        let args = self.command.capture_args(request);
        info!(command = %self.command.render(&args), "capturing");
        self.run(&args).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "gphoto2"
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::phase::{ExposureSetting, PhaseKind};

    fn request(bracketing: Bracketing) -> CaptureRequest {
        CaptureRequest {
            setting: ExposureSetting {
                aperture: "6.3".to_string(),
                speed: "1/10".to_string(),
                iso: "400".to_string(),
            },
            bracketing,
            phase: PhaseKind::Totality,
            cycle_index: 5,
            timestamp: Utc.timestamp_opt(1_786_556_760, 0).unwrap(),
        }
    }

    fn command() -> Gphoto2Command {
        Gphoto2Command::new("gphoto2", "Eclipse", "t{timestamp}_%n")
    }

    #[test]
    fn aeb_indices_cover_every_mode() {
        let indices: Vec<u8> = Bracketing::ALL.iter().map(|m| aeb_index(*m)).collect();
        assert_eq!(indices, [0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn capture_args_without_bracketing() {
        let args = command().capture_args(&request(Bracketing::Off));
        assert!(args.contains(&"/main/capturesettings/aperture=6.3".to_string()));
        assert!(args.contains(&"/main/capturesettings/shutterspeed=1/10".to_string()));
        assert!(args.contains(&"/main/imgsettings/iso=400".to_string()));
        assert!(args.contains(&"/main/capturesettings/aeb=0".to_string()));
        assert!(args.contains(&"--no-keep".to_string()));
        let captures = args
            .iter()
            .filter(|a| *a == "--capture-image-and-download")
            .count();
        assert_eq!(captures, 1);
    }

    #[test]
    fn bracketing_downloads_three_frames() {
        let args = command().capture_args(&request(Bracketing::OneAndThird));
        assert!(args.contains(&"/main/capturesettings/aeb=4".to_string()));
        let captures = args
            .iter()
            .filter(|a| *a == "--capture-image-and-download")
            .count();
        assert_eq!(captures, 3);
    }

    #[test]
    fn filename_template_expands() {
        let cmd = Gphoto2Command::new("gphoto2", "out", "{phase}/t{timestamp}_%n");
        let target = cmd.target(&request(Bracketing::Off));
        assert_eq!(target, Path::new("out/totality/t1786556760_%n"));
    }

    #[test]
    fn render_quotes_awkward_words() {
        let cmd = Gphoto2Command::new("gphoto2", "My Eclipse", "t{timestamp}_%n");
        let line = cmd.render(&cmd.capture_args(&request(Bracketing::Off)));
        assert!(line.starts_with("gphoto2 --set-config-value"));
        let words = shlex::split(&line).unwrap();
        assert!(words.contains(&"My Eclipse/t1786556760_%n".to_string()));
    }

    #[test]
    fn parse_current_line() {
        let out = "Label: Focus Mode\nReadonly: 0\nType: RADIO\nCurrent: Manual\nChoice: 0 One Shot\n";
        assert_eq!(parse_current(out), Some("Manual"));
        assert_eq!(parse_current("Label: x\n"), None);
        assert_eq!(parse_current("Current:   \n"), None);
    }

    #[test]
    fn query_args() {
        assert_eq!(
            Gphoto2Command::get_config_args(CameraSetting::DriveMode),
            ["--get-config", "/main/capturesettings/drivemode"]
        );
        assert_eq!(
            Gphoto2Command::bracketing_args(Bracketing::Two),
            ["--set-config", "/main/capturesettings/aeb=6"]
        );
    }

    #[test]
    fn new_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Eclipse");
        let camera = Gphoto2Camera::new(Gphoto2Command::new("gphoto2", &out, "t_%n")).unwrap();
        assert!(out.is_dir());
        assert_eq!(camera.backend(), "gphoto2");
    }

    /// Stand-in for `gphoto2` that creates the file named by `--filename`.
    #[cfg(unix)]
    fn stub_gphoto2(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("gphoto2");
        std::fs::write(
            &path,
            "#!/bin/sh\nwhile [ \"$#\" -gt 0 ]; do\n  if [ \"$1\" = --filename ]; then touch \"$2\" || exit 1; fi\n  shift\ndone\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn capture_creates_template_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let camera = Gphoto2Camera::new(Gphoto2Command::new(
            stub_gphoto2(dir.path()),
            &out,
            "{phase}/t{timestamp}_%n",
        ))
        .unwrap();

        camera.capture(&request(Bracketing::Off)).await.unwrap();

        assert!(out.join("totality").is_dir());
        assert!(out.join("totality/t1786556760_%n").is_file());
    }

    #[tokio::test]
    async fn unwritable_subdirectory_is_output_dir_error() {
        let dir = tempfile::tempdir().unwrap();
        // a plain file where the phase directory should go
        std::fs::write(dir.path().join("totality"), b"").unwrap();
        let camera = Gphoto2Camera::new(Gphoto2Command::new(
            dir.path().join("no-such-gphoto2"),
            dir.path(),
            "{phase}/t{timestamp}_%n",
        ))
        .unwrap();
        let err = camera.capture(&request(Bracketing::Off)).await.unwrap_err();
        assert!(matches!(err, CameraError::OutputDir { .. }), "{err}");
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let camera = Gphoto2Camera::new(Gphoto2Command::new(
            dir.path().join("no-such-gphoto2"),
            dir.path(),
            "t_%n",
        ))
        .unwrap();
        let err = camera.set_bracketing(Bracketing::Off).await.unwrap_err();
        assert!(matches!(err, CameraError::SpawnFailed { .. }));
    }
}
