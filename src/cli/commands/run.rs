//! `run`: preflight and the control loop on the real clock.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::camera::{Camera, DryRunCamera, Gphoto2Camera, Gphoto2Command};
use crate::cli::args::RunArgs;
use crate::clock::{Clock, SystemClock};
use crate::config::{CameraBackend, UmbraConfig};
use crate::error::UmbraError;
use crate::notify::{ConsoleNotifier, Notifier, SpeechNotifier};
use crate::observability::{Event, EventEmitter, StopReason, init_metrics};
use crate::phase::ControlLoop;
use crate::preflight::{Preflight, PreflightOutcome};
use crate::progress::{NoProgress, ProgressSink, TerminalProgress};

use super::load_config;

/// Runs the eclipse sequence.
///
/// The notifier is closed on every exit path once it has been opened.
///
/// # Errors
///
/// Returns a configuration error for a bad file, a camera error when the
/// output directory cannot be created, or a precondition error when the
/// focus check fails.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), UmbraError> {
    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let config = load_config(&args.config)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let camera = open_camera(&config, args.dry_run, &clock)?;
    let notifier = open_notifier(&config, args.no_speech);

    let result = sequence(args, &config, clock, camera, Arc::clone(&notifier), cancel).await;

    if let Err(e) = notifier.close().await {
        tracing::warn!(error = %e, "notifier did not shut down cleanly");
    }
    result.map(|_| ())
}

async fn sequence(
    args: &RunArgs,
    config: &UmbraConfig,
    clock: Arc<dyn Clock>,
    camera: Arc<dyn Camera>,
    notifier: Arc<dyn Notifier>,
    cancel: CancellationToken,
) -> Result<StopReason, UmbraError> {
    let schedule = config.eclipse.schedule()?;
    let events = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::stderr(),
    });

    let report = Preflight {
        date: config.eclipse.date,
        schedule: &schedule,
        camera_section: &config.camera,
        camera: camera.as_ref(),
        notifier: notifier.as_ref(),
    }
    .run(clock.now(), &mut std::io::stdout())
    .await?;

    if report.outcome == PreflightOutcome::NothingToDo {
        events.emit(Event::SequenceStopped {
            timestamp: clock.now(),
            reason: StopReason::NothingToDo,
            summary: None,
        });
        return Ok(StopReason::NothingToDo);
    }

    let progress: Arc<dyn ProgressSink> = if args.no_progress {
        Arc::new(NoProgress)
    } else {
        Arc::new(TerminalProgress::new())
    };

    let (reason, summary) = ControlLoop::new(schedule, config.phases.resolve(), clock, camera, notifier)
        .with_timing(config.timing)
        .with_progress(progress)
        .with_events(events)
        .with_cancel(cancel)
        .run()
        .await;
    tracing::info!(%reason, %summary, "run finished");
    Ok(reason)
}

fn open_camera(
    config: &UmbraConfig,
    dry_run: bool,
    clock: &Arc<dyn Clock>,
) -> Result<Arc<dyn Camera>, UmbraError> {
    let section = &config.camera;
    let command = Gphoto2Command::new(
        section.binary.clone(),
        section.output_dir.clone(),
        section.filename.clone(),
    );
    if dry_run || section.backend == CameraBackend::DryRun {
        tracing::info!("dry run: camera commands are logged, not executed");
        return Ok(Arc::new(DryRunCamera::new(
            command,
            Arc::clone(clock),
            Duration::ZERO,
        )));
    }
    Ok(Arc::new(Gphoto2Camera::new(command)?))
}

/// Speech when configured and available, console otherwise.
fn open_notifier(config: &UmbraConfig, no_speech: bool) -> Arc<dyn Notifier> {
    if !config.notify.speech || no_speech {
        return Arc::new(ConsoleNotifier::stdout());
    }
    match SpeechNotifier::spawn(&config.notify.command, ConsoleNotifier::stdout()) {
        Ok(speech) => Arc::new(speech),
        Err(e) => {
            tracing::warn!(error = %e, "speech unavailable, printing notifications only");
            Arc::new(ConsoleNotifier::stdout())
        }
    }
}
