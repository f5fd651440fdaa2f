//! `rehearse`: the whole sequence on a simulated clock.
//!
//! Uses the dry-run camera and a console notifier, so nothing is touched
//! and nothing is spoken. Virtual time jumps forward on every sleep, so a
//! full eclipse takes seconds.

use std::io::Write;
use std::sync::Arc;

use chrono::TimeDelta;
use tokio_util::sync::CancellationToken;

use crate::camera::{DryRunCamera, Gphoto2Command};
use crate::cli::args::{OutputFormat, RehearseArgs};
use crate::clock::{Clock, SimulatedClock};
use crate::error::UmbraError;
use crate::notify::ConsoleNotifier;
use crate::observability::{EventEmitter, RunSummary, StopReason};
use crate::phase::{ControlLoop, PhaseKind};
use crate::preflight::{Preflight, PreflightOutcome};

use super::load_config;

/// Rehearses the configured eclipse and prints a summary.
///
/// # Errors
///
/// Returns a configuration error for a bad file, or an I/O error when the
/// events file cannot be created.
pub async fn run(args: &RehearseArgs, cancel: CancellationToken) -> Result<(), UmbraError> {
    let config = load_config(&args.config)?;
    let schedule = config.eclipse.schedule()?;

    let start = args.from.map_or_else(
        || schedule.c1() - TimeDelta::minutes(1),
        |t| t.on(config.eclipse.date),
    );
    let clock = Arc::new(SimulatedClock::new(start));
    let section = &config.camera;
    let camera = Arc::new(DryRunCamera::new(
        Gphoto2Command::new(
            section.binary.clone(),
            section.output_dir.clone(),
            section.filename.clone(),
        ),
        clock.clone(),
        args.latency,
    ));
    // keep stdout clean for the JSON summary
    let (notifier, mut out): (ConsoleNotifier, Box<dyn Write + Send>) = match args.format {
        OutputFormat::Human => (ConsoleNotifier::stdout(), Box::new(std::io::stdout())),
        OutputFormat::Json => (ConsoleNotifier::stderr(), Box::new(std::io::stderr())),
    };
    let notifier = Arc::new(notifier);
    let events = Arc::new(match &args.events_file {
        Some(path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    });

    tracing::info!(%start, latency = ?args.latency, "starting rehearsal");
    let report = Preflight {
        date: config.eclipse.date,
        schedule: &schedule,
        camera_section: &config.camera,
        camera: camera.as_ref(),
        notifier: notifier.as_ref(),
    }
    .run(clock.now(), out.as_mut())
    .await?;

    let (reason, summary) = if report.outcome == PreflightOutcome::NothingToDo {
        (StopReason::NothingToDo, RunSummary::default())
    } else {
        ControlLoop::new(
            schedule,
            config.phases.resolve(),
            clock.clone(),
            camera.clone(),
            notifier,
        )
        .with_timing(config.timing)
        .with_events(events)
        .with_cancel(cancel)
        .run()
        .await
    };

    match args.format {
        OutputFormat::Human => print_human(reason, &summary, camera.captures()),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "reason": reason,
                "summary": summary,
                "camera_commands": camera.captures(),
                "warnings": report.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

fn print_human(reason: StopReason, summary: &RunSummary, commands: u64) {
    println!();
    println!("Rehearsal stopped: {reason}");
    println!(
        "  {} capture requests, {} failed, {} camera commands",
        summary.total_captures(),
        summary.failed_captures,
        commands,
    );
    println!("  {} phase transitions", summary.phase_transitions);
    for phase in PhaseKind::ACTIVE {
        println!("  {:<14} {}", phase.name(), summary.captures_in(phase));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let elapsed = std::time::Duration::from_secs(summary.elapsed_secs.max(0.0) as u64);
    println!("  simulated time: {}", humantime::format_duration(elapsed));
}
