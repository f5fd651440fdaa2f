//! Library-level runs of the control loop against configurations loaded
//! from YAML, on a simulated clock.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use tokio_util::sync::CancellationToken;

use umbra::camera::{DryRunCamera, Gphoto2Command};
use umbra::clock::SimulatedClock;
use umbra::config::ConfigLoader;
use umbra::notify::ConsoleNotifier;
use umbra::observability::StopReason;
use umbra::phase::{ControlLoop, PhaseKind};

const SHORT_ECLIPSE: &str = r#"
eclipse:
  date: 2024-04-08
  contacts: { c1: "00:00:00", c2: "00:10:00", c3: "00:10:30", c4: "00:20:00" }
  diamond_ring: 30s
  baileys_beads: 10s
camera:
  backend: dry-run
notify:
  speech: false
"#;

fn run_config(
    yaml: &str,
    latency: Duration,
    cancel: CancellationToken,
) -> (StopReason, umbra::observability::RunSummary, u64) {
    let loaded = ConfigLoader::with_defaults()
        .load_str(yaml, Path::new("inline.yaml"))
        .expect("config should load");
    let config = loaded.config;
    let schedule = config.eclipse.schedule().unwrap();

    let clock = Arc::new(SimulatedClock::new(schedule.c1() - TimeDelta::seconds(30)));
    let camera = Arc::new(DryRunCamera::new(
        Gphoto2Command::new("gphoto2", "frames", "t{timestamp}_%n"),
        clock.clone(),
        latency,
    ));
    let notifier = Arc::new(ConsoleNotifier::with_writer(Box::new(std::io::sink())));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (reason, summary) = runtime.block_on(
        ControlLoop::new(
            schedule,
            config.phases.resolve(),
            clock,
            camera.clone(),
            notifier,
        )
        .with_timing(config.timing)
        .with_cancel(cancel)
        .run(),
    );
    (reason, summary, camera.captures())
}

#[test]
fn default_tables_cover_every_phase() {
    let (reason, summary, commands) =
        run_config(SHORT_ECLIPSE, Duration::ZERO, CancellationToken::new());
    assert_eq!(reason, StopReason::FourthContact);
    for phase in PhaseKind::ACTIVE {
        assert!(summary.captures_in(phase) > 0, "no captures during {phase}");
    }
    assert_eq!(summary.total_captures(), commands);
}

#[test]
fn totality_override_changes_cycle() {
    let yaml = format!(
        "{SHORT_ECLIPSE}phases:\n  totality:\n    interval: 2s\n    aperture: '8'\n    speed: ['1/1000', '1/250']\n    iso: 100\n    delay_compensation: 0s\n"
    );
    let (_, summary, _) = run_config(&yaml, Duration::ZERO, CancellationToken::new());
    // ten seconds of totality, a two-frame cycle every two seconds
    let totality = summary.captures_in(PhaseKind::Totality);
    assert!(totality >= 4, "expected several cycles, got {totality}");
    assert_eq!(totality % 2, 0);
}

#[test]
fn slow_camera_takes_fewer_frames() {
    let (_, fast, _) = run_config(SHORT_ECLIPSE, Duration::ZERO, CancellationToken::new());
    let (_, slow, _) = run_config(SHORT_ECLIPSE, Duration::from_secs(1), CancellationToken::new());
    assert!(
        slow.captures_in(PhaseKind::DiamondRing) < fast.captures_in(PhaseKind::DiamondRing)
    );
}

#[test]
fn cancelled_run_stops_early() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (reason, summary, commands) = run_config(SHORT_ECLIPSE, Duration::ZERO, cancel);
    assert_eq!(reason, StopReason::Cancelled);
    assert_eq!(summary.total_captures(), 0);
    assert_eq!(commands, 0);
}
