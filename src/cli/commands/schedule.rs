//! `schedule`: prints the contacts and the boundaries derived from them.

use std::fmt::Write;

use chrono::{DateTime, TimeDelta, Utc};

use crate::cli::args::{OutputFormat, ScheduleArgs};
use crate::error::UmbraError;
use crate::phase::PhaseKind;
use crate::schedule::{ContactSchedule, classify};

use super::load_config;

/// Prints the contact schedule.
///
/// # Errors
///
/// Returns a configuration error when the file cannot be loaded.
pub fn run(args: &ScheduleArgs) -> Result<(), UmbraError> {
    let config = load_config(&args.config)?;
    let schedule = config.eclipse.schedule()?;

    match args.format {
        OutputFormat::Human => print!("{}", render_human(&schedule)),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "date": config.eclipse.date,
                "diamond_ring_secs": config.eclipse.diamond_ring.as_secs_f64(),
                "baileys_beads_secs": config.eclipse.baileys_beads.as_secs_f64(),
                "boundaries": schedule
                    .boundaries()
                    .iter()
                    .map(|b| serde_json::json!({
                        "name": b.name,
                        "at": b.at,
                        "phase_after": phase_after(b.at, &schedule),
                    }))
                    .collect::<Vec<_>>(),
                "totality_secs": (schedule.c3() - schedule.c2()).num_seconds(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

/// Phase in force just after `at`. Boundary instants themselves belong to
/// whichever side the classifier settles them on.
fn phase_after(at: DateTime<Utc>, schedule: &ContactSchedule) -> PhaseKind {
    classify(at + TimeDelta::milliseconds(1), schedule)
}

/// One line per boundary, marking where the phase changes.
fn render_human(schedule: &ContactSchedule) -> String {
    let mut out = String::new();
    let mut previous = None;
    for boundary in schedule.boundaries() {
        let phase = phase_after(boundary.at, schedule);
        let marker = if previous == Some(phase) { "" } else { phase_label(phase) };
        let _ = writeln!(
            out,
            "{:<7} {}  {}",
            boundary.name,
            boundary.at.format("%Y-%m-%d %H:%M:%S UTC"),
            marker,
        );
        previous = Some(phase);
    }
    let totality = (schedule.c3() - schedule.c2()).to_std().unwrap_or_default();
    let _ = writeln!(out, "totality lasts {}", humantime::format_duration(totality));
    out
}

const fn phase_label(phase: PhaseKind) -> &'static str {
    match phase {
        PhaseKind::Resting => "-> resting",
        PhaseKind::Partial => "-> partial",
        PhaseKind::DiamondRing => "-> diamond ring",
        PhaseKind::BaileysBeads => "-> Bailey's beads",
        PhaseKind::Totality => "-> totality",
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::schedule::ContactTime;

    #[test]
    fn lists_every_boundary() {
        let hms = |h, m, s| ContactTime::new(h, m, s).unwrap();
        let schedule = ContactSchedule::on_date(
            NaiveDate::from_ymd_opt(2024, 4, 8).unwrap(),
            [hms(0, 0, 0), hms(0, 10, 0), hms(0, 10, 30), hms(0, 20, 0)],
            TimeDelta::seconds(30),
            TimeDelta::seconds(10),
        );
        let text = render_human(&schedule);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 11);
        assert!(lines[1].starts_with("C2_DR   2024-04-08 00:09:30 UTC  -> diamond ring"));
        assert!(lines[3].ends_with("UTC  "));
        assert!(lines[4].starts_with("C2_BB2") && lines[4].ends_with("-> totality"));
        assert!(lines[9].ends_with("-> resting"));
        assert_eq!(lines[10], "totality lasts 30s");
    }
}
