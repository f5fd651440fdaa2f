//! Configuration validation
//!
//! Runs on the fully deserialized [`UmbraConfig`] and collects every
//! problem instead of stopping at the first, so a single `umbra validate`
//! shows everything that needs fixing.
//!
//! This is also where contact ordering is enforced: the contact clock
//! itself accepts whatever it is given.

use std::time::Duration;

use chrono::TimeDelta;

use crate::config::schema::{PhaseOverride, UmbraConfig};
use crate::error::{Severity, ValidationIssue};
use crate::phase::{PhaseDescriptor, PhaseKind, PhaseTable};
use crate::schedule::ContactSchedule;

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns the result.
    pub fn validate(&mut self, config: &UmbraConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        let schedule = self.validate_eclipse(config);
        self.validate_phases(config, schedule.as_ref());
        self.validate_camera(config);
        self.validate_notify(config);
        self.validate_timing(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Eclipse
    // ========================================================================

    /// Checks contact chronology and that the lead windows nest properly.
    /// Returns the schedule when it is usable for further checks.
    fn validate_eclipse(&mut self, config: &UmbraConfig) -> Option<ContactSchedule> {
        let eclipse = &config.eclipse;

        let schedule = match eclipse.schedule() {
            Ok(s) => s,
            Err(e) => {
                self.add_error("eclipse", &e.to_string());
                return None;
            }
        };

        let names = ["c1", "c2", "c3", "c4"];
        let contacts = schedule.contacts();
        let mut chronological = true;
        for i in 1..contacts.len() {
            if contacts[i] <= contacts[i - 1] {
                chronological = false;
                self.add_error(
                    &format!("eclipse.contacts.{}", names[i]),
                    &format!(
                        "{} ({}) must be later than {} ({})",
                        names[i].to_uppercase(),
                        contacts[i].format("%H:%M:%S"),
                        names[i - 1].to_uppercase(),
                        contacts[i - 1].format("%H:%M:%S"),
                    ),
                );
            }
        }
        if !chronological {
            return None;
        }

        let ring = schedule.diamond_ring_lead();
        let beads = schedule.baileys_beads_lead();

        if beads > ring {
            self.add_error(
                "eclipse.baileys_beads",
                &format!(
                    "Bailey's beads lead ({}) must not exceed the diamond ring lead ({})",
                    fmt_delta(beads),
                    fmt_delta(ring),
                ),
            );
        }

        let totality = schedule.c3() - schedule.c2();
        if beads * 2 > totality {
            self.add_error(
                "eclipse.baileys_beads",
                &format!(
                    "Bailey's beads windows ({} each side) overlap inside {} of totality",
                    fmt_delta(beads),
                    fmt_delta(totality),
                ),
            );
        }

        let partial_in = schedule.c2() - schedule.c1();
        let partial_out = schedule.c4() - schedule.c3();
        if ring > partial_in || ring > partial_out {
            self.add_error(
                "eclipse.diamond_ring",
                &format!(
                    "diamond ring lead ({}) is longer than a partial phase ({} in, {} out)",
                    fmt_delta(ring),
                    fmt_delta(partial_in),
                    fmt_delta(partial_out),
                ),
            );
        }

        if ring.is_zero() {
            self.add_warning("eclipse.diamond_ring", "no time set aside for the diamond ring");
        }
        if beads.is_zero() {
            self.add_warning("eclipse.baileys_beads", "no time set aside for Bailey's beads");
        }

        schedule.is_ordered().then_some(schedule)
    }

    // ========================================================================
    // Phases
    // ========================================================================

    fn validate_phases(&mut self, config: &UmbraConfig, schedule: Option<&ContactSchedule>) {
        for kind in PhaseKind::ACTIVE {
            if let Some(over) = config.phases.get(kind) {
                self.validate_override(kind, over);
            }
        }

        let table = config.phases.resolve();
        for descriptor in table.iter() {
            self.validate_tokens(descriptor);
        }
        if let Some(schedule) = schedule {
            self.validate_intervals_fit(&table, schedule);
        }
    }

    fn validate_override(&mut self, kind: PhaseKind, over: &PhaseOverride) {
        if let Some(interval) = over.interval
            && interval.subsec_nanos() != 0
        {
            self.add_error(
                &format!("phases.{kind}.interval"),
                &format!(
                    "interval must be a whole number of seconds, got {}",
                    humantime::format_duration(interval)
                ),
            );
        }
        if over.delay_compensation.is_some() && kind != PhaseKind::Totality {
            self.add_warning(
                &format!("phases.{kind}.delay_compensation"),
                "delay compensation only applies to totality and is ignored here",
            );
        }
    }

    fn validate_tokens(&mut self, descriptor: &PhaseDescriptor) {
        let kind = descriptor.kind;
        for (field, seq) in [
            ("aperture", &descriptor.aperture),
            ("speed", &descriptor.speed),
            ("iso", &descriptor.iso),
        ] {
            for (i, token) in seq.values().iter().enumerate() {
                if token.trim().is_empty() {
                    self.add_error(
                        &format!("phases.{kind}.{field}[{i}]"),
                        "value must not be empty",
                    );
                }
            }
        }

        let n = descriptor.cycle_len();
        for (field, seq) in [
            ("aperture", &descriptor.aperture),
            ("speed", &descriptor.speed),
            ("iso", &descriptor.iso),
        ] {
            if n % seq.len() != 0 {
                self.add_warning(
                    &format!("phases.{kind}.{field}"),
                    &format!(
                        "{} values do not divide the cycle length {n}; combinations shift from one cycle to the next",
                        seq.len()
                    ),
                );
            }
        }
    }

    fn validate_intervals_fit(&mut self, table: &PhaseTable, schedule: &ContactSchedule) {
        let windows = [
            (&table.partial, schedule.c2_dr() - schedule.c1()),
            (&table.totality, schedule.c3_bb2() - schedule.c2_bb2()),
        ];
        for (descriptor, window) in windows {
            let Ok(interval) = i64::try_from(descriptor.interval) else {
                continue;
            };
            if interval > 0 && TimeDelta::seconds(interval) > window {
                self.add_warning(
                    &format!("phases.{}.interval", descriptor.kind),
                    &format!(
                        "interval of {interval}s is longer than the {} window ({}); it may never fire",
                        descriptor.kind,
                        fmt_delta(window),
                    ),
                );
            }
        }
    }

    // ========================================================================
    // Camera / Notify / Timing
    // ========================================================================

    fn validate_camera(&mut self, config: &UmbraConfig) {
        let camera = &config.camera;
        if camera.binary.as_os_str().is_empty() {
            self.add_error("camera.binary", "camera binary cannot be empty");
        }
        if camera.output_dir.as_os_str().is_empty() {
            self.add_error("camera.output_dir", "output directory cannot be empty");
        }
        if camera.filename.trim().is_empty() {
            self.add_error("camera.filename", "filename template cannot be empty");
        } else if !camera.filename.contains("%n") {
            self.add_warning(
                "camera.filename",
                "filename template has no %n; bracketed frames will overwrite each other",
            );
        }
        if camera.focus_mode.is_none() {
            self.add_warning("camera.focus_mode", "focus mode check is disabled");
        }
    }

    fn validate_notify(&mut self, config: &UmbraConfig) {
        let notify = &config.notify;
        if notify.speech && notify.command.first().is_none_or(|p| p.trim().is_empty()) {
            self.add_error(
                "notify.command",
                "speech is enabled but no synthesiser command is configured",
            );
        }
    }

    fn validate_timing(&mut self, config: &UmbraConfig) {
        let t = &config.timing;
        for (field, value) in [
            ("resting_poll", t.resting_poll),
            ("partial_poll", t.partial_poll),
            ("hot_poll", t.hot_poll),
            ("totality_poll", t.totality_poll),
        ] {
            if value.is_zero() {
                self.add_error(
                    &format!("timing.{field}"),
                    "poll interval must be greater than zero",
                );
            }
        }
        if t.hot_poll > Duration::from_secs(1) {
            self.add_warning(
                "timing.hot_poll",
                "hot poll above one second will miss most of the diamond ring",
            );
        }
        if t.resting_poll > Duration::from_secs(60) {
            self.add_warning(
                "timing.resting_poll",
                "resting poll above one minute delays the start of the sequence",
            );
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

fn fmt_delta(d: TimeDelta) -> String {
    d.to_std().map_or_else(
        |_| format!("{}s", d.num_seconds()),
        |d| humantime::format_duration(d).to_string(),
    )
}
