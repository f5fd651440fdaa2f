//! Configuration schema
//!
//! Typed representation of an `umbra` YAML file. Every section except
//! `eclipse` is optional and falls back to the defaults below.
//!
//! ```yaml
//! eclipse:
//!   date: 2026-08-12
//!   contacts: { c1: "17:32:47", c2: "18:27:31", c3: "18:29:10", c4: "19:21:33" }
//!   diamond_ring: 25s
//!   baileys_beads: 10s
//! phases:
//!   totality:
//!     aperture: [16, 11, 10]
//!     speed: ["1/1600", "1/500", "1/60"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::phase::{Bracketing, PhaseDescriptor, PhaseKind, PhaseTable, ValueSequence};
use crate::schedule::{ContactSchedule, ContactTime};

// ============================================================================
// Root
// ============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UmbraConfig {
    /// Date, contacts and lead times.
    pub eclipse: EclipseSection,

    /// Per-phase exposure overrides.
    #[serde(default)]
    pub phases: PhaseOverrides,

    /// Camera backend.
    #[serde(default)]
    pub camera: CameraSection,

    /// Operator notifications.
    #[serde(default)]
    pub notify: NotifySection,

    /// Poll granularities.
    #[serde(default)]
    pub timing: TimingSection,
}

// ============================================================================
// Eclipse
// ============================================================================

/// When the eclipse happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EclipseSection {
    /// Calendar date of the eclipse (UTC).
    pub date: NaiveDate,

    /// Contact times of day, UTC.
    pub contacts: Contacts,

    /// Diamond ring lead around C2 and C3.
    #[serde(default = "default_diamond_ring", with = "duration_serde")]
    pub diamond_ring: Duration,

    /// Bailey's beads lead around C2 and C3.
    #[serde(default = "default_baileys_beads", with = "duration_serde")]
    pub baileys_beads: Duration,
}

/// The four contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Contacts {
    /// First contact.
    pub c1: ContactTime,
    /// Second contact.
    pub c2: ContactTime,
    /// Third contact.
    pub c3: ContactTime,
    /// Fourth contact.
    pub c4: ContactTime,
}

impl Contacts {
    /// `[C1, C2, C3, C4]`.
    #[must_use]
    pub const fn as_array(&self) -> [ContactTime; 4] {
        [self.c1, self.c2, self.c3, self.c4]
    }
}

const fn default_diamond_ring() -> Duration {
    Duration::from_secs(25)
}

const fn default_baileys_beads() -> Duration {
    Duration::from_secs(10)
}

impl EclipseSection {
    /// Builds the contact schedule. Ordering is not checked here.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] when a lead duration does not
    /// fit a signed time delta.
    pub fn schedule(&self) -> Result<ContactSchedule, ConfigError> {
        Ok(ContactSchedule::on_date(
            self.date,
            self.contacts.as_array(),
            to_delta("eclipse.diamond_ring", self.diamond_ring)?,
            to_delta("eclipse.baileys_beads", self.baileys_beads)?,
        ))
    }
}

fn to_delta(field: &str, d: Duration) -> Result<TimeDelta, ConfigError> {
    TimeDelta::from_std(d).map_err(|_| ConfigError::InvalidValue {
        field: field.to_string(),
        value: humantime::format_duration(d).to_string(),
        expected: "a duration shorter than a day".to_string(),
    })
}

// ============================================================================
// Phases
// ============================================================================

/// Optional overrides for each active phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseOverrides {
    /// Partial phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial: Option<PhaseOverride>,
    /// Diamond ring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diamond_ring: Option<PhaseOverride>,
    /// Bailey's beads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baileys_beads: Option<PhaseOverride>,
    /// Totality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totality: Option<PhaseOverride>,
}

/// Fields of one phase; anything left out keeps the built-in value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseOverride {
    /// Firing interval; `0` fires continuously.
    #[serde(default, with = "duration_serde::option", skip_serializing_if = "Option::is_none")]
    pub interval: Option<Duration>,
    /// Bracketing mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bracketing: Option<Bracketing>,
    /// Aperture value or list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<ValueSequence>,
    /// Shutter speed value or list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<ValueSequence>,
    /// ISO value or list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<ValueSequence>,
    /// Totality only: slack before the end of the window.
    #[serde(default, with = "duration_serde::option", skip_serializing_if = "Option::is_none")]
    pub delay_compensation: Option<Duration>,
}

impl PhaseOverride {
    fn apply(&self, base: &mut PhaseDescriptor) {
        if let Some(interval) = self.interval {
            base.interval = interval.as_secs();
        }
        if let Some(bracketing) = self.bracketing {
            base.bracketing = bracketing;
        }
        if let Some(aperture) = &self.aperture {
            base.aperture = aperture.clone();
        }
        if let Some(speed) = &self.speed {
            base.speed = speed.clone();
        }
        if let Some(iso) = &self.iso {
            base.iso = iso.clone();
        }
        if let Some(comp) = self.delay_compensation {
            base.delay_compensation = comp;
        }
    }
}

impl PhaseOverrides {
    /// Override for `kind`, if any.
    #[must_use]
    pub const fn get(&self, kind: PhaseKind) -> Option<&PhaseOverride> {
        match kind {
            PhaseKind::Resting => None,
            PhaseKind::Partial => self.partial.as_ref(),
            PhaseKind::DiamondRing => self.diamond_ring.as_ref(),
            PhaseKind::BaileysBeads => self.baileys_beads.as_ref(),
            PhaseKind::Totality => self.totality.as_ref(),
        }
    }

    /// The built-in table with every override applied.
    #[must_use]
    pub fn resolve(&self) -> PhaseTable {
        let mut table = PhaseTable::default();
        for (kind, slot) in [
            (PhaseKind::Partial, &mut table.partial),
            (PhaseKind::DiamondRing, &mut table.diamond_ring),
            (PhaseKind::BaileysBeads, &mut table.baileys_beads),
            (PhaseKind::Totality, &mut table.totality),
        ] {
            if let Some(over) = self.get(kind) {
                over.apply(slot);
            }
        }
        table
    }
}

// ============================================================================
// Camera
// ============================================================================

/// Which camera implementation to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CameraBackend {
    /// The `gphoto2` command line utility.
    #[default]
    Gphoto2,
    /// Log commands only.
    DryRun,
}

/// Camera settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraSection {
    /// Backend.
    pub backend: CameraBackend,
    /// Path or name of the `gphoto2` executable.
    pub binary: PathBuf,
    /// Download directory, created on startup.
    pub output_dir: PathBuf,
    /// File name template; `{timestamp}` and `{phase}` are expanded,
    /// `%n` is numbered by `gphoto2`.
    pub filename: String,
    /// Required focus mode; `null` skips the check.
    pub focus_mode: Option<String>,
    /// Expected drive mode; `null` skips the check.
    pub drive_mode: Option<String>,
}

impl Default for CameraSection {
    fn default() -> Self {
        Self {
            backend: CameraBackend::Gphoto2,
            binary: PathBuf::from("gphoto2"),
            output_dir: PathBuf::from("Eclipse"),
            filename: "t{timestamp}_%n".to_string(),
            focus_mode: Some("Manual".to_string()),
            drive_mode: Some("Single".to_string()),
        }
    }
}

// ============================================================================
// Notify
// ============================================================================

/// Notification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifySection {
    /// Speak messages as well as printing them.
    pub speech: bool,
    /// Synthesiser command line, fed `(SayText "...")` on stdin.
    pub command: Vec<String>,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            speech: true,
            command: vec!["festival".to_string(), "--pipe".to_string()],
        }
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Poll granularities of the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingSection {
    /// Sleep while resting.
    #[serde(with = "duration_serde")]
    pub resting_poll: Duration,
    /// Sleep during the partial phases.
    #[serde(with = "duration_serde")]
    pub partial_poll: Duration,
    /// Sleep during diamond ring and Bailey's beads.
    #[serde(with = "duration_serde")]
    pub hot_poll: Duration,
    /// Sleep during totality while a cycle is in progress.
    #[serde(with = "duration_serde")]
    pub totality_poll: Duration,
    /// Added to the remaining totality time so the loop wakes just after
    /// the beads return.
    #[serde(with = "duration_serde")]
    pub totality_margin: Duration,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            resting_poll: Duration::from_secs(5),
            partial_poll: Duration::from_millis(500),
            hot_poll: Duration::from_millis(50),
            totality_poll: Duration::from_millis(100),
            totality_margin: Duration::from_millis(500),
        }
    }
}

// ============================================================================
// Duration (de)serialization
// ============================================================================

/// Durations as humantime strings (`25s`, `1m 30s`, `500ms`) or plain
/// numbers of seconds.
pub mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Fractional(f64),
        Text(String),
    }

    fn convert<E: serde::de::Error>(raw: Raw) -> Result<Duration, E> {
        match raw {
            Raw::Seconds(s) => Ok(Duration::from_secs(s)),
            Raw::Fractional(s) => Duration::try_from_secs_f64(s)
                .map_err(|e| E::custom(format!("invalid duration {s}: {e}"))),
            Raw::Text(s) => humantime::parse_duration(s.trim())
                .map_err(|e| E::custom(format!("invalid duration '{s}': {e}"))),
        }
    }

    /// Serializes as a humantime string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*d))
    }

    /// Deserializes from a string or a number of seconds.
    ///
    /// # Errors
    ///
    /// Fails on negative numbers and unparseable strings.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        convert(Raw::deserialize(deserializer)?)
    }

    /// `Option<Duration>` variant.
    pub mod option {
        use std::time::Duration;

        use serde::{Deserialize, Deserializer, Serializer};

        /// Serializes `Some` as a humantime string and `None` as unit.
        ///
        /// # Errors
        ///
        /// Propagates serializer errors.
        #[allow(clippy::ref_option)]
        pub fn serialize<S: Serializer>(
            d: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match d {
                Some(d) => serializer.collect_str(&humantime::format_duration(*d)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an optional duration.
        ///
        /// # Errors
        ///
        /// Fails on negative numbers and unparseable strings.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<super::Raw>::deserialize(deserializer)?
                .map(super::convert)
                .transpose()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
eclipse:
  date: 2026-08-12
  contacts:
    c1: "17:32:47"
    c2: "18:27:31"
    c3: "18:29:10"
    c4: [19, 21, 33]
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: UmbraConfig = serde_yaml::from_str(MINIMAL).unwrap();
        assert_eq!(config.eclipse.diamond_ring, Duration::from_secs(25));
        assert_eq!(config.eclipse.baileys_beads, Duration::from_secs(10));
        assert_eq!(config.phases.resolve(), PhaseTable::default());
        assert_eq!(config.camera, CameraSection::default());
        assert!(config.notify.speech);
        assert_eq!(config.timing.hot_poll, Duration::from_millis(50));
    }

    #[test]
    fn schedule_uses_the_date() {
        let config: UmbraConfig = serde_yaml::from_str(MINIMAL).unwrap();
        let schedule = config.eclipse.schedule().unwrap();
        assert_eq!(schedule.c4().to_rfc3339(), "2026-08-12T19:21:33+00:00");
        assert_eq!(schedule.c2_dr().to_rfc3339(), "2026-08-12T18:27:06+00:00");
    }

    #[test]
    fn overrides_merge_onto_builtins() {
        let yaml = format!(
            "{MINIMAL}phases:\n  partial:\n    interval: 2m\n    iso: 100\n  totality:\n    speed: [\"1/1000\", 1]\n"
        );
        let config: UmbraConfig = serde_yaml::from_str(&yaml).unwrap();
        let table = config.phases.resolve();

        assert_eq!(table.partial.interval, 120);
        assert_eq!(table.partial.iso.values(), ["100"]);
        assert_eq!(table.partial.aperture.values(), ["10"]);
        assert_eq!(table.totality.speed.values(), ["1/1000", "1"]);
        // untouched tables keep their length
        assert_eq!(table.totality.aperture.len(), 8);
        assert_eq!(table.diamond_ring, PhaseTable::default().diamond_ring);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = format!("{MINIMAL}camera:\n  backnd: dry-run\n");
        assert!(serde_yaml::from_str::<UmbraConfig>(&yaml).is_err());
    }

    #[test]
    fn backend_spelling() {
        let yaml = format!("{MINIMAL}camera:\n  backend: dry-run\n  focus_mode: null\n");
        let config: UmbraConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(config.camera.backend, CameraBackend::DryRun);
        assert_eq!(config.camera.focus_mode, None);
        assert_eq!(config.camera.drive_mode.as_deref(), Some("Single"));
    }

    #[test]
    fn durations_accept_text_and_numbers() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(with = "duration_serde")]
            d: Duration,
        }
        let p: Probe = serde_yaml::from_str("d: 1m 30s").unwrap();
        assert_eq!(p.d, Duration::from_secs(90));
        let p: Probe = serde_yaml::from_str("d: 25").unwrap();
        assert_eq!(p.d, Duration::from_secs(25));
        let p: Probe = serde_yaml::from_str("d: 0.5").unwrap();
        assert_eq!(p.d, Duration::from_millis(500));
        assert!(serde_yaml::from_str::<Probe>("d: -1").is_err());
        assert!(serde_yaml::from_str::<Probe>("d: soon").is_err());
    }

    #[test]
    fn config_serializes_back_to_yaml() {
        let config: UmbraConfig = serde_yaml::from_str(MINIMAL).unwrap();
        let text = serde_yaml::to_string(&config).unwrap();
        assert!(text.contains("diamond_ring: 25s"));
        let again: UmbraConfig = serde_yaml::from_str(&text).unwrap();
        assert_eq!(again, config);
    }
}
