//! Immutable phase descriptors
//!
//! A descriptor is static configuration: the firing interval, the bracketing
//! mode and the aperture / speed / ISO tables of one phase. Nothing in here
//! is ever mutated once loaded; cycling state lives in
//! [`SequencerState`](super::SequencerState).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::PhaseKind;
use super::exposure::ExposureSetting;
use super::trigger::TriggerPolicy;

// ============================================================================
// Value tokens
// ============================================================================

/// A scalar as written in YAML. Device tokens are opaque, so numbers are
/// kept in the textual form the camera expects (`200`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScalarToken {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl TryFrom<ScalarToken> for String {
    type Error = String;

    /// Unquoted decimals are refused: YAML has already turned `6.30` into
    /// `6.3` and `1.0` into `1`, and the camera matches tokens literally.
    fn try_from(token: ScalarToken) -> Result<Self, Self::Error> {
        match token {
            ScalarToken::Text(s) => Ok(s),
            ScalarToken::Integer(n) => Ok(n.to_string()),
            ScalarToken::Float(x) => Err(format!(
                "decimal value {x} must be quoted (e.g. \"{x}\") so it reaches the camera as written"
            )),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(ScalarToken),
    Many(Vec<ScalarToken>),
}

/// An ordered, non-empty sequence of device value tokens.
///
/// A single configured value is simply a sequence of length one, so the
/// sequencer never has to tell scalars and lists apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OneOrMany", into = "Vec<String>")]
pub struct ValueSequence(Vec<String>);

impl ValueSequence {
    /// Builds a sequence, returning `None` when `values` is empty.
    #[must_use]
    pub fn new(values: Vec<String>) -> Option<Self> {
        if values.is_empty() {
            None
        } else {
            Some(Self(values))
        }
    }

    /// A sequence holding one value.
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![value.into()])
    }

    fn from_strs(values: &[&str]) -> Self {
        Self(values.iter().map(|v| (*v).to_string()).collect())
    }

    /// Number of values; always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with slices.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Element selected by `index`, taken modulo this sequence's own length.
    #[must_use]
    pub fn at(&self, index: u64) -> &str {
        // len() >= 1, and the remainder is < len so it fits in usize
        #[allow(clippy::cast_possible_truncation)]
        let slot = (index % self.0.len() as u64) as usize;
        &self.0[slot]
    }

    /// All values in order.
    #[must_use]
    pub fn values(&self) -> &[String] {
        &self.0
    }
}

impl TryFrom<OneOrMany> for ValueSequence {
    type Error = String;

    fn try_from(raw: OneOrMany) -> Result<Self, Self::Error> {
        let values: Vec<String> = match raw {
            OneOrMany::One(token) => vec![token.try_into()?],
            OneOrMany::Many(tokens) => tokens
                .into_iter()
                .map(String::try_from)
                .collect::<Result<_, _>>()?,
        };
        Self::new(values).ok_or_else(|| "value list must contain at least one value".to_string())
    }
}

impl From<ValueSequence> for Vec<String> {
    fn from(seq: ValueSequence) -> Self {
        seq.0
    }
}

// ============================================================================
// Bracketing
// ============================================================================

/// Automatic exposure bracketing span.
///
/// A closed set: the camera adapter owns the mapping to device wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bracketing {
    /// Single exposure per shot.
    #[default]
    Off,
    /// ±⅓ EV
    Third,
    /// ±⅔ EV
    TwoThirds,
    /// ±1 EV
    One,
    /// ±1⅓ EV
    OneAndThird,
    /// ±1⅔ EV
    OneAndTwoThirds,
    /// ±2 EV
    Two,
}

impl Bracketing {
    /// Every mode, narrowest first.
    pub const ALL: [Self; 7] = [
        Self::Off,
        Self::Third,
        Self::TwoThirds,
        Self::One,
        Self::OneAndThird,
        Self::OneAndTwoThirds,
        Self::Two,
    ];

    /// Configuration spelling.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Third => "1/3",
            Self::TwoThirds => "2/3",
            Self::One => "1",
            Self::OneAndThird => "1 1/3",
            Self::OneAndTwoThirds => "1 2/3",
            Self::Two => "2",
        }
    }

    /// Frames produced by one shot in this mode.
    #[must_use]
    pub const fn frames(self) -> usize {
        match self {
            Self::Off => 1,
            _ => 3,
        }
    }

    /// Returns `true` unless bracketing is off.
    #[must_use]
    pub const fn is_on(self) -> bool {
        !matches!(self, Self::Off)
    }
}

impl fmt::Display for Bracketing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Off => f.write_str("off"),
            other => write!(f, "±{} EV", other.label()),
        }
    }
}

impl FromStr for Bracketing {
    type Err = String;

    /// Whole-number spans need a `±` or an `EV`: a bare `2` is how
    /// `gphoto2` spells its aeb index for ±⅔ EV, not ±2 EV.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unsigned = trimmed.trim_start_matches('±');
        let normalized = unsigned.trim_end_matches("EV").trim();
        let marked = unsigned.len() != trimmed.len() || normalized.len() != unsigned.trim().len();
        match normalized.to_ascii_lowercase().as_str() {
            "off" | "none" | "0" => Ok(Self::Off),
            "1/3" => Ok(Self::Third),
            "2/3" => Ok(Self::TwoThirds),
            "1" if marked => Ok(Self::One),
            "1 1/3" | "4/3" => Ok(Self::OneAndThird),
            "1 2/3" | "5/3" => Ok(Self::OneAndTwoThirds),
            "2" if marked => Ok(Self::Two),
            "1" | "2" => Err(format!(
                "ambiguous bracketing '{s}': write \"±{normalized} EV\" for a ±{normalized} EV span"
            )),
            _ => Err(format!(
                "unknown bracketing '{s}' (expected off, 1/3, 2/3, ±1 EV, 1 1/3, 1 2/3 or ±2 EV)"
            )),
        }
    }
}

impl Serialize for Bracketing {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Bracketing {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::try_from(ScalarToken::deserialize(deserializer)?)
            .map_err(serde::de::Error::custom)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Phase Descriptor
// ============================================================================

/// Static exposure configuration for one active phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseDescriptor {
    /// Which phase this describes.
    pub kind: PhaseKind,
    /// Firing interval in whole seconds; 0 fires on every tick.
    pub interval: u64,
    /// Bracketing applied to every shot of the phase.
    pub bracketing: Bracketing,
    /// Aperture tokens, cycled.
    pub aperture: ValueSequence,
    /// Shutter speed tokens, cycled.
    pub speed: ValueSequence,
    /// ISO tokens, cycled.
    pub iso: ValueSequence,
    /// Slack kept before the end of the window when sleeping between cycles.
    #[serde(with = "crate::config::schema::duration_serde")]
    pub delay_compensation: Duration,
}

impl PhaseDescriptor {
    /// Built-in exposure table for `kind`.
    ///
    /// Returns `None` for [`PhaseKind::Resting`], which never fires.
    #[must_use]
    pub fn default_for(kind: PhaseKind) -> Option<Self> {
        match kind {
            PhaseKind::Resting => None,
            PhaseKind::Partial => Some(Self::builtin_partial()),
            PhaseKind::DiamondRing => Some(Self::builtin_diamond_ring()),
            PhaseKind::BaileysBeads => Some(Self::builtin_baileys_beads()),
            PhaseKind::Totality => Some(Self::builtin_totality()),
        }
    }

    fn builtin_partial() -> Self {
        Self {
            kind: PhaseKind::Partial,
            interval: 120,
            bracketing: Bracketing::One,
            aperture: ValueSequence::single("10"),
            speed: ValueSequence::single("1/1000"),
            iso: ValueSequence::single("200"),
            delay_compensation: Duration::ZERO,
        }
    }

    fn builtin_diamond_ring() -> Self {
        Self {
            kind: PhaseKind::DiamondRing,
            interval: 0,
            bracketing: Bracketing::OneAndThird,
            aperture: ValueSequence::single("11"),
            speed: ValueSequence::single("1/4000"),
            iso: ValueSequence::single("200"),
            delay_compensation: Duration::ZERO,
        }
    }

    fn builtin_baileys_beads() -> Self {
        Self {
            kind: PhaseKind::BaileysBeads,
            interval: 0,
            bracketing: Bracketing::OneAndTwoThirds,
            aperture: ValueSequence::single("16"),
            speed: ValueSequence::single("1/3200"),
            iso: ValueSequence::single("200"),
            delay_compensation: Duration::ZERO,
        }
    }

    // chromosphere, prominences, lower / inner / middle / outer / far outer
    // corona, earthshine
    fn builtin_totality() -> Self {
        Self {
            kind: PhaseKind::Totality,
            interval: 5,
            bracketing: Bracketing::Off,
            aperture: ValueSequence::from_strs(&["16", "11", "10", "10", "8", "6.3", "6.3", "6.3"]),
            speed: ValueSequence::from_strs(&[
                "1/1600", "1/1600", "1/500", "1/60", "1/25", "1/10", "0.5", "1",
            ]),
            iso: ValueSequence::from_strs(&["200", "200", "200", "200", "400", "400", "400", "400"]),
            delay_compensation: Duration::from_secs(3),
        }
    }

    /// Cycle length N: the longest of the three value tables.
    #[must_use]
    pub fn cycle_len(&self) -> usize {
        self.aperture
            .len()
            .max(self.speed.len())
            .max(self.iso.len())
    }

    /// Firing policy implied by the interval.
    #[must_use]
    pub const fn policy(&self) -> TriggerPolicy {
        if self.interval == 0 {
            TriggerPolicy::Continuous
        } else {
            TriggerPolicy::Periodic {
                interval: self.interval,
            }
        }
    }

    /// Setting selected by a cycle index.
    #[must_use]
    pub fn setting_at(&self, index: u64) -> ExposureSetting {
        ExposureSetting {
            aperture: self.aperture.at(index).to_string(),
            speed: self.speed.at(index).to_string(),
            iso: self.iso.at(index).to_string(),
        }
    }
}

/// Descriptors for every active phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTable {
    /// Partial phase (both sides of totality).
    pub partial: PhaseDescriptor,
    /// Diamond ring (both sides).
    pub diamond_ring: PhaseDescriptor,
    /// Bailey's beads (both sides).
    pub baileys_beads: PhaseDescriptor,
    /// Totality.
    pub totality: PhaseDescriptor,
}

impl PhaseTable {
    /// Descriptor for `kind`, or `None` while resting.
    #[must_use]
    pub const fn get(&self, kind: PhaseKind) -> Option<&PhaseDescriptor> {
        match kind {
            PhaseKind::Resting => None,
            PhaseKind::Partial => Some(&self.partial),
            PhaseKind::DiamondRing => Some(&self.diamond_ring),
            PhaseKind::BaileysBeads => Some(&self.baileys_beads),
            PhaseKind::Totality => Some(&self.totality),
        }
    }

    /// Iterates over the four descriptors in phase order.
    pub fn iter(&self) -> impl Iterator<Item = &PhaseDescriptor> {
        [
            &self.partial,
            &self.diamond_ring,
            &self.baileys_beads,
            &self.totality,
        ]
        .into_iter()
    }
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self {
            partial: PhaseDescriptor::builtin_partial(),
            diamond_ring: PhaseDescriptor::builtin_diamond_ring(),
            baileys_beads: PhaseDescriptor::builtin_baileys_beads(),
            totality: PhaseDescriptor::builtin_totality(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_sequence_accepts_scalar_and_list() {
        let one: ValueSequence = serde_yaml::from_str("\"6.3\"").unwrap();
        assert_eq!(one.values(), ["6.3"]);

        let iso: ValueSequence = serde_yaml::from_str("200").unwrap();
        assert_eq!(iso.values(), ["200"]);

        let many: ValueSequence = serde_yaml::from_str("[\"1/1600\", \"0.5\", 1]").unwrap();
        assert_eq!(many.values(), ["1/1600", "0.5", "1"]);
    }

    #[test]
    fn value_sequence_keeps_quoted_decimals_verbatim() {
        let seq: ValueSequence = serde_yaml::from_str("[\"6.30\", \"1.0\"]").unwrap();
        assert_eq!(seq.values(), ["6.30", "1.0"]);
    }

    #[test]
    fn value_sequence_rejects_unquoted_decimals() {
        for yaml in ["6.30", "[\"8\", 1.0]"] {
            let err = serde_yaml::from_str::<ValueSequence>(yaml).unwrap_err();
            assert!(err.to_string().contains("must be quoted"), "{yaml}: {err}");
        }
    }

    #[test]
    fn value_sequence_rejects_empty_list() {
        let result: Result<ValueSequence, _> = serde_yaml::from_str("[]");
        assert!(result.is_err());
    }

    #[test]
    fn value_sequence_indexes_modulo_own_length() {
        let seq = ValueSequence::from_strs(&["a", "b", "c"]);
        assert_eq!(seq.at(0), "a");
        assert_eq!(seq.at(4), "b");
        assert_eq!(seq.at(u64::MAX), seq.at(u64::MAX % 3));
    }

    #[test]
    fn bracketing_parses_common_spellings() {
        assert_eq!("off".parse::<Bracketing>().unwrap(), Bracketing::Off);
        assert_eq!("±1 EV".parse::<Bracketing>().unwrap(), Bracketing::One);
        assert_eq!("2EV".parse::<Bracketing>().unwrap(), Bracketing::Two);
        assert_eq!("±2".parse::<Bracketing>().unwrap(), Bracketing::Two);
        assert_eq!("4/3".parse::<Bracketing>().unwrap(), Bracketing::OneAndThird);
        assert_eq!(
            "1 2/3".parse::<Bracketing>().unwrap(),
            Bracketing::OneAndTwoThirds
        );
        assert!("3".parse::<Bracketing>().is_err());
    }

    #[test]
    fn bracketing_rejects_bare_whole_numbers() {
        for bare in ["1", "2", " 2 "] {
            let err = bare.parse::<Bracketing>().unwrap_err();
            assert!(err.contains("ambiguous"), "{bare}: {err}");
        }
        let err = serde_yaml::from_str::<Bracketing>("2").unwrap_err();
        assert!(err.to_string().contains("±2 EV"), "{err}");
    }

    #[test]
    fn bracketing_deserializes_from_yaml() {
        let b: Bracketing = serde_yaml::from_str("0").unwrap();
        assert_eq!(b, Bracketing::Off);
        let b: Bracketing = serde_yaml::from_str("\"±2 EV\"").unwrap();
        assert_eq!(b, Bracketing::Two);
        let b: Bracketing = serde_yaml::from_str("\"1 1/3\"").unwrap();
        assert_eq!(b, Bracketing::OneAndThird);
    }

    #[test]
    fn bracketing_display_round_trips() {
        for mode in Bracketing::ALL {
            assert_eq!(mode.to_string().parse::<Bracketing>().unwrap(), mode);
            let yaml = serde_yaml::to_string(&mode).unwrap();
            assert_eq!(serde_yaml::from_str::<Bracketing>(&yaml).unwrap(), mode);
        }
    }

    #[test]
    fn bracketing_frames() {
        assert_eq!(Bracketing::Off.frames(), 1);
        assert_eq!(Bracketing::Two.frames(), 3);
    }

    #[test]
    fn cycle_len_is_longest_table() {
        let mut d = PhaseDescriptor::default_for(PhaseKind::DiamondRing).unwrap();
        assert_eq!(d.cycle_len(), 1);
        d.speed = ValueSequence::from_strs(&["1/4000", "1/2000", "1/1000", "1/500"]);
        d.aperture = ValueSequence::from_strs(&["11", "8"]);
        assert_eq!(d.cycle_len(), 4);
    }

    #[test]
    fn default_totality_table_has_eight_exposures() {
        let table = PhaseTable::default();
        assert_eq!(table.totality.cycle_len(), 8);
        assert_eq!(table.totality.interval, 5);
        assert_eq!(table.totality.delay_compensation, Duration::from_secs(3));
        assert_eq!(table.totality.setting_at(7).speed, "1");
    }

    #[test]
    fn policy_follows_interval() {
        let table = PhaseTable::default();
        assert_eq!(
            table.partial.policy(),
            TriggerPolicy::Periodic { interval: 120 }
        );
        assert_eq!(table.diamond_ring.policy(), TriggerPolicy::Continuous);
    }

    #[test]
    fn table_lookup() {
        let table = PhaseTable::default();
        assert!(table.get(PhaseKind::Resting).is_none());
        for kind in PhaseKind::ACTIVE {
            assert_eq!(table.get(kind).unwrap().kind, kind);
        }
        assert_eq!(table.iter().count(), 4);
    }
}
