//! Eclipse phase engine
//!
//! Drives the camera through the phases of a total solar eclipse. The
//! engine is a single cooperative loop; all mutable state lives in one
//! [`SequencerState`] owned by that loop.
//!
//! # Architecture
//!
//! - [`PhaseKind`] / [`PhaseDescriptor`] — immutable per-phase exposure tables
//! - [`SequencerState`] — per-phase cycle indices and the periodic fire latch
//! - [`sequencer`] — picks the next exposure setting for a phase
//! - [`trigger`] — decides whether the current tick should fire
//! - [`ControlLoop`] — polls the clock and ties everything together

pub mod descriptor;
pub mod engine;
pub mod exposure;
pub mod sequencer;
pub mod state;
pub mod trigger;

pub use descriptor::{Bracketing, PhaseDescriptor, PhaseTable, ValueSequence};
pub use engine::{ControlLoop, TickOutcome};
pub use exposure::{CaptureRequest, ExposureSetting};
pub use state::{FireLatch, PhaseTransition, SequencerState};
pub use trigger::{TriggerPolicy, TriggerResult};

use serde::Serialize;

/// The operating phases of the sequence.
///
/// Ordered the way they are first met on the way into totality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Outside the eclipse entirely (before C1 or after C4).
    Resting,
    /// Partial eclipse, filter on.
    Partial,
    /// Diamond ring, either side of totality.
    DiamondRing,
    /// Bailey's beads, either side of totality.
    BaileysBeads,
    /// Totality.
    Totality,
}

impl PhaseKind {
    /// Phases that own an exposure table.
    pub const ACTIVE: [Self; 4] = [
        Self::Partial,
        Self::DiamondRing,
        Self::BaileysBeads,
        Self::Totality,
    ];

    /// Stable machine-readable name, used for events and metric labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Resting => "resting",
            Self::Partial => "partial",
            Self::DiamondRing => "diamond_ring",
            Self::BaileysBeads => "baileys_beads",
            Self::Totality => "totality",
        }
    }

    /// Spoken message announced when the phase is entered.
    #[must_use]
    pub const fn announcement(self) -> &'static str {
        match self {
            Self::Resting => "Camera entering resting phase",
            Self::Partial => "Camera entering partial phase. Please ensure filter is on!",
            Self::DiamondRing => "Camera entering diamond ring phase. Ensure filter is off!",
            Self::BaileysBeads => "Camera entering Bailey's beads phase. Ensure filter is off!",
            Self::Totality => "Camera entering totality! Ensure filter is off!",
        }
    }

    /// Returns `true` for [`PhaseKind::Resting`].
    #[must_use]
    pub const fn is_resting(self) -> bool {
        matches!(self, Self::Resting)
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_snake_case() {
        assert_eq!(PhaseKind::DiamondRing.name(), "diamond_ring");
        assert_eq!(PhaseKind::BaileysBeads.to_string(), "baileys_beads");
    }

    #[test]
    fn serializes_like_name() {
        for kind in PhaseKind::ACTIVE {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
    }

    #[test]
    fn resting_is_not_active() {
        assert!(PhaseKind::Resting.is_resting());
        assert!(!PhaseKind::ACTIVE.contains(&PhaseKind::Resting));
    }
}
