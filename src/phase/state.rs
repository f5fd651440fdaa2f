//! Sequencer state
//!
//! The only mutable state of the sequence, owned by the control loop.
//! Configuration is never touched; everything that changes from tick to
//! tick is here.

use std::collections::HashMap;

use super::PhaseKind;

/// Record of a phase change observed by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    /// Phase of the previous tick, `None` on the very first tick.
    pub from: Option<PhaseKind>,
    /// Newly active phase.
    pub to: PhaseKind,
}

/// Arming state of the periodic trigger gate.
///
/// Armed on an interval boundary with the phase's cycle length; each shot
/// fired while armed counts down by one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireLatch {
    remaining: usize,
    armed_at: Option<i64>,
}

impl FireLatch {
    /// Arms the latch for `shots` captures at boundary second `second`.
    pub fn arm(&mut self, second: i64, shots: usize) {
        self.remaining = shots;
        self.armed_at = Some(second);
    }

    /// Returns `true` while shots remain.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.remaining > 0
    }

    /// Shots still to fire before disarming.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.remaining
    }

    /// Boundary second the latch was last armed at.
    #[must_use]
    pub const fn armed_at(&self) -> Option<i64> {
        self.armed_at
    }

    /// Counts one shot. Returns `true` when that shot completed the cycle.
    pub fn record_shot(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.remaining == 0
    }
}

/// Mutable sequencing state.
///
/// Cycle indices are keyed by phase and survive phase exits: re-entering a
/// phase resumes where its previous occurrence stopped.
#[derive(Debug, Clone, Default)]
pub struct SequencerState {
    current: Option<PhaseKind>,
    cycle_index: HashMap<PhaseKind, u64>,
    latch: FireLatch,
    bracketing_pending: bool,
}

impl SequencerState {
    /// Fresh state with no phase and every index at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase observed on the previous tick.
    #[must_use]
    pub const fn current(&self) -> Option<PhaseKind> {
        self.current
    }

    /// Records the phase of this tick.
    ///
    /// Returns the transition when it differs from the previous tick. A
    /// transition disarms the fire latch and marks the new phase's
    /// bracketing as still to be configured; cycle indices are left alone.
    pub fn enter(&mut self, phase: PhaseKind) -> Option<PhaseTransition> {
        if self.current == Some(phase) {
            return None;
        }
        let transition = PhaseTransition {
            from: self.current,
            to: phase,
        };
        self.current = Some(phase);
        self.latch = FireLatch {
            remaining: 0,
            armed_at: self.latch.armed_at,
        };
        self.bracketing_pending = !phase.is_resting();
        Some(transition)
    }

    /// Next cycle index for `phase`.
    #[must_use]
    pub fn cycle_index(&self, phase: PhaseKind) -> u64 {
        self.cycle_index.get(&phase).copied().unwrap_or(0)
    }

    /// Advances the cycle index of `phase`, returning the index that was
    /// current before the call.
    pub fn advance_cycle(&mut self, phase: PhaseKind) -> u64 {
        let slot = self.cycle_index.entry(phase).or_insert(0);
        let used = *slot;
        *slot = slot.wrapping_add(1);
        used
    }

    /// The periodic fire latch.
    #[must_use]
    pub const fn latch(&self) -> &FireLatch {
        &self.latch
    }

    /// Mutable access to the periodic fire latch.
    pub const fn latch_mut(&mut self) -> &mut FireLatch {
        &mut self.latch
    }

    /// Whether the current phase's bracketing still has to be sent to the camera.
    #[must_use]
    pub const fn bracketing_pending(&self) -> bool {
        self.bracketing_pending
    }

    /// Marks the current phase's bracketing as configured.
    pub const fn bracketing_configured(&mut self) {
        self.bracketing_pending = false;
    }
}
