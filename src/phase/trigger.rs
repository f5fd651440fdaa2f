//! Trigger gate
//!
//! Decides, tick by tick, whether the current phase should capture now.
//!
//! - Periodic phases arm on whole wall-clock seconds divisible by their
//!   interval and then fire once per tick until a full cycle of settings has
//!   gone out.
//! - Continuous phases fire on every tick.
//!
//! Also home to the totality sleep calculation, which keeps the loop from
//! sleeping through the end of totality.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use super::descriptor::PhaseDescriptor;
use super::state::FireLatch;

/// Firing policy of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPolicy {
    /// Arm every `interval` seconds, then fire a full cycle.
    Periodic {
        /// Seconds between arming boundaries, never 0.
        interval: u64,
    },
    /// Fire on every tick.
    Continuous,
}

/// Why a tick fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireReason {
    /// Continuous phase.
    Continuous,
    /// Periodic latch armed on this tick at the given boundary second.
    Armed {
        /// Unix second of the boundary.
        second: i64,
    },
    /// Periodic latch still working through its cycle.
    Cycling {
        /// Shots still to fire, including this one.
        remaining: usize,
    },
}

impl fmt::Display for FireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Continuous => f.write_str("continuous"),
            Self::Armed { second } => write!(f, "armed at interval boundary {second}"),
            Self::Cycling { remaining } => write!(f, "cycle in progress ({remaining} left)"),
        }
    }
}

/// Result of evaluating the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
    /// Capture on this tick.
    Fired(FireReason),
    /// Nothing to do on this tick.
    NotMet,
}

impl TriggerResult {
    /// Returns `true` for [`TriggerResult::Fired`].
    #[must_use]
    pub const fn fired(&self) -> bool {
        matches!(self, Self::Fired(_))
    }
}

/// Evaluates the gate for `descriptor` at `now`.
///
/// A periodic latch arms at most once per boundary second, so a fast loop
/// that sees the same boundary second on several ticks fires one cycle only.
pub fn evaluate(
    descriptor: &PhaseDescriptor,
    latch: &mut FireLatch,
    now: DateTime<Utc>,
) -> TriggerResult {
    match descriptor.policy() {
        TriggerPolicy::Continuous => TriggerResult::Fired(FireReason::Continuous),
        TriggerPolicy::Periodic { interval } => {
            if latch.is_armed() {
                return TriggerResult::Fired(FireReason::Cycling {
                    remaining: latch.remaining(),
                });
            }
            let second = now.timestamp();
            // interval is a whole number of seconds well inside i64
            #[allow(clippy::cast_possible_wrap)]
            let on_boundary = second.rem_euclid(interval as i64) == 0;
            if on_boundary && latch.armed_at() != Some(second) {
                latch.arm(second, descriptor.cycle_len());
                TriggerResult::Fired(FireReason::Armed { second })
            } else {
                TriggerResult::NotMet
            }
        }
    }
}

/// Sleep after a completed totality cycle.
///
/// Sleeps a full `interval` while more than `interval + compensation`
/// remains before `remaining` runs out; otherwise sleeps just past the end
/// of the window (`remaining + margin`). A window that has already ended
/// gets the `idle` poll.
#[must_use]
pub fn compensated_sleep(
    remaining: TimeDelta,
    interval: Duration,
    compensation: Duration,
    margin: Duration,
    idle: Duration,
) -> Duration {
    let Ok(remaining) = remaining.to_std() else {
        return idle;
    };
    if remaining.is_zero() || interval.is_zero() {
        return idle;
    }
    if remaining > interval + compensation {
        interval
    } else {
        remaining + margin
    }
}
