//! Progress sink
//!
//! Purely observational: the control loop reports how far it is through
//! the long, quiet stretches of the sequence (waiting for C1, the partial
//! phases, totality) and a sink renders that however it likes.

use std::fmt;
use std::io::{IsTerminal, Write};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::phase::PhaseKind;
use crate::schedule::ContactSchedule;

/// A stretch of the sequence with a known end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgressStage {
    /// Before first contact.
    WaitingForFirstContact,
    /// Partial phase on the way in, until the diamond ring.
    PartialToDiamondRing,
    /// Totality, until the beads return.
    Totality,
    /// Partial phase on the way out, until fourth contact.
    PartialToFourthContact,
}

impl ProgressStage {
    /// Label shown next to the bar.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::WaitingForFirstContact => "(Waiting) C1",
            Self::PartialToDiamondRing => "(Partial) C2 DR",
            Self::Totality => "(Total) C3",
            Self::PartialToFourthContact => "(Partial) C4",
        }
    }

    /// The stage `now` falls in, with the instant it ends.
    #[must_use]
    pub fn at(
        now: DateTime<Utc>,
        phase: PhaseKind,
        schedule: &ContactSchedule,
    ) -> Option<(Self, DateTime<Utc>)> {
        match phase {
            PhaseKind::Resting if now < schedule.c1() => {
                Some((Self::WaitingForFirstContact, schedule.c1()))
            }
            PhaseKind::Partial if now < schedule.c2_dr() => {
                Some((Self::PartialToDiamondRing, schedule.c2_dr()))
            }
            PhaseKind::Partial => Some((Self::PartialToFourthContact, schedule.c4())),
            PhaseKind::Totality => Some((Self::Totality, schedule.c3_bb2())),
            _ => None,
        }
    }
}

impl fmt::Display for ProgressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives progress updates.
pub trait ProgressSink: Send + Sync {
    /// `elapsed` out of `total` of `stage` has passed.
    fn update(&self, stage: ProgressStage, elapsed: Duration, total: Duration);

    /// The stage is over.
    fn finish(&self, stage: ProgressStage);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _stage: ProgressStage, _elapsed: Duration, _total: Duration) {}

    fn finish(&self, _stage: ProgressStage) {}
}

const BAR_WIDTH: usize = 30;

/// Renders a bar of `width` cells.
#[must_use]
pub fn render_bar(elapsed: Duration, total: Duration, width: usize) -> String {
    let filled = if total.is_zero() {
        width
    } else {
        let ratio = (elapsed.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let cells = (ratio * width as f64).round() as usize;
        cells.min(width)
    };
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

#[derive(Debug, Default)]
struct BarState {
    stage: Option<ProgressStage>,
    last_second: Option<u64>,
}

/// One-line progress bar on stderr.
///
/// Does nothing unless stderr is a terminal.
#[derive(Debug)]
pub struct TerminalProgress {
    enabled: bool,
    state: Mutex<BarState>,
}

impl TerminalProgress {
    /// Creates a bar bound to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: std::io::stderr().is_terminal(),
            state: Mutex::new(BarState::default()),
        }
    }
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for TerminalProgress {
    fn update(&self, stage: ProgressStage, elapsed: Duration, total: Duration) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let second = elapsed.as_secs();
        if state.stage == Some(stage) && state.last_second == Some(second) {
            return;
        }
        let mut err = std::io::stderr().lock();
        if state.stage.is_some_and(|s| s != stage) {
            let _ = writeln!(err);
        }
        let left = Duration::from_secs(total.saturating_sub(elapsed).as_secs());
        let _ = write!(
            err,
            "\r{stage}: {} {second}/{}s ({} left)\x1b[K",
            render_bar(elapsed, total, BAR_WIDTH),
            total.as_secs(),
            humantime::format_duration(left),
        );
        let _ = err.flush();
        state.stage = Some(stage);
        state.last_second = Some(second);
    }

    fn finish(&self, stage: ProgressStage) {
        if !self.enabled {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.stage == Some(stage) {
            let _ = writeln!(std::io::stderr());
            *state = BarState::default();
        }
    }
}
