//! Phase classifier
//!
//! A pure function from an instant to the active phase. Rules are tried in
//! order and the first match wins, which settles every shared boundary
//! point in favour of the earlier rule:
//!
//! | # | window                                                   | phase         |
//! |---|----------------------------------------------------------|---------------|
//! | 1 | `now < C1` or `now > C4`                                 | Resting       |
//! | 2 | `C1 ≤ now < C2_DR` or `C3_DR < now ≤ C4`                 | Partial       |
//! | 3 | `C2_DR ≤ now ≤ C2_BB` or `C3_BB ≤ now ≤ C3_DR`           | DiamondRing   |
//! | 4 | `C2_BB < now ≤ C2_BB2` or `C3_BB2 ≤ now < C3_BB`         | BaileysBeads  |
//! | 5 | `C2_BB2 < now < C3_BB2`                                  | Totality      |
//!
//! The falling diamond ring window is closed at `C3_DR` so that instant is
//! covered as well.

use chrono::{DateTime, Utc};

use super::ContactSchedule;
use crate::phase::PhaseKind;

/// Returns the phase active at `now`.
#[must_use]
pub fn classify(now: DateTime<Utc>, schedule: &ContactSchedule) -> PhaseKind {
    let s = schedule;

    if now < s.c1() || now > s.c4() {
        PhaseKind::Resting
    } else if now < s.c2_dr() || (s.c3_dr() < now && now <= s.c4()) {
        PhaseKind::Partial
    } else if now <= s.c2_bb() || (s.c3_bb() <= now && now <= s.c3_dr()) {
        PhaseKind::DiamondRing
    } else if now <= s.c2_bb2() || (s.c3_bb2() <= now && now < s.c3_bb()) {
        PhaseKind::BaileysBeads
    } else if now < s.c3_bb2() {
        PhaseKind::Totality
    } else {
        // only reachable when the boundary chain is out of order
        PhaseKind::Resting
    }
}
