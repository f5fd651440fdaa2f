//! Contact clock
//!
//! Turns four wall-clock contact times on a calendar date into absolute UTC
//! instants and derives the boundaries around second and third contact.
//! Nothing here validates ordering; that is left to the configuration
//! validator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Contact Time
// ============================================================================

/// A contact time of day in UTC, with whole-second precision.
///
/// Deserializes from `"HH:MM:SS"` or from an `[h, m, s]` sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ContactTime(NaiveTime);

impl ContactTime {
    /// Builds a contact time, returning `None` for out-of-range fields.
    #[must_use]
    pub fn new(hour: u32, minute: u32, second: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, second).map(Self)
    }

    /// The time of day.
    #[must_use]
    pub const fn time(self) -> NaiveTime {
        self.0
    }

    /// The instant this time falls on for `date`.
    #[must_use]
    pub fn on(self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.0).and_utc()
    }
}

impl fmt::Display for ContactTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

impl FromStr for ContactTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
            .map(Self)
            .map_err(|e| format!("invalid contact time '{s}' (expected HH:MM:SS): {e}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawContactTime {
    Text(String),
    Parts(u32, u32, u32),
}

impl<'de> Deserialize<'de> for ContactTime {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawContactTime::deserialize(deserializer)? {
            RawContactTime::Text(s) => s.parse().map_err(serde::de::Error::custom),
            RawContactTime::Parts(h, m, s) => Self::new(h, m, s).ok_or_else(|| {
                serde::de::Error::custom(format!("invalid contact time [{h}, {m}, {s}]"))
            }),
        }
    }
}

impl Serialize for ContactTime {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ============================================================================
// Contact Schedule
// ============================================================================

/// The four contacts plus the eight derived boundary instants.
///
/// Computed once at startup and never changed. Behaviour downstream is only
/// defined when
/// `C1 ≤ C2_DR ≤ C2_BB ≤ C2 ≤ C2_BB2 ≤ C3_BB2 ≤ C3 ≤ C3_BB ≤ C3_DR ≤ C4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSchedule {
    c1: DateTime<Utc>,
    c2: DateTime<Utc>,
    c3: DateTime<Utc>,
    c4: DateTime<Utc>,
    diamond_ring: TimeDelta,
    baileys_beads: TimeDelta,
}

impl ContactSchedule {
    /// Builds a schedule from absolute contact instants `[C1, C2, C3, C4]`
    /// and the two lead durations.
    #[must_use]
    pub const fn new(
        contacts: [DateTime<Utc>; 4],
        diamond_ring: TimeDelta,
        baileys_beads: TimeDelta,
    ) -> Self {
        let [c1, c2, c3, c4] = contacts;
        Self {
            c1,
            c2,
            c3,
            c4,
            diamond_ring,
            baileys_beads,
        }
    }

    /// Builds a schedule from contact times of day on `date`.
    #[must_use]
    pub fn on_date(
        date: NaiveDate,
        contacts: [ContactTime; 4],
        diamond_ring: TimeDelta,
        baileys_beads: TimeDelta,
    ) -> Self {
        Self::new(contacts.map(|c| c.on(date)), diamond_ring, baileys_beads)
    }

    /// First contact.
    #[must_use]
    pub const fn c1(&self) -> DateTime<Utc> {
        self.c1
    }

    /// Second contact.
    #[must_use]
    pub const fn c2(&self) -> DateTime<Utc> {
        self.c2
    }

    /// Third contact.
    #[must_use]
    pub const fn c3(&self) -> DateTime<Utc> {
        self.c3
    }

    /// Fourth contact.
    #[must_use]
    pub const fn c4(&self) -> DateTime<Utc> {
        self.c4
    }

    /// Diamond ring lead.
    #[must_use]
    pub const fn diamond_ring_lead(&self) -> TimeDelta {
        self.diamond_ring
    }

    /// Bailey's beads lead.
    #[must_use]
    pub const fn baileys_beads_lead(&self) -> TimeDelta {
        self.baileys_beads
    }

    /// `C2 − diamond ring`: start of the rising diamond ring window.
    #[must_use]
    pub fn c2_dr(&self) -> DateTime<Utc> {
        shift(self.c2, -self.diamond_ring)
    }

    /// `C2 − beads`: start of the rising Bailey's beads window.
    #[must_use]
    pub fn c2_bb(&self) -> DateTime<Utc> {
        shift(self.c2, -self.baileys_beads)
    }

    /// `C2 + beads`: start of totality proper.
    #[must_use]
    pub fn c2_bb2(&self) -> DateTime<Utc> {
        shift(self.c2, self.baileys_beads)
    }

    /// `C3 − beads`: end of totality proper.
    #[must_use]
    pub fn c3_bb2(&self) -> DateTime<Utc> {
        shift(self.c3, -self.baileys_beads)
    }

    /// `C3 + beads`: end of the falling Bailey's beads window.
    #[must_use]
    pub fn c3_bb(&self) -> DateTime<Utc> {
        shift(self.c3, self.baileys_beads)
    }

    /// `C3 + diamond ring`: end of the falling diamond ring window.
    #[must_use]
    pub fn c3_dr(&self) -> DateTime<Utc> {
        shift(self.c3, self.diamond_ring)
    }

    /// The four contacts in order.
    #[must_use]
    pub const fn contacts(&self) -> [DateTime<Utc>; 4] {
        [self.c1, self.c2, self.c3, self.c4]
    }

    /// Every boundary, in chronological order for a well-formed schedule.
    #[must_use]
    pub fn boundaries(&self) -> Vec<Boundary> {
        vec![
            Boundary::new("C1", self.c1),
            Boundary::new("C2_DR", self.c2_dr()),
            Boundary::new("C2_BB", self.c2_bb()),
            Boundary::new("C2", self.c2),
            Boundary::new("C2_BB2", self.c2_bb2()),
            Boundary::new("C3_BB2", self.c3_bb2()),
            Boundary::new("C3", self.c3),
            Boundary::new("C3_BB", self.c3_bb()),
            Boundary::new("C3_DR", self.c3_dr()),
            Boundary::new("C4", self.c4),
        ]
    }

    /// Returns `true` when the boundary chain is non-decreasing.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.boundaries().windows(2).all(|w| w[0].at <= w[1].at)
    }
}

/// A named boundary instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Boundary {
    /// Short label such as `C2_DR`.
    pub name: &'static str,
    /// The instant.
    pub at: DateTime<Utc>,
}

impl Boundary {
    const fn new(name: &'static str, at: DateTime<Utc>) -> Self {
        Self { name, at }
    }
}

// Saturates at the representable range instead of panicking.
fn shift(at: DateTime<Utc>, by: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(if by < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
