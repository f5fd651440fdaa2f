//! Exposure settings and capture requests
//!
//! Setting tokens are opaque to the sequencer. The only place their
//! magnitude is looked at is [`ExposureSetting::exposure_value`], which is
//! used for informational logging.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PhaseKind;
use super::descriptor::Bracketing;

/// One aperture / shutter speed / ISO combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExposureSetting {
    /// Aperture token, e.g. `"6.3"`.
    pub aperture: String,
    /// Shutter speed token, e.g. `"1/1600"` or `"0.5"`.
    pub speed: String,
    /// ISO token, e.g. `"200"`.
    pub iso: String,
}

impl ExposureSetting {
    /// Exposure value normalised to ISO 100 (EV100), when every token reads
    /// as a number.
    ///
    /// `EV100 = log2(N² / t) − log2(ISO / 100)`
    #[must_use]
    pub fn exposure_value(&self) -> Option<f64> {
        let n = parse_aperture(&self.aperture)?;
        let t = parse_speed(&self.speed)?;
        let iso: f64 = self.iso.trim().parse().ok()?;
        if n <= 0.0 || t <= 0.0 || iso <= 0.0 {
            return None;
        }
        Some((n * n / t).log2() - (iso / 100.0).log2())
    }
}

impl std::fmt::Display for ExposureSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f/{} {}s ISO {}", self.aperture, self.speed, self.iso)
    }
}

fn parse_aperture(token: &str) -> Option<f64> {
    let t = token.trim();
    let t = t
        .strip_prefix("f/")
        .or_else(|| t.strip_prefix('f'))
        .unwrap_or(t);
    t.parse().ok()
}

fn parse_speed(token: &str) -> Option<f64> {
    let t = token.trim().trim_end_matches(['s', '"']);
    if let Some((num, den)) = t.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }
    t.parse().ok()
}

/// Fully resolved capture handed to the camera sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureRequest {
    /// Exposure to use.
    #[serde(flatten)]
    pub setting: ExposureSetting,
    /// Bracketing mode of the phase.
    pub bracketing: Bracketing,
    /// Phase that requested the capture.
    pub phase: PhaseKind,
    /// Cycle index the setting was drawn from.
    pub cycle_index: u64,
    /// When the request was issued.
    pub timestamp: DateTime<Utc>,
}
