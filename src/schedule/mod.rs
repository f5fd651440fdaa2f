//! Contact schedule and phase classification
//!
//! - [`ContactSchedule`] holds C1–C4 and derives the windows around second
//!   and third contact.
//! - [`classify`] maps an instant onto the active [`PhaseKind`](crate::phase::PhaseKind).

pub mod classify;
pub mod contact;

pub use classify::classify;
pub use contact::{Boundary, ContactSchedule, ContactTime};
