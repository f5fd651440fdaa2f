//! `umbra` - unattended camera sequencer for total solar eclipses
//!
//! This library classifies each instant of an eclipse into a phase, picks
//! the exposure for that phase and drives a tethered camera through it,
//! announcing what happens along the way.

pub mod camera;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod notify;
pub mod observability;
pub mod phase;
pub mod preflight;
pub mod progress;
pub mod schedule;
