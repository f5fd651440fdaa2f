//! Exposure sequencer
//!
//! Each of aperture, speed and ISO is picked at `index mod len` from its own
//! table, with one index per phase shared by all three so they advance in
//! lock-step. The index is bumped on every call, whether or not the capture
//! that follows succeeds.

use super::descriptor::PhaseDescriptor;
use super::exposure::ExposureSetting;
use super::state::SequencerState;

/// Returns the next setting for the descriptor's phase and advances that
/// phase's cycle index.
pub fn next(descriptor: &PhaseDescriptor, state: &mut SequencerState) -> ExposureSetting {
    let index = state.advance_cycle(descriptor.kind);
    descriptor.setting_at(index)
}
