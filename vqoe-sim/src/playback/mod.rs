//! Playback state machine.
//!
//! A run owns a single session that is advanced once per completed segment
//! download. Reported buffer occupancy is clamped to the configured soft
//! capacity; downloads are never deferred.

mod invariants;
mod session;
mod simulator;

pub use invariants::SimulationInvariantError;
pub use simulator::PlaybackSimulator;
