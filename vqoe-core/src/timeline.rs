//! Playback timeline produced by one simulation run.
//!
//! The segment event log is append-only and is the complete audit trail
//! the QoE aggregator consumes.

use std::fmt;

use serde::Serialize;

use crate::manifest::RungId;

/// Player state machine phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlaybackPhase {
    /// Downloading before the startup threshold is reached
    Startup,
    /// Buffer draining at real-time rate
    Playing,
    /// Buffer empty, waiting for the in-flight download
    Stalled,
    /// Last segment fully played out
    Finished,
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPhase::Startup => write!(f, "startup"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Stalled => write!(f, "stalled"),
            PlaybackPhase::Finished => write!(f, "finished"),
        }
    }
}

/// Buffer and clock state owned by a single run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BufferState {
    /// Buffered content in seconds
    pub occupancy_s: f64,
    /// Simulated wall clock in milliseconds since the playback request
    pub wall_clock_ms: f64,
    pub stalled: bool,
    pub playback_started: bool,
}

impl BufferState {
    /// Returns a copy with occupancy bounded by the soft buffer capacity.
    pub fn reported(&self, capacity_s: f64) -> BufferState {
        BufferState {
            occupancy_s: self.occupancy_s.min(capacity_s),
            ..*self
        }
    }
}

/// Recorded state machine transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PhaseTransition {
    pub from: PlaybackPhase,
    pub to: PlaybackPhase,
    pub at_ms: f64,
}

/// One downloaded segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentEvent {
    pub index: usize,
    pub chosen_rung: RungId,
    pub bitrate_bps: u64,
    pub duration_s: f64,
    pub is_cache_miss: bool,
    /// Post-override fetch latency
    pub latency_ms: f64,
    pub download_time_ms: f64,
    pub fetch_start_ms: f64,
    pub fetch_finish_ms: f64,
    /// Content played out while this segment was in flight
    pub played_ms: f64,
    /// Reported occupancy when the fetch was issued, in seconds
    pub buffer_before: f64,
    /// Reported occupancy right after the append, in seconds
    pub buffer_after: f64,
    pub stall_duration_ms: f64,
}

impl SegmentEvent {
    pub fn stalled(&self) -> bool {
        self.stall_duration_ms > 0.0
    }
}

/// Complete outcome of one simulated playback session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackTimeline {
    pub events: Vec<SegmentEvent>,
    pub transitions: Vec<PhaseTransition>,
    /// Wall clock at which playback began
    pub startup_delay_ms: f64,
    /// Wall clock at which the last segment finished playing
    pub finished_at_ms: f64,
    pub buffer_capacity_s: f64,
}

impl PlaybackTimeline {
    /// Wall clock from playback start to the end of the last segment.
    pub fn playback_span_ms(&self) -> f64 {
        self.finished_at_ms - self.startup_delay_ms
    }

    /// Wall-clock instants at which the player entered `Stalled`.
    pub fn stall_starts_ms(&self) -> Vec<f64> {
        self.transitions
            .iter()
            .filter(|t| t.to == PlaybackPhase::Stalled)
            .map(|t| t.at_ms)
            .collect()
    }
}
