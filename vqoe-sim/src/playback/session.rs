//! Mutable state of a single playback run.

use tracing::debug;
use vqoe_core::{
    BufferState, PhaseTransition, PlaybackPhase, PlaybackTimeline, RungId, SegmentEvent,
};

use super::invariants::{SimulationInvariantError, check_buffer};
use crate::abr::{CausalHistory, DownloadRecord};

/// One segment download as decided and sized by the simulator.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Fetch {
    pub index: usize,
    pub rung: RungId,
    pub bitrate_bps: u64,
    pub size_bits: u64,
    pub duration_s: f64,
    pub latency_ms: f64,
    pub is_cache_miss: bool,
    /// `max(latency, transfer time)`
    pub download_time_ms: f64,
}

/// Player state owned exclusively by one run.
///
/// Advanced by value through [`PlaybackSession::step`] once per completed
/// download and consumed by [`PlaybackSession::finish`].
#[derive(Debug)]
pub(crate) struct PlaybackSession {
    state: BufferState,
    phase: PlaybackPhase,
    buffer_capacity_s: f64,
    startup_threshold_s: f64,
    startup_delay_ms: Option<f64>,
    events: Vec<SegmentEvent>,
    transitions: Vec<PhaseTransition>,
    history: CausalHistory,
}

impl PlaybackSession {
    pub fn new(buffer_capacity_s: f64, startup_threshold_s: f64, segment_count: usize) -> Self {
        Self {
            state: BufferState::default(),
            phase: PlaybackPhase::Startup,
            buffer_capacity_s,
            startup_threshold_s,
            startup_delay_ms: None,
            events: Vec::with_capacity(segment_count),
            transitions: Vec::new(),
            history: CausalHistory::new(),
        }
    }

    /// Buffer state a policy observes, clamped to capacity.
    pub fn reported(&self) -> BufferState {
        self.state.reported(self.buffer_capacity_s)
    }

    pub fn history(&self) -> &CausalHistory {
        &self.history
    }

    fn enter(&mut self, to: PlaybackPhase, at_ms: f64) {
        debug!(from = %self.phase, to = %to, at_ms, "playback transition");
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            at_ms,
        });
        self.phase = to;
    }

    /// Applies one download from the instant it is requested to the instant it
    /// is appended to the buffer.
    pub fn step(mut self, fetch: Fetch) -> Result<Self, SimulationInvariantError> {
        let fetch_start_ms = self.state.wall_clock_ms;
        let buffer_before = self.reported().occupancy_s;
        let available_ms = self.state.occupancy_s * 1000.0;

        let mut played_ms = 0.0;
        let mut stall_duration_ms = 0.0;
        if self.state.playback_started {
            if fetch.download_time_ms <= available_ms {
                played_ms = fetch.download_time_ms;
                self.state.occupancy_s -= fetch.download_time_ms / 1000.0;
            } else {
                played_ms = available_ms;
                stall_duration_ms = fetch.download_time_ms - available_ms;
                self.state.occupancy_s = 0.0;
                self.state.stalled = true;
                self.enter(PlaybackPhase::Stalled, fetch_start_ms + available_ms);
            }
        }

        let fetch_finish_ms = fetch_start_ms + fetch.download_time_ms;
        self.state.wall_clock_ms = fetch_finish_ms;
        self.state.occupancy_s += fetch.duration_s;
        check_buffer(fetch.index, self.state.occupancy_s)?;

        if self.state.stalled {
            self.state.stalled = false;
            self.enter(PlaybackPhase::Playing, fetch_finish_ms);
        }
        if !self.state.playback_started && self.state.occupancy_s >= self.startup_threshold_s {
            self.start_playback(fetch_finish_ms);
        }

        self.history.record(DownloadRecord {
            index: fetch.index,
            rung: fetch.rung,
            size_bits: fetch.size_bits,
            download_time_ms: fetch.download_time_ms,
        });
        self.events.push(SegmentEvent {
            index: fetch.index,
            chosen_rung: fetch.rung,
            bitrate_bps: fetch.bitrate_bps,
            duration_s: fetch.duration_s,
            is_cache_miss: fetch.is_cache_miss,
            latency_ms: fetch.latency_ms,
            download_time_ms: fetch.download_time_ms,
            fetch_start_ms,
            fetch_finish_ms,
            played_ms,
            buffer_before,
            buffer_after: self.reported().occupancy_s,
            stall_duration_ms,
        });

        Ok(self)
    }

    fn start_playback(&mut self, at_ms: f64) {
        self.state.playback_started = true;
        self.startup_delay_ms = Some(at_ms);
        self.enter(PlaybackPhase::Playing, at_ms);
    }

    /// Plays out the remaining buffer and seals the timeline.
    pub fn finish(mut self) -> PlaybackTimeline {
        let last_download_ms = self.state.wall_clock_ms;
        if !self.state.playback_started {
            // Threshold never reached: playback begins once everything is buffered.
            self.start_playback(last_download_ms);
        }

        let finished_at_ms = last_download_ms + self.state.occupancy_s * 1000.0;
        self.enter(PlaybackPhase::Finished, finished_at_ms);

        PlaybackTimeline {
            events: self.events,
            transitions: self.transitions,
            startup_delay_ms: self.startup_delay_ms.unwrap_or(last_download_ms),
            finished_at_ms,
            buffer_capacity_s: self.buffer_capacity_s,
        }
    }
}
