//! Discrete-event replay of a latency trace against a manifest.

use tracing::debug;
use vqoe_core::{Manifest, NetworkTrace, PlaybackTimeline, SimulationConfig};

use super::invariants::{SimulationInvariantError, check_rung};
use super::session::{Fetch, PlaybackSession};
use crate::abr::AbrPolicy;

/// Replays one normalized trace against one manifest.
///
/// The simulator is synchronous and single-threaded. Every call to
/// [`PlaybackSimulator::run`] owns a fresh session, so nothing is shared
/// between runs.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackSimulator<'a> {
    manifest: &'a Manifest,
    trace: &'a NetworkTrace,
    config: &'a SimulationConfig,
}

impl<'a> PlaybackSimulator<'a> {
    /// Creates simulator over borrowed inputs.
    pub fn new(
        manifest: &'a Manifest,
        trace: &'a NetworkTrace,
        config: &'a SimulationConfig,
    ) -> Self {
        Self {
            manifest,
            trace,
            config,
        }
    }

    /// Fetch duration for `size_bits` over a segment with `latency_ms`.
    fn download_time_ms(&self, latency_ms: f64, size_bits: u64) -> f64 {
        let transfer_ms = self
            .config
            .bandwidth_bps()
            .map_or(0.0, |bps| size_bits as f64 / bps * 1000.0);
        latency_ms.max(transfer_ms)
    }

    /// Runs the full `Startup -> Playing <-> Stalled -> Finished` machine.
    ///
    /// Segment `k + 1` is decided exactly once, when segment `k` finishes
    /// downloading; segment 0 is decided at wall clock 0.
    ///
    /// # Errors
    ///
    /// - `SimulationInvariantError::TraceManifestMismatch` - Trace and manifest lengths differ
    /// - `SimulationInvariantError::InvalidRung` - Policy chose a rung outside the ladder
    /// - `SimulationInvariantError::NegativeBuffer` - Occupancy invalid after an append
    pub fn run(&self, policy: &mut AbrPolicy) -> Result<PlaybackTimeline, SimulationInvariantError> {
        let segment_count = self.manifest.segment_count();
        if self.trace.len() != segment_count {
            return Err(SimulationInvariantError::TraceManifestMismatch {
                trace_len: self.trace.len(),
                segment_count,
            });
        }

        let first_duration = self.manifest.segment(0).map_or(0.0, |s| s.duration_s());
        let threshold_s = self.config.startup_threshold_for(first_duration);
        let mut session =
            PlaybackSession::new(self.config.buffer_capacity_s, threshold_s, segment_count);

        for (segment, condition) in self.manifest.segments().iter().zip(self.trace.conditions()) {
            let index = segment.index();
            let rung = policy.decide(index, &session.reported(), self.manifest, session.history());
            let size_bits = check_rung(self.manifest, index, rung)?;
            let bitrate_bps = self.manifest.bitrate_bps(rung).unwrap_or_default();
            let download_time_ms = self.download_time_ms(condition.latency_ms, size_bits);

            debug!(
                segment = index,
                rung = %rung,
                download_time_ms,
                cache_miss = condition.is_cache_miss,
                "segment decided"
            );

            session = session.step(Fetch {
                index,
                rung,
                bitrate_bps,
                size_bits,
                duration_s: segment.duration_s(),
                latency_ms: condition.latency_ms,
                is_cache_miss: condition.is_cache_miss,
                download_time_ms,
            })?;
        }

        Ok(session.finish())
    }
}
