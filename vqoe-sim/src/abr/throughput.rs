//! Throughput-reactive policy.

use tracing::trace;
use vqoe_core::{BufferState, Manifest, RungId, ThroughputTuning};

use super::history::CausalHistory;

/// Picks the highest rung whose expected fetch would not stall playback.
///
/// Throughput is the harmonic mean of the most recent `window` downloads,
/// discounted by `safety_margin`. While playing, a fetch is safe when its
/// expected duration fits within the buffered content. Before playback starts
/// the buffer does not drain, so the budget is one segment of content. When
/// nothing fits, the lowest rung is chosen.
#[derive(Debug, Clone)]
pub struct ThroughputPolicy {
    tuning: ThroughputTuning,
}

impl ThroughputPolicy {
    /// Creates policy with the given estimator window and margin.
    pub fn new(tuning: ThroughputTuning) -> Self {
        Self { tuning }
    }

    /// Harmonic-mean throughput estimate in bits per second.
    pub fn estimate_bps(&self, history: &CausalHistory) -> Option<f64> {
        if history.is_empty() {
            return None;
        }
        let (count, inverse_sum) = history
            .recent_throughputs(self.tuning.window)
            .fold((0usize, 0.0f64), |(n, sum), bps| (n + 1, sum + 1.0 / bps));
        if inverse_sum <= 0.0 {
            return Some(f64::INFINITY);
        }
        Some(count as f64 / inverse_sum)
    }

    pub(crate) fn decide(
        &self,
        segment_index: usize,
        buffer: &BufferState,
        manifest: &Manifest,
        history: &CausalHistory,
    ) -> RungId {
        let lowest = manifest.lowest_rung();
        let (Some(estimate), Some(segment)) =
            (self.estimate_bps(history), manifest.segment(segment_index))
        else {
            return lowest;
        };

        let usable_bps = estimate * self.tuning.safety_margin;
        let budget_s = if buffer.playback_started {
            buffer.occupancy_s
        } else {
            segment.duration_s()
        };

        let chosen = manifest
            .rungs()
            .iter()
            .rev()
            .find(|rung| {
                segment
                    .size_bits(rung.id)
                    .is_some_and(|bits| bits as f64 / usable_bps <= budget_s)
            })
            .map_or(lowest, |rung| rung.id);

        trace!(
            segment = segment_index,
            estimate_bps = estimate,
            budget_s,
            rung = %chosen,
            "throughput decision"
        );
        chosen
    }
}
