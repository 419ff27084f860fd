//! Oracle lookahead policy.
//!
//! This is a semi-oracle baseline, not a realistic client: it is handed the
//! full normalized latency trace up front and plans against future fetch
//! latencies the player could not know. Use it to bound what a policy could
//! achieve on a trace, never as a model of real client behavior.

use std::sync::Arc;

use tracing::trace;
use vqoe_core::{BufferState, LookaheadTuning, Manifest, NetworkTrace, RungId, SimulationConfig};

use super::history::CausalHistory;

/// Costs closer than this are treated as ties.
const COST_EPSILON: f64 = 1e-9;

/// Bounded-horizon planner over the oracle latency trace.
///
/// For each decision it plans `horizon` segments ahead with a dynamic
/// program that keeps one surviving plan per rung per step. Plan cost is
/// `stall_weight * stall_s + switch_weight * switches - quality_weight * Mbps * duration_s`.
/// Ties prefer the higher first rung, then the plan with fewer switches.
#[derive(Debug, Clone)]
pub struct LookaheadPolicy {
    trace: Arc<NetworkTrace>,
    bandwidth_bps: Option<f64>,
    startup_threshold_s: f64,
    tuning: LookaheadTuning,
}

/// Partial plan; the root has no `first` rung yet.
#[derive(Debug, Clone, Copy)]
struct Plan {
    cost: f64,
    switches: u32,
    buffer_s: f64,
    started: bool,
    first: Option<RungId>,
    last: Option<RungId>,
}

impl Plan {
    fn root(buffer: &BufferState, previous: Option<RungId>) -> Self {
        Self {
            cost: 0.0,
            switches: 0,
            buffer_s: buffer.occupancy_s,
            started: buffer.playback_started,
            first: None,
            last: previous,
        }
    }

    fn is_better_than(&self, other: &Plan) -> bool {
        if (self.cost - other.cost).abs() > COST_EPSILON {
            return self.cost < other.cost;
        }
        if self.first != other.first {
            return self.first > other.first;
        }
        self.switches < other.switches
    }
}

impl LookaheadPolicy {
    /// Creates planner with foreknowledge of `trace`.
    pub fn new(
        trace: Arc<NetworkTrace>,
        config: &SimulationConfig,
        manifest: &Manifest,
        tuning: LookaheadTuning,
    ) -> Self {
        let first_duration = manifest.segment(0).map_or(0.0, |s| s.duration_s());
        Self {
            trace,
            bandwidth_bps: config.bandwidth_bps(),
            startup_threshold_s: config.startup_threshold_for(first_duration),
            tuning,
        }
    }

    /// Predicted fetch duration of `segment_index` at `rung`, in seconds.
    fn fetch_s(&self, manifest: &Manifest, segment_index: usize, rung: RungId) -> Option<f64> {
        let latency_ms = self.trace.condition(segment_index)?.latency_ms;
        let size_bits = manifest.segment(segment_index)?.size_bits(rung)?;
        let transfer_ms = self
            .bandwidth_bps
            .map_or(0.0, |bps| size_bits as f64 / bps * 1000.0);
        Some(latency_ms.max(transfer_ms) / 1000.0)
    }

    /// Extends `plan` by fetching `segment_index` at `rung`.
    fn extend(
        &self,
        plan: &Plan,
        manifest: &Manifest,
        segment_index: usize,
        rung: RungId,
    ) -> Option<Plan> {
        let segment = manifest.segment(segment_index)?;
        let bitrate_bps = manifest.bitrate_bps(rung)?;
        let fetch_s = self.fetch_s(manifest, segment_index, rung)?;

        let mut buffer_s = plan.buffer_s;
        let mut stall_s = 0.0;
        if plan.started {
            stall_s = (fetch_s - buffer_s).max(0.0);
            buffer_s = (buffer_s - fetch_s).max(0.0);
        }
        buffer_s += segment.duration_s();
        let started = plan.started || buffer_s >= self.startup_threshold_s;

        let switched = plan.last.is_some_and(|last| last != rung);
        let quality = bitrate_bps as f64 / 1_000_000.0 * segment.duration_s();
        let mut cost = plan.cost + self.tuning.stall_weight * stall_s
            - self.tuning.quality_weight * quality;
        if switched {
            cost += self.tuning.switch_weight;
        }

        Some(Plan {
            cost,
            switches: plan.switches + u32::from(switched),
            buffer_s,
            started,
            first: plan.first.or(Some(rung)),
            last: Some(rung),
        })
    }

    pub(crate) fn decide(
        &self,
        segment_index: usize,
        buffer: &BufferState,
        manifest: &Manifest,
        history: &CausalHistory,
    ) -> RungId {
        let lowest = manifest.lowest_rung();
        let end = (segment_index + self.tuning.horizon).min(manifest.segment_count());
        let rungs = manifest.rungs();

        // layer[r]: best plan whose latest fetch used rung r
        let mut layer = vec![Some(Plan::root(buffer, history.last_rung()))];
        for index in segment_index..end {
            let mut next: Vec<Option<Plan>> = vec![None; rungs.len()];
            for (slot, rung) in next.iter_mut().zip(rungs) {
                for plan in layer.iter().flatten() {
                    let Some(candidate) = self.extend(plan, manifest, index, rung.id) else {
                        continue;
                    };
                    if slot.is_none_or(|best| candidate.is_better_than(&best)) {
                        *slot = Some(candidate);
                    }
                }
            }
            layer = next;
        }

        let chosen = layer
            .into_iter()
            .flatten()
            .reduce(|best, plan| if plan.is_better_than(&best) { plan } else { best })
            .and_then(|plan| plan.first)
            .unwrap_or(lowest);

        trace!(
            segment = segment_index,
            horizon_end = end,
            rung = %chosen,
            "lookahead decision"
        );
        chosen
    }
}

#[cfg(test)]
mod tests {
    use vqoe_core::TraceInput;

    use super::*;

    fn manifest(count: usize) -> Manifest {
        Manifest::constant_bitrate(vec![1_000_000, 2_500_000, 5_000_000], 2.0, count).unwrap()
    }

    fn policy(
        manifest: &Manifest,
        latencies: Vec<f64>,
        bandwidth_cap_mbps: Option<f64>,
        tuning: LookaheadTuning,
    ) -> LookaheadPolicy {
        let trace = NetworkTrace::normalize(
            &TraceInput::new(latencies, Vec::new()),
            manifest.segment_count(),
            None,
        )
        .unwrap();
        let config = SimulationConfig {
            bandwidth_cap_mbps,
            ..Default::default()
        };
        LookaheadPolicy::new(Arc::new(trace), &config, manifest, tuning)
    }

    fn playing(occupancy_s: f64) -> BufferState {
        BufferState {
            occupancy_s,
            playback_started: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fast_network_picks_top_rung() {
        let manifest = manifest(8);
        let policy = policy(&manifest, vec![10.0; 8], None, LookaheadTuning::default());

        let rung = policy.decide(0, &BufferState::default(), &manifest, &CausalHistory::new());
        assert_eq!(rung, RungId::new(2));
    }

    #[test]
    fn test_constrained_bandwidth_avoids_stall() {
        let manifest = manifest(8);
        // 2 Mbps: the top rung would stall 5s on an empty buffer
        let policy = policy(&manifest, vec![10.0; 8], Some(2.0), LookaheadTuning::default());

        let rung = policy.decide(2, &playing(0.0), &manifest, &CausalHistory::new());
        assert_eq!(rung, RungId::new(0));
    }

    #[test]
    fn test_tie_prefers_higher_first_rung() {
        let manifest = manifest(4);
        let tuning = LookaheadTuning {
            quality_weight: 0.0,
            ..Default::default()
        };
        let policy = policy(&manifest, vec![10.0; 4], None, tuning);

        let rung = policy.decide(0, &playing(10.0), &manifest, &CausalHistory::new());
        assert_eq!(rung, RungId::new(2));
    }

    #[test]
    fn test_horizon_clipped_at_last_segment() {
        let manifest = manifest(3);
        let policy = policy(&manifest, vec![10.0; 3], None, LookaheadTuning::default());

        let rung = policy.decide(2, &playing(4.0), &manifest, &CausalHistory::new());
        assert_eq!(rung, RungId::new(2));
    }
}
