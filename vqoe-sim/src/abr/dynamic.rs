//! Hybrid policy switching between throughput and BOLA.

use tracing::debug;
use vqoe_core::{BufferState, DynamicTuning, Manifest, RungId};

use super::bola::BolaPolicy;
use super::history::CausalHistory;
use super::throughput::ThroughputPolicy;

/// Throughput mode while the buffer is low, BOLA once it is healthy.
///
/// Starts in throughput mode. Enters BOLA mode when the buffer exceeds the
/// low-buffer threshold and BOLA would pick at least the throughput rung;
/// returns to throughput mode when BOLA would pick lower and the buffer has
/// fallen under the threshold. The mode is a function of the decision
/// sequence, so the policy stays deterministic.
#[derive(Debug, Clone)]
pub struct DynamicPolicy {
    throughput: ThroughputPolicy,
    bola: BolaPolicy,
    tuning: DynamicTuning,
    bola_mode: bool,
}

impl DynamicPolicy {
    /// Combines the two sub-policies.
    pub fn new(throughput: ThroughputPolicy, bola: BolaPolicy, tuning: DynamicTuning) -> Self {
        Self {
            throughput,
            bola,
            tuning,
            bola_mode: false,
        }
    }

    /// Whether the last decision came from BOLA.
    pub fn in_bola_mode(&self) -> bool {
        self.bola_mode
    }

    pub(crate) fn decide(
        &mut self,
        segment_index: usize,
        buffer: &BufferState,
        manifest: &Manifest,
        history: &CausalHistory,
    ) -> RungId {
        let bola_rung = self.bola.decide(buffer, manifest);
        let throughput_rung = self
            .throughput
            .decide(segment_index, buffer, manifest, history);
        let level = buffer.occupancy_s;
        let threshold = self.tuning.low_buffer_threshold_s;

        let next_mode = if self.bola_mode {
            !(bola_rung < throughput_rung && level < threshold)
        } else {
            level > threshold && bola_rung >= throughput_rung
        };
        if next_mode != self.bola_mode {
            debug!(
                segment = segment_index,
                buffer_s = level,
                "dynamic policy switched to {}",
                if next_mode { "bola" } else { "throughput" }
            );
            self.bola_mode = next_mode;
        }

        if self.bola_mode {
            bola_rung
        } else {
            throughput_rung
        }
    }
}

#[cfg(test)]
mod tests {
    use vqoe_core::{BolaTuning, ThroughputTuning};

    use super::*;
    use crate::abr::history::DownloadRecord;

    fn manifest() -> Manifest {
        Manifest::constant_bitrate(vec![1_000_000, 2_500_000, 5_000_000], 2.0, 20).unwrap()
    }

    fn policy(manifest: &Manifest) -> DynamicPolicy {
        DynamicPolicy::new(
            ThroughputPolicy::new(ThroughputTuning::default()),
            BolaPolicy::new(manifest, 30.0, BolaTuning::default()),
            DynamicTuning::default(),
        )
    }

    fn fast_history() -> CausalHistory {
        let mut history = CausalHistory::new();
        for index in 0..3 {
            history.record(DownloadRecord {
                index,
                rung: RungId::new(0),
                size_bits: 2_000_000,
                download_time_ms: 100.0,
            });
        }
        history
    }

    fn buffer(occupancy_s: f64) -> BufferState {
        BufferState {
            occupancy_s,
            playback_started: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_starts_in_throughput_mode() {
        let manifest = manifest();
        let mut policy = policy(&manifest);

        let rung = policy.decide(0, &BufferState::default(), &manifest, &CausalHistory::new());
        assert_eq!(rung, RungId::new(0));
        assert!(!policy.in_bola_mode());
    }

    #[test]
    fn test_switches_to_bola_on_healthy_buffer_and_back() {
        let manifest = manifest();
        let mut policy = policy(&manifest);
        let history = fast_history();

        // 20 Mbps estimate: throughput picks the top rung, BOLA at 27s does too
        let rung = policy.decide(3, &buffer(27.0), &manifest, &history);
        assert!(policy.in_bola_mode());
        assert_eq!(rung, RungId::new(2));

        // Low buffer: BOLA falls to the lowest rung, below throughput's pick
        let rung = policy.decide(4, &buffer(1.0), &manifest, &history);
        assert!(!policy.in_bola_mode());
        assert_eq!(rung, RungId::new(2));
    }
}
