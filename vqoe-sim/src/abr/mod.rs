//! Adaptive-bitrate decision policies.
//!
//! Policies form a closed set of tagged variants behind one `decide`
//! interface and are instantiated by registry name at configuration time.
//! Every variant except [`LookaheadPolicy`] only sees information available
//! strictly before the decision.

mod bola;
mod dynamic;
mod history;
mod lookahead;
mod throughput;

use std::sync::Arc;

use vqoe_core::{AbrAlgorithm, BufferState, Manifest, NetworkTrace, RungId, SimulationConfig};

pub use bola::BolaPolicy;
pub use dynamic::DynamicPolicy;
pub use history::{CausalHistory, DownloadRecord};
pub use lookahead::LookaheadPolicy;
pub use throughput::ThroughputPolicy;

/// ABR strategy instance owned by a single run.
#[derive(Debug, Clone)]
pub enum AbrPolicy {
    /// Throughput-reactive policy
    Throughput(ThroughputPolicy),
    /// Buffer-based BOLA policy
    Bola(BolaPolicy),
    /// Throughput/BOLA hybrid
    Dynamic(DynamicPolicy),
    /// Oracle baseline with foreknowledge of the latency trace
    Lookahead(LookaheadPolicy),
}

impl AbrPolicy {
    /// Instantiates the policy named by `config.abr`.
    ///
    /// `trace` is only retained by the lookahead oracle.
    pub fn build(config: &SimulationConfig, manifest: &Manifest, trace: Arc<NetworkTrace>) -> Self {
        let tuning = &config.tuning;
        match config.abr {
            AbrAlgorithm::Throughput => AbrPolicy::Throughput(ThroughputPolicy::new(tuning.throughput)),
            AbrAlgorithm::Bola => {
                AbrPolicy::Bola(BolaPolicy::new(manifest, config.buffer_capacity_s, tuning.bola))
            }
            AbrAlgorithm::Dynamic => AbrPolicy::Dynamic(DynamicPolicy::new(
                ThroughputPolicy::new(tuning.throughput),
                BolaPolicy::new(manifest, config.buffer_capacity_s, tuning.bola),
                tuning.dynamic,
            )),
            AbrAlgorithm::Lookahead => AbrPolicy::Lookahead(LookaheadPolicy::new(
                trace,
                config,
                manifest,
                tuning.lookahead,
            )),
        }
    }

    /// Registry entry this instance was built from.
    pub fn algorithm(&self) -> AbrAlgorithm {
        match self {
            AbrPolicy::Throughput(_) => AbrAlgorithm::Throughput,
            AbrPolicy::Bola(_) => AbrAlgorithm::Bola,
            AbrPolicy::Dynamic(_) => AbrAlgorithm::Dynamic,
            AbrPolicy::Lookahead(_) => AbrAlgorithm::Lookahead,
        }
    }

    /// Chooses the rung for `segment_index`.
    ///
    /// `buffer` is the reported state at decision time and `history` holds
    /// only downloads that completed before this decision.
    pub fn decide(
        &mut self,
        segment_index: usize,
        buffer: &BufferState,
        manifest: &Manifest,
        history: &CausalHistory,
    ) -> RungId {
        match self {
            AbrPolicy::Throughput(policy) => policy.decide(segment_index, buffer, manifest, history),
            AbrPolicy::Bola(policy) => policy.decide(buffer, manifest),
            AbrPolicy::Dynamic(policy) => policy.decide(segment_index, buffer, manifest, history),
            AbrPolicy::Lookahead(policy) => policy.decide(segment_index, buffer, manifest, history),
        }
    }
}

#[cfg(test)]
mod tests {
    use vqoe_core::TraceInput;

    use super::*;

    #[test]
    fn test_build_every_registry_entry() {
        let manifest = Manifest::constant_bitrate(vec![500_000, 1_000_000], 2.0, 3).unwrap();
        let trace = Arc::new(
            NetworkTrace::normalize(&TraceInput::new(vec![50.0; 3], vec![]), 3, None).unwrap(),
        );

        for algorithm in AbrAlgorithm::ALL {
            let config = SimulationConfig {
                abr: algorithm,
                ..Default::default()
            };
            let mut policy = AbrPolicy::build(&config, &manifest, Arc::clone(&trace));
            assert_eq!(policy.algorithm(), algorithm);

            let rung = policy.decide(
                0,
                &BufferState::default(),
                &manifest,
                &CausalHistory::new(),
            );
            assert!(manifest.rung(rung).is_some());
        }
    }
}
