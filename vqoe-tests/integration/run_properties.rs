//! Properties every successful run must satisfy, over seeded synthetic traces.

use proptest::prelude::*;
use vqoe_core::{AbrAlgorithm, PlaybackPhase, QoeResult, RunSettings, SimulationConfig};
use vqoe_sim::{RunOutcome, TraceScenario, run_single};

const LADDER_BPS: [u64; 4] = [300_000, 1_200_000, 4_000_000, 8_000_000];
const TOLERANCE: f64 = 1e-6;

fn scenario(segments: usize, miss_rate: f64, miss_latency_ms: f64) -> TraceScenario {
    TraceScenario {
        segments,
        miss_rate,
        miss_latency_ms,
        ..Default::default()
    }
}

fn config(algorithm: AbrAlgorithm, bandwidth: Option<f64>, buffer_size: f64) -> SimulationConfig {
    RunSettings {
        abr: algorithm.as_str().to_string(),
        bandwidth,
        buffer_size,
        ..Default::default()
    }
    .resolve()
    .expect("valid settings")
}

fn simulate(scenario: &TraceScenario, seed: u64, config: &SimulationConfig) -> RunOutcome {
    let manifest = scenario
        .manifest(LADDER_BPS.to_vec())
        .expect("valid manifest");
    run_single(&manifest, &scenario.generate(seed), config).expect("well-formed trace")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_runs_are_deterministic(
        seed in any::<u64>(),
        segments in 1usize..40,
        algorithm in 0usize..AbrAlgorithm::ALL.len(),
        bandwidth in prop::option::of(0.5f64..40.0),
    ) {
        let scenario = scenario(segments, 0.2, 1500.0);
        let config = config(AbrAlgorithm::ALL[algorithm], bandwidth, 30.0);

        let first = QoeResult::from(simulate(&scenario, seed, &config).metrics);
        let second = QoeResult::from(simulate(&scenario, seed, &config).metrics);

        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn prop_events_are_causal_and_buffer_bounded(
        seed in any::<u64>(),
        segments in 1usize..40,
        algorithm in 0usize..AbrAlgorithm::ALL.len(),
        bandwidth in prop::option::of(0.5f64..40.0),
        buffer_size in 2.0f64..30.0,
    ) {
        let scenario = scenario(segments, 0.3, 2500.0);
        let config = config(AbrAlgorithm::ALL[algorithm], bandwidth, buffer_size);
        let outcome = simulate(&scenario, seed, &config);

        prop_assert_eq!(outcome.timeline.events.len(), segments);
        for (position, event) in outcome.timeline.events.iter().enumerate() {
            prop_assert_eq!(event.index, position);
            prop_assert!(event.buffer_before >= 0.0 && event.buffer_before <= buffer_size);
            prop_assert!(event.buffer_after >= 0.0 && event.buffer_after <= buffer_size);

            // Reported values are raw occupancy until the soft ceiling clamps them
            if event.buffer_before < buffer_size && event.buffer_after < buffer_size {
                let expected = event.buffer_before - event.played_ms / 1000.0 + event.duration_s;
                prop_assert!(
                    (event.buffer_after - expected).abs() < TOLERANCE,
                    "segment {}: {} != {}",
                    event.index,
                    event.buffer_after,
                    expected
                );
            }
        }
    }

    #[test]
    fn prop_span_is_content_plus_stalls(
        seed in any::<u64>(),
        segments in 1usize..40,
        algorithm in 0usize..AbrAlgorithm::ALL.len(),
        bandwidth in prop::option::of(0.5f64..40.0),
    ) {
        let scenario = scenario(segments, 0.25, 3000.0);
        let config = config(AbrAlgorithm::ALL[algorithm], bandwidth, 12.0);
        let outcome = simulate(&scenario, seed, &config);
        let metrics = outcome.metrics;

        let content_ms = outcome
            .timeline
            .events
            .iter()
            .map(|e| e.duration_s * 1000.0)
            .sum::<f64>();
        let expected_span = content_ms + metrics.total_rebuffer_ms;
        prop_assert!((metrics.playback_span_ms - expected_span).abs() < TOLERANCE * expected_span.max(1.0));

        let stalls = outcome
            .timeline
            .transitions
            .iter()
            .filter(|t| t.to == PlaybackPhase::Stalled)
            .count() as u64;
        prop_assert_eq!(stalls, metrics.rebuffer_count);
        prop_assert!(metrics.average_bitrate >= LADDER_BPS[0] as f64 - TOLERANCE);
        prop_assert!(metrics.average_bitrate <= LADDER_BPS[3] as f64 + TOLERANCE);
        prop_assert!(metrics.bitrate_switch_count < segments as u64);
    }
}
