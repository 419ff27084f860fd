//! Cross-policy behavior on shared traces.

use vqoe_core::{AbrAlgorithm, Manifest, RunSettings, SimulationConfig, TraceInput};
use vqoe_sim::{TraceScenario, run_single};

const LADDER_BPS: [u64; 3] = [500_000, 2_000_000, 6_000_000];

fn config(algorithm: AbrAlgorithm, bandwidth: Option<f64>) -> SimulationConfig {
    RunSettings {
        abr: algorithm.as_str().to_string(),
        bandwidth,
        ..Default::default()
    }
    .resolve()
    .expect("valid settings")
}

#[test]
fn test_no_policy_stalls_without_bandwidth_cap() {
    let scenario = TraceScenario::warm_cache(30);
    let manifest = scenario.manifest(LADDER_BPS.to_vec()).unwrap();
    let trace = scenario.generate(11);

    for algorithm in AbrAlgorithm::ALL {
        let metrics = run_single(&manifest, &trace, &config(algorithm, None))
            .unwrap()
            .metrics;

        assert_eq!(metrics.rebuffer_count, 0, "{algorithm} stalled");
        assert!(metrics.average_bitrate >= LADDER_BPS[0] as f64, "{algorithm}");
        assert!(metrics.average_bitrate <= LADDER_BPS[2] as f64, "{algorithm}");
    }
}

#[test]
fn test_lookahead_takes_top_rung_when_fetches_are_free() {
    let scenario = TraceScenario::cold_cache(20);
    let manifest = scenario.manifest(LADDER_BPS.to_vec()).unwrap();
    let trace = scenario.generate(5);

    let metrics = run_single(&manifest, &trace, &config(AbrAlgorithm::Lookahead, None))
        .unwrap()
        .metrics;

    assert_eq!(metrics.average_bitrate, LADDER_BPS[2] as f64);
    assert_eq!(metrics.bitrate_switch_count, 0);
}

#[test]
fn test_stall_averse_lookahead_avoids_rebuffering_under_cap() {
    // Top rung needs 3 s per 2 s segment at 4 Mbps; the lowest needs 0.5 s
    let manifest = Manifest::constant_bitrate(vec![1_000_000, 6_000_000], 2.0, 12).unwrap();
    let trace = TraceInput::new(vec![20.0; 12], vec![]);

    let mut settings = RunSettings {
        abr: "lookahead".to_string(),
        bandwidth: Some(4.0),
        ..Default::default()
    };
    settings.tuning.lookahead.stall_weight = 1000.0;
    let config = settings.resolve().unwrap();

    let metrics = run_single(&manifest, &trace, &config).unwrap().metrics;

    assert_eq!(metrics.total_rebuffer_ms, 0.0);
    assert!(metrics.average_bitrate > 1_000_000.0);
}

#[test]
fn test_policies_are_independent_per_run() {
    let scenario = TraceScenario::default();
    let manifest = scenario.manifest(LADDER_BPS.to_vec()).unwrap();
    let trace = scenario.generate(99);
    let config = config(AbrAlgorithm::Dynamic, Some(3.0));

    let first = run_single(&manifest, &trace, &config).unwrap();
    let _other = run_single(&manifest, &scenario.generate(100), &config).unwrap();
    let again = run_single(&manifest, &trace, &config).unwrap();

    assert_eq!(first.timeline, again.timeline);
    assert_eq!(first.metrics, again.metrics);
}
