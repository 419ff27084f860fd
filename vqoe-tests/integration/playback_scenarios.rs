//! Hand-checked playback scenarios driven through the single-run pipeline.

use vqoe_core::{
    Manifest, MalformedTraceError, NetworkTrace, PlaybackPhase, RunSettings, SimulationConfig,
    TraceInput,
};
use vqoe_sim::{RowError, run_single};

fn single_rung(segments: usize) -> Manifest {
    Manifest::constant_bitrate(vec![1_000_000], 2.0, segments).expect("valid manifest")
}

fn unconstrained(buffer_size: f64, startup_threshold: f64) -> SimulationConfig {
    RunSettings {
        bandwidth: None,
        buffer_size,
        startup_threshold: Some(startup_threshold),
        abr: "throughput".to_string(),
        ..Default::default()
    }
    .resolve()
    .expect("valid settings")
}

#[test]
fn test_stall_after_cache_miss() {
    let manifest = single_rung(4);
    let trace = TraceInput::new(vec![500.0, 500.0, 4000.0, 500.0], vec![2]);

    let outcome = run_single(&manifest, &trace, &unconstrained(5.0, 2.0)).unwrap();
    let metrics = outcome.metrics;

    assert_eq!(metrics.startup_delay_ms, 500.0);
    assert_eq!(metrics.rebuffer_count, 1);
    assert_eq!(metrics.total_rebuffer_ms, 500.0);
    assert_eq!(metrics.bitrate_switch_count, 0);
    assert_eq!(metrics.playback_span_ms, 8500.0);

    let timeline = outcome.timeline;
    assert_eq!(timeline.stall_starts_ms(), vec![4500.0]);
    assert_eq!(timeline.events[2].fetch_finish_ms, 5000.0);
    assert!(timeline.events[2].is_cache_miss);
    assert_eq!(timeline.finished_at_ms, 9000.0);

    let phases = timeline
        .transitions
        .iter()
        .map(|t| t.to)
        .collect::<Vec<_>>();
    assert_eq!(
        phases,
        vec![
            PlaybackPhase::Playing,
            PlaybackPhase::Stalled,
            PlaybackPhase::Playing,
            PlaybackPhase::Finished,
        ]
    );
}

#[test]
fn test_miss_latency_override() {
    let input = TraceInput::new(vec![25.0, 625.0, 700.0, 21.0, 19.0], vec![1, 2]);

    let trace = NetworkTrace::normalize(&input, 5, Some(370.0)).unwrap();
    assert_eq!(trace.latencies_ms(), vec![25.0, 370.0, 370.0, 21.0, 19.0]);

    let config = SimulationConfig {
        miss_latency_override_ms: Some(370.0),
        ..unconstrained(30.0, 2.0)
    };
    let outcome = run_single(&single_rung(5), &input, &config).unwrap();
    let latencies = outcome
        .timeline
        .events
        .iter()
        .map(|e| e.latency_ms)
        .collect::<Vec<_>>();
    assert_eq!(latencies, vec![25.0, 370.0, 370.0, 21.0, 19.0]);
    assert_eq!(outcome.metrics.total_rebuffer_ms, 0.0);
}

#[test]
fn test_threshold_never_reached_starts_at_last_download() {
    let manifest = single_rung(2);
    let trace = TraceInput::new(vec![300.0, 200.0], vec![]);

    let outcome = run_single(&manifest, &trace, &unconstrained(30.0, 10.0)).unwrap();

    assert_eq!(outcome.metrics.startup_delay_ms, 500.0);
    assert_eq!(outcome.metrics.playback_span_ms, 4000.0);
    assert_eq!(outcome.metrics.rebuffer_count, 0);
}

#[test]
fn test_bandwidth_cap_dominates_small_latency() {
    let manifest = single_rung(3);
    let trace = TraceInput::new(vec![100.0, 100.0, 3000.0], vec![]);
    let config = SimulationConfig {
        bandwidth_cap_mbps: Some(1.0),
        ..unconstrained(30.0, 2.0)
    };

    let outcome = run_single(&manifest, &trace, &config).unwrap();
    let download_times = outcome
        .timeline
        .events
        .iter()
        .map(|e| e.download_time_ms)
        .collect::<Vec<_>>();

    // 2 Mbit at 1 Mbps takes 2 s; only the slow segment is latency-bound
    assert_eq!(download_times, vec![2000.0, 2000.0, 3000.0]);
}

#[test]
fn test_length_mismatch_is_row_error() {
    let manifest = single_rung(4);
    let trace = TraceInput::new(vec![10.0, 10.0], vec![]);

    let error = run_single(&manifest, &trace, &unconstrained(30.0, 2.0)).unwrap_err();
    assert_eq!(
        error,
        RowError::MalformedTrace(MalformedTraceError::LengthMismatch {
            expected: 4,
            actual: 2,
        })
    );
}

#[test]
fn test_reported_buffer_never_exceeds_capacity() {
    let manifest = single_rung(10);
    let trace = TraceInput::new(vec![10.0; 10], vec![]);

    let outcome = run_single(&manifest, &trace, &unconstrained(5.0, 2.0)).unwrap();

    for event in &outcome.timeline.events {
        assert!(event.buffer_before <= 5.0);
        assert!(event.buffer_after <= 5.0);
    }
    assert_eq!(outcome.metrics.rebuffer_count, 0);
}
