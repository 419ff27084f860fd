//! Batch orchestration: ordering, isolation and fail-fast configuration.

use std::sync::Arc;

use vqoe_core::{BatchConfig, ConfigurationError, Manifest, QoeResult, RunSettings, TraceInput};
use vqoe_sim::{BatchOrchestrator, BatchRow, TraceScenario, run_single};

fn manifest() -> Arc<Manifest> {
    Arc::new(
        TraceScenario::warm_cache(20)
            .manifest(vec![400_000, 1_500_000, 4_000_000])
            .expect("valid manifest"),
    )
}

fn settings(abr: &str, bandwidth: f64) -> RunSettings {
    RunSettings {
        abr: abr.to_string(),
        bandwidth: Some(bandwidth),
        ..Default::default()
    }
}

fn good_rows(manifest: &Arc<Manifest>, count: usize) -> Vec<BatchRow> {
    let algorithms = ["throughput", "bola", "dynamic", "lookahead"];
    (0..count)
        .map(|i| BatchRow {
            manifest: Arc::clone(manifest),
            trace: TraceScenario::cold_cache(20).generate(i as u64),
            settings: settings(algorithms[i % algorithms.len()], 2.0 + i as f64),
        })
        .collect()
}

fn standalone(row: &BatchRow) -> QoeResult {
    let config = row.settings.resolve().expect("valid settings");
    match run_single(&row.manifest, &row.trace, &config) {
        Ok(outcome) => QoeResult::from(outcome.metrics),
        Err(error) => QoeResult::from(error),
    }
}

#[tokio::test]
async fn test_malformed_row_does_not_affect_siblings() {
    let manifest = manifest();
    let mut rows = good_rows(&manifest, 8);
    rows.insert(
        3,
        BatchRow {
            manifest: Arc::clone(&manifest),
            trace: TraceInput::new(vec![10.0; 20], vec![42]),
            settings: settings("bola", 10.0),
        },
    );

    let report = BatchOrchestrator::new(BatchConfig::with_workers(4))
        .unwrap()
        .run(rows.clone())
        .await
        .unwrap();

    assert_eq!(report.results.len(), 9);
    assert_eq!(report.succeeded, 8);
    assert_eq!(report.failed, 1);

    let error = report.results[3].error.as_deref().unwrap_or_default();
    assert!(error.contains("Miss index 42"));
    assert!(report.results[3].average_bitrate.is_none());

    for (index, (result, row)) in report.results.iter().zip(&rows).enumerate() {
        if index != 3 {
            assert_eq!(result, &standalone(row), "row {index} differs from a solo run");
        }
    }
}

#[tokio::test]
async fn test_worker_count_does_not_change_results() {
    let manifest = manifest();
    let rows = good_rows(&manifest, 16);

    let serial = BatchOrchestrator::new(BatchConfig::with_workers(1))
        .unwrap()
        .run(rows.clone())
        .await
        .unwrap();
    let parallel = BatchOrchestrator::new(BatchConfig::with_workers(8))
        .unwrap()
        .run(rows)
        .await
        .unwrap();

    assert_eq!(serial.results, parallel.results);
    assert_eq!(serial.failed, 0);
}

#[tokio::test]
async fn test_negative_latency_is_row_local() {
    let manifest = manifest();
    let mut rows = good_rows(&manifest, 2);
    let mut latencies = vec![30.0; 20];
    latencies[5] = -1.0;
    rows.push(BatchRow {
        manifest: Arc::clone(&manifest),
        trace: TraceInput::new(latencies, vec![]),
        settings: settings("dynamic", 5.0),
    });

    let report = BatchOrchestrator::new(BatchConfig::with_workers(3))
        .unwrap()
        .run(rows)
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert!(report.results[2].is_error());
    assert!(
        report.results[2]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("negative latency")
    );
}

#[tokio::test]
async fn test_invalid_buffer_fails_before_any_row_runs() {
    let manifest = manifest();
    let mut rows = good_rows(&manifest, 3);
    rows[2].settings.buffer_size = -4.0;

    let error = BatchOrchestrator::new(BatchConfig::with_workers(2))
        .unwrap()
        .run(rows)
        .await
        .unwrap_err();

    assert!(matches!(error, ConfigurationError::InRow { row: 2, .. }));
}
