//! Batch orchestration over a bounded worker pool.
//!
//! Rows are resolved up front so that a configuration error fails the whole
//! batch before any simulation runs. Workers then pull row indices from a
//! shared cursor and report `(index, result)` pairs to a collector, which
//! writes each result into the slot matching its input position.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use vqoe_core::{
    BatchConfig, ConfigurationError, Manifest, QoeResult, RunSettings, SimulationConfig, TraceInput,
};

use crate::pipeline::{RowError, run_single};

/// One independent unit of batch work.
#[derive(Debug, Clone)]
pub struct BatchRow {
    /// Manifest the trace was measured against
    pub manifest: Arc<Manifest>,
    /// Raw per-segment latencies and cache misses
    pub trace: TraceInput,
    /// Name-based settings, resolved before the batch starts
    pub settings: RunSettings,
}

/// Results of a batch in input order.
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// `results[i]` belongs to input row `i`
    pub results: Vec<QoeResult>,
    /// Rows that produced metrics
    pub succeeded: usize,
    /// Rows that produced an error result
    pub failed: usize,
    /// Wall time of the whole batch
    pub elapsed: Duration,
}

/// Row after settings resolution.
#[derive(Debug)]
struct ResolvedRow {
    manifest: Arc<Manifest>,
    trace: TraceInput,
    config: SimulationConfig,
}

/// Fans independent rows out across `max_workers` blocking workers.
#[derive(Debug, Clone)]
pub struct BatchOrchestrator {
    config: BatchConfig,
}

impl BatchOrchestrator {
    /// Creates orchestrator after validating the pool settings.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::InvalidValue` - Zero workers
    pub fn new(config: BatchConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Pool settings in effect.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Runs every row and returns results in input order.
    ///
    /// Row-local failures (malformed trace, invariant violation, panic, time
    /// budget) become error rows and never affect siblings.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::InRow` - Some row's settings do not resolve;
    ///   no row is executed
    pub async fn run(&self, rows: Vec<BatchRow>) -> Result<BatchReport, ConfigurationError> {
        let started = Instant::now();
        let jobs = Arc::new(resolve_rows(rows)?);
        let total = jobs.len();
        let workers = self.config.max_workers.min(total);

        info!(rows = total, workers, "starting batch");

        let cursor = Arc::new(AtomicUsize::new(0));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<(usize, QoeResult)>();
        let budget = self.config.row_time_budget;

        let handles = (0..workers)
            .map(|worker_id| {
                let jobs = Arc::clone(&jobs);
                let cursor = Arc::clone(&cursor);
                let result_tx = result_tx.clone();
                tokio::task::spawn_blocking(move || {
                    loop {
                        let index = cursor.fetch_add(1, Ordering::Relaxed);
                        let Some(job) = jobs.get(index) else {
                            break;
                        };
                        let result = execute_row(job, budget);
                        if result_tx.send((index, result)).is_err() {
                            break;
                        }
                    }
                    debug!(worker_id, "batch worker finished");
                })
            })
            .collect::<Vec<_>>();
        drop(result_tx);

        let mut slots: Vec<Option<QoeResult>> = vec![None; total];
        let mut completed = 0usize;
        while let Some((index, result)) = result_rx.recv().await {
            completed += 1;
            if let Some(error) = &result.error {
                warn!(row = index, error = %error, "row failed");
            }
            let percent = completed as f64 / total as f64 * 100.0;
            info!(
                completed,
                total,
                "batch progress {percent:.1}% (bandwidth {:?} Mbps, miss latency {:?} ms)",
                jobs[index].config.bandwidth_cap_mbps,
                jobs[index].config.miss_latency_override_ms
            );
            slots[index] = Some(result);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("batch worker terminated abnormally: {e}");
            }
        }

        let results = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| QoeResult::from_error("Row was not executed")))
            .collect::<Vec<_>>();
        let failed = results.iter().filter(|r| r.is_error()).count();
        let report = BatchReport {
            succeeded: results.len() - failed,
            failed,
            results,
            elapsed: started.elapsed(),
        };

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "batch complete"
        );
        Ok(report)
    }
}

fn resolve_rows(rows: Vec<BatchRow>) -> Result<Vec<ResolvedRow>, ConfigurationError> {
    rows.into_iter()
        .enumerate()
        .map(|(row, batch_row)| {
            let config = batch_row
                .settings
                .resolve()
                .map_err(|source| ConfigurationError::InRow {
                    row,
                    source: Box::new(source),
                })?;
            Ok(ResolvedRow {
                manifest: batch_row.manifest,
                trace: batch_row.trace,
                config,
            })
        })
        .collect()
}

/// Runs one row with panic containment and the optional time budget.
fn execute_row(job: &ResolvedRow, budget: Option<Duration>) -> QoeResult {
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        run_single(&job.manifest, &job.trace, &job.config)
    }))
    .unwrap_or_else(|payload| {
        Err(RowError::Panicked {
            message: panic_message(payload.as_ref()),
        })
    });

    let elapsed = started.elapsed();
    let outcome = outcome.and_then(|run| match budget {
        Some(budget) if elapsed > budget => Err(RowError::TimeBudgetExceeded {
            elapsed_ms: elapsed.as_millis(),
            budget_ms: budget.as_millis(),
        }),
        _ => Ok(run),
    });

    match outcome {
        Ok(run) => QoeResult::from(run.metrics),
        Err(error) => QoeResult::from(error),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Arc<Manifest> {
        Arc::new(Manifest::constant_bitrate(vec![1_000_000, 3_000_000], 2.0, 4).unwrap())
    }

    fn row(manifest: &Arc<Manifest>, latencies: Vec<f64>, abr: &str) -> BatchRow {
        BatchRow {
            manifest: Arc::clone(manifest),
            trace: TraceInput::new(latencies, vec![]),
            settings: RunSettings {
                abr: abr.to_string(),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let manifest = manifest();
        let rows = (0..12)
            .map(|i| row(&manifest, vec![100.0 + i as f64 * 50.0; 4], "throughput"))
            .collect::<Vec<_>>();

        let orchestrator = BatchOrchestrator::new(BatchConfig::with_workers(3)).unwrap();
        let report = orchestrator.run(rows.clone()).await.unwrap();

        assert_eq!(report.results.len(), 12);
        assert_eq!(report.succeeded, 12);
        for (result, row) in report.results.iter().zip(&rows) {
            let config = row.settings.resolve().unwrap();
            let expected = run_single(&row.manifest, &row.trace, &config).unwrap();
            assert_eq!(result.metrics(), Some(expected.metrics));
        }
    }

    #[tokio::test]
    async fn test_malformed_row_is_isolated() {
        let manifest = manifest();
        let rows = vec![
            row(&manifest, vec![100.0; 4], "bola"),
            row(&manifest, vec![100.0; 3], "bola"),
            row(&manifest, vec![100.0; 4], "dynamic"),
        ];

        let orchestrator = BatchOrchestrator::new(BatchConfig::with_workers(2)).unwrap();
        let report = orchestrator.run(rows).await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.results[0].is_error());
        assert!(report.results[1].is_error());
        assert!(report.results[1].reward_score.is_none());
        assert!(!report.results[2].is_error());
    }

    #[tokio::test]
    async fn test_unknown_algorithm_fails_whole_batch() {
        let manifest = manifest();
        let rows = vec![
            row(&manifest, vec![100.0; 4], "bola"),
            row(&manifest, vec![100.0; 4], "mpc"),
        ];

        let orchestrator = BatchOrchestrator::new(BatchConfig::with_workers(2)).unwrap();
        let error = orchestrator.run(rows).await.unwrap_err();

        match error {
            ConfigurationError::InRow { row, source } => {
                assert_eq!(row, 1);
                assert!(matches!(*source, ConfigurationError::UnknownAlgorithm { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_time_budget_marks_rows_failed() {
        let manifest = manifest();
        let rows = vec![row(&manifest, vec![100.0; 4], "lookahead")];
        let config = BatchConfig {
            max_workers: 1,
            row_time_budget: Some(Duration::ZERO),
        };

        let report = BatchOrchestrator::new(config).unwrap().run(rows).await.unwrap();
        assert_eq!(report.failed, 1);
        let message = report.results[0].error.as_deref().unwrap_or_default();
        assert!(message.contains("time budget"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = BatchOrchestrator::new(BatchConfig::with_workers(4))
            .unwrap()
            .run(Vec::new())
            .await
            .unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.succeeded + report.failed, 0);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(BatchOrchestrator::new(BatchConfig::with_workers(0)).is_err());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
    }
}
