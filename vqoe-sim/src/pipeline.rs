//! Single-run pipeline: normalize, simulate, aggregate.
//!
//! Both the `run` command and every batch row go through [`run_single`].

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;
use vqoe_core::{
    Manifest, MalformedTraceError, NetworkTrace, PlaybackTimeline, QoeMetrics, QoeResult,
    SimulationConfig, TraceInput,
};

use crate::abr::AbrPolicy;
use crate::playback::{PlaybackSimulator, SimulationInvariantError};

/// Failure confined to one row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    /// Row's trace could not be normalized
    #[error("Malformed trace: {0}")]
    MalformedTrace(#[from] MalformedTraceError),

    /// Simulator detected an internal inconsistency
    #[error("Simulation invariant violated: {0}")]
    Invariant(#[from] SimulationInvariantError),

    /// Row finished but took longer than the configured budget
    #[error("Row exceeded time budget: {elapsed_ms} ms > {budget_ms} ms")]
    TimeBudgetExceeded {
        /// Wall time spent on the row
        elapsed_ms: u128,
        /// Configured per-row budget
        budget_ms: u128,
    },

    /// Row's pipeline panicked
    #[error("Row panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string
        message: String,
    },
}

impl From<RowError> for QoeResult {
    fn from(error: RowError) -> Self {
        QoeResult::from_error(error.to_string())
    }
}

/// Everything one successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Full event log and phase transitions
    pub timeline: PlaybackTimeline,
    /// Metrics reduced from the timeline
    pub metrics: QoeMetrics,
}

/// Runs one trace against one manifest under `config`.
///
/// The config is assumed validated; see [`vqoe_core::RunSettings::resolve`].
///
/// # Errors
///
/// - `RowError::MalformedTrace` - Trace length, miss index or latency invalid
/// - `RowError::Invariant` - Simulator or policy broke an internal invariant
pub fn run_single(
    manifest: &Manifest,
    input: &TraceInput,
    config: &SimulationConfig,
) -> Result<RunOutcome, RowError> {
    let trace = Arc::new(NetworkTrace::normalize(
        input,
        manifest.segment_count(),
        config.miss_latency_override_ms,
    )?);

    let mut policy = AbrPolicy::build(config, manifest, Arc::clone(&trace));
    let timeline = PlaybackSimulator::new(manifest, &trace, config).run(&mut policy)?;
    let metrics = QoeMetrics::aggregate(&timeline, &config.reward);

    debug!(
        abr = %config.abr,
        segments = timeline.events.len(),
        misses = trace.miss_count(),
        rebuffer_ms = metrics.total_rebuffer_ms,
        "run complete"
    );

    Ok(RunOutcome { timeline, metrics })
}

#[cfg(test)]
mod tests {
    use vqoe_core::{AbrAlgorithm, RewardWeights};

    use super::*;

    fn manifest() -> Manifest {
        Manifest::constant_bitrate(vec![1_000_000], 2.0, 4).unwrap()
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            buffer_capacity_s: 5.0,
            startup_threshold_s: Some(2.0),
            abr: AbrAlgorithm::Bola,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_metrics() {
        let input = TraceInput::new(vec![500.0, 500.0, 4000.0, 500.0], vec![2]);
        let outcome = run_single(&manifest(), &input, &config()).unwrap();
        let metrics = outcome.metrics;

        assert_eq!(metrics.startup_delay_ms, 500.0);
        assert_eq!(metrics.rebuffer_count, 1);
        assert_eq!(metrics.total_rebuffer_ms, 500.0);
        assert_eq!(metrics.bitrate_switch_count, 0);
        assert_eq!(metrics.playback_span_ms, 8500.0);
        assert_eq!(metrics.average_bitrate, 1_000_000.0);

        let weights = RewardWeights::default();
        let expected = weights.bitrate * 1_000_000.0 - weights.rebuffer * 500.0;
        assert!((metrics.reward_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_miss_override_applied_before_simulation() {
        let input = TraceInput::new(vec![500.0, 500.0, 4000.0, 500.0], vec![2]);
        let config = SimulationConfig {
            miss_latency_override_ms: Some(1000.0),
            ..config()
        };
        let outcome = run_single(&manifest(), &input, &config).unwrap();

        assert_eq!(outcome.timeline.events[2].latency_ms, 1000.0);
        assert_eq!(outcome.metrics.rebuffer_count, 0);
    }

    #[test]
    fn test_malformed_trace_becomes_error_result() {
        let input = TraceInput::new(vec![500.0, 500.0], vec![]);
        let error = run_single(&manifest(), &input, &config()).unwrap_err();

        assert!(matches!(
            error,
            RowError::MalformedTrace(MalformedTraceError::LengthMismatch {
                expected: 4,
                actual: 2
            })
        ));

        let result = QoeResult::from(error);
        assert!(result.is_error());
        assert!(result.average_bitrate.is_none());
    }
}
