//! vqoe Core - Data model for adaptive-bitrate playback simulation
//!
//! This crate provides the immutable inputs and the pure reductions of the
//! simulator: the video manifest, the per-segment network trace, run
//! configuration, the segment event log and the QoE aggregation over it.

pub mod config;
pub mod manifest;
pub mod qoe;
pub mod timeline;
pub mod trace;

// Re-export main types for convenient access
pub use config::{
    AbrAlgorithm, BatchConfig, BolaTuning, ConfigurationError, DynamicTuning, LookaheadTuning,
    PolicyTuning, RewardWeights, RunSettings, SettingsOverrides, SimulationConfig,
    ThroughputTuning,
};
pub use manifest::{Manifest, ManifestError, QualityRung, RungId, Segment};
pub use qoe::{QoeMetrics, QoeResult};
pub use timeline::{BufferState, PhaseTransition, PlaybackPhase, PlaybackTimeline, SegmentEvent};
pub use trace::{MalformedTraceError, NetworkCondition, NetworkTrace, TraceInput};

/// Errors that can bubble up from any vqoe core subsystem.
#[derive(Debug, thiserror::Error)]
pub enum VqoeError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Malformed trace: {0}")]
    MalformedTrace(#[from] MalformedTraceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VqoeError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            VqoeError::Configuration(e) => match e {
                ConfigurationError::UnknownAlgorithm { name } => {
                    format!(
                        "Unknown ABR algorithm '{name}' (available: {})",
                        AbrAlgorithm::registry_names().join(", ")
                    )
                }
                other => format!("Invalid configuration: {other}"),
            },
            VqoeError::Manifest(e) => format!("Could not load manifest: {e}"),
            VqoeError::MalformedTrace(e) => format!("Trace rejected: {e}"),
            VqoeError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            VqoeError::Configuration(_) | VqoeError::Manifest(_) | VqoeError::MalformedTrace(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, VqoeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_algorithm_message_lists_registry() {
        let error = VqoeError::from(ConfigurationError::UnknownAlgorithm {
            name: "mpc".to_string(),
        });

        let message = error.user_message();
        assert!(message.contains("'mpc'"));
        assert!(message.contains("throughput"));
        assert!(message.contains("lookahead"));
        assert!(error.is_user_error());
    }

    #[test]
    fn test_io_error_is_not_user_error() {
        let error = VqoeError::from(std::io::Error::other("disk gone"));
        assert!(!error.is_user_error());
        assert_eq!(error.user_message(), "File system error occurred");
    }
}
