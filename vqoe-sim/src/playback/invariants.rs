//! Invariants checked while a run advances.

use thiserror::Error;
use vqoe_core::{Manifest, RungId};

/// Internal-consistency failure that aborts one run.
///
/// These signal a bug in a policy or in the simulator, never bad input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationInvariantError {
    /// Policy chose a rung the manifest does not offer
    #[error("Segment {segment}: policy chose rung {rung} but manifest has {rung_count} rungs")]
    InvalidRung {
        /// Segment being decided
        segment: usize,
        /// Rung returned by the policy
        rung: RungId,
        /// Rungs available in the manifest
        rung_count: usize,
    },

    /// Buffer occupancy went negative or non-finite after an append
    #[error("Segment {segment}: buffer occupancy {occupancy_s}s is invalid")]
    NegativeBuffer {
        /// Segment just appended
        segment: usize,
        /// Occupancy observed
        occupancy_s: f64,
    },

    /// Normalized trace and manifest disagree on segment count
    #[error("Trace covers {trace_len} segments but manifest has {segment_count}")]
    TraceManifestMismatch {
        /// Conditions in the trace
        trace_len: usize,
        /// Segments in the manifest
        segment_count: usize,
    },
}

/// Returns the size of `segment` at `rung`, or an error if the rung does not exist.
pub(crate) fn check_rung(
    manifest: &Manifest,
    segment: usize,
    rung: RungId,
) -> Result<u64, SimulationInvariantError> {
    manifest
        .segment(segment)
        .and_then(|s| s.size_bits(rung))
        .ok_or(SimulationInvariantError::InvalidRung {
            segment,
            rung,
            rung_count: manifest.rung_count(),
        })
}

/// Rejects negative or non-finite occupancy.
pub(crate) fn check_buffer(segment: usize, occupancy_s: f64) -> Result<(), SimulationInvariantError> {
    if !occupancy_s.is_finite() || occupancy_s < 0.0 {
        return Err(SimulationInvariantError::NegativeBuffer {
            segment,
            occupancy_s,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rung_out_of_range() {
        let manifest = Manifest::constant_bitrate(vec![1_000_000, 2_000_000], 2.0, 3).unwrap();

        assert_eq!(check_rung(&manifest, 1, RungId::new(1)), Ok(4_000_000));
        assert_eq!(
            check_rung(&manifest, 1, RungId::new(2)),
            Err(SimulationInvariantError::InvalidRung {
                segment: 1,
                rung: RungId::new(2),
                rung_count: 2,
            })
        );
    }

    #[test]
    fn test_buffer_bounds() {
        assert!(check_buffer(0, 0.0).is_ok());
        assert!(check_buffer(0, 12.5).is_ok());
        assert!(check_buffer(3, -0.001).is_err());
        assert!(check_buffer(3, f64::NAN).is_err());
    }
}
