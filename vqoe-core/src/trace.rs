//! Network trace adapter.
//!
//! Turns measured per-segment latencies plus the set of cache-miss indices
//! into one [`NetworkCondition`] per segment, applying the optional
//! miss-latency override.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Errors raised when a trace does not fit the manifest it is replayed against.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MalformedTraceError {
    #[error("Latency list has {actual} entries but the manifest has {expected} segments")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Miss index {index} is out of range for {segment_count} segments")]
    MissIndexOutOfRange { index: usize, segment_count: usize },

    #[error("Segment {index} has negative latency {latency_ms}ms")]
    NegativeLatency { index: usize, latency_ms: f64 },

    #[error("Segment {index} latency is not a finite number")]
    NonFiniteLatency { index: usize },
}

/// Raw per-video measurements as produced by the probing tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceInput {
    /// Measured fetch latency per segment, in milliseconds
    pub latency_list: Vec<f64>,
    /// 0-based indices of segments that were cache misses
    #[serde(default)]
    pub miss_indices: Vec<usize>,
}

impl TraceInput {
    pub fn new(latency_list: Vec<f64>, miss_indices: Vec<usize>) -> Self {
        Self {
            latency_list,
            miss_indices,
        }
    }
}

/// Network conditions observed for a single segment fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkCondition {
    pub segment_index: usize,
    pub latency_ms: f64,
    pub is_cache_miss: bool,
}

/// Normalized per-segment trace; exactly one condition per manifest segment.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkTrace {
    conditions: Vec<NetworkCondition>,
}

impl NetworkTrace {
    /// Normalizes raw measurements against a manifest with `segment_count` segments.
    ///
    /// When `miss_latency_override_ms` is set, every miss index's latency is
    /// replaced by exactly that value. Duplicate miss indices are collapsed.
    ///
    /// # Errors
    ///
    /// - `MalformedTraceError::LengthMismatch` - Latency count differs from segment count
    /// - `MalformedTraceError::MissIndexOutOfRange` - Miss index beyond the last segment
    /// - `MalformedTraceError::NegativeLatency` / `NonFiniteLatency` - Invalid measurement
    pub fn normalize(
        input: &TraceInput,
        segment_count: usize,
        miss_latency_override_ms: Option<f64>,
    ) -> Result<Self, MalformedTraceError> {
        if input.latency_list.len() != segment_count {
            return Err(MalformedTraceError::LengthMismatch {
                expected: segment_count,
                actual: input.latency_list.len(),
            });
        }

        let misses = input.miss_indices.iter().copied().collect::<BTreeSet<_>>();
        if let Some(&index) = misses.range(segment_count..).next() {
            return Err(MalformedTraceError::MissIndexOutOfRange {
                index,
                segment_count,
            });
        }

        let conditions = input
            .latency_list
            .iter()
            .enumerate()
            .map(|(index, &measured)| {
                if !measured.is_finite() {
                    return Err(MalformedTraceError::NonFiniteLatency { index });
                }
                if measured < 0.0 {
                    return Err(MalformedTraceError::NegativeLatency {
                        index,
                        latency_ms: measured,
                    });
                }

                let is_cache_miss = misses.contains(&index);
                let latency_ms = match miss_latency_override_ms {
                    Some(override_ms) if is_cache_miss => override_ms,
                    _ => measured,
                };

                Ok(NetworkCondition {
                    segment_index: index,
                    latency_ms,
                    is_cache_miss,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { conditions })
    }

    pub fn conditions(&self) -> &[NetworkCondition] {
        &self.conditions
    }

    pub fn condition(&self, index: usize) -> Option<&NetworkCondition> {
        self.conditions.get(index)
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Post-override latency per segment.
    pub fn latencies_ms(&self) -> Vec<f64> {
        self.conditions.iter().map(|c| c.latency_ms).collect()
    }

    pub fn miss_count(&self) -> usize {
        self.conditions.iter().filter(|c| c.is_cache_miss).count()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_override_replaces_only_misses() {
        let input = TraceInput::new(vec![25.0, 625.0, 700.0, 21.0, 19.0], vec![1, 2]);
        let trace = NetworkTrace::normalize(&input, 5, Some(370.0)).unwrap();

        assert_eq!(trace.latencies_ms(), vec![25.0, 370.0, 370.0, 21.0, 19.0]);
        assert_eq!(trace.miss_count(), 2);
        assert!(trace.condition(1).unwrap().is_cache_miss);
        assert!(!trace.condition(0).unwrap().is_cache_miss);
    }

    #[test]
    fn test_without_override_keeps_measurements() {
        let input = TraceInput::new(vec![25.0, 625.0, 700.0], vec![2, 2]);
        let trace = NetworkTrace::normalize(&input, 3, None).unwrap();

        assert_eq!(trace.latencies_ms(), vec![25.0, 625.0, 700.0]);
        assert_eq!(trace.miss_count(), 1);
    }

    #[test]
    fn test_length_mismatch() {
        let input = TraceInput::new(vec![25.0, 30.0], vec![]);
        assert_eq!(
            NetworkTrace::normalize(&input, 3, None),
            Err(MalformedTraceError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_miss_index_out_of_range() {
        let input = TraceInput::new(vec![25.0, 30.0], vec![0, 7]);
        assert_eq!(
            NetworkTrace::normalize(&input, 2, Some(100.0)),
            Err(MalformedTraceError::MissIndexOutOfRange {
                index: 7,
                segment_count: 2
            })
        );
    }

    #[test]
    fn test_negative_and_nan_latency() {
        let negative = TraceInput::new(vec![25.0, -1.0], vec![]);
        assert!(matches!(
            NetworkTrace::normalize(&negative, 2, None),
            Err(MalformedTraceError::NegativeLatency { index: 1, .. })
        ));

        let nan = TraceInput::new(vec![f64::NAN], vec![]);
        assert_eq!(
            NetworkTrace::normalize(&nan, 1, None),
            Err(MalformedTraceError::NonFiniteLatency { index: 0 })
        );
    }

    #[test]
    fn test_negative_latency_rejected_even_when_overridden() {
        let input = TraceInput::new(vec![25.0, -1.0], vec![1]);
        assert!(NetworkTrace::normalize(&input, 2, Some(50.0)).is_err());
    }

    proptest! {
        #[test]
        fn prop_override_is_exact_and_local(
            latencies in prop::collection::vec(0.0f64..5000.0, 1..64),
            raw_misses in prop::collection::vec(any::<prop::sample::Index>(), 0..16),
            override_ms in 0.0f64..2000.0,
        ) {
            let n = latencies.len();
            let misses = raw_misses.iter().map(|i| i.index(n)).collect::<Vec<_>>();
            let input = TraceInput::new(latencies.clone(), misses.clone());
            let trace = NetworkTrace::normalize(&input, n, Some(override_ms)).unwrap();

            prop_assert_eq!(trace.len(), n);
            for (i, condition) in trace.conditions().iter().enumerate() {
                prop_assert_eq!(condition.segment_index, i);
                if misses.contains(&i) {
                    prop_assert!(condition.is_cache_miss);
                    prop_assert_eq!(condition.latency_ms, override_ms);
                } else {
                    prop_assert!(!condition.is_cache_miss);
                    prop_assert_eq!(condition.latency_ms, latencies[i]);
                }
            }
        }
    }
}
