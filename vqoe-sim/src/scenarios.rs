//! Seeded synthetic traces for stress tests and benchmarks.
//!
//! Every scenario is a pure function of its seed, so a failing stress input
//! can be reproduced from the seed alone.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use vqoe_core::{Manifest, ManifestError, TraceInput};

/// Deterministic random source for reproducible scenarios.
#[derive(Debug, Clone)]
pub struct DeterministicRng {
    rng: ChaCha8Rng,
}

impl DeterministicRng {
    /// Creates deterministic RNG from seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Generates random number in range [0, 1).
    pub fn random_f64(&mut self) -> f64 {
        (self.rng.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generates random boolean with given probability.
    pub fn random_bool(&mut self, probability: f64) -> bool {
        self.random_f64() < probability
    }
}

/// Shape of a synthetic latency trace.
///
/// Hits draw latency uniformly from `base ± jitter`; misses add
/// `miss_latency_ms` on top, mimicking an edge cache falling back to origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceScenario {
    /// Number of segments
    pub segments: usize,
    /// Mean hit latency in milliseconds
    pub base_latency_ms: f64,
    /// Maximum deviation from the mean
    pub jitter_ms: f64,
    /// Probability that a segment is a cache miss
    pub miss_rate: f64,
    /// Extra latency of a miss in milliseconds
    pub miss_latency_ms: f64,
}

impl Default for TraceScenario {
    fn default() -> Self {
        Self {
            segments: 60,
            base_latency_ms: 40.0,
            jitter_ms: 20.0,
            miss_rate: 0.1,
            miss_latency_ms: 600.0,
        }
    }
}

impl TraceScenario {
    /// Edge cache that rarely misses.
    pub fn warm_cache(segments: usize) -> Self {
        Self {
            segments,
            miss_rate: 0.02,
            ..Default::default()
        }
    }

    /// Cold cache with long origin fetches.
    pub fn cold_cache(segments: usize) -> Self {
        Self {
            segments,
            miss_rate: 0.5,
            miss_latency_ms: 2500.0,
            ..Default::default()
        }
    }

    /// Generates the trace for `seed`.
    pub fn generate(&self, seed: u64) -> TraceInput {
        let mut rng = DeterministicRng::from_seed(seed);
        let mut latency_list = Vec::with_capacity(self.segments);
        let mut miss_indices = Vec::new();

        for index in 0..self.segments {
            let offset = (rng.random_f64() * 2.0 - 1.0) * self.jitter_ms;
            let mut latency = (self.base_latency_ms + offset).max(0.0);
            if rng.random_bool(self.miss_rate) {
                latency += self.miss_latency_ms;
                miss_indices.push(index);
            }
            latency_list.push(latency);
        }

        TraceInput::new(latency_list, miss_indices)
    }

    /// Constant-bitrate manifest with 2 s segments matching this scenario.
    ///
    /// # Errors
    ///
    /// - `ManifestError` - Empty scenario or invalid ladder
    pub fn manifest(&self, bitrates_bps: Vec<u64>) -> Result<Manifest, ManifestError> {
        Manifest::constant_bitrate(bitrates_bps, 2.0, self.segments)
    }
}
