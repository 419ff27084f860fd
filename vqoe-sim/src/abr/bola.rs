//! BOLA buffer-occupancy policy.

use vqoe_core::{BolaTuning, BufferState, Manifest, RungId};

/// Lyapunov buffer-based policy.
///
/// Rung utility is `ln(bitrate / lowest_bitrate) + 1`. The rung maximizing
/// `(vp * (utility + gp) - buffer_s) / bitrate` is chosen, where
/// `vp = (buffer_capacity - segment_duration) / (max_utility + gp)`.
#[derive(Debug, Clone)]
pub struct BolaPolicy {
    utilities: Vec<f64>,
    gp: f64,
    vp: f64,
}

impl BolaPolicy {
    /// Precomputes utilities and the control parameter for `manifest`.
    pub fn new(manifest: &Manifest, buffer_capacity_s: f64, tuning: BolaTuning) -> Self {
        let lowest = manifest
            .rungs()
            .first()
            .map_or(1.0, |rung| rung.bitrate_bps as f64);
        let utilities = manifest
            .rungs()
            .iter()
            .map(|rung| (rung.bitrate_bps as f64 / lowest).ln() + 1.0)
            .collect::<Vec<_>>();

        let segment_s = manifest
            .segment(0)
            .map_or(0.0, |segment| segment.duration_s());
        let max_utility = utilities.last().copied().unwrap_or(1.0);
        let vp = (buffer_capacity_s - segment_s) / (max_utility + tuning.gp);

        Self {
            utilities,
            gp: tuning.gp,
            vp,
        }
    }

    /// Control parameter `vp`; non-positive when the buffer holds at most one segment.
    pub fn vp(&self) -> f64 {
        self.vp
    }

    pub(crate) fn decide(&self, buffer: &BufferState, manifest: &Manifest) -> RungId {
        // A buffer no larger than one segment leaves BOLA nothing to steer by.
        if self.vp <= 0.0 {
            return manifest.lowest_rung();
        }

        let level = buffer.occupancy_s;
        let mut best = manifest.lowest_rung();
        let mut best_score = f64::NEG_INFINITY;
        for (rung, utility) in manifest.rungs().iter().zip(&self.utilities) {
            let score = (self.vp * (utility + self.gp) - level) / rung.bitrate_bps as f64;
            if score > best_score {
                best = rung.id;
                best_score = score;
            }
        }
        best
    }
}
