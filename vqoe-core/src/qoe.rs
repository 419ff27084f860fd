//! QoE aggregation over a playback timeline.
//!
//! A pure reduction: the same timeline and weights always give the same metrics.

use serde::Serialize;

use crate::config::RewardWeights;
use crate::timeline::PlaybackTimeline;

/// Summary metrics for a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QoeMetrics {
    /// Duration-weighted mean of chosen bitrates, in bits per second
    pub average_bitrate: f64,
    pub bitrate_switch_count: u64,
    pub total_rebuffer_ms: f64,
    pub rebuffer_count: u64,
    pub startup_delay_ms: f64,
    /// Wall clock from playback start to the end of the last segment
    pub playback_span_ms: f64,
    pub reward_score: f64,
}

impl QoeMetrics {
    /// Reduces `timeline` into summary metrics.
    pub fn aggregate(timeline: &PlaybackTimeline, weights: &RewardWeights) -> Self {
        let events = &timeline.events;

        let total_duration_s = events.iter().map(|e| e.duration_s).sum::<f64>();
        let average_bitrate = if total_duration_s > 0.0 {
            events
                .iter()
                .map(|e| e.bitrate_bps as f64 * e.duration_s)
                .sum::<f64>()
                / total_duration_s
        } else {
            0.0
        };

        let bitrate_switch_count = events
            .windows(2)
            .filter(|pair| pair[0].chosen_rung != pair[1].chosen_rung)
            .count() as u64;

        let total_rebuffer_ms = events.iter().map(|e| e.stall_duration_ms).sum::<f64>();
        let rebuffer_count = events.iter().filter(|e| e.stalled()).count() as u64;

        let reward_score = weights.bitrate * average_bitrate
            - weights.rebuffer * total_rebuffer_ms
            - weights.switch * bitrate_switch_count as f64;

        Self {
            average_bitrate,
            bitrate_switch_count,
            total_rebuffer_ms,
            rebuffer_count,
            startup_delay_ms: timeline.startup_delay_ms,
            playback_span_ms: timeline.playback_span_ms(),
            reward_score,
        }
    }
}

/// Per-row result: metrics on success, every numeric field null on error.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct QoeResult {
    pub average_bitrate: Option<f64>,
    pub bitrate_switch_count: Option<u64>,
    pub total_rebuffer_ms: Option<f64>,
    pub rebuffer_count: Option<u64>,
    pub startup_delay_ms: Option<f64>,
    pub playback_span_ms: Option<f64>,
    pub reward_score: Option<f64>,
    pub error: Option<String>,
}

impl QoeResult {
    pub fn from_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Returns the metrics if this row succeeded.
    pub fn metrics(&self) -> Option<QoeMetrics> {
        if self.is_error() {
            return None;
        }
        Some(QoeMetrics {
            average_bitrate: self.average_bitrate?,
            bitrate_switch_count: self.bitrate_switch_count?,
            total_rebuffer_ms: self.total_rebuffer_ms?,
            rebuffer_count: self.rebuffer_count?,
            startup_delay_ms: self.startup_delay_ms?,
            playback_span_ms: self.playback_span_ms?,
            reward_score: self.reward_score?,
        })
    }
}

impl From<QoeMetrics> for QoeResult {
    fn from(metrics: QoeMetrics) -> Self {
        Self {
            average_bitrate: Some(metrics.average_bitrate),
            bitrate_switch_count: Some(metrics.bitrate_switch_count),
            total_rebuffer_ms: Some(metrics.total_rebuffer_ms),
            rebuffer_count: Some(metrics.rebuffer_count),
            startup_delay_ms: Some(metrics.startup_delay_ms),
            playback_span_ms: Some(metrics.playback_span_ms),
            reward_score: Some(metrics.reward_score),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::RungId;
    use crate::timeline::SegmentEvent;

    fn event(index: usize, rung: usize, bitrate_bps: u64, stall_ms: f64) -> SegmentEvent {
        SegmentEvent {
            index,
            chosen_rung: RungId::new(rung),
            bitrate_bps,
            duration_s: 2.0,
            is_cache_miss: false,
            latency_ms: 100.0,
            download_time_ms: 100.0,
            fetch_start_ms: 0.0,
            fetch_finish_ms: 100.0,
            played_ms: 0.0,
            buffer_before: 0.0,
            buffer_after: 2.0,
            stall_duration_ms: stall_ms,
        }
    }

    fn timeline(events: Vec<SegmentEvent>) -> PlaybackTimeline {
        PlaybackTimeline {
            events,
            transitions: Vec::new(),
            startup_delay_ms: 250.0,
            finished_at_ms: 10_250.0,
            buffer_capacity_s: 30.0,
        }
    }

    #[test]
    fn test_aggregate_counts_switches_and_stalls() {
        let timeline = timeline(vec![
            event(0, 0, 1_000_000, 0.0),
            event(1, 1, 3_000_000, 0.0),
            event(2, 1, 3_000_000, 400.0),
            event(3, 0, 1_000_000, 100.0),
        ]);

        let metrics = QoeMetrics::aggregate(&timeline, &RewardWeights::default());

        assert_eq!(metrics.average_bitrate, 2_000_000.0);
        assert_eq!(metrics.bitrate_switch_count, 2);
        assert_eq!(metrics.total_rebuffer_ms, 500.0);
        assert_eq!(metrics.rebuffer_count, 2);
        assert_eq!(metrics.startup_delay_ms, 250.0);
        assert_eq!(metrics.playback_span_ms, 10_000.0);
    }

    #[test]
    fn test_reward_uses_configured_weights() {
        let timeline = timeline(vec![event(0, 0, 2_000_000, 1000.0), event(1, 1, 2_000_000, 0.0)]);
        let weights = RewardWeights {
            bitrate: 1e-6,
            rebuffer: 1e-3,
            switch: 0.5,
        };

        let metrics = QoeMetrics::aggregate(&timeline, &weights);
        // 2 Mbps - 1s stall - 1 switch * 0.5
        assert!((metrics.reward_score - 0.5).abs() < 1e-9);

        let zero = RewardWeights {
            bitrate: 0.0,
            rebuffer: 0.0,
            switch: 0.0,
        };
        assert_eq!(QoeMetrics::aggregate(&timeline, &zero).reward_score, 0.0);
    }

    #[test]
    fn test_error_result_has_no_metrics() {
        let result = QoeResult::from_error("segment 3 has negative latency");
        assert!(result.is_error());
        assert_eq!(result.metrics(), None);
        assert_eq!(result.average_bitrate, None);

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["average_bitrate"].is_null());
        assert_eq!(json["error"], "segment 3 has negative latency");
    }

    #[test]
    fn test_metrics_round_trip_through_result() {
        let metrics = QoeMetrics::aggregate(
            &timeline(vec![event(0, 0, 1_000_000, 0.0)]),
            &RewardWeights::default(),
        );
        let result = QoeResult::from(metrics);
        assert!(!result.is_error());
        assert_eq!(result.metrics(), Some(metrics));
    }
}
