//! Centralized configuration for vqoe.
//!
//! All tunable parameters are defined here so policy constants and reward
//! weights are never hard-coded in the simulator. `RunSettings` is the
//! name-based, serializable form supplied by users; it resolves into a
//! validated, typed `SimulationConfig` that is immutable for one run.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that make a run or a whole batch unusable before simulation starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("Unknown ABR algorithm: {name}")]
    UnknownAlgorithm { name: String },

    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Row {row}: {source}")]
    InRow {
        row: usize,
        #[source]
        source: Box<ConfigurationError>,
    },
}

impl ConfigurationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Fixed registry of ABR strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbrAlgorithm {
    /// Harmonic-mean throughput estimate with a safety margin
    Throughput,
    /// Buffer-occupancy based Lyapunov policy
    Bola,
    /// Throughput at low buffer, BOLA once the buffer is healthy
    Dynamic,
    /// Oracle baseline with bounded foreknowledge of the latency trace
    Lookahead,
}

impl AbrAlgorithm {
    pub const ALL: [AbrAlgorithm; 4] = [
        AbrAlgorithm::Throughput,
        AbrAlgorithm::Bola,
        AbrAlgorithm::Dynamic,
        AbrAlgorithm::Lookahead,
    ];

    /// Registry name used in configuration and output rows.
    pub fn as_str(self) -> &'static str {
        match self {
            AbrAlgorithm::Throughput => "throughput",
            AbrAlgorithm::Bola => "bola",
            AbrAlgorithm::Dynamic => "dynamic",
            AbrAlgorithm::Lookahead => "lookahead",
        }
    }

    pub fn registry_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|a| a.as_str()).collect()
    }

    /// Whether this strategy sees future network conditions.
    pub fn is_oracle(self) -> bool {
        matches!(self, AbrAlgorithm::Lookahead)
    }
}

impl FromStr for AbrAlgorithm {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "throughput" => Ok(AbrAlgorithm::Throughput),
            "bola" => Ok(AbrAlgorithm::Bola),
            "dynamic" => Ok(AbrAlgorithm::Dynamic),
            "lookahead" => Ok(AbrAlgorithm::Lookahead),
            _ => Err(ConfigurationError::UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for AbrAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear QoE reward: `bitrate * avg_bps - rebuffer * rebuffer_ms - switch * switches`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Weight per bit/s of average bitrate
    pub bitrate: f64,
    /// Penalty per millisecond of rebuffering
    pub rebuffer: f64,
    /// Penalty per bitrate switch
    pub switch: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            bitrate: 1e-6,   // 1 point per Mbps
            rebuffer: 4.3e-3, // 4.3 points per second stalled
            switch: 1.0,
        }
    }
}

impl RewardWeights {
    fn validate(&self) -> Result<(), ConfigurationError> {
        for (name, value) in [
            ("bitrate", self.bitrate),
            ("rebuffer", self.rebuffer),
            ("switch", self.switch),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::invalid(
                    "reward weight",
                    format!("{name} weight must be finite and non-negative, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// Throughput-reactive policy parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThroughputTuning {
    /// Number of most recent downloads in the harmonic mean
    pub window: usize,
    /// Fraction of the estimate considered usable (0, 1]
    pub safety_margin: f64,
}

impl Default for ThroughputTuning {
    fn default() -> Self {
        Self {
            window: 3,
            safety_margin: 0.9,
        }
    }
}

/// BOLA parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BolaTuning {
    /// Lyapunov control parameter `gp`
    pub gp: f64,
}

impl Default for BolaTuning {
    fn default() -> Self {
        Self { gp: 5.0 }
    }
}

/// Dynamic (throughput/BOLA hybrid) parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicTuning {
    /// Buffer level below which throughput mode is preferred, in seconds
    pub low_buffer_threshold_s: f64,
}

impl Default for DynamicTuning {
    fn default() -> Self {
        Self {
            low_buffer_threshold_s: 10.0,
        }
    }
}

/// Oracle lookahead parameters.
///
/// Per-segment cost is
/// `stall_weight * stall_s + switch_weight * [rung changed] - quality_weight * bitrate_mbps * duration_s`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookaheadTuning {
    /// Number of segments planned per decision, including the current one
    pub horizon: usize,
    pub stall_weight: f64,
    pub switch_weight: f64,
    pub quality_weight: f64,
}

impl Default for LookaheadTuning {
    fn default() -> Self {
        Self {
            horizon: 5,
            stall_weight: 4.3,
            switch_weight: 1.0,
            quality_weight: 1.0,
        }
    }
}

/// Tuning for every policy in the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyTuning {
    pub throughput: ThroughputTuning,
    pub bola: BolaTuning,
    pub dynamic: DynamicTuning,
    pub lookahead: LookaheadTuning,
}

impl PolicyTuning {
    fn validate(&self) -> Result<(), ConfigurationError> {
        if self.throughput.window == 0 {
            return Err(ConfigurationError::invalid(
                "throughput window",
                "must be at least 1",
            ));
        }
        let margin = self.throughput.safety_margin;
        if !(margin > 0.0 && margin <= 1.0) {
            return Err(ConfigurationError::invalid(
                "throughput safety margin",
                format!("must be in (0, 1], got {margin}"),
            ));
        }
        if !self.bola.gp.is_finite() || self.bola.gp <= 0.0 {
            return Err(ConfigurationError::invalid(
                "bola gp",
                format!("must be positive, got {}", self.bola.gp),
            ));
        }
        let threshold = self.dynamic.low_buffer_threshold_s;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigurationError::invalid(
                "dynamic low buffer threshold",
                format!("must be non-negative, got {threshold}"),
            ));
        }
        let lookahead = &self.lookahead;
        if lookahead.horizon == 0 {
            return Err(ConfigurationError::invalid(
                "lookahead horizon",
                "must be at least 1",
            ));
        }
        for (name, value) in [
            ("stall", lookahead.stall_weight),
            ("switch", lookahead.switch_weight),
            ("quality", lookahead.quality_weight),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::invalid(
                    "lookahead weight",
                    format!("{name} weight must be finite and non-negative, got {value}"),
                ));
            }
        }
        Ok(())
    }
}

/// Validated parameters for one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Bandwidth cap in Mbps (None = unconstrained, fetch time is latency only)
    pub bandwidth_cap_mbps: Option<f64>,
    /// Soft buffer ceiling in seconds
    pub buffer_capacity_s: f64,
    /// Buffered seconds required to begin playback (None = one segment duration)
    pub startup_threshold_s: Option<f64>,
    pub abr: AbrAlgorithm,
    /// Latency forced onto every cache-miss segment, in milliseconds
    pub miss_latency_override_ms: Option<f64>,
    pub reward: RewardWeights,
    pub tuning: PolicyTuning,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            bandwidth_cap_mbps: None,
            buffer_capacity_s: 30.0,
            startup_threshold_s: None,
            abr: AbrAlgorithm::Dynamic,
            miss_latency_override_ms: None,
            reward: RewardWeights::default(),
            tuning: PolicyTuning::default(),
        }
    }
}

impl SimulationConfig {
    /// Checks every field for a usable value.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::InvalidValue` - Negative, zero or non-finite parameter
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let Some(mbps) = self.bandwidth_cap_mbps
            && (!mbps.is_finite() || mbps <= 0.0)
        {
            return Err(ConfigurationError::invalid(
                "bandwidth",
                format!("must be a positive number of Mbps, got {mbps}"),
            ));
        }
        if !self.buffer_capacity_s.is_finite() || self.buffer_capacity_s <= 0.0 {
            return Err(ConfigurationError::invalid(
                "buffer size",
                format!("must be positive seconds, got {}", self.buffer_capacity_s),
            ));
        }
        if let Some(threshold) = self.startup_threshold_s
            && (!threshold.is_finite() || threshold < 0.0)
        {
            return Err(ConfigurationError::invalid(
                "startup threshold",
                format!("must be non-negative seconds, got {threshold}"),
            ));
        }
        if let Some(miss) = self.miss_latency_override_ms
            && (!miss.is_finite() || miss < 0.0)
        {
            return Err(ConfigurationError::invalid(
                "miss latency",
                format!("must be non-negative milliseconds, got {miss}"),
            ));
        }
        self.reward.validate()?;
        self.tuning.validate()
    }

    /// Effective bandwidth in bits per second, if capped.
    pub fn bandwidth_bps(&self) -> Option<f64> {
        self.bandwidth_cap_mbps.map(|mbps| mbps * 1_000_000.0)
    }

    /// Startup threshold, falling back to the first segment's duration.
    pub fn startup_threshold_for(&self, first_segment_duration_s: f64) -> f64 {
        self.startup_threshold_s
            .unwrap_or(first_segment_duration_s)
    }
}

/// Name-based run settings as supplied on the command line or in a table row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Bandwidth cap in Mbps
    pub bandwidth: Option<f64>,
    /// Buffer size in seconds
    pub buffer_size: f64,
    /// Miss latency override in milliseconds
    pub miss_latency: Option<f64>,
    /// ABR algorithm registry name
    pub abr: String,
    /// Startup threshold in seconds
    pub startup_threshold: Option<f64>,
    pub reward: RewardWeights,
    pub tuning: PolicyTuning,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            bandwidth: Some(25.0),
            buffer_size: 30.0,
            miss_latency: None,
            abr: AbrAlgorithm::Dynamic.as_str().to_string(),
            startup_threshold: None,
            reward: RewardWeights::default(),
            tuning: PolicyTuning::default(),
        }
    }
}

/// Per-row overrides of the batch-wide settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOverrides {
    pub bandwidth: Option<f64>,
    pub buffer_size: Option<f64>,
    pub miss_latency: Option<f64>,
    pub abr: Option<String>,
}

impl SettingsOverrides {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl RunSettings {
    /// Resolves names into a validated configuration.
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::UnknownAlgorithm` - `abr` is not in the registry
    /// - `ConfigurationError::InvalidValue` - Any field fails validation
    pub fn resolve(&self) -> Result<SimulationConfig, ConfigurationError> {
        let config = SimulationConfig {
            bandwidth_cap_mbps: self.bandwidth,
            buffer_capacity_s: self.buffer_size,
            startup_threshold_s: self.startup_threshold,
            abr: self.abr.parse()?,
            miss_latency_override_ms: self.miss_latency,
            reward: self.reward,
            tuning: self.tuning,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns a copy with any fields present in `overrides` replaced.
    pub fn with_overrides(&self, overrides: &SettingsOverrides) -> RunSettings {
        let mut settings = self.clone();
        if let Some(bandwidth) = overrides.bandwidth {
            settings.bandwidth = Some(bandwidth);
        }
        if let Some(buffer_size) = overrides.buffer_size {
            settings.buffer_size = buffer_size;
        }
        if let Some(miss_latency) = overrides.miss_latency {
            settings.miss_latency = Some(miss_latency);
        }
        if let Some(abr) = &overrides.abr {
            settings.abr = abr.clone();
        }
        settings
    }

    /// Applies `VQOE_ABR` and `VQOE_BUFFER_SIZE` environment overrides.
    pub fn from_env(mut self) -> Self {
        if let Ok(abr) = std::env::var("VQOE_ABR") {
            self.abr = abr;
        }
        if let Ok(buffer) = std::env::var("VQOE_BUFFER_SIZE")
            && let Ok(seconds) = buffer.parse::<f64>()
        {
            self.buffer_size = seconds;
        }
        self
    }
}

/// Batch orchestration settings.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Number of concurrent workers
    pub max_workers: usize,
    /// Rows whose pipeline takes longer than this are reported as errors
    pub row_time_budget: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get().max(1),
            row_time_budget: None,
        }
    }
}

impl BatchConfig {
    pub fn with_workers(max_workers: usize) -> Self {
        Self {
            max_workers,
            ..Default::default()
        }
    }

    /// # Errors
    ///
    /// - `ConfigurationError::InvalidValue` - Zero workers
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_workers == 0 {
            return Err(ConfigurationError::invalid(
                "max workers",
                "worker pool needs at least one worker",
            ));
        }
        Ok(())
    }

    /// Applies `VQOE_MAX_WORKERS` and `VQOE_ROW_TIME_BUDGET_MS` overrides.
    pub fn from_env(mut self) -> Self {
        if let Ok(workers) = std::env::var("VQOE_MAX_WORKERS")
            && let Ok(count) = workers.parse::<usize>()
        {
            self.max_workers = count;
        }
        if let Ok(budget) = std::env::var("VQOE_ROW_TIME_BUDGET_MS")
            && let Ok(ms) = budget.parse::<u64>()
        {
            self.row_time_budget = Some(Duration::from_millis(ms));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_registry_round_trip() {
        for algorithm in AbrAlgorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<AbrAlgorithm>(), Ok(algorithm));
        }
        assert_eq!("  BOLA ".parse::<AbrAlgorithm>(), Ok(AbrAlgorithm::Bola));
        assert!(AbrAlgorithm::Lookahead.is_oracle());
        assert!(!AbrAlgorithm::Throughput.is_oracle());
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        let settings = RunSettings {
            abr: "pensieve".to_string(),
            ..Default::default()
        };
        assert_eq!(
            settings.resolve(),
            Err(ConfigurationError::UnknownAlgorithm {
                name: "pensieve".to_string()
            })
        );
    }

    #[test]
    fn test_default_settings_resolve() {
        let config = RunSettings::default().resolve().unwrap();
        assert_eq!(config.abr, AbrAlgorithm::Dynamic);
        assert_eq!(config.bandwidth_bps(), Some(25_000_000.0));
        assert_eq!(config.buffer_capacity_s, 30.0);
        assert_eq!(config.startup_threshold_for(4.0), 4.0);
    }

    #[test]
    fn test_negative_buffer_and_bandwidth_rejected() {
        let negative_buffer = RunSettings {
            buffer_size: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            negative_buffer.resolve(),
            Err(ConfigurationError::InvalidValue {
                field: "buffer size",
                ..
            })
        ));

        let negative_bandwidth = RunSettings {
            bandwidth: Some(-2.0),
            ..Default::default()
        };
        assert!(matches!(
            negative_bandwidth.resolve(),
            Err(ConfigurationError::InvalidValue {
                field: "bandwidth",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_tuning_rejected() {
        let mut config = SimulationConfig::default();
        config.tuning.throughput.safety_margin = 1.5;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.tuning.lookahead.horizon = 0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.reward.switch = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides_apply_only_present_fields() {
        let base = RunSettings::default();
        let overrides = SettingsOverrides {
            miss_latency: Some(370.0),
            abr: Some("throughput".to_string()),
            ..Default::default()
        };

        let merged = base.with_overrides(&overrides);
        assert_eq!(merged.miss_latency, Some(370.0));
        assert_eq!(merged.abr, "throughput");
        assert_eq!(merged.bandwidth, base.bandwidth);
        assert_eq!(merged.buffer_size, base.buffer_size);
        assert!(SettingsOverrides::default().is_empty());
        assert!(!overrides.is_empty());
    }

    #[test]
    fn test_settings_deserialize_with_defaults() {
        let settings: RunSettings =
            serde_json::from_str(r#"{"abr": "lookahead", "bandwidth": null}"#).unwrap();
        assert_eq!(settings.abr, "lookahead");
        assert_eq!(settings.bandwidth, None);
        assert_eq!(settings.buffer_size, 30.0);
        assert_eq!(settings.tuning.lookahead.horizon, 5);
    }

    #[test]
    fn test_batch_config_requires_worker() {
        assert!(BatchConfig::with_workers(0).validate().is_err());
        assert!(BatchConfig::with_workers(4).validate().is_ok());
    }
}
