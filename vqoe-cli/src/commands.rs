//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};
use serde_json::{Map, Value};
use tracing::{info, warn};
use vqoe_core::{
    AbrAlgorithm, BatchConfig, ConfigurationError, Manifest, QoeResult, RunSettings, TraceInput,
    VqoeError,
};
use vqoe_sim::{BatchOrchestrator, BatchRow, run_single};

use crate::table::{self, TableRow};

/// Worker count used by `batch` when neither flag nor environment sets one.
const DEFAULT_MAX_WORKERS: usize = 25;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Simulate one latency trace and print the result row as JSON
    Run {
        /// Per-segment latencies in milliseconds, as a JSON array
        #[arg(long)]
        latency_list: String,
        /// Cache-miss segment indices, as a JSON array
        #[arg(long, default_value = "[]")]
        miss_indices: String,
        /// Also print the full segment event log
        #[arg(long)]
        timeline: bool,
        #[command(flatten)]
        simulation: SimulationArgs,
    },
    /// Simulate every row of a JSON Lines table
    Batch {
        /// Input table, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,
        /// Output table
        #[arg(short, long)]
        output: PathBuf,
        /// Concurrent workers [default: 25, env: VQOE_MAX_WORKERS]
        #[arg(long)]
        max_workers: Option<usize>,
        /// Rows slower than this are reported as errors [env: VQOE_ROW_TIME_BUDGET_MS]
        #[arg(long)]
        row_time_budget_ms: Option<u64>,
        #[command(flatten)]
        simulation: SimulationArgs,
    },
    /// List available ABR algorithms
    Algorithms,
}

/// Settings shared by `run` and `batch`.
///
/// Unset flags fall back to `VQOE_*` environment overrides, then defaults.
#[derive(Args, Debug, Clone)]
pub struct SimulationArgs {
    /// Sabre JSON manifest
    #[arg(long, default_value = "./config/bbb4k.json")]
    manifest_json: PathBuf,
    /// Bandwidth cap in Mbps [default: 25]
    #[arg(short = 'n', long, conflicts_with = "unlimited_bandwidth")]
    bandwidth: Option<f64>,
    /// Remove the bandwidth cap; fetch time is latency only
    #[arg(long)]
    unlimited_bandwidth: bool,
    /// Latency forced onto cache-miss segments, in milliseconds
    #[arg(short = 'm', long)]
    miss_latency: Option<f64>,
    /// Buffer size in seconds [default: 30, env: VQOE_BUFFER_SIZE]
    #[arg(short = 'b', long)]
    buffer_size: Option<f64>,
    /// ABR algorithm [default: dynamic, env: VQOE_ABR]
    #[arg(short = 'a', long)]
    abr: Option<String>,
    /// Buffered seconds before playback starts [default: first segment duration]
    #[arg(long)]
    startup_threshold: Option<f64>,
    /// Reward weight per bit/s of average bitrate
    #[arg(long)]
    reward_bitrate: Option<f64>,
    /// Reward penalty per millisecond of rebuffering
    #[arg(long)]
    reward_rebuffer: Option<f64>,
    /// Reward penalty per bitrate switch
    #[arg(long)]
    reward_switch: Option<f64>,
}

impl SimulationArgs {
    /// Layers defaults, environment and flags into run settings.
    fn settings(&self) -> RunSettings {
        let mut settings = RunSettings::default().from_env();
        if self.unlimited_bandwidth {
            settings.bandwidth = None;
        } else if let Some(bandwidth) = self.bandwidth {
            settings.bandwidth = Some(bandwidth);
        }
        if let Some(miss_latency) = self.miss_latency {
            settings.miss_latency = Some(miss_latency);
        }
        if let Some(buffer_size) = self.buffer_size {
            settings.buffer_size = buffer_size;
        }
        if let Some(abr) = &self.abr {
            settings.abr = abr.clone();
        }
        if let Some(threshold) = self.startup_threshold {
            settings.startup_threshold = Some(threshold);
        }
        if let Some(weight) = self.reward_bitrate {
            settings.reward.bitrate = weight;
        }
        if let Some(weight) = self.reward_rebuffer {
            settings.reward.rebuffer = weight;
        }
        if let Some(weight) = self.reward_switch {
            settings.reward.switch = weight;
        }
        settings
    }
}

/// Dispatches a parsed CLI command.
///
/// # Errors
///
/// - `VqoeError` - Configuration or manifest errors from the command
/// - `anyhow::Error` - Table I/O failures
pub async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Run {
            latency_list,
            miss_indices,
            timeline,
            simulation,
        } => run_trace(&latency_list, &miss_indices, timeline, &simulation).await,
        Commands::Batch {
            input,
            output,
            max_workers,
            row_time_budget_ms,
            simulation,
        } => {
            let mut batch = BatchConfig::with_workers(DEFAULT_MAX_WORKERS).from_env();
            if let Some(workers) = max_workers {
                batch.max_workers = workers;
            }
            if let Some(ms) = row_time_budget_ms {
                batch.row_time_budget = Some(Duration::from_millis(ms));
            }
            run_batch(&input, &output, batch, &simulation).await
        }
        Commands::Algorithms => {
            list_algorithms();
            Ok(())
        }
    }
}

async fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || Manifest::load(&path))
        .await
        .context("manifest loader task failed")?
        .map_err(|e| VqoeError::from(e).into())
}

/// Simulate a single trace given on the command line
///
/// A trace that fails to simulate is printed as an error row, the same
/// shape `batch` writes for it.
///
/// # Errors
///
/// - `VqoeError::Configuration` - Unknown algorithm or invalid setting
/// - `VqoeError::Manifest` - Manifest missing or malformed
/// - `anyhow::Error` - Latency or miss-index argument is not a JSON array
pub async fn run_trace(
    latency_list: &str,
    miss_indices: &str,
    with_timeline: bool,
    simulation: &SimulationArgs,
) -> anyhow::Result<()> {
    let row = trace_row(latency_list, miss_indices, with_timeline, simulation).await?;
    println!("{}", serde_json::to_string_pretty(&Value::Object(row))?);
    Ok(())
}

/// Builds the output row for one command-line trace.
async fn trace_row(
    latency_list: &str,
    miss_indices: &str,
    with_timeline: bool,
    simulation: &SimulationArgs,
) -> anyhow::Result<Map<String, Value>> {
    let settings = simulation.settings();
    let config = settings.resolve().map_err(VqoeError::from)?;
    let manifest = load_manifest(&simulation.manifest_json).await?;

    let trace = TraceInput::new(
        serde_json::from_str(latency_list).context("--latency-list must be a JSON array of numbers")?,
        serde_json::from_str(miss_indices).context("--miss-indices must be a JSON array of indices")?,
    );

    let (result, timeline) = match run_single(&manifest, &trace, &config) {
        Ok(outcome) => (QoeResult::from(outcome.metrics), Some(outcome.timeline)),
        Err(e) => {
            warn!(error = %e, "trace failed");
            (QoeResult::from(e), None)
        }
    };

    let mut columns = Map::new();
    columns.insert("latency_list".to_string(), serde_json::to_value(&trace.latency_list)?);
    columns.insert("miss_indices".to_string(), serde_json::to_value(&trace.miss_indices)?);
    let mut row = table::output_row(columns, &result, &settings);
    if with_timeline && let Some(timeline) = timeline {
        row.insert("timeline".to_string(), serde_json::to_value(timeline)?);
    }
    Ok(row)
}

/// Simulate every row of a JSON Lines table
///
/// # Errors
///
/// - `VqoeError::Configuration` - Invalid pool settings or any row's settings
/// - `VqoeError::Manifest` - Manifest missing or malformed
/// - `anyhow::Error` - Input unreadable or output unwritable
pub async fn run_batch(
    input: &Path,
    output: &Path,
    batch: BatchConfig,
    simulation: &SimulationArgs,
) -> anyhow::Result<()> {
    let orchestrator = BatchOrchestrator::new(batch).map_err(VqoeError::from)?;
    let base = simulation.settings();
    let manifest = Arc::new(load_manifest(&simulation.manifest_json).await?);
    let rows = table::read_rows(input, &base).await?;

    let mut results: Vec<Option<QoeResult>> = vec![None; rows.len()];
    let mut runnable = Vec::new();
    let mut positions = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        match &row.trace {
            Ok(trace) => {
                positions.push(index);
                runnable.push(BatchRow {
                    manifest: Arc::clone(&manifest),
                    trace: trace.clone(),
                    settings: row.settings.clone(),
                });
            }
            Err(reason) => {
                // Never reaches the orchestrator, so check its settings here
                row.settings
                    .resolve()
                    .map_err(|source| ConfigurationError::InRow {
                        row: index,
                        source: Box::new(source),
                    })
                    .map_err(VqoeError::from)?;
                results[index] = Some(QoeResult::from_error(format!("Malformed trace: {reason}")));
            }
        }
    }

    let report = orchestrator.run(runnable).await.map_err(|e| {
        VqoeError::from(remap_row(e, &positions))
    })?;
    for (position, result) in positions.into_iter().zip(report.results) {
        results[position] = Some(result);
    }

    let output_rows = rows
        .into_iter()
        .zip(results)
        .map(|(TableRow { columns, settings, .. }, result)| {
            table::output_row(columns, &result.unwrap_or_default(), &settings)
        })
        .collect::<Vec<_>>();
    let failed = output_rows
        .iter()
        .filter(|row| row.get("error").is_some_and(|e| !e.is_null()))
        .count();
    table::write_rows(output, &output_rows).await?;

    info!(
        rows = output_rows.len(),
        failed,
        output = %output.display(),
        "batch written"
    );
    eprintln!(
        "Simulated {} rows ({} failed) -> {}",
        output_rows.len(),
        failed,
        output.display()
    );
    Ok(())
}

/// Maps a row index in the runnable subset back to the input table.
fn remap_row(error: ConfigurationError, positions: &[usize]) -> ConfigurationError {
    match error {
        ConfigurationError::InRow { row, source } => ConfigurationError::InRow {
            row: positions.get(row).copied().unwrap_or(row),
            source,
        },
        other => other,
    }
}

/// List available ABR algorithms
pub fn list_algorithms() {
    println!("ABR algorithms");
    println!("{:-<40}", "");
    for algorithm in AbrAlgorithm::ALL {
        let note = if algorithm.is_oracle() {
            " (oracle baseline, sees the future trace)"
        } else {
            ""
        };
        println!("  {algorithm}{note}");
    }
}
