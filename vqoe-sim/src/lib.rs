//! vqoe Simulation - Deterministic ABR playback simulation.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![warn(clippy::too_many_lines)]
//!
//! Replays a per-segment latency trace against a video manifest and
//! reproduces the download/playback timeline a streaming client would
//! experience, then reduces it to QoE metrics.
//!
//! # Features
//!
//! - **Deterministic Execution**: Identical inputs always produce identical results
//! - **Pluggable Policies**: Closed registry of ABR strategies, including an oracle baseline
//! - **Invariant Checking**: Buffer and decision invariants abort only the offending run
//! - **Batch Orchestration**: Bounded worker pool with input-ordered results
//!
//! # Example
//!
//! ```rust,no_run
//! use vqoe_core::{Manifest, RunSettings, TraceInput};
//! use vqoe_sim::pipeline::run_single;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = Manifest::constant_bitrate(vec![1_000_000, 3_000_000], 2.0, 5)?;
//! let config = RunSettings::default().resolve()?;
//! let trace = TraceInput::new(vec![25.0, 625.0, 700.0, 21.0, 19.0], vec![1, 2]);
//!
//! let outcome = run_single(&manifest, &trace, &config)?;
//! println!("rebuffered {} ms", outcome.metrics.total_rebuffer_ms);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **ABR Policies** (`abr`): decide the rung of each segment from causal history
//! - **Playback Simulator** (`playback`): the `Startup → Playing ⇄ Stalled → Finished` machine
//! - **Pipeline** (`pipeline`): trace normalization, simulation and aggregation for one row
//! - **Batch Orchestrator** (`batch`): fans rows out across a bounded worker pool
//! - **Scenarios** (`scenarios`): seeded synthetic traces for stress tests and benchmarks

pub mod abr;
pub mod batch;
pub mod pipeline;
pub mod playback;
pub mod scenarios;

pub use abr::{AbrPolicy, CausalHistory, DownloadRecord};
pub use batch::{BatchOrchestrator, BatchReport, BatchRow};
pub use pipeline::{RowError, RunOutcome, run_single};
pub use playback::{PlaybackSimulator, SimulationInvariantError};
pub use scenarios::{DeterministicRng, TraceScenario};
