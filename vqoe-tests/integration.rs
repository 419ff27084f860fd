//! Integration tests for vqoe
//!
//! These tests drive the public pipeline and batch APIs end to end, the way
//! the CLI does, and check the properties every run must satisfy.

#[path = "integration/playback_scenarios.rs"]
mod playback_scenarios;

#[path = "integration/batch_isolation.rs"]
mod batch_isolation;

#[path = "integration/run_properties.rs"]
mod run_properties;

#[path = "integration/policy_comparison.rs"]
mod policy_comparison;
