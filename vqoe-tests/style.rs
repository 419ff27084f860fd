//! Style Enforcement Tests
//!
//! Scans the workspace crates for patterns clippy does not catch.
//!
//! - `naming_conventions` - Banned function prefixes, type suffixes, module names and doc format
//! - `module_size` - Upper bound on production lines per module

#[path = "style/naming_conventions.rs"]
mod naming_conventions;

#[path = "style/module_size.rs"]
mod module_size;

#[path = "style/workspace_files.rs"]
mod workspace_files;
