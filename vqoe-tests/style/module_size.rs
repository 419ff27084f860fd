//! Module Size Limit
//!
//! Keeps every module small enough to read in one sitting. Test modules at
//! the end of a file do not count toward the limit.

use std::fs;

use crate::workspace_files::{production_lines, rust_files};

/// Maximum production lines per module.
const MAX_MODULE_LINES: usize = 600;

#[test]
fn module_size_enforcement() {
    let files = rust_files().expect("Failed to scan workspace");
    let mut oversized = Vec::new();

    for file in &files {
        let content = fs::read_to_string(file).expect("Failed to read source file");
        let lines = production_lines(&content).count();
        if lines > MAX_MODULE_LINES {
            oversized.push(format!("{}: {lines} lines", file.display()));
        }
    }

    println!("Module size: {} files checked", files.len());
    assert!(
        oversized.is_empty(),
        "Modules over {MAX_MODULE_LINES} lines, split them by concern:\n{}",
        oversized.join("\n")
    );
}
