//! Rust source discovery for the style checks.

use std::fs;
use std::path::{Path, PathBuf};

/// Workspace crates whose sources are checked, relative to this crate.
const MEMBER_DIRS: [&str; 4] = ["../vqoe-core", "../vqoe-sim", "../vqoe-cli", "../vqoe-tests"];

/// Every `.rs` file under the workspace members, excluding the style fixtures.
pub fn rust_files() -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let mut files = Vec::new();
    for dir in MEMBER_DIRS {
        collect(Path::new(dir), &mut files, 0)?;
    }
    files.sort();
    Ok(files)
}

fn collect(
    dir: &Path,
    files: &mut Vec<PathBuf>,
    depth: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if depth > 8 || !dir.is_dir() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(name) = path.file_name() {
            let name = name.to_string_lossy();
            // Style fixtures contain deliberate violations
            if name.starts_with('.') || name == "target" || name == "style" {
                continue;
            }
        }

        if path.is_dir() {
            collect(&path, files, depth + 1)?;
        } else if let Some(extension) = path.extension()
            && extension == "rs"
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Lines of a file before its `#[cfg(test)]` module.
pub fn production_lines(content: &str) -> impl Iterator<Item = (usize, &str)> {
    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
}

#[test]
fn test_discovers_workspace_sources() {
    let files = rust_files().expect("Failed to scan workspace");
    assert!(files.iter().any(|f| f.ends_with("vqoe-sim/src/lib.rs")));
    assert!(files.iter().all(|f| !f.to_string_lossy().contains("/style/")));
}

#[test]
fn test_production_lines_stop_at_test_module() {
    let content = "fn a() {}\n\n#[cfg(test)]\nmod tests {}\n";
    assert_eq!(production_lines(content).count(), 2);
}
