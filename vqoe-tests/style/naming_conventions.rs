//! Naming Convention Checker
//!
//! Enforces the naming rules that matter most: banned function prefixes,
//! banned type suffixes, generic module names, and the `# Errors` doc format.

use std::fs;
use std::path::Path;

use crate::workspace_files::{production_lines, rust_files};

/// A naming violation found in the code
#[derive(Debug)]
struct NamingViolation {
    file_path: String,
    line_number: usize,
    violation_type: &'static str,
    message: String,
}

/// Simple naming convention checker focused on critical violations
struct NamingChecker {
    violations: Vec<NamingViolation>,
    files_checked: usize,
}

impl NamingChecker {
    fn new() -> Self {
        Self {
            violations: Vec::new(),
            files_checked: 0,
        }
    }

    fn record(&mut self, file_path: &Path, line_number: usize, kind: &'static str, message: String) {
        self.violations.push(NamingViolation {
            file_path: file_path.display().to_string(),
            line_number,
            violation_type: kind,
            message,
        });
    }

    /// Check for banned function prefixes
    fn check_function_prefixes(&mut self, file_path: &Path, content: &str) {
        let banned_patterns = [
            ("get_", "Use the noun directly: trace.latency() not trace.get_latency()"),
            ("set_", "Use descriptive verbs: buffer.drain() not buffer.set_level()"),
            ("handle_", "Be specific: run_batch() not handle_batch()"),
        ];

        for (line_num, line) in production_lines(content) {
            let trimmed = line.trim();
            if trimmed.starts_with("//") {
                continue;
            }

            let is_fn = ["pub fn ", "pub async fn ", "fn ", "async fn ", "pub(crate) fn "]
                .iter()
                .any(|start| trimmed.starts_with(start));
            if !is_fn {
                continue;
            }

            for &(prefix, correction) in &banned_patterns {
                if trimmed.contains(&format!("fn {prefix}")) {
                    self.record(
                        file_path,
                        line_num + 1,
                        "BANNED_FUNCTION_PREFIX",
                        format!("Function uses banned prefix '{prefix}'. {correction}"),
                    );
                }
            }
        }
    }

    /// Check for banned type suffixes
    fn check_type_naming(&mut self, file_path: &Path, content: &str) {
        let banned_suffixes = [
            ("Factory", "Use a simple new() function"),
            ("Service", "Usually adds no semantic value - prefer direct naming"),
            ("Manager", "Name what it IS, not its role"),
            ("Handler", "Be more specific about what you're handling"),
            ("Helper", "Name the concern it covers"),
        ];

        for (line_num, line) in production_lines(content) {
            let trimmed = line.trim();
            let words = trimmed.split_whitespace().collect::<Vec<_>>();
            let name_index = match words.as_slice() {
                ["pub" | "pub(crate)", "struct" | "enum" | "trait", ..] => 2,
                ["struct" | "enum" | "trait", ..] => 1,
                _ => continue,
            };
            let Some(name_part) = words.get(name_index) else {
                continue;
            };
            let type_name = name_part
                .split(['<', '{', '(', ';'])
                .next()
                .unwrap_or("")
                .trim();

            for &(suffix, message) in &banned_suffixes {
                if type_name.ends_with(suffix) {
                    self.record(
                        file_path,
                        line_num + 1,
                        "BANNED_TYPE_SUFFIX",
                        format!("Type '{type_name}' uses banned '{suffix}' suffix. {message}"),
                    );
                }
            }
        }
    }

    /// Check for banned module names
    fn check_module_names(&mut self, file_path: &Path) {
        let Some(stem) = file_path.file_stem() else {
            return;
        };
        let stem = stem.to_string_lossy();
        let banned = ["utils", "common", "helpers", "misc", "stuff"];

        if banned.contains(&stem.as_ref()) {
            self.record(
                file_path,
                1,
                "BANNED_MODULE_NAME",
                format!("Module name '{stem}' is too generic. Name the concern it covers"),
            );
        }
    }

    /// Check `# Errors` sections: blank line after the header, then
    /// `- `ErrorType` - condition` bullets
    fn check_errors_sections(&mut self, file_path: &Path, content: &str) {
        let lines = content.lines().collect::<Vec<_>>();
        for (index, line) in lines.iter().enumerate() {
            if line.trim() != "/// # Errors" {
                continue;
            }

            if lines.get(index + 1).map(|l| l.trim()) != Some("///") {
                self.record(
                    file_path,
                    index + 1,
                    "INVALID_DOC_FORMAT",
                    "# Errors section must be followed by blank line: `///`".to_string(),
                );
                continue;
            }

            let mut found_content = false;
            for (offset, doc_line) in lines[index + 2..].iter().enumerate() {
                let Some(doc) = doc_line.trim().strip_prefix("///") else {
                    break;
                };
                let doc = doc.trim();
                if doc.starts_with("# ") {
                    break;
                }
                if doc.is_empty() {
                    continue;
                }
                found_content = true;

                // Continuation lines of a bullet are indented
                if doc_line.trim().starts_with("///   ") {
                    continue;
                }
                let is_bullet = doc
                    .strip_prefix("- ")
                    .is_some_and(|bullet| bullet.contains('`') && bullet.contains(" - "));
                if !is_bullet {
                    self.record(
                        file_path,
                        index + offset + 3,
                        "INVALID_DOC_FORMAT",
                        "Use format `- ErrorType - condition` with backticks around error type"
                            .to_string(),
                    );
                }
            }

            if !found_content {
                self.record(
                    file_path,
                    index + 1,
                    "INVALID_DOC_FORMAT",
                    "# Errors section cannot be empty - list specific error types".to_string(),
                );
            }
        }
    }

    fn check_file(&mut self, file_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = fs::read_to_string(file_path)?;
        self.files_checked += 1;

        self.check_module_names(file_path);
        self.check_function_prefixes(file_path, &content);
        self.check_type_naming(file_path, &content);
        self.check_errors_sections(file_path, &content);
        Ok(())
    }

    fn check_workspace(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        for file in rust_files()? {
            self.check_file(&file)?;
        }
        Ok(())
    }

    /// Report violations and return whether the check passed
    fn report_violations(&self) -> bool {
        if self.violations.is_empty() {
            println!(
                "Naming conventions: {} files checked, no violations found",
                self.files_checked
            );
            return true;
        }

        println!("Naming convention violations found:");
        for violation in &self.violations {
            println!(
                "{}:{} [{}] {}",
                violation.file_path,
                violation.line_number,
                violation.violation_type,
                violation.message
            );
        }
        println!(
            "Found {} violation(s) in {} file(s) checked",
            self.violations.len(),
            self.files_checked
        );
        false
    }
}

#[test]
fn test_banned_function_prefixes() {
    let mut checker = NamingChecker::new();
    const VIOLATION_CODE: &str = r#"
impl Buffer {
    pub fn get_level(&self) -> f64 { 0.0 }
    pub fn set_level(&mut self, v: f64) { }
    pub fn handle_stall(&self) { }
    pub fn drain(&mut self) { } // This is OK
    fn getter(&self) -> u32 { 42 } // OK - no underscore
    // pub fn get_commented(&self) {}
}
"#;

    checker.check_function_prefixes(Path::new("buffer.rs"), VIOLATION_CODE);

    assert_eq!(checker.violations.len(), 3);
    assert!(
        checker
            .violations
            .iter()
            .all(|v| v.violation_type == "BANNED_FUNCTION_PREFIX")
    );
    assert_eq!(checker.violations[0].line_number, 3);
}

#[test]
fn test_banned_type_suffixes() {
    let mut checker = NamingChecker::new();
    const TYPE_CODE: &str = r#"
pub struct PolicyFactory {}
pub(crate) struct TraceManager;
pub enum RungHelper { A }
pub struct BatchOrchestrator {}
struct PlaybackSession {
"#;

    checker.check_type_naming(Path::new("types.rs"), TYPE_CODE);

    let names = checker
        .violations
        .iter()
        .map(|v| v.line_number)
        .collect::<Vec<_>>();
    assert_eq!(names, vec![2, 3, 4]);
}

#[test]
fn test_banned_module_names() {
    let mut checker = NamingChecker::new();

    checker.check_module_names(Path::new("src/utils.rs"));
    checker.check_module_names(Path::new("src/helpers.rs"));
    checker.check_module_names(Path::new("src/playback.rs"));
    checker.check_module_names(Path::new("src/abr/lookahead.rs"));

    assert_eq!(checker.violations.len(), 2);
}

#[test]
fn test_errors_section_format() {
    let mut checker = NamingChecker::new();
    const DOC_CODE: &str = r#"
/// Good.
///
/// # Errors
///
/// - `ConfigurationError::InvalidValue` - Zero workers;
///   continued on the next line
pub fn good() {}

/// # Errors
/// - `RowError` - Missing blank line
pub fn missing_blank() {}

/// # Errors
///
/// Returns an error when things go wrong
pub fn no_bullet() {}
"#;

    checker.check_errors_sections(Path::new("doc.rs"), DOC_CODE);

    let lines = checker
        .violations
        .iter()
        .map(|v| v.line_number)
        .collect::<Vec<_>>();
    assert_eq!(lines, vec![10, 16]);
}

#[test]
fn naming_convention_enforcement() {
    let mut checker = NamingChecker::new();

    checker
        .check_workspace()
        .expect("Failed to check workspace");

    assert!(
        checker.report_violations(),
        "Naming convention violations found - see output above"
    );
}
