//! Architectural Enforcement
//!
//! Source scanners shared by the integration tests in `tests/`. Each test
//! walks the production sources of the gateway crates and rejects patterns
//! that break a structural rule:
//! - No blocking I/O on the request path
//! - No sleeps in production code
//! - No process-wide mutable state
//! - No `unwrap()`/`expect()` outside tests
//!
//! "Production" means everything in a source file above its first
//! `#[cfg(test)]` line, with `//` comments removed.

use std::fs;
use std::path::{Path, PathBuf};

/// Source roots scanned by every rule
pub const PRODUCTION_DIRS: &[&str] = &["gateway/core/src", "gateway/daemon/src"];

/// Workspace root, resolved from this crate's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Production lines of one source file
#[derive(Debug)]
pub struct SourceFile {
    /// Path relative to the workspace root
    pub path: PathBuf,
    /// Lines above the first `#[cfg(test)]`, 1-based index = position + 1
    pub lines: Vec<String>,
}

/// A rule violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// File containing the violation
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// Offending source line, trimmed
    pub text: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{} - {}", self.path.display(), self.line, self.text)
    }
}

/// Keep only production lines of `content`
pub fn production_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .take_while(|line| !line.trim_start().starts_with("#[cfg(test)]"))
        .map(str::to_string)
        .collect()
}

/// Strip a trailing `//` comment (including doc comments)
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Load production sources under `dirs`
pub fn production_sources(dirs: &[&str]) -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in dirs {
        let path = root.join(dir);
        assert!(path.exists(), "source directory {} is missing", path.display());

        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            files.push(SourceFile {
                path: entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .to_path_buf(),
                lines: production_lines(&content),
            });
        }
    }

    files
}

/// Every production line in `dirs` whose code part matches `is_violation`
pub fn scan<F>(dirs: &[&str], is_violation: F) -> Vec<Violation>
where
    F: Fn(&str) -> bool,
{
    let mut violations = Vec::new();
    for file in production_sources(dirs) {
        for (idx, line) in file.lines.iter().enumerate() {
            if is_violation(code_part(line)) {
                violations.push(Violation {
                    path: file.path.clone(),
                    line: idx + 1,
                    text: line.trim().to_string(),
                });
            }
        }
    }
    violations
}

/// Panic with a readable report if any violations were found
pub fn assert_clean(rule: &str, violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {rule}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }

    panic!(
        "\nFound {} violation(s) of: {rule}\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_lines_stop_at_test_module() {
        let content = "fn a() {}\n\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\n";
        let lines = production_lines(content);
        assert_eq!(lines, vec!["fn a() {}".to_string(), String::new()]);
    }

    #[test]
    fn test_code_part_strips_comments() {
        assert_eq!(code_part("let x = 1; // std::fs::read"), "let x = 1; ");
        assert_eq!(code_part("//! std::net::TcpStream"), "");
    }

    #[test]
    fn test_scanned_directories_exist() {
        assert!(!production_sources(PRODUCTION_DIRS).is_empty());
    }
}
