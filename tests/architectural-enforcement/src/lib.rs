//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles:
//! - All I/O in async code is async
//! - No sleeping as a substitute for waiting on I/O
//! - Only the transport layer talks to sockets
//! - Production code propagates errors instead of panicking
//!
//! The scanners are line based. They read source text, not syntax trees, so
//! they stay cheap and dependency free.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: [&str; 2] = ["assistant/core/src", "assistant/cli/src"];

/// One offending line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: PathBuf,
    pub line: usize,
    pub text: String,
    pub rule: &'static str,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.rule,
            self.text
        )
    }
}

/// Workspace root (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

/// Every `.rs` file under `dir` (relative to the workspace root)
pub fn rust_files(dir: &str) -> Vec<PathBuf> {
    let root = workspace_root().join(dir);
    if !root.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Production lines of a file: everything before its `#[cfg(test)]` module
pub fn production_lines(path: &Path) -> Vec<String> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .take_while(|line| line.trim() != "#[cfg(test)]")
        .map(str::to_string)
        .collect()
}

/// The code part of a line, or `None` for comment lines
pub fn code_part(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("//") {
        return None;
    }
    Some(line.split("//").next().unwrap_or(line))
}

/// Whether the line at `current_idx` is inside an `async fn`
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") {
            return true;
        }

        if (line.starts_with("fn ") || line.contains(" fn ")) && !line.contains("async") {
            return false;
        }

        // Stop at module/impl boundaries
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return false;
        }
    }
    false
}

/// Scan production code with `check`, which returns a rule name on a hit
pub fn scan<F>(dirs: &[&str], check: F) -> Vec<Violation>
where
    F: Fn(&Path, &[&str], usize, &str) -> Option<&'static str>,
{
    let mut violations = Vec::new();

    for dir in dirs {
        for path in rust_files(dir) {
            let owned = production_lines(&path);
            let lines: Vec<&str> = owned.iter().map(String::as_str).collect();

            for (idx, line) in lines.iter().enumerate() {
                let Some(code) = code_part(line) else {
                    continue;
                };
                if let Some(rule) = check(&path, &lines, idx, code) {
                    violations.push(Violation {
                        path: path.clone(),
                        line: idx + 1,
                        text: line.trim().to_string(),
                        rule,
                    });
                }
            }
        }
    }

    violations
}

/// Print the violations and fail
pub fn report(title: &str, violations: &[Violation], help: &[&str]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in help {
        eprintln!("  {line}");
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = vec![
            "async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));

        let code = vec![
            "pub fn load() {",
            "    let contents = std::fs::read_to_string(\"config.toml\")?;",
            "}",
        ];
        assert!(!is_in_async_function(&code, 1));
    }

    #[test]
    fn test_comment_lines_skipped() {
        assert_eq!(code_part("    // std::fs::read()"), None);
        assert_eq!(code_part("let x = 1; // note"), Some("let x = 1; "));
    }

    #[test]
    fn test_workspace_root_has_production_dirs() {
        for dir in PRODUCTION_DIRS {
            assert!(
                !rust_files(dir).is_empty(),
                "{dir} not found under {}",
                workspace_root().display()
            );
        }
    }
}
