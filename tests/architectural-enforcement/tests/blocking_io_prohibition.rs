//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async production code MUST NOT block the runtime.
//! **Required**: Use `tokio::fs`, `tokio::net`, `tokio::io`, not `std::fs`,
//! `std::net`, blocking stdin/stdout or `reqwest::blocking`.
//!
//! Blocking calls in plain (non-async) functions are accepted: configuration
//! is read once, before the first turn.

use architectural_enforcement::{is_in_async_function, report, scan, PRODUCTION_DIRS};

#[test]
fn test_no_blocking_io_in_async_code() {
    let violations = scan(&PRODUCTION_DIRS, |_path, lines, idx, code| {
        if code.contains("reqwest::blocking") {
            return Some("Blocking HTTP client");
        }

        if !is_in_async_function(lines, idx) {
            return None;
        }

        if code.contains("std::fs::") {
            Some("Blocking file I/O")
        } else if code.contains("std::net::") {
            Some("Blocking network I/O")
        } else if code.contains("std::io::stdin()") || code.contains("std::io::stdout()") {
            Some("Blocking stdin/stdout")
        } else if code.contains("std::process::Command") {
            Some("Blocking process I/O")
        } else {
            None
        }
    });

    report(
        "CRITICAL: Blocking I/O calls found in async code!",
        &violations,
        &[
            "✅ REQUIRED async I/O:",
            "  - tokio::fs::read_to_string().await, tokio::fs::write().await",
            "  - tokio::io::stdin() with AsyncBufReadExt::lines()",
            "  - reqwest::Client (async)",
        ],
    );
}

#[test]
fn test_no_blocking_std_imports() {
    let violations = scan(&PRODUCTION_DIRS, |_path, _lines, _idx, code| {
        let code = code.trim();
        if code.starts_with("use std::fs") || code.starts_with("use std::net") {
            Some("Blocking I/O import")
        } else {
            None
        }
    });

    report(
        "Blocking std I/O imported in production code!",
        &violations,
        &["Spell out std::fs:: at the (non-async) call site, or use tokio."],
    );
}
