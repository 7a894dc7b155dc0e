//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Streams wait on frames, and
//! silence is bounded with `tokio::time::timeout`, never a polling loop.
//! **Exceptions**: Test code.

use architectural_enforcement::{report, scan, PRODUCTION_DIRS};

#[test]
fn test_no_sleep_in_production_code() {
    let violations = scan(&PRODUCTION_DIRS, |_path, _lines, _idx, code| {
        if code.contains("thread::sleep") {
            Some("Blocking sleep")
        } else if code.contains("time::sleep") || code.contains("sleep_until") {
            Some("Async sleep")
        } else {
            None
        }
    });

    report(
        "CRITICAL: Sleep calls found in production code!",
        &violations,
        &[
            "❌ FORBIDDEN:",
            "  - Sleep in polling loops",
            "  - Sleep as poor man's synchronization",
            "✅ Wait on the connection instead; bound it with tokio::time::timeout.",
        ],
    );
}
