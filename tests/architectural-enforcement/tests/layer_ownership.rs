//! Integration Test: Layer Ownership
//!
//! **Policy**:
//! - Only `transport/websocket` speaks WebSocket
//! - Only `auth.rs` issues HTTP requests
//! - The reducer and decoder stay pure (no tokio, no I/O)
//! - Production code propagates errors; no `unwrap()` or `expect()`

use std::path::Path;

use architectural_enforcement::{report, scan, PRODUCTION_DIRS};

fn in_module(path: &Path, suffix: &str) -> bool {
    path.to_string_lossy().replace('\\', "/").contains(suffix)
}

#[test]
fn test_websocket_confined_to_transport() {
    let violations = scan(&PRODUCTION_DIRS, |path, _lines, _idx, code| {
        if code.contains("tokio_tungstenite") && !in_module(path, "src/transport/websocket/") {
            Some("WebSocket outside transport")
        } else {
            None
        }
    });

    report(
        "WebSocket code found outside the transport layer!",
        &violations,
        &["Implement Connector in assistant/core/src/transport instead."],
    );
}

#[test]
fn test_http_requests_confined_to_auth() {
    let violations = scan(&PRODUCTION_DIRS, |path, _lines, _idx, code| {
        if code.contains("reqwest::Client") && !in_module(path, "src/auth.rs") {
            Some("HTTP client outside auth")
        } else {
            None
        }
    });

    report(
        "HTTP client found outside credential refresh!",
        &violations,
        &["Turns talk to the backend through a Connector only."],
    );
}

#[test]
fn test_reducer_and_decoder_are_pure() {
    let violations = scan(&["assistant/core/src"], |path, _lines, _idx, code| {
        let pure = in_module(path, "src/reducer.rs") || in_module(path, "src/decoder.rs");
        if pure && (code.contains("tokio::") || code.contains("async ") || code.contains(".await"))
        {
            Some("Async code in a pure module")
        } else {
            None
        }
    });

    report(
        "Reducer/decoder must stay synchronous and side-effect free!",
        &violations,
        &["Move I/O into the controller or the transport layer."],
    );
}

#[test]
fn test_no_panicking_error_handling() {
    let violations = scan(&PRODUCTION_DIRS, |_path, _lines, _idx, code| {
        if code.contains(".unwrap()") || code.contains(".expect(") {
            Some("Panicking error handling")
        } else {
            None
        }
    });

    report(
        "unwrap()/expect() found in production code!",
        &violations,
        &["Propagate with `?`, or use unwrap_or / unwrap_or_default with a reason."],
    );
}
