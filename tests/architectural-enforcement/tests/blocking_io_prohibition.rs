//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Production code in the gateway crates MUST NOT use blocking I/O.
//! **Required**: `tokio::fs`, `tokio::net` and async `reqwest`, never `std::fs`,
//! `std::net` or `reqwest::blocking`.

use architectural_enforcement::{assert_clean, scan, PRODUCTION_DIRS};

fn is_blocking_io(code: &str) -> bool {
    code.contains("std::fs")
        || code.contains("std::net")
        || code.contains("reqwest::blocking")
        || code.contains("std::process::Command")
        || code.contains("std::io::stdin()")
}

#[test]
fn test_no_blocking_io_in_production_code() {
    let violations = scan(PRODUCTION_DIRS, is_blocking_io);
    assert_clean("blocking I/O in production code", &violations);
}

#[test]
fn test_detector_flags_blocking_calls() {
    assert!(is_blocking_io("let s = std::fs::read_to_string(path)?;"));
    assert!(is_blocking_io("use std::net::TcpListener;"));
    assert!(is_blocking_io("let c = reqwest::blocking::Client::new();"));
    assert!(!is_blocking_io("let s = tokio::fs::read(path).await?;"));
    assert!(!is_blocking_io("let l = tokio::net::TcpListener::bind(addr).await?;"));
}
