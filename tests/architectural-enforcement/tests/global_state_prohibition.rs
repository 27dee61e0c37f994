//! Integration Test: Global State Prohibition
//!
//! **Policy**: The catalog, instance cache and metrics recorder are built once
//! at startup and passed explicitly. No crate may hide mutable state in a
//! process-wide static.
//! **Allowed**: `const` items and immutable `static` string/number tables.

use architectural_enforcement::{assert_clean, scan, PRODUCTION_DIRS};

fn is_global_state(code: &str) -> bool {
    let trimmed = code.trim_start();
    trimmed.contains("static mut ")
        || trimmed.contains("lazy_static!")
        || trimmed.contains("thread_local!")
        || ((trimmed.starts_with("static ") || trimmed.starts_with("pub static "))
            && (trimmed.contains("OnceLock")
                || trimmed.contains("OnceCell")
                || trimmed.contains("Mutex")
                || trimmed.contains("RwLock")
                || trimmed.contains("Atomic")))
}

#[test]
fn test_no_global_mutable_state() {
    let violations = scan(PRODUCTION_DIRS, is_global_state);
    assert_clean("process-wide mutable state", &violations);
}

#[test]
fn test_detector_flags_statics() {
    assert!(is_global_state("static mut CACHE: Option<Cache> = None;"));
    assert!(is_global_state("static ENGINES: OnceLock<Mutex<HashMap<String, E>>> = OnceLock::new();"));
    assert!(is_global_state("pub static COUNTER: AtomicU64 = AtomicU64::new(0);"));
    assert!(!is_global_state("pub const DEFAULT_CACHE_CAPACITY: usize = 16;"));
    assert!(!is_global_state("fn name(&self) -> &'static str {"));
}
