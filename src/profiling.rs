//! Optional stage timing.
//!
//! Off by default; `set_profiling_enabled(true)` makes [`timed`] log the wall
//! time of each wrapped stage at info level.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Global flag to enable/disable stage timing.
static PROFILING_ENABLED: AtomicBool = AtomicBool::new(false);

pub fn is_profiling_enabled() -> bool {
    PROFILING_ENABLED.load(Ordering::Relaxed)
}

pub fn set_profiling_enabled(enabled: bool) {
    PROFILING_ENABLED.store(enabled, Ordering::Relaxed);
    if enabled {
        log::info!("Stage profiling ENABLED");
    }
}

/// Runs `f`, logging `[PERF] <label>: <ms>` when profiling is enabled.
///
/// GPU work is only recorded or submitted inside most stages, so the figure
/// is CPU time unless the stage waits on the device.
pub fn timed<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    if is_profiling_enabled() {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();
        log::info!("[PERF] {}: {:.2}ms", label, elapsed.as_secs_f64() * 1000.0);
        result
    } else {
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_returns_closure_result() {
        assert_eq!(timed("disabled", || 21 * 2), 42);
        set_profiling_enabled(true);
        assert_eq!(timed("enabled", || "done"), "done");
        set_profiling_enabled(false);
        assert!(!is_profiling_enabled());
    }
}
