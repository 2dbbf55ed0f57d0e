// Sat Oct 17 2026 - Alex

use log::LevelFilter;
use std::time::Instant;

pub struct LoggingUtils;

impl LoggingUtils {
    /// Install `env_logger` at `level`. `RUST_LOG` still overrides per module.
    pub fn init_logger(level: LevelFilter) {
        let _ = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_millis()
            .try_init();
    }
}

/// Logs how long a scope took, at debug level, when dropped.
pub struct ScopedTimer {
    name: String,
    start: Instant,
}

impl ScopedTimer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for ScopedTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::debug!("[TIMER] {} took {:.3}ms", self.name, elapsed.as_secs_f64() * 1000.0);
    }
}

/// Route log output through the test harness. Safe to call from every test.
pub fn init_test_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
