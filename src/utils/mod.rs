// Sat Oct 17 2026 - Alex

pub mod logging;

pub use logging::{LoggingUtils, ScopedTimer};
