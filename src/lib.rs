// Sat Oct 17 2026 - Alex

pub mod config;
pub mod jit;
pub mod memory;
pub mod pattern;
pub mod utils;

pub use config::{BackendKind, Config, ConfigError};
pub use jit::{CallConvention, JitError, Runtime, ScanSession, ScannerHandle};
pub use memory::{Address, Region};
pub use pattern::{MaskKind, Pattern, PatternBuilder, PatternError};
