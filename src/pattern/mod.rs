// Thu Oct 15 2026 - Alex

pub mod error;
pub mod mask;
pub mod pattern;

pub use error::PatternError;
pub use mask::MaskKind;
pub use pattern::{Pattern, PatternBuilder};
