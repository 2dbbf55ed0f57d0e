// Fri Oct 16 2026 - Alex

use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JitError {
    #[error("Compilation failed: {0}")]
    CompilationFailed(String),
    #[error("Invalid scanner handle: {0}")]
    InvalidHandle(u64),
    #[error("Calling convention {0} is not supported on this target")]
    UnsupportedCallConvention(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Pattern(#[from] PatternError),
}

impl JitError {
    pub fn codegen(err: impl std::fmt::Display) -> Self {
        Self::CompilationFailed(err.to_string())
    }
}
