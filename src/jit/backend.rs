// Fri Oct 16 2026 - Alex

use crate::jit::JitError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A jump target inside one instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

impl Label {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallConvention {
    /// The platform C convention.
    #[default]
    Host,
    SystemV,
    WindowsFastcall,
}

impl CallConvention {
    pub fn is_supported(self) -> bool {
        match self {
            Self::Host => true,
            Self::SystemV | Self::WindowsFastcall => cfg!(target_arch = "x86_64"),
        }
    }
}

impl fmt::Display for CallConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::SystemV => write!(f, "system_v"),
            Self::WindowsFastcall => write!(f, "windows_fastcall"),
        }
    }
}

/// Instruction builder handed to the compiler for one routine.
///
/// Instructions fall through to the next one unless they branch. Every
/// stream must end in a return or an unconditional jump.
pub trait Emitter {
    /// Declare the two-address signature. Must come first.
    fn enter(&mut self, original_length: usize) -> Result<(), JitError>;

    fn new_label(&mut self) -> Label;

    fn bind(&mut self, label: Label) -> Result<(), JitError>;

    fn jump(&mut self, target: Label) -> Result<(), JitError>;

    /// Branch to `target` when `current + lookahead` is past the last valid start.
    fn branch_if_exhausted(&mut self, lookahead: usize, target: Label) -> Result<(), JitError>;

    /// Branch to `on_mismatch` unless `[current + offset] == expected`.
    fn compare_byte(&mut self, offset: usize, expected: u8, on_mismatch: Label) -> Result<(), JitError>;

    /// Branch to `on_mismatch` unless `[current + offset] & mask == expected`.
    fn compare_masked(
        &mut self,
        offset: usize,
        mask: u8,
        expected: u8,
        on_mismatch: Label,
    ) -> Result<(), JitError>;

    /// Test `lanes` consecutive bytes starting at `current + offset` against
    /// `expected` at once. On a hit, advance `current` by the lowest matching
    /// lane and branch to `on_found`; otherwise fall through unchanged.
    fn find_anchor(
        &mut self,
        offset: usize,
        expected: u8,
        lanes: usize,
        on_found: Label,
    ) -> Result<(), JitError>;

    fn advance(&mut self, count: usize) -> Result<(), JitError>;

    fn return_current(&mut self) -> Result<(), JitError>;

    fn return_null(&mut self) -> Result<(), JitError>;
}

/// Generated scan code together with the memory backing it.
///
/// Every routine is `fn(current, end) -> match | null`. `end` is one past
/// the region; the routine derives the last valid start
/// (`end - original_length`) itself and returns null once `current` passes it.
pub trait ScanRoutine: Send + Sync {
    /// Run the routine over `[current, end)`.
    ///
    /// # Safety
    ///
    /// `end - current` must be at least the pattern's original length and
    /// every byte in `[current, end)` must be readable.
    unsafe fn invoke(&self, current: *const u8, end: *const u8) -> *const u8;

    /// Hand the backing memory back to the allocator.
    fn release(self: Box<Self>);
}

pub type EmitFn<'a> = dyn FnMut(&mut dyn Emitter) -> Result<(), JitError> + 'a;

pub trait CodeBackend: Send {
    fn name(&self) -> &'static str;

    /// Width of the vector equality test, if the backend has one.
    fn vector_lanes(&self) -> Option<usize>;

    /// Open an instruction stream, let `body` fill it, and finalize it.
    ///
    /// Memory allocated for a stream that fails to finalize is released
    /// before the error is returned.
    fn assemble(&mut self, body: &mut EmitFn<'_>) -> Result<Box<dyn ScanRoutine>, JitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_convention_always_supported() {
        assert!(CallConvention::Host.is_supported());
        assert_eq!(CallConvention::default(), CallConvention::Host);
    }

    #[test]
    fn test_call_convention_serde_names() {
        let json = serde_json::to_string(&CallConvention::WindowsFastcall).unwrap();
        assert_eq!(json, "\"windows_fastcall\"");
        let conv: CallConvention = serde_json::from_str("\"system_v\"").unwrap();
        assert_eq!(conv, CallConvention::SystemV);
    }
}
