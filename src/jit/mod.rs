// Fri Oct 16 2026 - Alex

pub mod backend;
pub mod compiler;
pub mod cranelift;
pub mod error;
pub mod program;
pub mod runtime;
pub mod session;

pub use backend::{CallConvention, CodeBackend, Emitter, Label, ScanRoutine};
pub use compiler::{CompiledScanner, Compiler, CompilerOptions, ScanPlan};
pub use cranelift::{CraneliftBackend, OptLevel};
pub use error::JitError;
pub use program::{Program, ProgramBackend};
pub use runtime::{Runtime, ScannerHandle};
pub use session::ScanSession;
