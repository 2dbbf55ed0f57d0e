// Sat Oct 17 2026 - Alex

use crate::config::{BackendKind, Config};
use crate::jit::backend::CodeBackend;
use crate::jit::compiler::{CompiledScanner, Compiler, CompilerOptions};
use crate::jit::cranelift::CraneliftBackend;
use crate::jit::program::ProgramBackend;
use crate::jit::session::ScanSession;
use crate::jit::JitError;
use crate::memory::{Address, Region};
use crate::pattern::Pattern;
use crate::utils::logging::ScopedTimer;
use ahash::AHashMap;

/// Opaque reference to a scanner owned by a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScannerHandle {
    id: u64,
    original_length: usize,
    trimmed_length: usize,
    anchor: Option<usize>,
}

impl ScannerHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn original_length(&self) -> usize {
        self.original_length
    }

    pub fn trimmed_length(&self) -> usize {
        self.trimmed_length
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }
}

/// Owns every compiled scanner and the backend that produced them.
pub struct Runtime {
    backend: Box<dyn CodeBackend>,
    compiler: Compiler,
    scanners: AHashMap<u64, CompiledScanner>,
    next_id: u64,
}

impl Runtime {
    /// Native code where the host supports it, the portable backend otherwise.
    pub fn new() -> Self {
        if CraneliftBackend::host_supported() {
            Self::with_backend(Box::new(CraneliftBackend::new()))
        } else {
            log::warn!("native code generation unavailable on this host, using program backend");
            Self::with_backend(Box::new(ProgramBackend::new()))
        }
    }

    pub fn with_backend(backend: Box<dyn CodeBackend>) -> Self {
        Self {
            backend,
            compiler: Compiler::new(),
            scanners: AHashMap::new(),
            next_id: 1,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, JitError> {
        config
            .validate()
            .map_err(|e| JitError::InvalidConfig(e.to_string()))?;

        let backend: Box<dyn CodeBackend> = match config.backend {
            BackendKind::Cranelift => Box::new(
                CraneliftBackend::new()
                    .with_call_convention(config.call_convention)
                    .with_opt_level(config.opt_level),
            ),
            BackendKind::Program => Box::new(ProgramBackend::new().with_lanes(config.lane_width)),
        };

        let mut runtime = Self::with_backend(backend);
        runtime.compiler = Compiler::with_options(CompilerOptions {
            fast_skip: config.fast_skip,
        });
        Ok(runtime)
    }

    pub fn set_fast_skip(&mut self, enabled: bool) {
        self.compiler = Compiler::with_options(CompilerOptions { fast_skip: enabled });
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }

    pub fn contains(&self, handle: ScannerHandle) -> bool {
        self.scanners.contains_key(&handle.id)
    }

    pub fn compile(&mut self, pattern: &Pattern) -> Result<ScannerHandle, JitError> {
        let _timer = log::log_enabled!(log::Level::Debug).then(|| ScopedTimer::new(format!("compile {}", pattern)));

        let scanner = match self.compiler.compile(pattern, self.backend.as_mut()) {
            Ok(scanner) => scanner,
            Err(e) => {
                log::warn!("failed to compile {}: {}", pattern, e);
                return Err(e);
            }
        };

        let handle = ScannerHandle {
            id: self.next_id,
            original_length: scanner.original_length(),
            trimmed_length: scanner.trimmed_length(),
            anchor: pattern.anchor(),
        };
        self.next_id += 1;

        log::debug!(
            "scanner {} on {}: length {}, trimmed {}, anchor {:?}, fast-skip {}",
            handle.id,
            self.backend.name(),
            handle.original_length,
            handle.trimmed_length,
            handle.anchor,
            scanner.has_fast_skip()
        );

        self.scanners.insert(handle.id, scanner);
        Ok(handle)
    }

    pub fn release(&mut self, handle: ScannerHandle) -> Result<(), JitError> {
        let scanner = self
            .scanners
            .remove(&handle.id)
            .ok_or(JitError::InvalidHandle(handle.id))?;
        scanner.release();
        log::debug!("released scanner {}", handle.id);
        Ok(())
    }

    pub fn session(&self, handle: ScannerHandle) -> Result<ScanSession<'_>, JitError> {
        self.scanners
            .get(&handle.id)
            .map(ScanSession::new)
            .ok_or(JitError::InvalidHandle(handle.id))
    }

    pub fn scan_predicate<F>(
        &self,
        handle: ScannerHandle,
        region: &Region<'_>,
        pred: F,
    ) -> Result<Option<Address>, JitError>
    where
        F: FnMut(Address) -> bool,
    {
        Ok(self.session(handle)?.scan_predicate(region, pred))
    }

    pub fn scan_all(&self, handle: ScannerHandle, region: &Region<'_>) -> Result<Vec<Address>, JitError> {
        Ok(self.session(handle)?.scan_all(region))
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        let remaining = self.scanners.len();
        for (_, scanner) in self.scanners.drain() {
            scanner.release();
        }
        if remaining > 0 {
            log::debug!("runtime dropped, released {} scanners", remaining);
        }
    }
}
