// Fri Oct 16 2026 - Alex

use crate::jit::backend::{CodeBackend, Emitter, ScanRoutine};
use crate::jit::JitError;
use crate::pattern::{MaskKind, Pattern};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    pub fast_skip: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self { fast_skip: true }
    }
}

/// One comparison in the verify phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    Exact { offset: usize, value: u8 },
    Masked { offset: usize, mask: u8, value: u8 },
}

impl Check {
    pub fn offset(&self) -> usize {
        match *self {
            Check::Exact { offset, .. } | Check::Masked { offset, .. } => offset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FastSkip {
    pub offset: usize,
    pub value: u8,
    pub lanes: usize,
}

/// Everything the emitter needs, decided up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    pub original_length: usize,
    pub checks: Vec<Check>,
    pub fast_skip: Option<FastSkip>,
}

impl ScanPlan {
    pub fn new(pattern: &Pattern, options: &CompilerOptions, vector_lanes: Option<usize>) -> Result<Self, JitError> {
        let trimmed = pattern.trimmed_len();
        if trimmed == 0 {
            return Err(JitError::CompilationFailed(
                "pattern is empty or fully wildcarded".to_string(),
            ));
        }

        let bytes = pattern.bytes();
        let checks = (0..trimmed)
            .rev()
            .filter_map(|i| match pattern.kind_at(i) {
                MaskKind::Ignore => None,
                MaskKind::Exact => Some(Check::Exact {
                    offset: i,
                    value: bytes[i],
                }),
                MaskKind::Partial(mask) => Some(Check::Masked {
                    offset: i,
                    mask,
                    value: bytes[i],
                }),
            })
            .collect();

        let fast_skip = match (pattern.anchor(), vector_lanes) {
            (Some(offset), Some(lanes)) if options.fast_skip && trimmed > 1 && lanes > 1 => {
                Some(FastSkip {
                    offset,
                    value: bytes[offset],
                    lanes,
                })
            }
            _ => None,
        };

        Ok(Self {
            original_length: pattern.len(),
            checks,
            fast_skip,
        })
    }

    /// Lower the plan onto `e`.
    ///
    /// Generated routine, with an anchor at offset `A` and `W` vector lanes:
    ///
    /// ```text
    ///     if current > last: goto not_found
    ///     goto skip
    /// next:
    ///     current += 1
    /// skip:                                  ; fast-skip
    ///     if current + W - 1 > last: goto tail
    ///     find [current + A .. + W] == anchor -> current += lane, goto verify
    ///     current += W
    ///     goto skip
    /// tail_next:
    ///     current += 1
    /// tail:                                  ; scalar anchor search
    ///     if current > last: goto not_found
    ///     if [current + A] != anchor: goto tail_next
    /// verify:                                ; highest offset first
    ///     if [current + i] & mask[i] != bytes[i]: goto next
    ///     ...
    ///     return current
    /// not_found:
    ///     return null
    /// ```
    ///
    /// Without an anchor the skip/tail blocks collapse into a bounds check in
    /// front of `verify`.
    pub fn emit(&self, e: &mut dyn Emitter) -> Result<(), JitError> {
        e.enter(self.original_length)?;

        let next = e.new_label();
        let verify = e.new_label();
        let not_found = e.new_label();

        if let Some(skip) = self.fast_skip {
            let scan = e.new_label();
            let tail = e.new_label();
            let tail_next = e.new_label();

            e.branch_if_exhausted(0, not_found)?;
            e.jump(scan)?;

            e.bind(next)?;
            e.advance(1)?;

            e.bind(scan)?;
            e.branch_if_exhausted(skip.lanes - 1, tail)?;
            e.find_anchor(skip.offset, skip.value, skip.lanes, verify)?;
            e.advance(skip.lanes)?;
            e.jump(scan)?;

            e.bind(tail_next)?;
            e.advance(1)?;

            e.bind(tail)?;
            e.branch_if_exhausted(0, not_found)?;
            e.compare_byte(skip.offset, skip.value, tail_next)?;
        } else {
            let check = e.new_label();

            e.jump(check)?;

            e.bind(next)?;
            e.advance(1)?;

            e.bind(check)?;
            e.branch_if_exhausted(0, not_found)?;
        }

        // The skip loop has already matched the anchor.
        let anchored = self.fast_skip.map(|skip| skip.offset);

        e.bind(verify)?;
        for check in self.checks.iter().filter(|c| Some(c.offset()) != anchored) {
            match *check {
                Check::Exact { offset, value } => e.compare_byte(offset, value, next)?,
                Check::Masked { offset, mask, value } => e.compare_masked(offset, mask, value, next)?,
            }
        }
        e.return_current()?;

        e.bind(not_found)?;
        e.return_null()
    }
}

/// A finished routine plus the pattern facts the scan protocol needs.
pub struct CompiledScanner {
    routine: Box<dyn ScanRoutine>,
    original_length: usize,
    trimmed_length: usize,
    fast_skip: bool,
}

impl CompiledScanner {
    pub fn original_length(&self) -> usize {
        self.original_length
    }

    pub fn trimmed_length(&self) -> usize {
        self.trimmed_length
    }

    pub fn has_fast_skip(&self) -> bool {
        self.fast_skip
    }

    pub fn routine(&self) -> &dyn ScanRoutine {
        self.routine.as_ref()
    }

    pub fn release(self) {
        self.routine.release();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Compiler {
    options: CompilerOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn with_fast_skip(mut self, enabled: bool) -> Self {
        self.options.fast_skip = enabled;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn plan(&self, pattern: &Pattern, backend: &dyn CodeBackend) -> Result<ScanPlan, JitError> {
        let plan = ScanPlan::new(pattern, &self.options, backend.vector_lanes())?;
        let wanted = self.options.fast_skip && pattern.anchor().is_some() && pattern.trimmed_len() > 1;
        if wanted && plan.fast_skip.is_none() {
            log::warn!(
                "fast-skip unavailable for {} on {} backend, scanning scalar",
                pattern,
                backend.name()
            );
        }
        Ok(plan)
    }

    pub fn compile(&self, pattern: &Pattern, backend: &mut dyn CodeBackend) -> Result<CompiledScanner, JitError> {
        let plan = self.plan(pattern, backend)?;
        let routine = backend.assemble(&mut |e| plan.emit(e))?;

        Ok(CompiledScanner {
            routine,
            original_length: plan.original_length,
            trimmed_length: pattern.trimmed_len(),
            fast_skip: plan.fast_skip.is_some(),
        })
    }
}
