// Fri Oct 16 2026 - Alex

use crate::jit::backend::{CodeBackend, EmitFn, Emitter, Label, ScanRoutine};
use crate::jit::JitError;
use std::fmt;

pub const DEFAULT_LANES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Jump(usize),
    Exhausted { lookahead: usize, target: usize },
    CompareByte { offset: usize, expected: u8, on_mismatch: usize },
    CompareMasked { offset: usize, mask: u8, expected: u8, on_mismatch: usize },
    FindAnchor { offset: usize, expected: u8, lanes: usize, on_found: usize },
    Advance(usize),
    ReturnCurrent,
    ReturnNull,
}

impl Op {
    fn is_terminator(&self) -> bool {
        matches!(self, Op::Jump(_) | Op::ReturnCurrent | Op::ReturnNull)
    }

    fn retarget(self, resolve: impl Fn(usize) -> Result<usize, JitError>) -> Result<Self, JitError> {
        Ok(match self {
            Op::Jump(t) => Op::Jump(resolve(t)?),
            Op::Exhausted { lookahead, target } => Op::Exhausted {
                lookahead,
                target: resolve(target)?,
            },
            Op::CompareByte { offset, expected, on_mismatch } => Op::CompareByte {
                offset,
                expected,
                on_mismatch: resolve(on_mismatch)?,
            },
            Op::CompareMasked { offset, mask, expected, on_mismatch } => Op::CompareMasked {
                offset,
                mask,
                expected,
                on_mismatch: resolve(on_mismatch)?,
            },
            Op::FindAnchor { offset, expected, lanes, on_found } => Op::FindAnchor {
                offset,
                expected,
                lanes,
                on_found: resolve(on_found)?,
            },
            other => other,
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Jump(t) => write!(f, "jmp @{}", t),
            Op::Exhausted { lookahead, target } => write!(f, "ja cur+{}, last -> @{}", lookahead, target),
            Op::CompareByte { offset, expected, on_mismatch } => {
                write!(f, "cmp [cur+{}], {:02X} -> @{}", offset, expected, on_mismatch)
            }
            Op::CompareMasked { offset, mask, expected, on_mismatch } => write!(
                f,
                "cmp [cur+{}] & {:02X}, {:02X} -> @{}",
                offset, mask, expected, on_mismatch
            ),
            Op::FindAnchor { offset, expected, lanes, on_found } => write!(
                f,
                "vfind{} [cur+{}], {:02X} -> @{}",
                lanes, offset, expected, on_found
            ),
            Op::Advance(n) => write!(f, "add cur, {}", n),
            Op::ReturnCurrent => write!(f, "ret cur"),
            Op::ReturnNull => write!(f, "ret null"),
        }
    }
}

/// A finalized instruction stream with every label resolved to an op index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    original_length: usize,
    ops: Vec<Op>,
}

impl Program {
    pub fn original_length(&self) -> usize {
        self.original_length
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// # Safety
    ///
    /// Same contract as [`ScanRoutine::invoke`].
    pub unsafe fn run(&self, current: *const u8, end: *const u8) -> *const u8 {
        let last = (end as usize).wrapping_sub(self.original_length);
        let mut cur = current;
        let mut pc = 0;

        while let Some(op) = self.ops.get(pc) {
            pc += 1;
            match *op {
                Op::Jump(target) => pc = target,
                Op::Exhausted { lookahead, target } => {
                    if (cur as usize).wrapping_add(lookahead) > last {
                        pc = target;
                    }
                }
                Op::CompareByte { offset, expected, on_mismatch } => {
                    if cur.add(offset).read() != expected {
                        pc = on_mismatch;
                    }
                }
                Op::CompareMasked { offset, mask, expected, on_mismatch } => {
                    if cur.add(offset).read() & mask != expected {
                        pc = on_mismatch;
                    }
                }
                Op::FindAnchor { offset, expected, lanes, on_found } => {
                    let window = std::slice::from_raw_parts(cur.add(offset), lanes);
                    if let Some(lane) = window.iter().position(|&b| b == expected) {
                        cur = cur.add(lane);
                        pc = on_found;
                    }
                }
                Op::Advance(n) => cur = cur.wrapping_add(n),
                Op::ReturnCurrent => return cur,
                Op::ReturnNull => return std::ptr::null(),
            }
        }

        std::ptr::null()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; scan routine, original length {}", self.original_length)?;
        for (i, op) in self.ops.iter().enumerate() {
            writeln!(f, "{:4}: {}", i, op)?;
        }
        Ok(())
    }
}

impl ScanRoutine for Program {
    unsafe fn invoke(&self, current: *const u8, end: *const u8) -> *const u8 {
        self.run(current, end)
    }

    fn release(self: Box<Self>) {}
}

/// Records ops with label ids as targets until the stream is finalized.
struct Recorder {
    original_length: Option<usize>,
    ops: Vec<Op>,
    labels: Vec<Option<usize>>,
}

impl Recorder {
    fn new() -> Self {
        Self {
            original_length: None,
            ops: Vec::new(),
            labels: Vec::new(),
        }
    }

    fn push(&mut self, op: Op) -> Result<(), JitError> {
        if self.original_length.is_none() {
            return Err(JitError::CompilationFailed(
                "instruction emitted before the signature".to_string(),
            ));
        }
        self.ops.push(op);
        Ok(())
    }

    fn target(&self, label: Label) -> Result<usize, JitError> {
        if label.index() < self.labels.len() {
            Ok(label.index())
        } else {
            Err(JitError::CompilationFailed(format!("unknown label {}", label.index())))
        }
    }

    fn finish(self) -> Result<Program, JitError> {
        let original_length = self
            .original_length
            .ok_or_else(|| JitError::CompilationFailed("empty instruction stream".to_string()))?;

        match self.ops.last() {
            Some(op) if op.is_terminator() => {}
            _ => {
                return Err(JitError::CompilationFailed(
                    "instruction stream falls off its end".to_string(),
                ))
            }
        }

        let labels = &self.labels;
        let resolve = |id: usize| {
            labels
                .get(id)
                .copied()
                .flatten()
                .ok_or_else(|| JitError::CompilationFailed(format!("label {} never bound", id)))
        };

        let ops = self
            .ops
            .into_iter()
            .map(|op| op.retarget(&resolve))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Program { original_length, ops })
    }
}

impl Emitter for Recorder {
    fn enter(&mut self, original_length: usize) -> Result<(), JitError> {
        if self.original_length.is_some() {
            return Err(JitError::CompilationFailed("signature declared twice".to_string()));
        }
        self.original_length = Some(original_length);
        Ok(())
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label((self.labels.len() - 1) as u32)
    }

    fn bind(&mut self, label: Label) -> Result<(), JitError> {
        let here = self.ops.len();
        let slot = self
            .labels
            .get_mut(label.index())
            .ok_or_else(|| JitError::CompilationFailed(format!("unknown label {}", label.index())))?;
        if slot.is_some() {
            return Err(JitError::CompilationFailed(format!(
                "label {} bound twice",
                label.index()
            )));
        }
        *slot = Some(here);
        Ok(())
    }

    fn jump(&mut self, target: Label) -> Result<(), JitError> {
        let target = self.target(target)?;
        self.push(Op::Jump(target))
    }

    fn branch_if_exhausted(&mut self, lookahead: usize, target: Label) -> Result<(), JitError> {
        let target = self.target(target)?;
        self.push(Op::Exhausted { lookahead, target })
    }

    fn compare_byte(&mut self, offset: usize, expected: u8, on_mismatch: Label) -> Result<(), JitError> {
        let on_mismatch = self.target(on_mismatch)?;
        self.push(Op::CompareByte { offset, expected, on_mismatch })
    }

    fn compare_masked(
        &mut self,
        offset: usize,
        mask: u8,
        expected: u8,
        on_mismatch: Label,
    ) -> Result<(), JitError> {
        let on_mismatch = self.target(on_mismatch)?;
        self.push(Op::CompareMasked { offset, mask, expected, on_mismatch })
    }

    fn find_anchor(
        &mut self,
        offset: usize,
        expected: u8,
        lanes: usize,
        on_found: Label,
    ) -> Result<(), JitError> {
        if lanes == 0 {
            return Err(JitError::CompilationFailed("vector search with zero lanes".to_string()));
        }
        let on_found = self.target(on_found)?;
        self.push(Op::FindAnchor { offset, expected, lanes, on_found })
    }

    fn advance(&mut self, count: usize) -> Result<(), JitError> {
        self.push(Op::Advance(count))
    }

    fn return_current(&mut self) -> Result<(), JitError> {
        self.push(Op::ReturnCurrent)
    }

    fn return_null(&mut self) -> Result<(), JitError> {
        self.push(Op::ReturnNull)
    }
}

/// Records the instruction stream and runs it in software.
pub struct ProgramBackend {
    lanes: usize,
}

impl ProgramBackend {
    pub fn new() -> Self {
        Self { lanes: DEFAULT_LANES }
    }

    /// Lane width of the emulated vector test; `0` disables it.
    pub fn with_lanes(mut self, lanes: usize) -> Self {
        self.lanes = lanes;
        self
    }

    /// Record a stream without wrapping it as a routine, for inspection.
    pub fn record(&self, body: &mut EmitFn<'_>) -> Result<Program, JitError> {
        let mut recorder = Recorder::new();
        body(&mut recorder)?;
        recorder.finish()
    }
}

impl Default for ProgramBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBackend for ProgramBackend {
    fn name(&self) -> &'static str {
        "program"
    }

    fn vector_lanes(&self) -> Option<usize> {
        if self.lanes > 0 {
            Some(self.lanes)
        } else {
            None
        }
    }

    fn assemble(&mut self, body: &mut EmitFn<'_>) -> Result<Box<dyn ScanRoutine>, JitError> {
        let program = self.record(body)?;
        log::trace!("recorded program:\n{}", program);
        Ok(Box::new(program))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(body: &mut EmitFn<'_>) -> Result<Program, JitError> {
        ProgramBackend::new().record(body)
    }

    #[test]
    fn test_labels_resolve_to_op_indices() {
        let program = record(&mut |e| {
            e.enter(1)?;
            let done = e.new_label();
            e.jump(done)?;
            e.advance(1)?;
            e.bind(done)?;
            e.return_null()
        })
        .unwrap();
        assert_eq!(program.ops(), &[Op::Jump(2), Op::Advance(1), Op::ReturnNull]);
    }

    #[test]
    fn test_unbound_label_fails() {
        let err = record(&mut |e| {
            e.enter(1)?;
            let nowhere = e.new_label();
            e.jump(nowhere)
        })
        .unwrap_err();
        assert!(matches!(err, JitError::CompilationFailed(_)));
    }

    #[test]
    fn test_double_bind_fails() {
        let err = record(&mut |e| {
            e.enter(1)?;
            let l = e.new_label();
            e.bind(l)?;
            e.bind(l)?;
            e.return_null()
        })
        .unwrap_err();
        assert!(matches!(err, JitError::CompilationFailed(_)));
    }

    #[test]
    fn test_missing_signature_fails() {
        let err = record(&mut |e| e.return_null()).unwrap_err();
        assert!(matches!(err, JitError::CompilationFailed(_)));
    }

    #[test]
    fn test_fall_through_end_fails() {
        let err = record(&mut |e| {
            e.enter(1)?;
            e.advance(1)
        })
        .unwrap_err();
        assert!(matches!(err, JitError::CompilationFailed(_)));
    }

    #[test]
    fn test_find_anchor_moves_to_lowest_lane() {
        let data = [0u8, 0, 7, 0, 7, 0, 0, 0];
        let program = record(&mut |e| {
            e.enter(1)?;
            let found = e.new_label();
            e.find_anchor(0, 7, 4, found)?;
            e.return_null()?;
            e.bind(found)?;
            e.return_current()
        })
        .unwrap();

        let range = data.as_ptr_range();
        let hit = unsafe { program.run(range.start, range.end) };
        assert_eq!(hit, data[2..].as_ptr());
    }

    #[test]
    fn test_exhausted_uses_original_length() {
        let data = [0u8; 4];
        let program = record(&mut |e| {
            e.enter(3)?;
            let out = e.new_label();
            e.branch_if_exhausted(2, out)?;
            e.return_current()?;
            e.bind(out)?;
            e.return_null()
        })
        .unwrap();

        let range = data.as_ptr_range();
        // last start is offset 1; 0 + 2 > 1
        assert!(unsafe { program.run(range.start, range.end) }.is_null());
        let program = record(&mut |e| {
            e.enter(3)?;
            let out = e.new_label();
            e.branch_if_exhausted(1, out)?;
            e.return_current()?;
            e.bind(out)?;
            e.return_null()
        })
        .unwrap();
        assert_eq!(unsafe { program.run(range.start, range.end) }, range.start);
    }

    #[test]
    fn test_listing() {
        let program = record(&mut |e| {
            e.enter(2)?;
            let next = e.new_label();
            e.compare_masked(1, 0xF0, 0x30, next)?;
            e.return_current()?;
            e.bind(next)?;
            e.return_null()
        })
        .unwrap();
        let listing = program.to_string();
        assert!(listing.contains("cmp [cur+1] & F0, 30 -> @2"));
        assert!(listing.contains("ret null"));
    }
}
