// Fri Oct 16 2026 - Alex

use crate::jit::backend::{CallConvention, CodeBackend, EmitFn, Emitter, Label, ScanRoutine};
use crate::jit::JitError;
use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::types::{self, Type};
use cranelift_codegen::ir::{AbiParam, Block, Function, InstBuilder, MemFlags, UserFuncName, Value};
use cranelift_codegen::isa::CallConv;
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext, Variable};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{Linkage, Module};
use serde::{Deserialize, Serialize};

const VECTOR_LANES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl OptLevel {
    fn as_setting(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Speed => "speed",
            Self::SpeedAndSize => "speed_and_size",
        }
    }
}

type ScanFn = unsafe extern "C" fn(*const u8, *const u8) -> *const u8;
#[cfg(target_arch = "x86_64")]
type SysVScanFn = unsafe extern "sysv64" fn(*const u8, *const u8) -> *const u8;
#[cfg(target_arch = "x86_64")]
type Win64ScanFn = unsafe extern "win64" fn(*const u8, *const u8) -> *const u8;

pub struct NativeRoutine {
    module: Option<JITModule>,
    entry: *const u8,
    call_convention: CallConvention,
}

// SAFETY: the module's code pages are immutable once finalized and the entry
// point stays valid until `release` consumes the routine.
unsafe impl Send for NativeRoutine {}
unsafe impl Sync for NativeRoutine {}

impl ScanRoutine for NativeRoutine {
    unsafe fn invoke(&self, current: *const u8, end: *const u8) -> *const u8 {
        match self.call_convention {
            CallConvention::Host => {
                let f: ScanFn = std::mem::transmute(self.entry);
                f(current, end)
            }
            #[cfg(target_arch = "x86_64")]
            CallConvention::SystemV => {
                let f: SysVScanFn = std::mem::transmute(self.entry);
                f(current, end)
            }
            #[cfg(target_arch = "x86_64")]
            CallConvention::WindowsFastcall => {
                let f: Win64ScanFn = std::mem::transmute(self.entry);
                f(current, end)
            }
            #[cfg(not(target_arch = "x86_64"))]
            other => unreachable!("{} is rejected before code is generated", other),
        }
    }

    fn release(self: Box<Self>) {
        // Code pages are returned in `Drop`.
        drop(self);
    }
}

impl Drop for NativeRoutine {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: the runtime drops a routine only once no session can reach it.
            unsafe { module.free_memory() };
        }
    }
}

/// Native code through Cranelift. Each scanner gets its own `JITModule` so
/// its code pages can be freed without touching any other scanner.
pub struct CraneliftBackend {
    call_convention: CallConvention,
    opt_level: OptLevel,
}

impl CraneliftBackend {
    pub fn new() -> Self {
        Self {
            call_convention: CallConvention::Host,
            opt_level: OptLevel::Speed,
        }
    }

    pub fn with_call_convention(mut self, call_convention: CallConvention) -> Self {
        self.call_convention = call_convention;
        self
    }

    pub fn with_opt_level(mut self, opt_level: OptLevel) -> Self {
        self.opt_level = opt_level;
        self
    }

    pub fn call_convention(&self) -> CallConvention {
        self.call_convention
    }

    /// Whether Cranelift can generate code for the host at all.
    pub fn host_supported() -> bool {
        cranelift_native::builder().is_ok()
    }

    fn make_module(&self) -> Result<JITModule, JitError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("use_colocated_libcalls", "false")
            .map_err(JitError::codegen)?;
        flag_builder.set("is_pic", "false").map_err(JitError::codegen)?;
        flag_builder
            .set("opt_level", self.opt_level.as_setting())
            .map_err(JitError::codegen)?;

        let isa_builder = cranelift_native::builder().map_err(JitError::codegen)?;
        let isa = isa_builder
            .finish(settings::Flags::new(flag_builder))
            .map_err(JitError::codegen)?;

        let builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        Ok(JITModule::new(builder))
    }

    fn cranelift_call_conv(&self, module: &JITModule) -> Result<CallConv, JitError> {
        if !self.call_convention.is_supported() {
            return Err(JitError::UnsupportedCallConvention(self.call_convention.to_string()));
        }
        Ok(match self.call_convention {
            CallConvention::Host => module.isa().default_call_conv(),
            CallConvention::SystemV => CallConv::SystemV,
            CallConvention::WindowsFastcall => CallConv::WindowsFastcall,
        })
    }

    fn define(&self, module: &mut JITModule, body: &mut EmitFn<'_>) -> Result<*const u8, JitError> {
        let ptr_type = module.target_config().pointer_type();

        let mut sig = module.make_signature();
        sig.call_conv = self.cranelift_call_conv(module)?;
        sig.params.push(AbiParam::new(ptr_type)); // current
        sig.params.push(AbiParam::new(ptr_type)); // end
        sig.returns.push(AbiParam::new(ptr_type)); // match or null

        let func_id = module
            .declare_function("scan", Linkage::Local, &sig)
            .map_err(JitError::codegen)?;

        let mut func = Function::with_name_signature(UserFuncName::user(0, func_id.as_u32()), sig);
        let mut func_ctx = FunctionBuilderContext::new();
        {
            let builder = FunctionBuilder::new(&mut func, &mut func_ctx);
            let mut emitter = ClifEmitter::new(builder, ptr_type);
            body(&mut emitter)?;
            emitter.finish()?;
        }

        let mut ctx = Context::for_function(func);
        module
            .define_function(func_id, &mut ctx)
            .map_err(JitError::codegen)?;
        module.clear_context(&mut ctx);
        module.finalize_definitions().map_err(JitError::codegen)?;

        Ok(module.get_finalized_function(func_id))
    }
}

impl Default for CraneliftBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBackend for CraneliftBackend {
    fn name(&self) -> &'static str {
        "cranelift"
    }

    fn vector_lanes(&self) -> Option<usize> {
        if cfg!(any(target_arch = "x86_64", target_arch = "aarch64")) {
            Some(VECTOR_LANES)
        } else {
            None
        }
    }

    fn assemble(&mut self, body: &mut EmitFn<'_>) -> Result<Box<dyn ScanRoutine>, JitError> {
        let mut module = self.make_module()?;

        match self.define(&mut module, body) {
            Ok(entry) => Ok(Box::new(NativeRoutine {
                module: Some(module),
                entry,
                call_convention: self.call_convention,
            })),
            Err(e) => {
                // SAFETY: nothing from this module was handed out.
                unsafe { module.free_memory() };
                Err(e)
            }
        }
    }
}

/// Lowers emitter calls onto a Cranelift function, one block per label.
struct ClifEmitter<'a> {
    builder: FunctionBuilder<'a>,
    ptr_type: Type,
    current: Variable,
    last: Option<Value>,
    labels: Vec<Block>,
    bound: Vec<bool>,
    filled: bool,
}

impl<'a> ClifEmitter<'a> {
    fn new(mut builder: FunctionBuilder<'a>, ptr_type: Type) -> Self {
        let current = Variable::from_u32(0);
        builder.declare_var(current, ptr_type);
        Self {
            builder,
            ptr_type,
            current,
            last: None,
            labels: Vec::new(),
            bound: Vec::new(),
            filled: true,
        }
    }

    fn block(&self, label: Label) -> Result<Block, JitError> {
        self.labels
            .get(label.index())
            .copied()
            .ok_or_else(|| JitError::CompilationFailed(format!("unknown label {}", label.index())))
    }

    fn last(&self) -> Result<Value, JitError> {
        self.last
            .ok_or_else(|| JitError::CompilationFailed("instruction emitted before the signature".to_string()))
    }

    fn offset(offset: usize) -> Result<i32, JitError> {
        i32::try_from(offset).map_err(|_| JitError::CompilationFailed(format!("offset {} out of range", offset)))
    }

    /// Make sure there is an open block to append to.
    ///
    /// Code emitted right after a jump or return is unreachable and goes
    /// into a fresh block of its own.
    fn open(&mut self) -> Result<Value, JitError> {
        let last = self.last()?;
        if self.filled {
            let dead = self.builder.create_block();
            self.builder.switch_to_block(dead);
            self.filled = false;
        }
        Ok(last)
    }

    /// Branch to `target` when `cond` holds, otherwise continue in a new block.
    fn branch_if(&mut self, cond: Value, target: Block) {
        let next = self.builder.create_block();
        self.builder.ins().brif(cond, target, &[], next, &[]);
        self.builder.switch_to_block(next);
    }

    fn load_byte(&mut self, offset: usize) -> Result<Value, JitError> {
        let offset = Self::offset(offset)?;
        let current = self.builder.use_var(self.current);
        Ok(self
            .builder
            .ins()
            .load(types::I8, MemFlags::trusted(), current, offset))
    }

    fn finish(mut self) -> Result<(), JitError> {
        if !self.filled {
            return Err(JitError::CompilationFailed(
                "instruction stream falls off its end".to_string(),
            ));
        }
        if let Some(i) = self.bound.iter().position(|b| !b) {
            return Err(JitError::CompilationFailed(format!("label {} never bound", i)));
        }
        self.builder.seal_all_blocks();
        self.builder.finalize();
        Ok(())
    }
}

impl Emitter for ClifEmitter<'_> {
    fn enter(&mut self, original_length: usize) -> Result<(), JitError> {
        if self.last.is_some() {
            return Err(JitError::CompilationFailed("signature declared twice".to_string()));
        }
        let entry = self.builder.create_block();
        self.builder.append_block_params_for_function_params(entry);
        self.builder.switch_to_block(entry);

        let current = self.builder.block_params(entry)[0];
        let end = self.builder.block_params(entry)[1];
        self.builder.def_var(self.current, current);

        let length = i64::try_from(original_length).map_err(JitError::codegen)?;
        let length = self.builder.ins().iconst(self.ptr_type, length);
        self.last = Some(self.builder.ins().isub(end, length));
        self.filled = false;
        Ok(())
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(self.builder.create_block());
        self.bound.push(false);
        Label((self.labels.len() - 1) as u32)
    }

    fn bind(&mut self, label: Label) -> Result<(), JitError> {
        let block = self.block(label)?;
        if self.bound[label.index()] {
            return Err(JitError::CompilationFailed(format!(
                "label {} bound twice",
                label.index()
            )));
        }
        self.bound[label.index()] = true;
        if !self.filled {
            self.builder.ins().jump(block, &[]);
        }
        self.builder.switch_to_block(block);
        self.filled = false;
        Ok(())
    }

    fn jump(&mut self, target: Label) -> Result<(), JitError> {
        let block = self.block(target)?;
        self.open()?;
        self.builder.ins().jump(block, &[]);
        self.filled = true;
        Ok(())
    }

    fn branch_if_exhausted(&mut self, lookahead: usize, target: Label) -> Result<(), JitError> {
        let block = self.block(target)?;
        let last = self.open()?;
        let lookahead = i64::try_from(lookahead).map_err(JitError::codegen)?;
        let current = self.builder.use_var(self.current);
        let probe = self.builder.ins().iadd_imm(current, lookahead);
        let past = self
            .builder
            .ins()
            .icmp(IntCC::UnsignedGreaterThan, probe, last);
        self.branch_if(past, block);
        Ok(())
    }

    fn compare_byte(&mut self, offset: usize, expected: u8, on_mismatch: Label) -> Result<(), JitError> {
        let block = self.block(on_mismatch)?;
        self.open()?;
        let byte = self.load_byte(offset)?;
        let expected = self.builder.ins().iconst(types::I8, i64::from(expected));
        let differs = self.builder.ins().icmp(IntCC::NotEqual, byte, expected);
        self.branch_if(differs, block);
        Ok(())
    }

    fn compare_masked(
        &mut self,
        offset: usize,
        mask: u8,
        expected: u8,
        on_mismatch: Label,
    ) -> Result<(), JitError> {
        let block = self.block(on_mismatch)?;
        self.open()?;
        let byte = self.load_byte(offset)?;
        let mask = self.builder.ins().iconst(types::I8, i64::from(mask));
        let masked = self.builder.ins().band(byte, mask);
        let expected = self.builder.ins().iconst(types::I8, i64::from(expected));
        let differs = self.builder.ins().icmp(IntCC::NotEqual, masked, expected);
        self.branch_if(differs, block);
        Ok(())
    }

    fn find_anchor(
        &mut self,
        offset: usize,
        expected: u8,
        lanes: usize,
        on_found: Label,
    ) -> Result<(), JitError> {
        if lanes != VECTOR_LANES {
            return Err(JitError::CompilationFailed(format!(
                "vector search needs {} lanes, got {}",
                VECTOR_LANES, lanes
            )));
        }
        let block = self.block(on_found)?;
        self.open()?;
        let offset = Self::offset(offset)?;

        let current = self.builder.use_var(self.current);
        let mut flags = MemFlags::new();
        flags.set_notrap();
        let window = self.builder.ins().load(types::I8X16, flags, current, offset);
        let needle = self.builder.ins().iconst(types::I8, i64::from(expected));
        let needle = self.builder.ins().splat(types::I8X16, needle);
        let hits = self.builder.ins().icmp(IntCC::Equal, window, needle);
        let bits = self.builder.ins().vhigh_bits(types::I32, hits);

        let hit = self.builder.create_block();
        let miss = self.builder.create_block();
        self.builder.ins().brif(bits, hit, &[], miss, &[]);

        self.builder.switch_to_block(hit);
        let lane = self.builder.ins().ctz(bits);
        let lane = self.builder.ins().uextend(self.ptr_type, lane);
        let current = self.builder.use_var(self.current);
        let moved = self.builder.ins().iadd(current, lane);
        self.builder.def_var(self.current, moved);
        self.builder.ins().jump(block, &[]);

        self.builder.switch_to_block(miss);
        Ok(())
    }

    fn advance(&mut self, count: usize) -> Result<(), JitError> {
        self.open()?;
        let count = i64::try_from(count).map_err(JitError::codegen)?;
        let current = self.builder.use_var(self.current);
        let moved = self.builder.ins().iadd_imm(current, count);
        self.builder.def_var(self.current, moved);
        Ok(())
    }

    fn return_current(&mut self) -> Result<(), JitError> {
        self.open()?;
        let current = self.builder.use_var(self.current);
        self.builder.ins().return_(&[current]);
        self.filled = true;
        Ok(())
    }

    fn return_null(&mut self) -> Result<(), JitError> {
        self.open()?;
        let null = self.builder.ins().iconst(self.ptr_type, 0);
        self.builder.ins().return_(&[null]);
        self.filled = true;
        Ok(())
    }
}
