//! JIT compilation and one-shot execution

use cranelift_codegen::ir::{types, AbiParam, UserFuncName};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{default_libcall_names, FuncId, Linkage, Module};
use thiserror::Error;

use crate::ir::instr::Program;
use crate::vm::VmState;

use super::lowering::{ExternFuncs, LowerError, LoweringContext};
use super::runtime;

#[derive(Debug, Error)]
pub enum JitError {
    #[error("codegen settings: {0}")]
    Settings(String),

    #[error("host target not supported: {0}")]
    Host(String),

    #[error(transparent)]
    Lower(#[from] LowerError),

    #[error("module: {0}")]
    Module(#[from] cranelift_module::ModuleError),
}

/// A compiled program, pinned to the `VmState` address it was lowered
/// against.
pub struct Chip8Jit {
    module: JITModule,
    main: FuncId,
}

impl Chip8Jit {
    /// Compile `program` for the host, with every `VmState` field address
    /// baked in from `vm`.
    ///
    /// `vm` must stay valid (and not move) until the run finishes; the
    /// timer thread keeps its delay-timer pointer past that, so the driver
    /// leaks the state.
    pub fn compile(program: &Program, vm: *mut VmState) -> Result<Self, JitError> {
        let mut flag_builder = settings::builder();
        flag_builder
            .set("opt_level", "speed")
            .map_err(|e| JitError::Settings(e.to_string()))?;
        flag_builder
            .set("is_pic", "false")
            .map_err(|e| JitError::Settings(e.to_string()))?;
        let flags = settings::Flags::new(flag_builder);

        let isa = cranelift_native::builder()
            .map_err(|e| JitError::Host(e.to_string()))?
            .finish(flags)
            .map_err(|e| JitError::Host(e.to_string()))?;

        let mut jit_builder = JITBuilder::with_isa(isa, default_libcall_names());
        jit_builder.symbol("chip8_init", runtime::chip8_init as *const u8);
        jit_builder.symbol("chip8_start_timer", runtime::chip8_start_timer as *const u8);
        jit_builder.symbol("chip8_draw", runtime::chip8_draw as *const u8);
        jit_builder.symbol("chip8_rand", runtime::chip8_rand as *const u8);
        let mut module = JITModule::new(jit_builder);

        // Shim signatures: init(), start_timer(ptr), draw(ptr), rand() -> u32
        let empty_sig = module.make_signature();
        let mut ptr_sig = module.make_signature();
        ptr_sig.params.push(AbiParam::new(types::I64));
        let mut rand_sig = module.make_signature();
        rand_sig.returns.push(AbiParam::new(types::I32));

        let init_id = module.declare_function("chip8_init", Linkage::Import, &empty_sig)?;
        let timer_id = module.declare_function("chip8_start_timer", Linkage::Import, &ptr_sig)?;
        let draw_id = module.declare_function("chip8_draw", Linkage::Import, &ptr_sig)?;
        let rand_id = module.declare_function("chip8_rand", Linkage::Import, &rand_sig)?;

        let main_sig = module.make_signature();
        let main = module.declare_function("chip8_main", Linkage::Local, &main_sig)?;

        let mut ctx = module.make_context();
        ctx.func.signature = main_sig;
        ctx.func.name = UserFuncName::user(0, 0);

        let ext = ExternFuncs {
            init: module.declare_func_in_func(init_id, &mut ctx.func),
            start_timer: module.declare_func_in_func(timer_id, &mut ctx.func),
            draw: module.declare_func_in_func(draw_id, &mut ctx.func),
            rand: module.declare_func_in_func(rand_id, &mut ctx.func),
        };

        {
            let mut builder_ctx = FunctionBuilderContext::new();
            let builder = FunctionBuilder::new(&mut ctx.func, &mut builder_ctx);
            LoweringContext::lower(program, vm, ext, builder)?;
        }

        module.define_function(main, &mut ctx)?;
        module.clear_context(&mut ctx);
        module.finalize_definitions()?;

        Ok(Chip8Jit { module, main })
    }

    /// Run the generated entry point to completion. Blocks until the
    /// program reaches its end; a program lifted with a self-loop halt
    /// never returns.
    pub fn run(&self) {
        let code = self.module.get_finalized_function(self.main);
        let entry: extern "C" fn() = unsafe { std::mem::transmute(code) };
        entry();
    }
}
