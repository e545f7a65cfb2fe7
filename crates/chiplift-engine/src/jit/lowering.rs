//! Program IR to Cranelift IR
//!
//! The lifted IR has no virtual registers; every instruction reads and
//! writes `VmState` directly. Lowering therefore needs no SSA variables or
//! block parameters: each instruction becomes loads and stores against
//! addresses baked in as constants from the `VmState` the program was
//! compiled against.

use std::mem::offset_of;

use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, FuncRef, InstBuilder, MemFlags, Value};
use cranelift_frontend::FunctionBuilder;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ir::instr::{BlockId, IrOp, Program, Terminator};
use crate::vm::{VmState, SCREEN_BYTES};

#[derive(Debug, Error)]
pub enum LowerError {
    #[error("block {0} reached lowering without a terminator")]
    Unterminated(BlockId),
}

/// References to the runtime shims, already declared in the function.
#[derive(Clone, Copy)]
pub struct ExternFuncs {
    pub init: FuncRef,
    pub start_timer: FuncRef,
    pub draw: FuncRef,
    pub rand: FuncRef,
}

pub struct LoweringContext<'a> {
    program: &'a Program,
    /// Address of the `VmState` the generated code runs against
    base: i64,
    ext: ExternFuncs,
}

impl<'a> LoweringContext<'a> {
    /// Lower the whole program into `builder`'s function. Takes ownership
    /// of the builder since finalize() consumes it.
    pub fn lower(
        program: &'a Program,
        vm_base: *mut VmState,
        ext: ExternFuncs,
        mut builder: FunctionBuilder<'_>,
    ) -> Result<(), LowerError> {
        let ctx = LoweringContext {
            program,
            base: vm_base as usize as i64,
            ext,
        };

        let mut block_map = FxHashMap::default();
        for block in &program.blocks {
            block_map.insert(block.id, builder.create_block());
        }

        // Prologue: render-sink init and the delay-timer thread, then fall
        // into the lifted entry block. Filled first so it becomes the
        // function entry.
        let prologue = builder.create_block();
        builder.switch_to_block(prologue);
        builder.ins().call(ctx.ext.init, &[]);
        let dt_ptr = ctx.state_addr(&mut builder, offset_of!(VmState, dt));
        builder.ins().call(ctx.ext.start_timer, &[dt_ptr]);
        builder.ins().jump(block_map[&program.entry], &[]);

        for block in &program.blocks {
            builder.switch_to_block(block_map[&block.id]);
            for instr in &block.instrs {
                ctx.lower_op(&mut builder, instr.op);
            }
            match block.terminator {
                Terminator::Jump(target) => {
                    builder.ins().jump(block_map[&target], &[]);
                }
                Terminator::Skip { x, value, ne, skip, fall } => {
                    let vx = ctx.load_v(&mut builder, x);
                    let cc = if ne { IntCC::NotEqual } else { IntCC::Equal };
                    // Narrow immediates must be the sign-extended i64 form.
                    let cond = builder.ins().icmp_imm(cc, vx, value as i8 as i64);
                    builder
                        .ins()
                        .brif(cond, block_map[&skip], &[], block_map[&fall], &[]);
                }
                Terminator::Done => {
                    builder.ins().return_(&[]);
                }
                Terminator::None => return Err(LowerError::Unterminated(block.id)),
            }
        }

        // No block parameters anywhere, so sealing order doesn't matter.
        builder.seal_all_blocks();
        builder.finalize();
        Ok(())
    }

    fn state_addr(&self, b: &mut FunctionBuilder<'_>, offset: usize) -> Value {
        b.ins().iconst(types::I64, self.base + offset as i64)
    }

    fn load_v(&self, b: &mut FunctionBuilder<'_>, x: u8) -> Value {
        let addr = self.state_addr(b, offset_of!(VmState, v) + x as usize);
        b.ins().load(types::I8, MemFlags::trusted(), addr, 0)
    }

    fn store_v(&self, b: &mut FunctionBuilder<'_>, x: u8, value: Value) {
        let addr = self.state_addr(b, offset_of!(VmState, v) + x as usize);
        b.ins().store(MemFlags::trusted(), value, addr, 0);
    }

    fn load_index(&self, b: &mut FunctionBuilder<'_>, ty: types::Type) -> Value {
        let addr = self.state_addr(b, offset_of!(VmState, i));
        let raw = b.ins().load(types::I16, MemFlags::trusted(), addr, 0);
        if ty == types::I16 {
            raw
        } else {
            b.ins().uextend(ty, raw)
        }
    }

    /// Address of memory[I + extra].
    fn indirect_addr(&self, b: &mut FunctionBuilder<'_>, index: Value) -> Value {
        let mem = self.state_addr(b, offset_of!(VmState, memory));
        b.ins().iadd(mem, index)
    }

    fn lower_op(&self, b: &mut FunctionBuilder<'_>, op: IrOp) {
        match op {
            IrOp::Nop => {}

            IrOp::SetIndex { addr } => {
                let value = b.ins().iconst(types::I16, addr as i64);
                let dst = self.state_addr(b, offset_of!(VmState, i));
                b.ins().store(MemFlags::trusted(), value, dst, 0);
            }
            IrOp::SetReg { x, value } => {
                let value = b.ins().iconst(types::I8, value as i8 as i64);
                self.store_v(b, x, value);
            }
            IrOp::AddImm { x, value } => {
                let vx = self.load_v(b, x);
                let sum = b.ins().iadd_imm(vx, value as i8 as i64);
                self.store_v(b, x, sum);
            }
            IrOp::AddReg { x, y } => {
                let vx = self.load_v(b, x);
                let vy = self.load_v(b, y);
                let sum = b.ins().iadd(vx, vy);
                self.store_v(b, x, sum);
            }
            IrOp::AddIndex { x } => {
                let vx = self.load_v(b, x);
                let wide = b.ins().uextend(types::I16, vx);
                let index = self.load_index(b, types::I16);
                let sum = b.ins().iadd(index, wide);
                let dst = self.state_addr(b, offset_of!(VmState, i));
                b.ins().store(MemFlags::trusted(), sum, dst, 0);
            }
            IrOp::Random { x, mask } => {
                let call = b.ins().call(self.ext.rand, &[]);
                let raw = b.inst_results(call)[0];
                let byte = b.ins().ireduce(types::I8, raw);
                let masked = b.ins().band_imm(byte, mask as i8 as i64);
                self.store_v(b, x, masked);
            }
            IrOp::ReadDelay { x } => {
                let addr = self.state_addr(b, offset_of!(VmState, dt));
                let dt = b.ins().load(types::I8, MemFlags::trusted(), addr, 0);
                self.store_v(b, x, dt);
            }
            IrOp::WriteDelay { x } => {
                let vx = self.load_v(b, x);
                let addr = self.state_addr(b, offset_of!(VmState, dt));
                b.ins().store(MemFlags::trusted(), vx, addr, 0);
            }
            IrOp::StoreBcd { x } => {
                let vx = self.load_v(b, x);
                let wide = b.ins().uextend(types::I32, vx);
                let hundreds = b.ins().udiv_imm(wide, 100);
                let tens_wide = b.ins().udiv_imm(wide, 10);
                let tens = b.ins().urem_imm(tens_wide, 10);
                let units = b.ins().urem_imm(wide, 10);
                let index = self.load_index(b, types::I64);
                let dst = self.indirect_addr(b, index);
                for (i, digit) in [hundreds, tens, units].into_iter().enumerate() {
                    let byte = b.ins().ireduce(types::I8, digit);
                    b.ins().store(MemFlags::trusted(), byte, dst, i as i32);
                }
            }
            IrOp::StoreIndirect { x } => {
                let vx = self.load_v(b, x);
                let index = self.load_index(b, types::I64);
                let dst = self.indirect_addr(b, index);
                b.ins().store(MemFlags::trusted(), vx, dst, 0);
            }
            IrOp::LoadIndirect { x } => {
                let index = self.load_index(b, types::I64);
                let src = self.indirect_addr(b, index);
                let byte = b.ins().load(types::I8, MemFlags::trusted(), src, 0);
                self.store_v(b, x, byte);
            }
            IrOp::Draw { x, y, rows } => self.lower_draw(b, x, y, rows),
        }
    }

    /// Unrolled sprite blit: `rows` bytes starting at memory[I], XORed into
    /// the screen one pixel per byte at (Vx, Vy). No wraparound: pixels past
    /// the end of the framebuffer are steered into the spill byte directly
    /// after it. No collision flag. One draw call after the whole pass.
    fn lower_draw(&self, b: &mut FunctionBuilder<'_>, x: u8, y: u8, rows: u8) {
        let screen = self.state_addr(b, offset_of!(VmState, screen));
        let index = self.load_index(b, types::I64);
        let vx = self.load_v(b, x);
        let x0 = b.ins().uextend(types::I64, vx);
        let vy = self.load_v(b, y);
        let y0 = b.ins().uextend(types::I64, vy);

        for row in 0..rows as i64 {
            let sprite_index = b.ins().iadd_imm(index, row);
            let sprite_addr = self.indirect_addr(b, sprite_index);
            let sprite = b.ins().load(types::I8, MemFlags::trusted(), sprite_addr, 0);

            let yr = b.ins().iadd_imm(y0, row);
            let row_base = b.ins().imul_imm(yr, 64);

            for bit in 0..8i64 {
                let shifted = b.ins().ushr_imm(sprite, 7 - bit);
                let pixel = b.ins().band_imm(shifted, 1);

                let xb = b.ins().iadd_imm(x0, bit);
                let offset = b.ins().iadd(row_base, xb);
                let in_bounds =
                    b.ins()
                        .icmp_imm(IntCC::UnsignedLessThan, offset, SCREEN_BYTES as i64);
                let spill = b.ins().iconst(types::I64, SCREEN_BYTES as i64);
                let safe = b.ins().select(in_bounds, offset, spill);

                let dst = b.ins().iadd(screen, safe);
                let old = b.ins().load(types::I8, MemFlags::trusted(), dst, 0);
                let new = b.ins().bxor(old, pixel);
                b.ins().store(MemFlags::trusted(), new, dst, 0);
            }
        }

        b.ins().call(self.ext.draw, &[screen]);
    }
}
