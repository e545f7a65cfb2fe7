//! Single-pass program builder
//!
//! Walks the ROM two bytes at a time over the supplied code ranges and lifts
//! every recognized word into the current basic block. Control flow is wired
//! as it is discovered:
//!
//! - a forward jump records its source block in `pending`; when the target
//!   offset is reached the deferred terminator is filled in and lifting
//!   continues in the target block
//! - a backward jump into the middle of an already-emitted block splits that
//!   block at the target instruction
//! - a conditional skip ends the current block with a two-way branch
//!   (fallthrough at c+2, skip target at c+4) and parks the skip target in
//!   `skip_merge`; the next recognized instruction merges into it
//!
//! Unrecognized words produce an `UNKNOWN` trace line and nothing else; in
//! particular they do not consume a pending skip merge.

use crate::ir::instr::{IrOp, Lifted, Note, Program, Terminator};
use crate::ir::BlockId;
use crate::isa::{self, Op, Word, LOAD_BASE};

use super::ranges::CodeRanges;
use super::state::{InstrLoc, LiftState};

/// Everything the lift produced besides the program itself
#[derive(Debug, Default)]
pub struct LiftReport {
    /// One line per decoded in-range offset, in address order
    pub trace: Vec<String>,
    /// Unrecognized words: (offset, raw word)
    pub unknown: Vec<(u16, u16)>,
    /// Blocks left without a terminator and patched with a self-loop
    pub dangling: Vec<BlockId>,
}

/// Lift a ROM into a program over the given code ranges.
///
/// Never fails: unknown words and dangling blocks are reported, not fatal.
/// The result still needs [`crate::ir::verify`] before execution.
pub fn lift_program(name: &str, rom: &[u8], ranges: &CodeRanges) -> (Program, LiftReport) {
    let mut program = Program::new(name, rom);
    let entry = program.add_block(0);
    program.entry = entry;
    let mut st = LiftState::new(entry);
    let mut report = LiftReport::default();

    let mut off = 0usize;
    while off + 1 < rom.len() {
        let c = off as u16;
        off += 2;
        if !ranges.contains(c) {
            continue;
        }
        let word = Word(u16::from_be_bytes([rom[c as usize], rom[c as usize + 1]]));
        let Some(op) = isa::decode(word) else {
            report.trace.push(format!(
                "{:04x}: UNKNOWN {}",
                LOAD_BASE.wrapping_add(c),
                word.0
            ));
            report.unknown.push((c, word.0));
            continue;
        };

        fire_pending(&mut program, &mut st, c);
        let had_skip = st.skip_merge.is_some();

        report
            .trace
            .push(format!("{:04x}: {}", LOAD_BASE.wrapping_add(c), op));
        lift_op(&mut program, &mut st, c, op);

        // A skip set before this instruction merges right after it.
        if had_skip {
            if let Some(merge) = st.skip_merge.take() {
                if program.block(st.current).terminator == Terminator::None {
                    program.block_mut(st.current).terminator = Terminator::Jump(merge);
                }
                st.current = merge;
            }
        }
    }

    // The block still receiving instructions is the end of the run.
    if program.block(st.current).terminator == Terminator::None {
        program.block_mut(st.current).terminator = Terminator::Done;
    }

    // Whatever is left unterminated (unreached forward targets, skip arms
    // past the end of the ROM) gets a deterministic self-loop.
    for i in 0..program.blocks.len() {
        let id = BlockId(i as u32);
        if program.block(id).terminator == Terminator::None {
            program.block_mut(id).terminator = Terminator::Jump(id);
            report.dangling.push(id);
        }
    }

    (program, report)
}

/// If offset `c` is a deferred forward-jump target, resolve it: terminate
/// the deferred source into a block starting at `c`, wire the linear
/// fallthrough from the previously active block, and continue lifting there.
fn fire_pending(program: &mut Program, st: &mut LiftState, c: u16) {
    let Some(src) = st.pending.remove(&c) else {
        return;
    };
    let dst = match st.block_at.get(&c) {
        Some(&b) => b,
        None => {
            let b = program.add_block(c);
            st.block_at.insert(c, b);
            b
        }
    };
    if program.block(src).terminator == Terminator::None {
        program.block_mut(src).terminator = Terminator::Jump(dst);
    }
    if st.current != dst && program.block(st.current).terminator == Terminator::None {
        program.block_mut(st.current).terminator = Terminator::Jump(dst);
    }
    st.current = dst;
}

fn lift_op(program: &mut Program, st: &mut LiftState, c: u16, op: Op) {
    match op {
        Op::Jump { addr } => {
            emit(program, st, c, op, IrOp::Nop, None);
            handle_jump(program, st, c, addr.wrapping_sub(LOAD_BASE));
        }
        Op::SkipEqImm { x, value } => handle_skip(program, st, c, op, x, value, false),
        Op::SkipNeImm { x, value } => handle_skip(program, st, c, op, x, value, true),

        Op::SetImm { x, value } => emit(program, st, c, op, IrOp::SetReg { x, value }, None),
        Op::AddImm { x, value } => emit(program, st, c, op, IrOp::AddImm { x, value }, None),
        Op::AddReg { x, y } => emit(program, st, c, op, IrOp::AddReg { x, y }, None),
        Op::SetIndex { addr } => emit(program, st, c, op, IrOp::SetIndex { addr }, None),
        Op::AddIndex { x } => emit(program, st, c, op, IrOp::AddIndex { x }, None),
        Op::Random { x, mask } => emit(program, st, c, op, IrOp::Random { x, mask }, None),
        Op::ReadDelay { x } => emit(program, st, c, op, IrOp::ReadDelay { x }, None),
        Op::WriteDelay { x } => emit(program, st, c, op, IrOp::WriteDelay { x }, None),
        Op::StoreBcd { x } => emit(program, st, c, op, IrOp::StoreBcd { x }, None),
        Op::StoreIndirect { x } => emit(program, st, c, op, IrOp::StoreIndirect { x }, None),
        Op::LoadIndirect { x } => emit(program, st, c, op, IrOp::LoadIndirect { x }, None),
        Op::Draw { x, y, rows } => emit(program, st, c, op, IrOp::Draw { x, y, rows }, None),

        // Recognized but lifted as markers only.
        Op::Cls
        | Op::Ret
        | Op::Sys { .. }
        | Op::Call { .. }
        | Op::JumpIndexed { .. }
        | Op::SkipEqReg { .. }
        | Op::SkipNeReg { .. }
        | Op::MovReg { .. }
        | Op::OrReg { .. }
        | Op::AndReg { .. }
        | Op::XorReg { .. }
        | Op::SubReg { .. }
        | Op::ShrReg { .. }
        | Op::ShlReg { .. } => {
            emit(program, st, c, op, IrOp::Nop, Some(Note::Unimplemented));
        }
    }
}

fn emit(program: &mut Program, st: &mut LiftState, c: u16, op: Op, ir: IrOp, note: Option<Note>) {
    let block = st.current;
    let index = program.block(block).instrs.len();
    program.block_mut(block).instrs.push(Lifted {
        offset: c,
        mnemonic: op.to_string(),
        op: ir,
        note,
    });
    st.emitted.insert(c, InstrLoc { block, index });
}

/// Absolute jump at offset `c` to offset `t` (both relative to the load
/// base). Four cases: target already starts a block, forward target
/// (deferred), backward target inside an emitted block (split), and a jump
/// to its own offset (self-loop). Lifting always resumes in a fresh block
/// at `c + 2`.
fn handle_jump(program: &mut Program, st: &mut LiftState, c: u16, t: u16) {
    if let Some(&dst) = st.block_at.get(&t) {
        program.block_mut(st.current).terminator = Terminator::Jump(dst);
    } else if t > c {
        st.pending.insert(t, st.current);
    } else if let Some(loc) = st.emitted.get(&t).copied() {
        let new = program.split_block(loc.block, loc.index, t);
        st.block_at.insert(t, new);
        for (index, li) in program.block(new).instrs.iter().enumerate() {
            st.emitted.insert(li.offset, InstrLoc { block: new, index });
        }
        // The jump itself may have moved into the split-off tail.
        let src = st.emitted[&c].block;
        program.block_mut(src).terminator = Terminator::Jump(new);
    } else {
        // Backward target that was never lifted (data, or filtered out).
        // Defer it like a forward target; if it stays unresolved the source
        // block surfaces in the dangling report.
        st.pending.insert(t, st.current);
    }

    let next = program.add_block(c + 2);
    st.block_at.insert(c + 2, next);
    st.current = next;
}

/// Conditional skip at offset `c`: branch between the fallthrough block at
/// `c + 2` and the skip block at `c + 4`, continue lifting in the
/// fallthrough, and leave the skip block parked for the merge edge.
fn handle_skip(
    program: &mut Program,
    st: &mut LiftState,
    c: u16,
    op: Op,
    x: u8,
    value: u8,
    ne: bool,
) {
    emit(program, st, c, op, IrOp::Nop, None);
    let fall = program.add_block(c + 2);
    let skip = program.add_block(c + 4);
    st.block_at.insert(c + 2, fall);
    st.block_at.insert(c + 4, skip);
    program.block_mut(st.current).terminator = Terminator::Skip { x, value, ne, skip, fall };
    st.current = fall;
    st.skip_merge = Some(skip);
}
