//! Pretty-printing for the lifted IR
//!
//! The `Display` form of a `Program` is also the dump artifact written next
//! to the ROM after a successful lift.

use std::fmt;
use std::io;
use std::path::Path;

use super::instr::{Block, Lifted, Note, Program, Terminator};
use crate::isa::LOAD_BASE;

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program @{} (blocks: {}) {{", self.name, self.blocks.len())?;
        for block in &self.blocks {
            write_block(f, self, block)?;
        }
        writeln!(f, "}}")
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, program: &Program, block: &Block) -> fmt::Result {
    writeln!(f, "  {}: ; offset {:04x}", block.id, block.start_offset)?;
    let preds = program.predecessors(block.id);
    if !preds.is_empty() {
        write!(f, "    ; preds:")?;
        for pred in &preds {
            write!(f, " {}", pred)?;
        }
        writeln!(f)?;
    }

    for instr in &block.instrs {
        writeln!(f, "    {}", instr)?;
    }

    writeln!(f, "    {}", block.terminator)
}

impl fmt::Display for Lifted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}: {}",
            LOAD_BASE.wrapping_add(self.offset),
            self.mnemonic
        )?;
        if self.note == Some(Note::Unimplemented) {
            write!(f, " ; unimplemented")?;
        }
        Ok(())
    }
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Terminator::Jump(target) => write!(f, "jmp {}", target),
            Terminator::Skip { x, value, ne, skip, fall } => write!(
                f,
                "skip.{} V{:x}, 0x{:x}, {}, {}",
                if ne { "ne" } else { "eq" },
                x,
                value,
                skip,
                fall
            ),
            Terminator::Done => write!(f, "done"),
            Terminator::None => write!(f, "<no terminator>"),
        }
    }
}

/// Write the dump artifact for a lifted program.
pub fn write_dump(program: &Program, path: &Path) -> io::Result<()> {
    std::fs::write(path, program.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::{IrOp, Program};

    #[test]
    fn dump_shape() {
        let mut p = Program::new("rom", &[]);
        let b0 = p.add_block(0);
        p.block_mut(b0).instrs.push(Lifted {
            offset: 0,
            mnemonic: "ld V1, 0x20".to_string(),
            op: IrOp::SetReg { x: 1, value: 0x20 },
            note: None,
        });
        p.block_mut(b0).terminator = Terminator::Done;

        let text = p.to_string();
        assert!(text.starts_with("program @rom (blocks: 1) {"));
        assert!(text.contains("  bb0: ; offset 0000"));
        assert!(text.contains("    0200: ld V1, 0x20"));
        assert!(text.contains("    done"));
    }
}
