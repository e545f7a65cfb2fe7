//! IR instructions, blocks, and programs
//!
//! The lifter produces one `Program` per ROM: basic blocks of offset-tagged
//! instructions with explicit terminators. Offsets are byte offsets relative
//! to the 0x200 load base. Unlike an SSA IR there are no virtual registers;
//! every instruction reads and writes the machine state directly, so blocks
//! carry no parameters and splitting a block never rewrites operands.

use rustc_hash::FxHashSet;

/// Basic block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Diagnostic annotation on a lifted instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Note {
    /// Recognized encoding lifted as a marker with no semantics.
    Unimplemented,
}

/// Machine-state effect of one lifted instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrOp {
    /// Marker only; control-flow effects (if any) live in the terminator.
    Nop,
    /// I := addr
    SetIndex { addr: u16 },
    /// Vx := value
    SetReg { x: u8, value: u8 },
    /// Vx := Vx + value (wrapping, no carry flag)
    AddImm { x: u8, value: u8 },
    /// Vx := Vx + Vy (wrapping, no carry flag)
    AddReg { x: u8, y: u8 },
    /// I := I + Vx (Vx zero-extended to 16 bits)
    AddIndex { x: u8 },
    /// Vx := random byte & mask
    Random { x: u8, mask: u8 },
    /// Vx := DT
    ReadDelay { x: u8 },
    /// DT := Vx
    WriteDelay { x: u8 },
    /// memory[I..I+3] := hundreds, tens, units of Vx
    StoreBcd { x: u8 },
    /// memory[I] := Vx
    StoreIndirect { x: u8 },
    /// Vx := memory[I]
    LoadIndirect { x: u8 },
    /// XOR an n-row sprite at memory[I] into the screen at (Vx, Vy)
    Draw { x: u8, y: u8, rows: u8 },
}

/// One lifted instruction: the decoded effect plus its provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifted {
    /// Byte offset of the source word, relative to the load base
    pub offset: u16,
    /// Disassembly text, as printed in the lift trace
    pub mnemonic: String,
    pub op: IrOp,
    pub note: Option<Note>,
}

/// How a block terminates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump to target block
    Jump(BlockId),
    /// Conditional skip: if (Vx == value) != ne, go to `skip`, else `fall`
    Skip {
        x: u8,
        value: u8,
        /// true for sne (skip on not-equal)
        ne: bool,
        skip: BlockId,
        fall: BlockId,
    },
    /// End of the program run
    Done,
    /// Placeholder terminator (not yet assigned)
    None,
}

/// A basic block
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    /// Offset of the first word this block covers
    pub start_offset: u16,
    pub instrs: Vec<Lifted>,
    pub terminator: Terminator,
}

/// A complete lifted program
#[derive(Debug)]
pub struct Program {
    /// ROM name (for the dump header)
    pub name: String,
    pub blocks: Vec<Block>,
    pub entry: BlockId,
    /// The raw ROM bytes, copied into VM memory at load time
    pub rom: Vec<u8>,
}

impl Program {
    pub fn new(name: impl Into<String>, rom: &[u8]) -> Self {
        Program {
            name: name.into(),
            blocks: vec![],
            entry: BlockId(0),
            rom: rom.to_vec(),
        }
    }

    /// Get a block by ID
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    /// Get a mutable block by ID
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    /// Add a new empty block starting at `start_offset` and return its ID
    pub fn add_block(&mut self, start_offset: u16) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            start_offset,
            instrs: vec![],
            terminator: Terminator::None,
        });
        id
    }

    /// Split `id` before instruction index `at`: the tail (and the old
    /// terminator) moves into a fresh block starting at `start_offset`, and
    /// `id` falls through into it. Returns the new block's ID.
    pub fn split_block(&mut self, id: BlockId, at: usize, start_offset: u16) -> BlockId {
        let new = self.add_block(start_offset);
        let old = &mut self.blocks[id.0 as usize];
        let tail = old.instrs.split_off(at);
        let term = std::mem::replace(&mut old.terminator, Terminator::Jump(new));
        let block = &mut self.blocks[new.0 as usize];
        block.instrs = tail;
        block.terminator = term;
        new
    }

    /// Successor block IDs of `id`
    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        match self.block(id).terminator {
            Terminator::Jump(t) => vec![t],
            Terminator::Skip { skip, fall, .. } => vec![skip, fall],
            Terminator::Done | Terminator::None => vec![],
        }
    }

    /// Predecessor block IDs of `id`
    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.blocks
            .iter()
            .filter(|b| self.successors(b.id).contains(&id))
            .map(|b| b.id)
            .collect()
    }

    /// Blocks reachable from the entry
    pub fn reachable(&self) -> FxHashSet<BlockId> {
        let mut seen = FxHashSet::default();
        let mut work = vec![self.entry];
        while let Some(id) = work.pop() {
            if seen.insert(id) {
                work.extend(self.successors(id));
            }
        }
        seen
    }

    /// Total number of instructions across all blocks
    pub fn instr_count(&self) -> usize {
        self.blocks.iter().map(|b| b.instrs.len()).sum()
    }

    /// Offsets of recognized instructions lifted without semantics
    pub fn unimplemented_offsets(&self) -> Vec<u16> {
        let mut offsets: Vec<u16> = self
            .blocks
            .iter()
            .flat_map(|b| b.instrs.iter())
            .filter(|li| li.note == Some(Note::Unimplemented))
            .map(|li| li.offset)
            .collect();
        offsets.sort_unstable();
        offsets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifted(offset: u16, text: &str) -> Lifted {
        Lifted {
            offset,
            mnemonic: text.to_string(),
            op: IrOp::Nop,
            note: None,
        }
    }

    #[test]
    fn split_moves_tail_and_terminator() {
        let mut p = Program::new("t", &[]);
        let b0 = p.add_block(0);
        p.block_mut(b0).instrs.push(lifted(0, "a"));
        p.block_mut(b0).instrs.push(lifted(2, "b"));
        p.block_mut(b0).instrs.push(lifted(4, "c"));
        p.block_mut(b0).terminator = Terminator::Done;

        let b1 = p.split_block(b0, 1, 2);
        assert_eq!(p.block(b0).instrs.len(), 1);
        assert_eq!(p.block(b0).terminator, Terminator::Jump(b1));
        assert_eq!(p.block(b1).start_offset, 2);
        assert_eq!(p.block(b1).instrs.len(), 2);
        assert_eq!(p.block(b1).instrs[0].offset, 2);
        assert_eq!(p.block(b1).terminator, Terminator::Done);
    }

    #[test]
    fn reachability_ignores_orphans() {
        let mut p = Program::new("t", &[]);
        let b0 = p.add_block(0);
        let b1 = p.add_block(2);
        let b2 = p.add_block(4);
        p.block_mut(b0).terminator = Terminator::Jump(b1);
        p.block_mut(b1).terminator = Terminator::Done;
        p.block_mut(b2).terminator = Terminator::Done;
        p.entry = b0;

        let r = p.reachable();
        assert!(r.contains(&b0) && r.contains(&b1));
        assert!(!r.contains(&b2));
        assert_eq!(p.predecessors(b1), vec![b0]);
    }
}
