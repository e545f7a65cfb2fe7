//! Mutable lifting context
//!
//! Everything the handlers need to wire control flow across the single
//! forward pass: which offsets already have a block or an emitted
//! instruction, which forward jump targets are still unresolved, and the
//! at-most-one pending skip merge.

use rustc_hash::FxHashMap;

use crate::ir::instr::BlockId;

/// Location of an emitted instruction inside the program
#[derive(Debug, Clone, Copy)]
pub struct InstrLoc {
    pub block: BlockId,
    pub index: usize,
}

#[derive(Debug)]
pub struct LiftState {
    /// Block currently receiving instructions
    pub current: BlockId,
    /// Forward jump targets not yet reached: target offset -> source block
    /// whose terminator is deferred until the target is lifted
    pub pending: FxHashMap<u16, BlockId>,
    /// Offset -> where its instruction was emitted (backward-jump splits)
    pub emitted: FxHashMap<u16, InstrLoc>,
    /// Offset -> block that starts exactly there
    pub block_at: FxHashMap<u16, BlockId>,
    /// Skip-target block waiting for its merge edge; at most one can be
    /// outstanding because a skip never skips another skip
    pub skip_merge: Option<BlockId>,
}

impl LiftState {
    pub fn new(entry: BlockId) -> Self {
        let mut block_at = FxHashMap::default();
        block_at.insert(0, entry);
        LiftState {
            current: entry,
            pending: FxHashMap::default(),
            emitted: FxHashMap::default(),
            block_at,
            skip_merge: None,
        }
    }
}
