//! Program well-formedness checks
//!
//! Run after lifting and before handing the program to a backend. Catches
//! the defects the lifter is supposed to have patched away: unfilled
//! terminators and branches to block IDs that do not exist.

use thiserror::Error;

use super::instr::{BlockId, Program, Terminator};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("program has no blocks")]
    Empty,

    #[error("entry block {0} does not exist")]
    BadEntry(BlockId),

    #[error("block {0} has no terminator")]
    Unterminated(BlockId),

    #[error("block {block} branches to nonexistent block {target}")]
    BadTarget { block: BlockId, target: BlockId },
}

pub fn verify(program: &Program) -> Result<(), VerifyError> {
    if program.blocks.is_empty() {
        return Err(VerifyError::Empty);
    }
    if program.entry.0 as usize >= program.blocks.len() {
        return Err(VerifyError::BadEntry(program.entry));
    }

    let exists = |id: BlockId| (id.0 as usize) < program.blocks.len();
    for block in &program.blocks {
        match block.terminator {
            Terminator::None => return Err(VerifyError::Unterminated(block.id)),
            Terminator::Done => {}
            Terminator::Jump(target) => {
                if !exists(target) {
                    return Err(VerifyError::BadTarget { block: block.id, target });
                }
            }
            Terminator::Skip { skip, fall, .. } => {
                for target in [skip, fall] {
                    if !exists(target) {
                        return Err(VerifyError::BadTarget { block: block.id, target });
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unterminated_block() {
        let mut p = Program::new("t", &[]);
        let b0 = p.add_block(0);
        assert_eq!(verify(&p), Err(VerifyError::Unterminated(b0)));

        p.block_mut(b0).terminator = Terminator::Done;
        assert_eq!(verify(&p), Ok(()));
    }

    #[test]
    fn rejects_bad_target() {
        let mut p = Program::new("t", &[]);
        let b0 = p.add_block(0);
        p.block_mut(b0).terminator = Terminator::Jump(BlockId(7));
        assert_eq!(
            verify(&p),
            Err(VerifyError::BadTarget { block: b0, target: BlockId(7) })
        );
    }
}
