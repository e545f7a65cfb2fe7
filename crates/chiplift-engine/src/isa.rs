//! CHIP-8 instruction set: word field extraction and opcode decode
//!
//! Instruction words are 16-bit big-endian. Operand fields are addressed by
//! position: nibble 0 is the most significant nibble, byte 0 the least
//! significant byte, and the address field is the low 12 bits.
//!
//! Decode runs one ordered match per mask, from most to least specific
//! (0xFFFF, 0xF0FF, 0xF00F, 0xF000), so exact encodings like 00E0 win over
//! the 0nnn family they would otherwise fall into.

use std::fmt;

/// Address the first ROM byte maps to in CHIP-8 memory.
pub const LOAD_BASE: u16 = 0x200;

/// A raw 16-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Word(pub u16);

impl Word {
    /// Nibble `i`, counted from the most significant (0..=3).
    pub fn nibble(self, i: u32) -> u8 {
        ((self.0 >> (4 * (3 - i))) & 0xF) as u8
    }

    /// Byte `i`, counted from the least significant (0..=1).
    pub fn byte(self, i: u32) -> u8 {
        ((self.0 >> (8 * i)) & 0xFF) as u8
    }

    /// The low 12-bit address field.
    pub fn addr(self) -> u16 {
        self.0 & 0x0FFF
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}", self.0)
    }
}

/// A decoded instruction.
///
/// Every recognized encoding has a variant, including the families that lift
/// to markers only (calls, shifts, register-register ALU forms); the lifter
/// decides which carry semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Cls,
    Ret,
    Sys { addr: u16 },
    Jump { addr: u16 },
    Call { addr: u16 },
    SkipEqImm { x: u8, value: u8 },
    SkipNeImm { x: u8, value: u8 },
    SkipEqReg { x: u8, y: u8 },
    SkipNeReg { x: u8, y: u8 },
    SetImm { x: u8, value: u8 },
    AddImm { x: u8, value: u8 },
    MovReg { x: u8, y: u8 },
    OrReg { x: u8, y: u8 },
    AndReg { x: u8, y: u8 },
    XorReg { x: u8, y: u8 },
    AddReg { x: u8, y: u8 },
    SubReg { x: u8, y: u8 },
    ShrReg { x: u8 },
    ShlReg { x: u8 },
    SetIndex { addr: u16 },
    JumpIndexed { addr: u16 },
    Random { x: u8, mask: u8 },
    Draw { x: u8, y: u8, rows: u8 },
    ReadDelay { x: u8 },
    WriteDelay { x: u8 },
    AddIndex { x: u8 },
    StoreBcd { x: u8 },
    StoreIndirect { x: u8 },
    LoadIndirect { x: u8 },
}

/// Decode a raw word, or `None` if no encoding matches.
pub fn decode(word: Word) -> Option<Op> {
    let x = word.nibble(1);
    let y = word.nibble(2);
    let n = word.nibble(3);
    let kk = word.byte(0);
    let addr = word.addr();
    let w = word.0;

    // mask 0xFFFF: exact encodings
    match w {
        0x00E0 => return Some(Op::Cls),
        0x00EE => return Some(Op::Ret),
        _ => {}
    }

    // mask 0xF0FF: Fx** family
    match w & 0xF0FF {
        0xF007 => return Some(Op::ReadDelay { x }),
        0xF015 => return Some(Op::WriteDelay { x }),
        0xF01E => return Some(Op::AddIndex { x }),
        0xF033 => return Some(Op::StoreBcd { x }),
        0xF055 => return Some(Op::StoreIndirect { x }),
        0xF065 => return Some(Op::LoadIndirect { x }),
        _ => {}
    }

    // mask 0xF00F: ALU and register-register skip forms
    match w & 0xF00F {
        0x5000 => return Some(Op::SkipEqReg { x, y }),
        0x8000 => return Some(Op::MovReg { x, y }),
        0x8001 => return Some(Op::OrReg { x, y }),
        0x8002 => return Some(Op::AndReg { x, y }),
        0x8003 => return Some(Op::XorReg { x, y }),
        0x8004 => return Some(Op::AddReg { x, y }),
        0x8005 => return Some(Op::SubReg { x, y }),
        0x8006 => return Some(Op::ShrReg { x }),
        0x800E => return Some(Op::ShlReg { x }),
        0x9000 => return Some(Op::SkipNeReg { x, y }),
        _ => {}
    }

    // mask 0xF000: wide families
    match w & 0xF000 {
        0x0000 => Some(Op::Sys { addr }),
        0x1000 => Some(Op::Jump { addr }),
        0x2000 => Some(Op::Call { addr }),
        0x3000 => Some(Op::SkipEqImm { x, value: kk }),
        0x4000 => Some(Op::SkipNeImm { x, value: kk }),
        0x6000 => Some(Op::SetImm { x, value: kk }),
        0x7000 => Some(Op::AddImm { x, value: kk }),
        0xA000 => Some(Op::SetIndex { addr }),
        0xB000 => Some(Op::JumpIndexed { addr }),
        0xC000 => Some(Op::Random { x, mask: kk }),
        0xD000 => Some(Op::Draw { x, y, rows: n }),
        _ => None,
    }
}

impl fmt::Display for Op {
    /// Conventional CHIP-8 disassembly text, e.g. `ld V1, 0x20`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::Cls => write!(f, "cls"),
            Op::Ret => write!(f, "ret"),
            Op::Sys { .. } => write!(f, "sys"),
            Op::Jump { addr } => write!(f, "jp 0x{:x}", addr),
            Op::Call { addr } => write!(f, "call 0x{:x}", addr),
            Op::SkipEqImm { x, value } => write!(f, "se V{:x}, 0x{:x}", x, value),
            Op::SkipNeImm { x, value } => write!(f, "sne V{:x}, 0x{:x}", x, value),
            Op::SkipEqReg { x, y } => write!(f, "se V{:x}, V{:x}", x, y),
            Op::SkipNeReg { x, y } => write!(f, "sne V{:x}, V{:x}", x, y),
            Op::SetImm { x, value } => write!(f, "ld V{:x}, 0x{:x}", x, value),
            Op::AddImm { x, value } => write!(f, "add V{:x}, 0x{:x}", x, value),
            Op::MovReg { x, y } => write!(f, "ld V{:x}, V{:x}", x, y),
            Op::OrReg { x, y } => write!(f, "or V{:x}, V{:x}", x, y),
            Op::AndReg { x, y } => write!(f, "and V{:x}, V{:x}", x, y),
            Op::XorReg { x, y } => write!(f, "xor V{:x}, V{:x}", x, y),
            Op::AddReg { x, y } => write!(f, "add V{:x}, V{:x}", x, y),
            Op::SubReg { x, y } => write!(f, "sub V{:x}, V{:x}", x, y),
            Op::ShrReg { x } => write!(f, "shr V{:x}", x),
            Op::ShlReg { x } => write!(f, "shl V{:x}", x),
            Op::SetIndex { addr } => write!(f, "ld I, 0x{:x}", addr),
            Op::JumpIndexed { addr } => write!(f, "jp V0, 0x{:x}", addr),
            Op::Random { x, mask } => write!(f, "rnd V{:x}, 0x{:x}", x, mask),
            Op::Draw { x, y, rows } => write!(f, "drw V{:x}, V{:x}, 0x{:x}", x, y, rows),
            Op::ReadDelay { x } => write!(f, "ld V{:x}, DT", x),
            Op::WriteDelay { x } => write!(f, "ld DT, V{:x}", x),
            Op::AddIndex { x } => write!(f, "add I, V{:x}", x),
            Op::StoreBcd { x } => write!(f, "ld B, V{:x}", x),
            Op::StoreIndirect { x } => write!(f, "ld [I], V{:x}", x),
            Op::LoadIndirect { x } => write!(f, "ld V{:x}, [I]", x),
        }
    }
}
