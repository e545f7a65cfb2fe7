//! Machine state shared between the host and generated code
//!
//! One `VmState` per run, allocated by the driver and never moved while
//! generated code can touch it: the JIT bakes field addresses into the
//! emitted instructions. `#[repr(C)]` keeps the layout stable for the
//! `offset_of!` computations in the lowering.

use thiserror::Error;

pub const REGISTER_COUNT: usize = 16;
pub const MEMORY_BYTES: usize = 4096;
pub const SCREEN_WIDTH: usize = 64;
pub const SCREEN_HEIGHT: usize = 32;
pub const SCREEN_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT;
pub const STACK_DEPTH: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    #[error("ROM is {0} bytes; at most 3584 fit above the load base")]
    RomTooLarge(usize),
}

/// CHIP-8 machine state.
///
/// `dt` is decremented by the detached timer thread through an atomic view
/// of the same byte; generated code reads and writes it as a plain byte.
/// `screen_spill` sits directly after the framebuffer: lowered sprite
/// stores land there when a pixel falls off the bottom of the screen, so
/// out-of-range draws are dropped without touching unrelated state.
#[repr(C)]
pub struct VmState {
    /// General-purpose registers V0..VF
    pub v: [u8; REGISTER_COUNT],
    /// Index register
    pub i: u16,
    /// Delay timer
    pub dt: u8,
    /// Sound timer (reserved)
    pub st: u8,
    /// 4 KiB address space; ROM bytes sit at the load base
    pub memory: [u8; MEMORY_BYTES],
    /// 64x32 one-byte-per-pixel framebuffer
    pub screen: [u8; SCREEN_BYTES],
    /// Spill target for off-screen sprite pixels
    pub screen_spill: u8,
    /// Call stack (reserved; call/ret lift as markers)
    pub stack: [u16; STACK_DEPTH],
}

impl VmState {
    /// Fresh state with `rom` copied in at the load base.
    pub fn new(rom: &[u8]) -> Result<Box<Self>, VmError> {
        let base = crate::isa::LOAD_BASE as usize;
        if rom.len() > MEMORY_BYTES - base {
            return Err(VmError::RomTooLarge(rom.len()));
        }
        let mut state = Box::new(VmState {
            v: [0; REGISTER_COUNT],
            i: 0,
            dt: 0,
            st: 0,
            memory: [0; MEMORY_BYTES],
            screen: [0; SCREEN_BYTES],
            screen_spill: 0,
            stack: [0; STACK_DEPTH],
        });
        state.memory[base..base + rom.len()].copy_from_slice(rom);
        Ok(state)
    }
}
