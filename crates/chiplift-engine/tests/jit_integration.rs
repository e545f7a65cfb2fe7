#![cfg(feature = "jit")]

//! End-to-end JIT tests: lift small ROMs, compile them through
//! `cranelift_jit`, run the generated code, and assert on the `VmState`
//! left behind.
//!
//! The render sink is process-global, so every test shares one recording
//! sink; only the draw test inspects it.

use std::io;
use std::sync::Mutex;

use chiplift_engine::ir::verify;
use chiplift_engine::jit::Chip8Jit;
use chiplift_engine::render::{self, RenderSink};
use chiplift_engine::vm::SCREEN_BYTES;
use chiplift_engine::{lift_program, CodeRanges, VmState};

static FRAMES: Mutex<Vec<[u8; SCREEN_BYTES]>> = Mutex::new(Vec::new());

/// Serializes the tests that draw, so frame counts stay deterministic.
static DRAW_LOCK: Mutex<()> = Mutex::new(());

struct RecordingSink;

impl RenderSink for RecordingSink {
    fn init(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn draw(&mut self, frame: &[u8; SCREEN_BYTES]) -> io::Result<()> {
        FRAMES.lock().unwrap().push(*frame);
        Ok(())
    }
}

fn rom(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Lift, verify, compile, and run a ROM; the state is leaked because the
/// timer thread keeps a pointer into it.
fn run_rom_with_ranges(words: &[u16], ranges: &CodeRanges) -> &'static VmState {
    render::install(Box::new(RecordingSink));
    let bytes = rom(words);
    let (program, _report) = lift_program("jit-test", &bytes, ranges);
    verify(&program).expect("lifted program should verify");

    let vm = Box::leak(VmState::new(&bytes).unwrap());
    let compiled = Chip8Jit::compile(&program, vm).expect("compile failed");
    compiled.run();
    vm
}

fn run_rom(words: &[u16]) -> &'static VmState {
    let bytes_len = words.len() * 2;
    run_rom_with_ranges(words, &CodeRanges::whole(bytes_len))
}

#[test]
fn register_load_and_add() {
    let vm = run_rom(&[0x6005, 0x7003]);
    assert_eq!(vm.v[0], 8);
}

#[test]
fn add_wraps_without_carry() {
    let vm = run_rom(&[0x60FF, 0x7002]);
    assert_eq!(vm.v[0], 1);
    assert_eq!(vm.v[0xF], 0);
}

#[test]
fn register_register_add() {
    let vm = run_rom(&[0x6005, 0x6107, 0x8014]);
    assert_eq!(vm.v[0], 12);
    assert_eq!(vm.v[1], 7);
}

#[test]
fn index_set_and_add() {
    let vm = run_rom(&[0xA123, 0x6405, 0xF41E]);
    assert_eq!(vm.i, 0x128);
}

#[test]
fn random_respects_mask() {
    let vm = run_rom(&[0xC0F0]);
    assert_eq!(vm.v[0] & 0x0F, 0);
}

#[test]
fn bcd_decomposition() {
    // V0 = 234, I = 0x300: memory[0x300..] = 2, 3, 4.
    let vm = run_rom(&[0x60EA, 0xA300, 0xF033]);
    assert_eq!(&vm.memory[0x300..0x303], &[2, 3, 4]);
}

#[test]
fn store_and_load_indirect() {
    let vm = run_rom(&[0x602A, 0xA400, 0xF055, 0xF165]);
    assert_eq!(vm.memory[0x400], 0x2A);
    assert_eq!(vm.v[1], 0x2A);
}

#[test]
fn delay_timer_write_then_read() {
    // The timer thread's first tick is 50ms out; the program finishes in
    // microseconds, so the read observes the written value.
    let vm = run_rom(&[0x6030, 0xF015, 0xF107]);
    assert_eq!(vm.v[1], 0x30);
}

#[test]
fn skip_taken_skips_one_instruction() {
    let vm = run_rom(&[0x6005, 0x3005, 0x6101, 0x6202]);
    assert_eq!(vm.v[1], 0, "skipped instruction must not run");
    assert_eq!(vm.v[2], 2);
}

#[test]
fn skip_not_taken_falls_through() {
    let vm = run_rom(&[0x6005, 0x4005, 0x6101, 0x6202]);
    assert_eq!(vm.v[1], 1);
    assert_eq!(vm.v[2], 2);
}

#[test]
fn draw_xors_sprite_and_reports_frames() {
    // 0xFF row sprite stored as data at offset 8 (address 0x208); the
    // code ranges keep it out of the decoder.
    let _draws = DRAW_LOCK.lock().unwrap();
    let ranges = CodeRanges::parse("0-7").unwrap();
    FRAMES.lock().unwrap().clear();

    let vm = run_rom_with_ranges(&[0x6000, 0x6100, 0xA208, 0xD011, 0xFF00], &ranges);
    assert_eq!(&vm.screen[0..8], &[1, 1, 1, 1, 1, 1, 1, 1]);
    assert_eq!(vm.screen[8], 0);

    {
        let frames = FRAMES.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][0..8], &[1, 1, 1, 1, 1, 1, 1, 1]);
        assert_eq!(frames[0][8], 0);
    }

    // Drawing the same sprite twice XORs the pixels away again; every
    // draw still reports a frame.
    let ranges = CodeRanges::parse("0-9").unwrap();
    let vm = run_rom_with_ranges(&[0x6000, 0x6100, 0xA20A, 0xD011, 0xD011, 0xFF00], &ranges);
    assert_eq!(&vm.screen[0..8], &[0; 8]);
    let frames = FRAMES.lock().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(&frames[1][0..8], &[1, 1, 1, 1, 1, 1, 1, 1]);
    assert_eq!(&frames[2][0..8], &[0; 8]);
}

#[test]
fn offscreen_rows_land_in_the_spill_byte() {
    // V1 = 31: the sprite's second row falls off the bottom of the screen.
    let _draws = DRAW_LOCK.lock().unwrap();
    let ranges = CodeRanges::parse("0-7").unwrap();
    let vm = run_rom_with_ranges(&[0x6000, 0x611F, 0xA208, 0xD012, 0xFFFF], &ranges);
    assert_eq!(&vm.screen[31 * 64..31 * 64 + 8], &[1; 8]);
    // Nothing wrapped around to the top.
    assert_eq!(&vm.screen[0..8], &[0; 8]);
}
