//! Runtime shims called from generated code
//!
//! Fixed C ABIs; registered on the `JITBuilder` by name. All of them must
//! be panic-free: there is no unwinding across the generated frames.

use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use crate::render;
use crate::vm::SCREEN_BYTES;

/// Delay-timer tick interval.
const TICK: Duration = Duration::from_millis(50);

/// One-time render-sink setup, called from the program prologue.
pub extern "C" fn chip8_init() {
    render::with_sink(|sink| sink.init());
}

/// Present the framebuffer. The 2048 bytes are snapshotted before the sink
/// sees them; generated code keeps mutating the live buffer concurrently.
///
/// # Safety
/// `screen` must point at the framebuffer of a live `VmState`.
pub unsafe extern "C" fn chip8_draw(screen: *const u8) {
    let mut frame = [0u8; SCREEN_BYTES];
    unsafe {
        std::ptr::copy_nonoverlapping(screen, frame.as_mut_ptr(), SCREEN_BYTES);
    }
    render::with_sink(|sink| sink.draw(&frame));
}

/// Spawn the detached delay-timer thread: decrement the byte at `dt` every
/// tick until it reaches zero, forever. The thread is never joined.
///
/// # Safety
/// `dt` must point at the delay-timer byte of a `VmState` that stays valid
/// for the rest of the process (the driver leaks it).
pub unsafe extern "C" fn chip8_start_timer(dt: *mut u8) {
    let addr = dt as usize;
    thread::spawn(move || loop {
        thread::sleep(TICK);
        // Generated code accesses the same byte with plain loads/stores;
        // byte-granular atomics on this side keep the countdown coherent.
        let cell = unsafe { AtomicU8::from_ptr(addr as *mut u8) };
        let value = cell.load(Ordering::Relaxed);
        if value > 0 {
            let _ = cell.compare_exchange(value, value - 1, Ordering::Relaxed, Ordering::Relaxed);
        }
    });
}

/// Random byte source for the rnd opcode (the mask is applied in generated
/// code).
pub extern "C" fn chip8_rand() -> u32 {
    rand::random::<u32>()
}
