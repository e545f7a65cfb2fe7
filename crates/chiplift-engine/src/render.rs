//! Render sinks
//!
//! The generated program reports frames through a process-global sink,
//! installed once before the run. `RenderSink` abstracts the output so a
//! terminal, a test recorder, or nothing at all can sit behind the same
//! `chip8_draw` callback.

use std::io::{self, Write};

use crossterm::{cursor, style, terminal, QueueableCommand};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::vm::{SCREEN_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};

/// Consumer of rendered frames. One byte per pixel, row-major 64x32;
/// nonzero means lit.
pub trait RenderSink: Send {
    /// One-time setup before the program starts.
    fn init(&mut self) -> io::Result<()>;

    /// Present one frame.
    fn draw(&mut self, frame: &[u8; SCREEN_BYTES]) -> io::Result<()>;
}

static SINK: OnceCell<Mutex<Box<dyn RenderSink>>> = OnceCell::new();

/// Install the process-global sink. Returns false if one is already
/// installed (the first installation wins).
pub fn install(sink: Box<dyn RenderSink>) -> bool {
    SINK.set(Mutex::new(sink)).is_ok()
}

/// Run `f` against the installed sink, if any.
pub(crate) fn with_sink(f: impl FnOnce(&mut dyn RenderSink) -> io::Result<()>) {
    if let Some(sink) = SINK.get() {
        // Render failures must not unwind into generated code.
        let _ = f(&mut **sink.lock());
    }
}

/// Sink that discards every frame. Headless runs and tests.
pub struct NullRenderer;

impl RenderSink for NullRenderer {
    fn init(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn draw(&mut self, _frame: &[u8; SCREEN_BYTES]) -> io::Result<()> {
        Ok(())
    }
}

/// Terminal renderer: redraws the full 64x32 grid in place on stdout.
pub struct TermRenderer {
    out: io::Stdout,
}

impl TermRenderer {
    pub fn new() -> Self {
        TermRenderer { out: io::stdout() }
    }
}

impl Default for TermRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for TermRenderer {
    fn init(&mut self) -> io::Result<()> {
        self.out
            .queue(terminal::Clear(terminal::ClearType::All))?
            .queue(cursor::Hide)?
            .flush()
    }

    fn draw(&mut self, frame: &[u8; SCREEN_BYTES]) -> io::Result<()> {
        for row in 0..SCREEN_HEIGHT {
            let mut line = String::with_capacity(SCREEN_WIDTH);
            for col in 0..SCREEN_WIDTH {
                line.push(if frame[row * SCREEN_WIDTH + col] != 0 {
                    '█'
                } else {
                    ' '
                });
            }
            self.out
                .queue(cursor::MoveTo(0, row as u16))?
                .queue(style::Print(line))?;
        }
        self.out.flush()
    }
}

impl Drop for TermRenderer {
    fn drop(&mut self) {
        let _ = self.out.queue(cursor::Show).and_then(|o| o.flush());
    }
}
