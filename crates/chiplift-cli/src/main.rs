//! chiplift command-line interface
//!
//! `chiplift lift <rom>` translates a ROM and writes the IR dump;
//! `chiplift run <rom>` additionally JIT-compiles and executes it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chiplift_engine::ir::{display, verify};
use chiplift_engine::render::{self, NullRenderer, TermRenderer};
use chiplift_engine::{jit, lift_program, CodeRanges, LiftReport, Program, VmState};

#[derive(Parser)]
#[command(name = "chiplift", version, about = "Static CHIP-8 binary translator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lift a ROM to IR, print the trace, and write the dump artifact
    Lift {
        /// ROM file (16-bit big-endian words, loaded at 0x200)
        rom: PathBuf,

        /// Code ranges as closed hex byte-offset ranges, e.g. "0-1f,30-1ff".
        /// Defaults to the whole ROM.
        #[arg(long)]
        code: Option<String>,

        /// Where to write the dump (default: <rom>.c8ir next to the ROM)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Lift a ROM and run it once through the JIT
    Run {
        /// ROM file (16-bit big-endian words, loaded at 0x200)
        rom: PathBuf,

        /// Code ranges as closed hex byte-offset ranges, e.g. "0-1f,30-1ff".
        /// Defaults to the whole ROM.
        #[arg(long)]
        code: Option<String>,

        /// Discard frames instead of rendering to the terminal
        #[arg(long)]
        headless: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Lift { rom, code, out } => {
            let (program, rom_path) = lift_rom(&rom, code.as_deref())?;
            let dump = out.unwrap_or_else(|| dump_path(&rom_path));
            display::write_dump(&program, &dump)
                .with_context(|| format!("failed to write {}", dump.display()))?;
            println!("wrote {}", dump.display());
            Ok(())
        }
        Commands::Run { rom, code, headless } => {
            let (program, rom_path) = lift_rom(&rom, code.as_deref())?;
            let dump = dump_path(&rom_path);
            display::write_dump(&program, &dump)
                .with_context(|| format!("failed to write {}", dump.display()))?;

            if headless {
                render::install(Box::new(NullRenderer));
            } else {
                render::install(Box::new(TermRenderer::new()));
            }

            // The timer thread holds a pointer into the state for the rest
            // of the process, so the state never comes back.
            let vm = Box::leak(VmState::new(&program.rom)?);
            let compiled = jit::Chip8Jit::compile(&program, vm)?;
            compiled.run();
            Ok(())
        }
    }
}

/// Read, lift, report, and verify a ROM.
fn lift_rom(rom: &Path, code: Option<&str>) -> Result<(Program, PathBuf)> {
    let bytes =
        std::fs::read(rom).with_context(|| format!("failed to read {}", rom.display()))?;
    let ranges = match code {
        Some(spec) => CodeRanges::parse(spec).context("bad --code ranges")?,
        None => CodeRanges::whole(bytes.len()),
    };
    let name = rom
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rom".to_string());

    let (program, report) = lift_program(&name, &bytes, &ranges);
    print_report(&report);

    verify(&program).context("lifted program failed verification")?;
    Ok((program, rom.to_path_buf()))
}

fn print_report(report: &LiftReport) {
    for line in &report.trace {
        println!("{}", line);
    }
    for id in &report.dangling {
        eprintln!("warning: block {} never terminated; patched with a self-loop", id);
    }
}

fn dump_path(rom: &Path) -> PathBuf {
    let mut os = rom.as_os_str().to_os_string();
    os.push(".c8ir");
    PathBuf::from(os)
}
