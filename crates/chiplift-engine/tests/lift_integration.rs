//! Lifter integration tests: CFG reconstruction and trace properties on
//! hand-assembled ROMs.

use chiplift_engine::ir::instr::{IrOp, Terminator};
use chiplift_engine::ir::{display, verify};
use chiplift_engine::{lift_program, CodeRanges, LiftReport, Program};

fn rom(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn lift(words: &[u16]) -> (Program, LiftReport) {
    let bytes = rom(words);
    let ranges = CodeRanges::whole(bytes.len());
    lift_program("test", &bytes, &ranges)
}

#[test]
fn trace_covers_every_in_range_offset() {
    let (_, report) = lift(&[0x6001, 0x6102, 0xA300, 0xC0FF, 0xFFFF, 0x7001]);
    assert_eq!(report.trace.len(), 6);

    // Only offsets inside the supplied ranges decode.
    let bytes = rom(&[0x6001, 0x6102, 0xA300, 0xC0FF]);
    let ranges = CodeRanges::parse("0-1").unwrap();
    let (_, report) = lift_program("test", &bytes, &ranges);
    assert_eq!(report.trace.len(), 1);
    assert_eq!(report.trace[0], "0200: ld V0, 0x1");
}

#[test]
fn trace_mnemonics() {
    let (_, report) = lift(&[0x6120, 0xA228, 0xD125, 0xF51E, 0xF333]);
    assert_eq!(
        report.trace,
        vec![
            "0200: ld V1, 0x20",
            "0202: ld I, 0x228",
            "0204: drw V1, V2, 0x5",
            "0206: add I, V5",
            "0208: ld B, V3",
        ]
    );
}

#[test]
fn relift_is_idempotent() {
    let words = [0x6001, 0x3001, 0x6102, 0x1202, 0xFFFF, 0x6203];
    let (p1, r1) = lift(&words);
    let (p2, r2) = lift(&words);

    assert_eq!(r1.trace, r2.trace);
    assert_eq!(p1.blocks.len(), p2.blocks.len());
    for (a, b) in p1.blocks.iter().zip(&p2.blocks) {
        assert_eq!(a.start_offset, b.start_offset);
        assert_eq!(a.terminator, b.terminator);
        assert_eq!(a.instrs, b.instrs);
    }
}

#[test]
fn forward_jump_defers_then_lands() {
    // 0x000: jp 0x210, padding the target can't be reached through, then
    // 0x010: jp 0x210 (halt self-loop).
    let mut words = vec![0x1210];
    words.extend([0xFFFF; 7]);
    words.push(0x1210);
    let (program, report) = lift(&words);
    assert!(verify(&program).is_ok());
    assert!(report.dangling.is_empty());

    // Exactly two blocks are reachable: the entry and the halt block.
    let reachable = program.reachable();
    assert_eq!(reachable.len(), 2);

    let entry = program.block(program.entry);
    let Terminator::Jump(target) = entry.terminator else {
        panic!("entry should end in a jump, got {:?}", entry.terminator);
    };
    let halt = program.block(target);
    assert_eq!(halt.start_offset, 0x010);
    // The halt block jumps to itself, not back to offset 0x000.
    assert_eq!(halt.terminator, Terminator::Jump(halt.id));
}

#[test]
fn backward_jump_splits_the_emitted_block() {
    // Three loads, then a jump back into the middle of them.
    let (program, _) = lift(&[0x6001, 0x6102, 0x6203, 0x1202]);
    assert!(verify(&program).is_ok());

    let entry = program.block(program.entry);
    assert_eq!(entry.instrs.len(), 1);
    assert_eq!(entry.instrs[0].offset, 0x000);
    let Terminator::Jump(split) = entry.terminator else {
        panic!("entry should fall through into the split block");
    };

    // Offset 0x002 begins its own block holding the rest, and the jump's
    // edge lands there (a self-loop), not at offset 0x000.
    let body = program.block(split);
    assert_eq!(body.start_offset, 0x002);
    let offsets: Vec<u16> = body.instrs.iter().map(|i| i.offset).collect();
    assert_eq!(offsets, vec![0x002, 0x004, 0x006]);
    assert_eq!(body.terminator, Terminator::Jump(split));
    assert!(program.predecessors(program.entry).is_empty());
}

#[test]
fn self_jump_halts_in_place() {
    let (program, _) = lift(&[0x1200]);
    let entry = program.block(program.entry);
    assert_eq!(entry.terminator, Terminator::Jump(program.entry));
}

#[test]
fn skip_builds_three_blocks_and_merges() {
    let (program, _) = lift(&[0x3001, 0x6105]);
    assert!(verify(&program).is_ok());

    let entry = program.block(program.entry);
    let Terminator::Skip { x, value, ne, skip, fall } = entry.terminator else {
        panic!("skip should terminate the entry block");
    };
    assert_eq!((x, value, ne), (0, 1, false));

    // Fallthrough holds the skipped instruction and merges into the skip
    // block, which the branch also reaches directly.
    let fall_block = program.block(fall);
    assert_eq!(fall_block.start_offset, 0x002);
    assert_eq!(fall_block.instrs.len(), 1);
    assert_eq!(fall_block.instrs[0].offset, 0x002);
    assert_eq!(fall_block.terminator, Terminator::Jump(skip));

    let skip_block = program.block(skip);
    assert_eq!(skip_block.start_offset, 0x004);
    assert_eq!(skip_block.terminator, Terminator::Done);
}

#[test]
fn unknown_word_only_traces() {
    let (program, report) = lift(&[0xFFFF]);
    assert_eq!(report.trace, vec!["0200: UNKNOWN 65535"]);
    assert_eq!(report.unknown, vec![(0, 0xFFFF)]);
    assert_eq!(program.blocks.len(), 1);
    assert_eq!(program.instr_count(), 0);
    assert_eq!(program.block(program.entry).terminator, Terminator::Done);
    assert!(verify(&program).is_ok());
}

#[test]
fn unknown_word_does_not_consume_skip_merge() {
    // se, then garbage, then a recognized load: the load still merges.
    let (program, _) = lift(&[0x3001, 0xFFFF, 0x6105]);
    let Terminator::Skip { skip, fall, .. } = program.block(program.entry).terminator else {
        panic!("skip should terminate the entry block");
    };
    assert_eq!(program.block(fall).terminator, Terminator::Jump(skip));
}

#[test]
fn dangling_skip_arm_is_patched_and_reported() {
    // The skip target at offset 4 is past the end of the ROM.
    let (program, report) = lift(&[0x3001]);
    assert_eq!(report.dangling.len(), 1);
    let id = report.dangling[0];
    assert_eq!(program.block(id).terminator, Terminator::Jump(id));
    assert!(verify(&program).is_ok());
}

#[test]
fn recognized_markers_carry_a_note() {
    let (program, report) = lift(&[0x8121, 0x00E0, 0x2345]);
    assert_eq!(program.unimplemented_offsets(), vec![0, 2, 4]);
    assert_eq!(
        report.trace,
        vec!["0200: or V1, V2", "0202: cls", "0204: call 0x345"]
    );
    for block in &program.blocks {
        for instr in &block.instrs {
            assert_eq!(instr.op, IrOp::Nop);
        }
    }
}

#[test]
fn dump_artifact_round_trips_to_disk() {
    let (program, _) = lift(&[0x6120, 0x3001, 0x6105]);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.ch8.c8ir");
    display::write_dump(&program, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("program @test"));
    assert!(text.contains("0200: ld V1, 0x20"));
    assert!(text.contains("skip.eq V0, 0x1"));
    assert!(text.contains("done"));
}
