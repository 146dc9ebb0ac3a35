//! Code generator integration tests

use pretty_assertions::assert_eq;
use rill_alloc::HeapAlloc;
use rill_bytecode::{disassemble, generate, Instruction, Program};
use rill_common::SourceBuffer;
use rill_lexer::lex;
use rill_parser::parse;
use rill_typechecker::check;

fn compile(text: &str) -> Program {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", text);
    let tree = check(parse(lex(&source, &heap).expect("lexes")).expect("parses")).expect("checks");
    generate(&tree).expect("generates")
}

fn count_exits(program: &Program) -> usize {
    program.instructions.iter().filter(|i| matches!(i, Instruction::Exit)).count()
}

#[test]
fn every_program_ends_the_module_with_exactly_one_exit() {
    for text in [
        "1 + 2",
        "a := 0 while a < 3 { a = a + 1 } a",
        "fun f() int { return 1 } f()",
        "if true { 1 } else { 2 }",
        "struct P { x: int } p := P { x = 1 } p.x",
    ] {
        let program = compile(text);
        assert_eq!(count_exits(&program), 1, "program for {text:?}");
    }
}

#[test]
fn plain_expression_compiles_to_straight_line_code() {
    let program = compile("1 + 5 * 2");
    // No stack traffic, no jumps: everything stays in registers.
    assert!(program.instructions.iter().all(|i| matches!(
        i,
        Instruction::MovImm64 { .. }
            | Instruction::Mov { .. }
            | Instruction::Add { .. }
            | Instruction::Mul { .. }
            | Instruction::Exit
    )));
}

#[test]
fn jump_targets_are_patched_to_instruction_indices() {
    let program = compile("if true { 1 } else { 2 }");
    let len = program.instructions.len() as u32;
    for instruction in &program.instructions {
        match instruction {
            Instruction::Jmp { target }
            | Instruction::JmpZero { target, .. }
            | Instruction::Call { target } => {
                assert!(*target <= len, "target {target} out of range");
            }
            _ => {}
        }
    }
}

#[test]
fn calls_reference_code_after_the_exit() {
    let program = compile("fun f() int { return 7 } f()");
    let exit_index =
        program.instructions.iter().position(|i| matches!(i, Instruction::Exit)).unwrap() as u32;
    let call_target = program
        .instructions
        .iter()
        .find_map(|i| match i {
            Instruction::Call { target } => Some(*target),
            _ => None,
        })
        .expect("has a call");
    assert!(call_target > exit_index, "function bodies follow the module exit");
    // The callee returns.
    assert!(program.instructions.iter().any(|i| matches!(i, Instruction::Ret)));
}

#[test]
fn while_loops_jump_backwards() {
    let program = compile("a := 0 while a < 3 { a = a + 1 } a");
    let has_backward_jump = program.instructions.iter().enumerate().any(|(index, i)| match i {
        Instruction::Jmp { target } => (*target as usize) < index,
        _ => false,
    });
    assert!(has_backward_jump);
}

#[test]
fn module_globals_are_reserved_and_released() {
    let program = compile("a := 1 a");
    // Prologue bumps sp, epilogue drops it before exit.
    assert!(matches!(program.instructions[0], Instruction::MovImm64 { imm: 1, .. }));
    assert!(matches!(program.instructions[1], Instruction::Add { dst: 1, .. }));
    let exit_at =
        program.instructions.iter().position(|i| matches!(i, Instruction::Exit)).unwrap();
    assert!(matches!(program.instructions[exit_at - 1], Instruction::Sub { dst: 1, .. }));
}

#[test]
fn string_literals_land_in_the_string_table() {
    let program = compile("print(\"hello\")");
    assert_eq!(program.strings, vec!["hello".to_string()]);
    assert!(program.instructions.iter().any(|i| matches!(i, Instruction::Print { .. })));
}

#[test]
fn real_arithmetic_uses_the_real_opcodes() {
    let program = compile("1.5 + 2.5");
    assert!(program.instructions.iter().any(|i| matches!(i, Instruction::AddReal { .. })));
    assert!(!program.instructions.iter().any(|i| matches!(i, Instruction::Add { dst: 3, .. })));
}

#[test]
fn logical_operators_short_circuit_with_jumps() {
    let program = compile("true and false");
    assert!(program.instructions.iter().any(|i| matches!(i, Instruction::JmpZero { .. })));
}

#[test]
fn disassembly_round_trips_through_serde() {
    let program = compile("fun f(a: int) int { return a } f(1)");
    let json = serde_json::to_string(&program).expect("serializes");
    let back: Program = serde_json::from_str(&json).expect("deserializes");
    assert_eq!(disassemble(&program), disassemble(&back));
}
