//! The JIT and the interpreter must agree on every program the JIT accepts.

use rill_alloc::HeapAlloc;
use rill_bytecode::{generate, Program};
use rill_common::SourceBuffer;
use rill_interpreter::interpret;
use rill_lexer::lex;
use rill_parser::parse;
use rill_typechecker::check;

fn compile_source(text: &str) -> Program {
    let heap = HeapAlloc::new();
    let source = SourceBuffer::new("<test>", text);
    let tree = check(parse(lex(&source, &heap).expect("lexes")).expect("parses")).expect("checks");
    generate(&tree).expect("generates")
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
#[test]
fn straight_line_arithmetic_matches_the_interpreter() {
    for text in [
        "1 + 5 * 2 + 3 * 4 + 6 * 7 + 8 * 9 + 10",
        "2 * 3 * 4",
        "40 + 2",
        "7",
    ] {
        let program = compile_source(text);
        let jitted = rill_jit::compile(&program).expect("straight-line code must JIT");
        let native = jitted.call();
        let interpreted = interpret(&program).expect("interprets");
        assert_eq!(native, interpreted, "program: {text}");
    }
}

#[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
#[test]
fn empty_module_yields_zero() {
    let program = compile_source("");
    let jitted = rill_jit::compile(&program).expect("jits");
    assert_eq!(jitted.call(), 0);
    assert_eq!(interpret(&program).expect("interprets"), 0);
}

#[test]
fn programs_with_control_flow_fall_back() {
    for text in [
        "if true then 1 else 2",
        "a := 0 while a < 3 { a = a + 1 } a",
        "fun f() int { return 1 } f()",
        "1 - 2",
        "1 / 2",
        "true and false",
    ] {
        let program = compile_source(text);
        assert!(
            rill_jit::compile(&program).is_err(),
            "program should fall back to the interpreter: {text}"
        );
    }
}
