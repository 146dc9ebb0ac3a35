//! The fixed compilation pipeline and its execution backends

use anyhow::{Context, Result};
use rill_alloc::HeapAlloc;
use rill_bytecode::{generate, Program};
use rill_common::SourceBuffer;
use rill_interpreter::interpret;

/// Load the input either as a source file or, with `-s`, as literal text.
pub fn load_source(input: &str, as_source: bool) -> Result<SourceBuffer> {
    if as_source {
        Ok(SourceBuffer::new("<source>", input))
    } else {
        let text = std::fs::read_to_string(input)
            .with_context(|| format!("failed to read '{input}'"))?;
        Ok(SourceBuffer::new(input, text))
    }
}

/// source bytes → tokens → tree → typed tree → bytecode.
///
/// Every stage emits its own diagnostics; the first failing stage aborts the
/// pipeline.
pub fn compile(source: &SourceBuffer) -> Result<Program> {
    let heap = HeapAlloc::new();
    let tokens = rill_lexer::lex(source, &heap)?;
    let tree = rill_parser::parse(tokens)?;
    let typed = rill_typechecker::check(tree)?;
    let program = generate(&typed)?;
    Ok(program)
}

/// Parse only: used by the `dot` command.
pub fn parse_only(source: &SourceBuffer) -> Result<String> {
    let heap = HeapAlloc::new();
    let tokens = rill_lexer::lex(source, &heap)?;
    let tree = rill_parser::parse(tokens)?;
    Ok(rill_parser::graphviz::write_dot(&tree))
}

/// Execute a compiled program: native code when the JIT supports it, the
/// interpreter otherwise. A failed JIT attempt is not an error.
pub fn execute(program: &Program) -> Result<i64> {
    match rill_jit::compile(program) {
        Ok(function) => {
            log::info!(target: "jit", "executing natively");
            Ok(function.call())
        }
        Err(error) => {
            log::info!(target: "jit", "falling back to the interpreter: {error}");
            Ok(interpret(program)?)
        }
    }
}

/// Execute a compiled program on the interpreter only.
pub fn simulate(program: &Program) -> Result<i64> {
    Ok(interpret(program)?)
}
