//! Subcommand implementations

use crate::pipeline;
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;

/// `run`: full pipeline, then native execution with interpreter fallback.
/// The program result is printed on stdout.
pub fn run(input: &str, as_source: bool) -> Result<()> {
    let source = pipeline::load_source(input, as_source)?;
    let program = pipeline::compile(&source)?;
    let value = pipeline::execute(&program)?;
    println!("{value}");
    Ok(())
}

/// `sim`: full pipeline, interpreter only.
pub fn sim(input: &str, as_source: bool) -> Result<()> {
    let source = pipeline::load_source(input, as_source)?;
    let program = pipeline::compile(&source)?;
    let value = pipeline::simulate(&program)?;
    println!("{value}");
    Ok(())
}

/// `com`: compile and persist the program artifact next to the input.
pub fn com(input: &str, as_source: bool) -> Result<()> {
    let source = pipeline::load_source(input, as_source)?;
    let program = pipeline::compile(&source)?;
    let artifact = if as_source {
        "out.json".to_string()
    } else {
        Path::new(input).with_extension("json").display().to_string()
    };
    let json = serde_json::to_string_pretty(&program).context("failed to serialize program")?;
    std::fs::write(&artifact, json).with_context(|| format!("failed to write '{artifact}'"))?;
    log::info!(target: "driver", "wrote {artifact}");
    Ok(())
}

/// `dis`: compile and print the disassembly.
pub fn dis(input: &str, as_source: bool) -> Result<()> {
    let source = pipeline::load_source(input, as_source)?;
    let program = pipeline::compile(&source)?;
    print!("{}", rill_bytecode::disassemble(&program));
    Ok(())
}

/// `dot`: parse and print a Graphviz digraph of the tree.
pub fn dot(input: &str, as_source: bool) -> Result<()> {
    let source = pipeline::load_source(input, as_source)?;
    print!("{}", pipeline::parse_only(&source)?);
    Ok(())
}

/// `repl`: accumulate lines into a module; a line that fails any pipeline
/// stage is rolled back so the buffer stays valid. `\exit` leaves.
pub fn repl() -> Result<()> {
    let stdin = std::io::stdin();
    let mut buffer = String::new();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        if line.trim_end() == "\\exit" {
            break;
        }

        let rollback = buffer.len();
        buffer.push_str(&line);

        let source = rill_common::SourceBuffer::new("<repl>", buffer.clone());
        match pipeline::compile(&source).and_then(|program| pipeline::execute(&program)) {
            Ok(value) => println!("{value}"),
            Err(_) => {
                // Keep the previously working content.
                buffer.truncate(rollback);
            }
        }
    }
    Ok(())
}
