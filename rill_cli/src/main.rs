//! The `rill` command-line driver

mod commands;
mod pipeline;

use clap::{Parser, Subcommand};
use std::io::Write as _;
use std::process::ExitCode;
use std::time::Instant;

#[derive(Parser)]
#[command(
    name = "rill",
    version,
    about = "Compiler and runtime for the Rill language",
    subcommand_required = true,
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Don't output anything from the compiler
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output time to finish the command
    #[arg(short, long, global = true)]
    time: bool,

    /// Verbose compiler output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Treat the input argument as literal source text instead of a path
    #[arg(short, long, global = true)]
    source: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a file and write the program artifact
    Com { input: String },
    /// Compile a file and print the bytecode disassembly
    Dis { input: String },
    /// Generate a Graphviz dot rendering of the syntax tree
    Dot { input: String },
    /// Start the interactive session
    Repl,
    /// Run a file, natively when the JIT supports it
    Run { input: String },
    /// Run a file on the bytecode interpreter
    Sim { input: String },
}

fn init_logger(quiet: bool, verbose: bool) {
    let level = if quiet {
        log::LevelFilter::Off
    } else if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(buf, "[{}] ({}) {}", record.level(), record.target(), record.args())
        })
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.quiet, cli.verbose);

    let started = Instant::now();
    let result = match &cli.command {
        Command::Com { input } => commands::com(input, cli.source),
        Command::Dis { input } => commands::dis(input, cli.source),
        Command::Dot { input } => commands::dot(input, cli.source),
        Command::Repl => commands::repl(),
        Command::Run { input } => commands::run(input, cli.source),
        Command::Sim { input } => commands::sim(input, cli.source),
    };
    if cli.time {
        eprintln!("finished in {:.3?}", started.elapsed());
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!(target: "driver", "{error:#}");
            ExitCode::FAILURE
        }
    }
}
