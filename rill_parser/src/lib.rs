//! Syntax analysis for the Rill language

pub mod ast;
pub mod graphviz;
mod parser;
mod precedence;
pub mod visitor;

pub use ast::*;
pub use parser::{parse, GrammarTree};
pub use precedence::Precedence;
pub use visitor::{walk_expr, walk_module, walk_stmt, Visitor};
