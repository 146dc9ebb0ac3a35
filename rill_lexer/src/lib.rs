//! Lexical analysis for the Rill language

mod intern;
mod lexer;
mod token;

pub use intern::{InternPool, Istr};
pub use lexer::{lex, TokenStream};
pub use token::{TokenIdx, TokenKind};
