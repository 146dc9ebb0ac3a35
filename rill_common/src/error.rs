//! Error handling utilities for the Rill compiler

use thiserror::Error;

/// The main error type for the Rill compiler
#[derive(Error, Debug, Clone)]
pub enum RillError {
    #[error("Lexical error: {message}")]
    LexError { message: String },

    #[error("Parse error: {message}")]
    ParseError { message: String },

    #[error("Type error: {message}")]
    TypeError { message: String },

    #[error("Code generation error: {message}")]
    CodegenError { message: String },

    #[error("Runtime error: {message}")]
    RuntimeError { message: String },

    #[error("JIT error: {message}")]
    JitError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Result type alias for Rill compiler operations
pub type RillResult<T> = Result<T, RillError>;

impl RillError {
    pub fn lex_error(message: impl Into<String>) -> Self {
        Self::LexError { message: message.into() }
    }

    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::ParseError { message: message.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::TypeError { message: message.into() }
    }

    pub fn codegen_error(message: impl Into<String>) -> Self {
        Self::CodegenError { message: message.into() }
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::RuntimeError { message: message.into() }
    }

    pub fn jit_error(message: impl Into<String>) -> Self {
        Self::JitError { message: message.into() }
    }

    pub fn io_error(message: impl Into<String>) -> Self {
        Self::IoError { message: message.into() }
    }
}
