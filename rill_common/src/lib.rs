//! Shared utilities for the Rill compiler toolchain

pub mod diagnostics;
pub mod error;
pub mod source;
pub mod span;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{RillError, RillResult};
pub use source::SourceBuffer;
pub use span::{Location, Span};
