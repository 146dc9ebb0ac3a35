//! Type checking for the Rill language

mod checker;
mod env;
mod types;

pub use checker::{check, TypedTree};
pub use types::{FieldLayout, FunInfo, StructLayout, PRINT_FUN_ID};
