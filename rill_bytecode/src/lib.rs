//! Bytecode definition and code generation for the Rill language

mod disassembler;
mod generator;
mod instruction;

pub use disassembler::disassemble;
pub use generator::generate;
pub use instruction::{Instruction, Program, Reg, BP, FIRST_TEMP, REGISTER_COUNT, RESULT, SP};
