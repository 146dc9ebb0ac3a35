//! Human-readable rendering of compiled programs

use crate::instruction::{Instruction, Program};
use std::fmt;
use std::fmt::Write as _;

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::MovImm64 { dst, imm } => write!(f, "mov_imm64  r{dst}, {imm}"),
            Instruction::Mov { dst, src } => write!(f, "mov        r{dst}, r{src}"),
            Instruction::Add { dst, src } => write!(f, "add        r{dst}, r{src}"),
            Instruction::Sub { dst, src } => write!(f, "sub        r{dst}, r{src}"),
            Instruction::Mul { dst, src } => write!(f, "mul        r{dst}, r{src}"),
            Instruction::Div { dst, src } => write!(f, "div        r{dst}, r{src}"),
            Instruction::Mod { dst, src } => write!(f, "mod        r{dst}, r{src}"),
            Instruction::AddReal { dst, src } => write!(f, "add.r      r{dst}, r{src}"),
            Instruction::SubReal { dst, src } => write!(f, "sub.r      r{dst}, r{src}"),
            Instruction::MulReal { dst, src } => write!(f, "mul.r      r{dst}, r{src}"),
            Instruction::DivReal { dst, src } => write!(f, "div.r      r{dst}, r{src}"),
            Instruction::ModReal { dst, src } => write!(f, "mod.r      r{dst}, r{src}"),
            Instruction::Lt { dst, src } => write!(f, "lt         r{dst}, r{src}"),
            Instruction::Le { dst, src } => write!(f, "le         r{dst}, r{src}"),
            Instruction::Eq { dst, src } => write!(f, "eq         r{dst}, r{src}"),
            Instruction::Ne { dst, src } => write!(f, "ne         r{dst}, r{src}"),
            Instruction::Ge { dst, src } => write!(f, "ge         r{dst}, r{src}"),
            Instruction::Gt { dst, src } => write!(f, "gt         r{dst}, r{src}"),
            Instruction::LtReal { dst, src } => write!(f, "lt.r       r{dst}, r{src}"),
            Instruction::LeReal { dst, src } => write!(f, "le.r       r{dst}, r{src}"),
            Instruction::EqReal { dst, src } => write!(f, "eq.r       r{dst}, r{src}"),
            Instruction::NeReal { dst, src } => write!(f, "ne.r       r{dst}, r{src}"),
            Instruction::GeReal { dst, src } => write!(f, "ge.r       r{dst}, r{src}"),
            Instruction::GtReal { dst, src } => write!(f, "gt.r       r{dst}, r{src}"),
            Instruction::Load { dst, slot } => write!(f, "load       r{dst}, [bp{slot:+}]"),
            Instruction::Store { slot, src } => write!(f, "store      [bp{slot:+}], r{src}"),
            Instruction::Jmp { target } => write!(f, "jmp        {target:#06x}"),
            Instruction::JmpZero { target, src } => write!(f, "jmp_zero   {target:#06x}, r{src}"),
            Instruction::Print { src } => write!(f, "print      r{src}"),
            Instruction::Call { target } => write!(f, "call       {target:#06x}"),
            Instruction::Ret => write!(f, "ret"),
            Instruction::Push { src } => write!(f, "push       r{src}"),
            Instruction::Pop { dst } => write!(f, "pop        r{dst}"),
            Instruction::Exit => write!(f, "exit"),
        }
    }
}

/// Render the whole program, one `[index]: instruction` line each, followed
/// by the string table when present.
pub fn disassemble(program: &Program) -> String {
    let mut out = String::new();
    for (index, instruction) in program.instructions.iter().enumerate() {
        let _ = writeln!(out, "[{index:04x}]: {instruction}");
    }
    if !program.strings.is_empty() {
        let _ = writeln!(out, "strings:");
        for (id, string) in program.strings.iter().enumerate() {
            let _ = writeln!(out, "  {id}: {string:?}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_indexed_lines() {
        let program = Program {
            instructions: vec![
                Instruction::MovImm64 { dst: 3, imm: 42 },
                Instruction::Mov { dst: 2, src: 3 },
                Instruction::Exit,
            ],
            strings: vec!["hi".to_string()],
        };
        let text = disassemble(&program);
        assert!(text.contains("[0000]: mov_imm64  r3, 42"));
        assert!(text.contains("[0002]: exit"));
        assert!(text.contains("0: \"hi\""));
    }
}
