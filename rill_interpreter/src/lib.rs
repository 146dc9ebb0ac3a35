//! Bytecode interpreter for the Rill language.
//!
//! A fixed bank of 32 registers and a fixed 1024-slot value stack. Register 0
//! is the base pointer, register 1 the stack pointer; `Exit` requires both to
//! be zero and yields register 2 as the program result. Integer arithmetic
//! wraps at 64 bits; the `*Real` opcodes treat register contents as IEEE-754
//! bit patterns.

use rill_bytecode::{Instruction, Program, BP, REGISTER_COUNT, RESULT, SP};
use rill_common::{RillError, RillResult};

const STACK_SIZE: usize = 1024;

/// Execute a program from instruction 0 until `Exit`.
pub fn interpret(program: &Program) -> RillResult<i64> {
    Interpreter::new(program).run()
}

struct Interpreter<'p> {
    program: &'p Program,
    registers: [i64; REGISTER_COUNT],
    stack: [i64; STACK_SIZE],
    ip: usize,
}

fn real(bits: i64) -> f64 {
    f64::from_bits(bits as u64)
}

fn bits(value: f64) -> i64 {
    value.to_bits() as i64
}

impl<'p> Interpreter<'p> {
    fn new(program: &'p Program) -> Self {
        Self { program, registers: [0; REGISTER_COUNT], stack: [0; STACK_SIZE], ip: 0 }
    }

    fn reg(&self, reg: u8) -> i64 {
        self.registers[reg as usize]
    }

    fn slot_address(&self, slot: i32) -> RillResult<usize> {
        let address = self.reg(BP) + slot as i64;
        if (0..STACK_SIZE as i64).contains(&address) {
            Ok(address as usize)
        } else {
            Err(RillError::runtime_error(format!("stack access out of bounds: bp{slot:+}")))
        }
    }

    fn push(&mut self, value: i64) -> RillResult<()> {
        let sp = self.reg(SP);
        if sp as usize >= STACK_SIZE {
            return Err(RillError::runtime_error("stack overflow"));
        }
        self.stack[sp as usize] = value;
        self.registers[SP as usize] = sp + 1;
        Ok(())
    }

    fn pop(&mut self) -> RillResult<i64> {
        let sp = self.reg(SP);
        if sp <= 0 {
            return Err(RillError::runtime_error("stack underflow"));
        }
        self.registers[SP as usize] = sp - 1;
        Ok(self.stack[(sp - 1) as usize])
    }

    fn run(&mut self) -> RillResult<i64> {
        while self.ip < self.program.instructions.len() {
            let instruction = self.program.instructions[self.ip];
            self.ip += 1;

            match instruction {
                Instruction::MovImm64 { dst, imm } => self.registers[dst as usize] = imm,
                Instruction::Mov { dst, src } => {
                    self.registers[dst as usize] = self.reg(src);
                }

                Instruction::Add { dst, src } => {
                    self.registers[dst as usize] = self.reg(dst).wrapping_add(self.reg(src));
                }
                Instruction::Sub { dst, src } => {
                    self.registers[dst as usize] = self.reg(dst).wrapping_sub(self.reg(src));
                }
                Instruction::Mul { dst, src } => {
                    self.registers[dst as usize] = self.reg(dst).wrapping_mul(self.reg(src));
                }
                Instruction::Div { dst, src } => {
                    if self.reg(src) == 0 {
                        return Err(RillError::runtime_error("division by zero"));
                    }
                    self.registers[dst as usize] = self.reg(dst).wrapping_div(self.reg(src));
                }
                Instruction::Mod { dst, src } => {
                    if self.reg(src) == 0 {
                        return Err(RillError::runtime_error("modulo by zero"));
                    }
                    self.registers[dst as usize] = self.reg(dst).wrapping_rem(self.reg(src));
                }

                Instruction::AddReal { dst, src } => {
                    self.registers[dst as usize] = bits(real(self.reg(dst)) + real(self.reg(src)));
                }
                Instruction::SubReal { dst, src } => {
                    self.registers[dst as usize] = bits(real(self.reg(dst)) - real(self.reg(src)));
                }
                Instruction::MulReal { dst, src } => {
                    self.registers[dst as usize] = bits(real(self.reg(dst)) * real(self.reg(src)));
                }
                Instruction::DivReal { dst, src } => {
                    self.registers[dst as usize] = bits(real(self.reg(dst)) / real(self.reg(src)));
                }
                Instruction::ModReal { dst, src } => {
                    self.registers[dst as usize] = bits(real(self.reg(dst)) % real(self.reg(src)));
                }

                Instruction::Lt { dst, src } => {
                    self.registers[dst as usize] = (self.reg(dst) < self.reg(src)) as i64;
                }
                Instruction::Le { dst, src } => {
                    self.registers[dst as usize] = (self.reg(dst) <= self.reg(src)) as i64;
                }
                Instruction::Eq { dst, src } => {
                    self.registers[dst as usize] = (self.reg(dst) == self.reg(src)) as i64;
                }
                Instruction::Ne { dst, src } => {
                    self.registers[dst as usize] = (self.reg(dst) != self.reg(src)) as i64;
                }
                Instruction::Ge { dst, src } => {
                    self.registers[dst as usize] = (self.reg(dst) >= self.reg(src)) as i64;
                }
                Instruction::Gt { dst, src } => {
                    self.registers[dst as usize] = (self.reg(dst) > self.reg(src)) as i64;
                }

                Instruction::LtReal { dst, src } => {
                    self.registers[dst as usize] = (real(self.reg(dst)) < real(self.reg(src))) as i64;
                }
                Instruction::LeReal { dst, src } => {
                    self.registers[dst as usize] =
                        (real(self.reg(dst)) <= real(self.reg(src))) as i64;
                }
                Instruction::EqReal { dst, src } => {
                    self.registers[dst as usize] =
                        (real(self.reg(dst)) == real(self.reg(src))) as i64;
                }
                Instruction::NeReal { dst, src } => {
                    self.registers[dst as usize] =
                        (real(self.reg(dst)) != real(self.reg(src))) as i64;
                }
                Instruction::GeReal { dst, src } => {
                    self.registers[dst as usize] =
                        (real(self.reg(dst)) >= real(self.reg(src))) as i64;
                }
                Instruction::GtReal { dst, src } => {
                    self.registers[dst as usize] = (real(self.reg(dst)) > real(self.reg(src))) as i64;
                }

                Instruction::Load { dst, slot } => {
                    let address = self.slot_address(slot)?;
                    self.registers[dst as usize] = self.stack[address];
                }
                Instruction::Store { slot, src } => {
                    let address = self.slot_address(slot)?;
                    self.stack[address] = self.reg(src);
                }

                Instruction::Jmp { target } => self.ip = target as usize,
                Instruction::JmpZero { target, src } => {
                    if self.reg(src) == 0 {
                        self.ip = target as usize;
                    }
                }

                Instruction::Print { src } => {
                    let index = self.reg(src);
                    let string = usize::try_from(index)
                        .ok()
                        .and_then(|i| self.program.strings.get(i))
                        .ok_or_else(|| {
                            RillError::runtime_error(format!("invalid string reference {index}"))
                        })?;
                    println!("{string}");
                }

                Instruction::Call { target } => {
                    self.push(self.ip as i64)?;
                    self.ip = target as usize;
                }
                Instruction::Ret => {
                    let address = self.pop()?;
                    self.ip = address as usize;
                }
                Instruction::Push { src } => self.push(self.reg(src))?,
                Instruction::Pop { dst } => {
                    let value = self.pop()?;
                    self.registers[dst as usize] = value;
                }

                Instruction::Exit => {
                    if self.reg(BP) != 0 || self.reg(SP) != 0 {
                        return Err(RillError::runtime_error(
                            "frame not unwound at exit: base/stack pointer nonzero",
                        ));
                    }
                    return Ok(self.reg(RESULT));
                }
            }
        }
        log::warn!(target: "interpreter", "program ran past the last instruction");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_bytecode::Instruction as I;

    fn run(instructions: Vec<I>) -> RillResult<i64> {
        let program = Program { instructions, strings: Vec::new() };
        interpret(&program)
    }

    #[test]
    fn mov_and_exit_yield_the_result_register() {
        let result = run(vec![I::MovImm64 { dst: 2, imm: 42 }, I::Exit]);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn integer_arithmetic_wraps() {
        let result = run(vec![
            I::MovImm64 { dst: 2, imm: i64::MAX },
            I::MovImm64 { dst: 3, imm: 1 },
            I::Add { dst: 2, src: 3 },
            I::Exit,
        ]);
        assert_eq!(result.unwrap(), i64::MIN);
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let result = run(vec![
            I::MovImm64 { dst: 2, imm: 1 },
            I::MovImm64 { dst: 3, imm: 0 },
            I::Div { dst: 2, src: 3 },
            I::Exit,
        ]);
        assert!(matches!(result, Err(RillError::RuntimeError { .. })));
    }

    #[test]
    fn real_arithmetic_goes_through_bit_patterns() {
        let result = run(vec![
            I::MovImm64 { dst: 2, imm: 1.5f64.to_bits() as i64 },
            I::MovImm64 { dst: 3, imm: 2.25f64.to_bits() as i64 },
            I::AddReal { dst: 2, src: 3 },
            I::Exit,
        ]);
        assert_eq!(f64::from_bits(result.unwrap() as u64), 3.75);
    }

    #[test]
    fn exit_with_unbalanced_stack_is_an_error() {
        let result = run(vec![
            I::MovImm64 { dst: 3, imm: 5 },
            I::Push { src: 3 },
            I::Exit,
        ]);
        assert!(matches!(result, Err(RillError::RuntimeError { .. })));
    }

    #[test]
    fn pop_on_empty_stack_underflows() {
        let result = run(vec![I::Pop { dst: 3 }, I::Exit]);
        assert!(matches!(result, Err(RillError::RuntimeError { .. })));
    }

    #[test]
    fn pushing_past_the_stack_capacity_overflows() {
        let mut instructions = vec![I::MovImm64 { dst: 3, imm: 7 }];
        for _ in 0..=1024 {
            instructions.push(I::Push { src: 3 });
        }
        instructions.push(I::Exit);
        let result = run(instructions);
        assert!(matches!(result, Err(RillError::RuntimeError { .. })));
    }

    #[test]
    fn call_and_ret_round_trip_through_the_stack() {
        // 0: call the callee at 2; 1: exit with r2 set by the callee
        let result = run(vec![
            I::Call { target: 2 },
            I::Exit,
            I::MovImm64 { dst: 2, imm: 69 },
            I::Ret,
        ]);
        assert_eq!(result.unwrap(), 69);
    }
}
