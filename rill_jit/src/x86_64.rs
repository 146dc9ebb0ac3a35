//! x86-64 instruction selection.
//!
//! 32-bit operand forms only, which keeps every encoding inside the eight
//! legacy registers (no REX prefixes) and zero-extends results into the full
//! 64-bit register. Numbering: eax=0, ecx=1, edx=2, ebx=3, esp=4, ebp=5,
//! esi=6, edi=7.

use rill_bytecode::{Instruction, Program, Reg, FIRST_TEMP, RESULT};
use rill_common::{RillError, RillResult};

const EAX: u8 = 0;
/// Temporaries r3.. map here, in order. Only caller-saved registers that
/// need no REX prefix qualify, which keeps ebx/esp/ebp out.
const TEMP_BANK: [u8; 3] = [1, 2, 6]; // ecx, edx, esi
/// Stack slots map here, growing down from the top of the file.
const SLOT_BANK: [u8; 1] = [7]; // edi

fn temp(reg: Reg) -> RillResult<u8> {
    if reg == RESULT {
        return Ok(EAX);
    }
    let index = reg.checked_sub(FIRST_TEMP).map(usize::from);
    match index.and_then(|i| TEMP_BANK.get(i)) {
        Some(machine) => Ok(*machine),
        None => Err(RillError::jit_error(format!("register r{reg} exceeds the machine bank"))),
    }
}

fn slot(slot: i32) -> RillResult<u8> {
    match usize::try_from(slot).ok().and_then(|i| SLOT_BANK.get(i)) {
        Some(machine) => Ok(*machine),
        None => Err(RillError::jit_error(format!("stack slot {slot} exceeds the machine bank"))),
    }
}

pub fn mov_imm32(reg: u8, value: u32) -> [u8; 5] {
    let bytes = value.to_le_bytes();
    [0xb8 + (reg & 0b111), bytes[0], bytes[1], bytes[2], bytes[3]]
}

pub fn add(dst: u8, src: u8) -> [u8; 2] {
    [0x01, 0xc0 + ((src & 0b111) << 3) + (dst & 0b111)]
}

pub fn mul(dst: u8, src: u8) -> [u8; 3] {
    [0x0f, 0xaf, 0xc0 + ((dst & 0b111) << 3) + (src & 0b111)]
}

pub fn mov_reg(dst: u8, src: u8) -> [u8; 2] {
    [0x89, 0xc0 + ((src & 0b111) << 3) + (dst & 0b111)]
}

pub fn ret() -> [u8; 1] {
    [0xc3]
}

/// Lower a program to machine code, or fail on the first opcode outside the
/// supported subset.
pub fn emit(program: &Program) -> RillResult<Vec<u8>> {
    let mut code = Vec::with_capacity(program.len() * 4 + 8);
    // The interpreter starts with a zeroed register bank; match it for the
    // result register so an empty module yields 0.
    code.extend_from_slice(&mov_imm32(EAX, 0));

    for instruction in &program.instructions {
        match *instruction {
            Instruction::MovImm64 { dst, imm } => {
                let value = u32::try_from(imm).map_err(|_| {
                    RillError::jit_error("mov only supports a 32-bit immediate")
                })?;
                code.extend_from_slice(&mov_imm32(temp(dst)?, value));
            }
            Instruction::Mov { dst, src } => {
                code.extend_from_slice(&mov_reg(temp(dst)?, temp(src)?));
            }
            Instruction::Add { dst, src } => {
                code.extend_from_slice(&add(temp(dst)?, temp(src)?));
            }
            Instruction::Mul { dst, src } => {
                code.extend_from_slice(&mul(temp(dst)?, temp(src)?));
            }
            Instruction::Store { slot: index, src } => {
                code.extend_from_slice(&mov_reg(slot(index)?, temp(src)?));
            }
            Instruction::Load { dst, slot: index } => {
                code.extend_from_slice(&mov_reg(temp(dst)?, slot(index)?));
            }
            Instruction::Exit => {
                code.extend_from_slice(&ret());
            }
            ref unsupported => {
                return Err(RillError::jit_error(format!(
                    "unsupported opcode for the JIT: {unsupported}"
                )));
            }
        }
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodings_match_the_reference_bytes() {
        assert_eq!(mov_imm32(0, 42), [0xb8, 42, 0, 0, 0]);
        assert_eq!(mov_imm32(3, 0x01020304), [0xbb, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(add(0, 1), [0x01, 0xc8]);
        assert_eq!(mul(2, 3), [0x0f, 0xaf, 0xd3]);
        assert_eq!(mov_reg(0, 1), [0x89, 0xc8]);
        assert_eq!(ret(), [0xc3]);
    }

    #[test]
    fn result_register_maps_to_eax() {
        let program = Program {
            instructions: vec![Instruction::MovImm64 { dst: RESULT, imm: 7 }, Instruction::Exit],
            strings: Vec::new(),
        };
        let code = emit(&program).unwrap();
        // prologue zero, mov eax 7, ret
        assert_eq!(code, vec![0xb8, 0, 0, 0, 0, 0xb8, 7, 0, 0, 0, 0xc3]);
    }

    #[test]
    fn wide_immediates_are_rejected() {
        let program = Program {
            instructions: vec![
                Instruction::MovImm64 { dst: 3, imm: 1 << 40 },
                Instruction::Exit,
            ],
            strings: Vec::new(),
        };
        assert!(emit(&program).is_err());
    }

    #[test]
    fn control_flow_aborts_the_attempt() {
        let program = Program {
            instructions: vec![Instruction::Jmp { target: 0 }, Instruction::Exit],
            strings: Vec::new(),
        };
        assert!(emit(&program).is_err());
    }

    #[test]
    fn bank_exhaustion_aborts_the_attempt() {
        let program = Program {
            instructions: vec![Instruction::MovImm64 { dst: 9, imm: 1 }, Instruction::Exit],
            strings: Vec::new(),
        };
        assert!(emit(&program).is_err());
        let program = Program {
            instructions: vec![
                Instruction::MovImm64 { dst: 3, imm: 1 },
                Instruction::Store { slot: 5, src: 3 },
                Instruction::Exit,
            ],
            strings: Vec::new(),
        };
        assert!(emit(&program).is_err());
    }
}
