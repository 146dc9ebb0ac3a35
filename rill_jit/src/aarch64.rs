//! aarch64 instruction selection.
//!
//! Fixed 32-bit instruction words. Wide constants are lowered as a
//! `movz` plus up to three `movk` halfword writes, so any 64-bit immediate
//! can be materialized. Numbering is the architectural one: x0 is the ABI
//! return register.

use rill_bytecode::{Instruction, Program, Reg, FIRST_TEMP, RESULT};
use rill_common::{RillError, RillResult};

const X0: u8 = 0;
/// Temporaries r3.. map to x1..x7.
const TEMP_BANK: [u8; 7] = [1, 2, 3, 4, 5, 6, 7];
/// Stack slots map to x15 downwards.
const SLOT_BANK: [u8; 7] = [15, 14, 13, 12, 11, 10, 9];

fn temp(reg: Reg) -> RillResult<u8> {
    if reg == RESULT {
        return Ok(X0);
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

/// MOVZ Xd, #imm16, LSL #(hw * 16)
pub fn movz(rd: u8, imm16: u16, hw: u8) -> u32 {
    0xd280_0000 | (u32::from(hw & 0b11) << 21) | (u32::from(imm16) << 5) | u32::from(rd & 0b11111)
}

/// MOVK Xd, #imm16, LSL #(hw * 16)
pub fn movk(rd: u8, imm16: u16, hw: u8) -> u32 {
    0xf280_0000 | (u32::from(hw & 0b11) << 21) | (u32::from(imm16) << 5) | u32::from(rd & 0b11111)
}

/// Materialize a full 64-bit constant: `movz` for the first halfword, `movk`
/// for every further nonzero halfword.
pub fn mov_imm64(rd: u8, value: u64) -> Vec<u32> {
    if value == 0 {
        return vec![movz(rd, 0, 0)];
    }
    let mut words = Vec::with_capacity(4);
    for hw in 0..4u8 {
        let half = ((value >> (16 * hw)) & 0xffff) as u16;
        if half == 0 {
            continue;
        }
        // The movz clears the remaining halfwords, so zero halves are skipped.
        if words.is_empty() {
            words.push(movz(rd, half, hw));
        } else {
            words.push(movk(rd, half, hw));
        }
    }
    words
}

/// ORR Xd, XZR, Xm — register move
pub fn mov_reg(rd: u8, rm: u8) -> u32 {
    0xaa00_03e0 | (u32::from(rm & 0b11111) << 16) | u32::from(rd & 0b11111)
}

/// ADD Xd, Xd, Xm
pub fn add(rd: u8, rm: u8) -> u32 {
    0x8b00_0000
        | (u32::from(rm & 0b11111) << 16)
        | (u32::from(rd & 0b11111) << 5)
        | u32::from(rd & 0b11111)
}

/// MUL Xd, Xd, Xm (MADD with XZR)
pub fn mul(rd: u8, rm: u8) -> u32 {
    0x9b00_7c00
        | (u32::from(rm & 0b11111) << 16)
        | (u32::from(rd & 0b11111) << 5)
        | u32::from(rd & 0b11111)
}

/// RET X30
pub fn ret() -> u32 {
    0xd65f_03c0
}

/// Lower a program to machine code, or fail on the first opcode outside the
/// supported subset.
pub fn emit(program: &Program) -> RillResult<Vec<u8>> {
    let mut words: Vec<u32> = Vec::with_capacity(program.len() + 2);
    // Match the interpreter's zeroed register bank for the result register.
    words.push(movz(X0, 0, 0));

    for instruction in &program.instructions {
        match *instruction {
            Instruction::MovImm64 { dst, imm } => {
                words.extend(mov_imm64(temp(dst)?, imm as u64));
            }
            Instruction::Mov { dst, src } => words.push(mov_reg(temp(dst)?, temp(src)?)),
            Instruction::Add { dst, src } => words.push(add(temp(dst)?, temp(src)?)),
            Instruction::Mul { dst, src } => words.push(mul(temp(dst)?, temp(src)?)),
            Instruction::Store { slot: index, src } => {
                words.push(mov_reg(slot(index)?, temp(src)?));
            }
            Instruction::Load { dst, slot: index } => {
                words.push(mov_reg(temp(dst)?, slot(index)?));
            }
            Instruction::Exit => words.push(ret()),
            ref unsupported => {
                return Err(RillError::jit_error(format!(
                    "unsupported opcode for the JIT: {unsupported}"
                )));
            }
        }
    }

    let mut bytes = Vec::with_capacity(words.len() * 4);
    for word in words {
        bytes.extend_from_slice(&word.to_le_bytes());
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movz_encodes_small_immediates() {
        assert_eq!(movz(0, 42, 0), 0xd280_0540);
        assert_eq!(movz(3, 0, 0), 0xd280_0003);
    }

    #[test]
    fn wide_constants_lower_to_movz_plus_movk() {
        let words = mov_imm64(1, 0x0001_0002_0003_0004);
        assert_eq!(words.len(), 4);
        assert_eq!(words[0], movz(1, 4, 0));
        assert_eq!(words[1], movk(1, 3, 1));
        assert_eq!(words[2], movk(1, 2, 2));
        assert_eq!(words[3], movk(1, 1, 3));
    }

    #[test]
    fn zero_constant_is_a_single_movz() {
        assert_eq!(mov_imm64(2, 0), vec![movz(2, 0, 0)]);
    }

    #[test]
    fn sparse_constants_skip_zero_halfwords() {
        let words = mov_imm64(0, 0x0000_beef_0000_0000);
        assert_eq!(words, vec![movz(0, 0xbeef, 2)]);
    }

    #[test]
    fn reference_encodings() {
        assert_eq!(ret(), 0xd65f_03c0);
        assert_eq!(add(0, 1), 0x8b01_0000);
        assert_eq!(mul(0, 1), 0x9b01_7c00);
        assert_eq!(mov_reg(2, 3), 0xaa03_03e2);
    }

    #[test]
    fn control_flow_aborts_the_attempt() {
        let program = Program {
            instructions: vec![Instruction::Ret, Instruction::Exit],
            strings: Vec::new(),
        };
        assert!(emit(&program).is_err());
    }
}
