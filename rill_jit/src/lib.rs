//! Just-in-time translation of Rill bytecode into native machine code.
//!
//! The instruction selector supports a straight-line subset of the bytecode:
//! `MovImm64`, `Mov`, `Add`, `Mul`, `Store`, `Load` and `Exit` (emitted as
//! `ret`). Any other opcode aborts the attempt with an error and the caller
//! falls back to the interpreter; nothing is mapped for a failed attempt.
//!
//! Bytecode register 2 (the program result) maps to the ABI return register,
//! temporaries map to caller-saved scratch registers, and `Store`/`Load`
//! slots map to a second register bank growing from the other end of the
//! machine register file. A program that exhausts either bank falls back.

// The encoders are portable byte emitters; both compile everywhere so their
// output can be unit-tested on any host. Only the target's encoder is wired
// into `compile`.
pub mod aarch64;
mod page;
pub mod x86_64;

use rill_bytecode::Program;
use rill_common::RillResult;

/// A callable page of emitted machine code. The mapping is released when the
/// function is dropped.
pub struct JitFunction {
    page: memmap2::Mmap,
}

impl JitFunction {
    /// Invoke the emitted code. The signature is fixed: no arguments, a
    /// 64-bit signed result.
    pub fn call(&self) -> i64 {
        let entry: extern "C" fn() -> i64 =
            // The page was produced by `compile` below and transitioned
            // read+execute; its first byte is the function entry.
            unsafe { std::mem::transmute(self.page.as_ptr()) };
        entry()
    }
}

/// Translate a program for the build target. Returns an error when the
/// target ISA is unsupported or the program uses opcodes outside the JIT
/// subset; the caller is expected to fall back to the interpreter.
pub fn compile(program: &Program) -> RillResult<JitFunction> {
    let bytes = emit_for_target(program)?;

    #[cfg(feature = "dump-jit")]
    {
        if let Err(error) = std::fs::write("jit_dump.bin", &bytes) {
            log::warn!(target: "jit", "failed to write jit_dump.bin: {error}");
        } else {
            log::info!(target: "jit", "wrote {} bytes to jit_dump.bin", bytes.len());
        }
    }

    let page = page::map_executable(&bytes)?;
    log::debug!(target: "jit", "mapped {} bytes of machine code", bytes.len());
    Ok(JitFunction { page })
}

#[cfg(target_arch = "x86_64")]
fn emit_for_target(program: &Program) -> RillResult<Vec<u8>> {
    log::debug!(target: "jit", "compiling for x86_64");
    x86_64::emit(program)
}

#[cfg(target_arch = "aarch64")]
fn emit_for_target(program: &Program) -> RillResult<Vec<u8>> {
    log::debug!(target: "jit", "compiling for aarch64");
    aarch64::emit(program)
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn emit_for_target(_program: &Program) -> RillResult<Vec<u8>> {
    Err(rill_common::RillError::jit_error("no JIT backend for this architecture"))
}
