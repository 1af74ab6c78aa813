//! mmio_decode: memory access decoding for faulting x86/x86-64 instructions
//!
//! A trap handler that watches memory-mapped I/O regions gets control after
//! an instruction touches a monitored page. To log or emulate the access it
//! needs to know what the instruction was moving. This crate answers that
//! for the MOV family without executing anything.
//!
//! # Features
//!
//! - **Narrow**: Only `MOV r/m, r`, `MOV r, r/m`, `MOV r/m, imm`, `MOVZX` and
//!   `MOVSX` are recognized. Everything else is reported, never guessed.
//! - **Pure**: Every query is a function of the instruction bytes (and a
//!   register snapshot). No global state, safe to call from many threads.
//! - **Typed failures**: A register holding zero and an undecodable
//!   instruction are never confused.
//! - **Both modes**: 32-bit ([`Ia32`]) and 64-bit ([`Amd64`]) rules.
//!
//! # Example
//!
//! ```rust
//! use mmio_decode::*;
//!
//! // mov byte [0x44332211], 0x7f
//! let code = [0xC6, 0x05, 0x11, 0x22, 0x33, 0x44, 0x7F];
//! assert_eq!(access_type::<Ia32>(&code)?, AccessKind::ImmediateWrite);
//! assert_eq!(mem_width::<Ia32>(&code)?.bytes(), 1);
//! assert_eq!(imm_value::<Ia32>(&code)?, 0x7F);
//!
//! // mov [rax], r9
//! let code = [0x4C, 0x89, 0x08];
//! let regs = RegisterSnapshot::new().with(Gpr::R9, 0xCAFE);
//! let access = decode_access::<Amd64, _>(&code, &regs)?;
//! assert_eq!(access.stored_value(), Some(0xCAFE));
//!
//! // nop is not a memory access instruction
//! assert_eq!(mem_width::<Amd64>(&[0x90]), Err(DecodeError::UnrecognizedOpcode));
//! # Ok::<(), DecodeError>(())
//! ```

pub mod disasm;
pub mod error;
pub mod instruction;
pub mod mode;
pub mod modrm;
pub mod opcode;
pub mod prefix;
pub mod registers;
pub mod tables;
#[cfg(all(windows, target_arch = "x86_64"))]
pub mod trap;

// Re-export the main API
pub use disasm::{
    InstructionHeader, access_type, decode_access, imm_value, mem_width, reg_value, reg_width,
    register_operand,
};
pub use error::{DecodeError, Result};
pub use instruction::MemoryAccess;
pub use mode::{Amd64, Ia32, Mode, NativeMode};
pub use opcode::Opcode;
pub use prefix::DecodeFlags;
pub use registers::{Gpr, RegisterFile, RegisterOperand, RegisterSnapshot, register_value};
pub use tables::{AccessKind, OperandWidth};
#[cfg(all(windows, target_arch = "x86_64"))]
pub use trap::{FaultDirection, FaultSite};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Check if the current platform can capture faults through the `trap` module
pub fn is_supported() -> bool {
    cfg!(target_arch = "x86_64") && cfg!(target_os = "windows")
}

/// Get library information
pub fn get_version() -> &'static str {
    VERSION
}
