//! Memory access decoder for MOV-class instructions
//!
//! Each query re-runs prefix scanning and opcode reading over the given
//! bytes, so every call is an independent pure function of its inputs.

use crate::error::{DecodeError, Result};
use crate::instruction::MemoryAccess;
use crate::mode::Mode;
use crate::modrm::{ModRm, walk_memory_operand};
use crate::opcode::{Opcode, read_opcode};
use crate::prefix::{DecodeFlags, MAX_INSTRUCTION_LEN, scan_prefixes};
use crate::registers::{RegisterFile, RegisterOperand};
use crate::tables::{AccessKind, OperandWidth};

/// Prefixes and opcode of one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionHeader {
    /// Number of prefix bytes
    pub prefix_len: usize,
    pub flags: DecodeFlags,
    pub opcode: Opcode,
}

impl InstructionHeader {
    /// Scan prefixes and read the opcode at the start of `code`
    pub fn parse<M: Mode>(code: &[u8]) -> Result<Self> {
        let (prefix_len, flags) = scan_prefixes::<M>(code)?;
        let (_, opcode) = read_opcode(&code[prefix_len..])?;
        log::trace!(
            "{}: opcode {opcode} after {prefix_len} prefix bytes, flags {:?}",
            M::NAME,
            flags
        );
        Ok(Self {
            prefix_len,
            flags,
            opcode,
        })
    }

    /// Offset of the byte following the opcode (the ModR/M byte)
    #[inline]
    pub fn modrm_offset(&self) -> usize {
        self.prefix_len + self.opcode.encoded_len()
    }

    pub fn classify<M: Mode>(&self) -> AccessKind {
        M::classify(self.opcode)
    }

    /// Width of the register operand, which is also the immediate width
    pub fn reg_width<M: Mode>(&self) -> Result<OperandWidth> {
        match M::reg_width_class(self.opcode) {
            Some(class) => Ok(class.resolve(self.flags)),
            None => Err(unrecognized(self.opcode)),
        }
    }

    /// Width of the memory operand
    pub fn mem_width<M: Mode>(&self) -> Result<OperandWidth> {
        match M::mem_width_class(self.opcode) {
            Some(class) => Ok(class.resolve(self.flags)),
            None => Err(unrecognized(self.opcode)),
        }
    }

    fn modrm(&self, code: &[u8]) -> Result<ModRm> {
        code.get(self.modrm_offset())
            .copied()
            .map(ModRm)
            .ok_or(DecodeError::Truncated)
    }

    /// Register operand of a register read/write instruction
    pub fn register_operand<M: Mode>(&self, code: &[u8]) -> Result<RegisterOperand> {
        if !self.classify::<M>().has_register_operand() {
            log::warn!("not a register instruction, opcode {}", self.opcode);
            return Err(DecodeError::UnrecognizedOpcode);
        }
        let index = self
            .modrm(code)?
            .register_index(self.flags.register_extension_bit());
        RegisterOperand::select::<M>(index, self.reg_width::<M>()?, self.flags)
    }

    /// Immediate of an immediate write instruction, with the total
    /// instruction length
    fn immediate<M: Mode>(&self, code: &[u8]) -> Result<(u64, usize)> {
        if self.classify::<M>() != AccessKind::ImmediateWrite {
            log::warn!("not an immediate instruction, opcode {}", self.opcode);
            return Err(DecodeError::UnrecognizedOpcode);
        }
        let width = self.reg_width::<M>()?;
        let start = self.modrm_offset();
        let operand = walk_memory_operand::<M>(&code[start.min(code.len())..], self.flags)?;
        let offset = start + operand.encoded_len();
        let value = read_immediate(code.get(offset..).unwrap_or_default(), width)?;
        Ok((value, offset + width.bytes()))
    }
}

fn unrecognized(opcode: Opcode) -> DecodeError {
    log::warn!("unknown opcode {opcode}");
    DecodeError::UnrecognizedOpcode
}

/// Little-endian unsigned read of exactly `width` bytes
pub fn read_immediate(code: &[u8], width: OperandWidth) -> Result<u64> {
    let bytes = code.get(..width.bytes()).ok_or(DecodeError::Truncated)?;
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(u64::from_le_bytes(buf))
}

fn check_length(len: usize) -> Result<usize> {
    if len > MAX_INSTRUCTION_LEN {
        log::warn!("decoded length {len} exceeds instruction length limit");
        Err(DecodeError::InstructionTooLong)
    } else {
        Ok(len)
    }
}

/// Classify how the instruction at the start of `code` accesses memory.
///
/// Opcodes outside the supported MOV subset are [`AccessKind::Others`];
/// only unreadable input is an error.
pub fn access_type<M: Mode>(code: &[u8]) -> Result<AccessKind> {
    Ok(InstructionHeader::parse::<M>(code)?.classify::<M>())
}

/// Width in bytes of the register (and immediate) operand
pub fn reg_width<M: Mode>(code: &[u8]) -> Result<OperandWidth> {
    InstructionHeader::parse::<M>(code)?.reg_width::<M>()
}

/// Width in bytes of the memory operand
pub fn mem_width<M: Mode>(code: &[u8]) -> Result<OperandWidth> {
    InstructionHeader::parse::<M>(code)?.mem_width::<M>()
}

/// The register a register read/write instruction moves to or from
pub fn register_operand<M: Mode>(code: &[u8]) -> Result<RegisterOperand> {
    InstructionHeader::parse::<M>(code)?.register_operand::<M>(code)
}

/// Value in `regs` of the register a register read/write instruction names
pub fn reg_value<M: Mode, R: RegisterFile + ?Sized>(code: &[u8], regs: &R) -> Result<u64> {
    register_operand::<M>(code).map(|op| op.read(regs))
}

/// Immediate of an immediate write instruction
pub fn imm_value<M: Mode>(code: &[u8]) -> Result<u64> {
    let header = InstructionHeader::parse::<M>(code)?;
    let (value, len) = header.immediate::<M>(code)?;
    check_length(len)?;
    Ok(value)
}

/// Fully decode the memory access of the instruction at the start of
/// `code`, reading register operands from `regs`.
pub fn decode_access<M: Mode, R: RegisterFile + ?Sized>(
    code: &[u8],
    regs: &R,
) -> Result<MemoryAccess> {
    let header = InstructionHeader::parse::<M>(code)?;
    let kind = header.classify::<M>();
    if !kind.is_recognized() {
        return Err(unrecognized(header.opcode));
    }

    let mem_width = header.mem_width::<M>()?;
    let start = header.modrm_offset();
    let code_at_modrm = code.get(start..).unwrap_or_default();
    let operand = walk_memory_operand::<M>(code_at_modrm, header.flags)?;
    let displacement = operand.displacement(code_at_modrm)?;

    let mut access = MemoryAccess {
        mode: M::NAME,
        prefix_len: header.prefix_len,
        flags: header.flags,
        opcode: header.opcode,
        kind,
        mem_width,
        register: None,
        register_value: None,
        immediate: None,
        displacement,
        len: start + operand.encoded_len(),
    };

    if kind == AccessKind::ImmediateWrite {
        let (value, len) = header.immediate::<M>(code)?;
        access.immediate = Some(value);
        access.len = len;
    } else {
        let register = header.register_operand::<M>(code)?;
        access.register = Some(register);
        access.register_value = Some(register.read(regs));
    }
    check_length(access.len)?;

    log::debug!(
        "{}: {} {} width {} len {}",
        M::NAME,
        kind.as_str(),
        header.opcode,
        mem_width.bytes(),
        access.len
    );
    Ok(access)
}
