//! Opcode classification tables
//!
//! Fixed opcode sets for the MOV-class instructions a trap handler has to
//! emulate. The 32-bit and 64-bit encodings differ only in which opcodes
//! may be widened to 64 bits, so each mode gets its own [`OpcodeTables`].

use crate::opcode::Opcode;
use crate::prefix::DecodeFlags;

/// How an instruction touches memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    /// Memory is read into a register (`MOV r, m`, `MOVZX`, `MOVSX`)
    RegisterRead,
    /// A register is written to memory (`MOV m, r`)
    RegisterWrite,
    /// An immediate is written to memory (`MOV m, imm`)
    ImmediateWrite,
    /// Not a supported memory access instruction
    Others,
}

impl AccessKind {
    /// `false` only for [`AccessKind::Others`]
    #[inline]
    pub fn is_recognized(self) -> bool {
        self != AccessKind::Others
    }

    /// The instruction carries a ModR/M.reg register operand
    #[inline]
    pub fn has_register_operand(self) -> bool {
        matches!(self, AccessKind::RegisterRead | AccessKind::RegisterWrite)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccessKind::RegisterRead => "register_read",
            AccessKind::RegisterWrite => "register_write",
            AccessKind::ImmediateWrite => "immediate_write",
            AccessKind::Others => "others",
        }
    }
}

/// Operand width in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum OperandWidth {
    Byte = 1,
    Word = 2,
    Dword = 4,
    Qword = 8,
}

impl OperandWidth {
    #[inline]
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// Mask selecting the low `bytes()` bytes of a 64-bit value
    #[inline]
    pub fn mask(self) -> u64 {
        match self {
            OperandWidth::Byte => 0xFF,
            OperandWidth::Word => 0xFFFF,
            OperandWidth::Dword => 0xFFFF_FFFF,
            OperandWidth::Qword => u64::MAX,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(OperandWidth::Byte),
            2 => Some(OperandWidth::Word),
            4 => Some(OperandWidth::Dword),
            8 => Some(OperandWidth::Qword),
            _ => None,
        }
    }
}

/// Width class of the register (or immediate) operand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegWidthClass {
    /// Always one byte
    Byte,
    /// 2, 4 or 8 bytes depending on prefixes
    Variable,
}

impl RegWidthClass {
    pub fn resolve(self, flags: DecodeFlags) -> OperandWidth {
        match self {
            RegWidthClass::Byte => OperandWidth::Byte,
            RegWidthClass::Variable => variable_width(flags),
        }
    }
}

/// Width class of the memory operand.
///
/// MOVZX/MOVSX read a narrower memory operand than the register they fill,
/// which is why this is a separate table set from [`RegWidthClass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemWidthClass {
    /// Always one byte
    Byte,
    /// Always two bytes
    Word,
    /// Four bytes, or two with an operand-size override
    Dword,
    /// 2, 4 or 8 bytes depending on prefixes
    Variable,
}

impl MemWidthClass {
    pub fn resolve(self, flags: DecodeFlags) -> OperandWidth {
        match self {
            MemWidthClass::Byte => OperandWidth::Byte,
            MemWidthClass::Word => OperandWidth::Word,
            MemWidthClass::Dword => {
                if flags.contains(DecodeFlags::OPERAND_SIZE_OVERRIDE) {
                    OperandWidth::Word
                } else {
                    OperandWidth::Dword
                }
            }
            MemWidthClass::Variable => variable_width(flags),
        }
    }
}

// 0x66 is checked before REX.W
fn variable_width(flags: DecodeFlags) -> OperandWidth {
    if flags.contains(DecodeFlags::OPERAND_SIZE_OVERRIDE) {
        OperandWidth::Word
    } else if flags.contains(DecodeFlags::OPERAND_SIZE_EXTENDED) {
        OperandWidth::Qword
    } else {
        OperandWidth::Dword
    }
}

/// The full table set of one addressing mode
#[derive(Debug)]
pub struct OpcodeTables {
    pub reg_read: &'static [Opcode],
    pub reg_write: &'static [Opcode],
    pub imm_write: &'static [Opcode],
    /// Register operand: byte only
    pub reg_width8: &'static [Opcode],
    /// Register operand: width selected by prefixes
    pub reg_width_var: &'static [Opcode],
    /// Memory operand: byte only
    pub mem_width8: &'static [Opcode],
    /// Memory operand: word only
    pub mem_width16: &'static [Opcode],
    /// Memory operand: dword or word
    pub mem_width32: &'static [Opcode],
    /// Memory operand: qword, dword or word
    pub mem_width64: &'static [Opcode],
}

impl OpcodeTables {
    /// Classify an opcode.
    ///
    /// Tables are searched read, write, immediate; the first hit wins.
    pub fn classify(&self, opcode: Opcode) -> AccessKind {
        if self.reg_read.contains(&opcode) {
            AccessKind::RegisterRead
        } else if self.reg_write.contains(&opcode) {
            AccessKind::RegisterWrite
        } else if self.imm_write.contains(&opcode) {
            AccessKind::ImmediateWrite
        } else {
            AccessKind::Others
        }
    }

    pub fn reg_width_class(&self, opcode: Opcode) -> Option<RegWidthClass> {
        if self.reg_width8.contains(&opcode) {
            Some(RegWidthClass::Byte)
        } else if self.reg_width_var.contains(&opcode) {
            Some(RegWidthClass::Variable)
        } else {
            None
        }
    }

    pub fn mem_width_class(&self, opcode: Opcode) -> Option<MemWidthClass> {
        if self.mem_width8.contains(&opcode) {
            Some(MemWidthClass::Byte)
        } else if self.mem_width16.contains(&opcode) {
            Some(MemWidthClass::Word)
        } else if self.mem_width32.contains(&opcode) {
            Some(MemWidthClass::Dword)
        } else if self.mem_width64.contains(&opcode) {
            Some(MemWidthClass::Variable)
        } else {
            None
        }
    }
}

const MOV_RM8_R8: Opcode = Opcode::one_byte(0x88);
const MOV_RM_R: Opcode = Opcode::one_byte(0x89);
const MOV_R8_RM8: Opcode = Opcode::one_byte(0x8A);
const MOV_R_RM: Opcode = Opcode::one_byte(0x8B);
const MOV_RM8_IMM8: Opcode = Opcode::one_byte(0xC6);
const MOV_RM_IMM: Opcode = Opcode::one_byte(0xC7);
const MOVZX_R_RM8: Opcode = Opcode::two_byte(0xB6);
const MOVZX_R_RM16: Opcode = Opcode::two_byte(0xB7);
const MOVSX_R_RM8: Opcode = Opcode::two_byte(0xBE);
const MOVSX_R_RM16: Opcode = Opcode::two_byte(0xBF);

const REG_READ: &[Opcode] = &[
    MOV_R8_RM8,
    MOV_R_RM,
    MOVZX_R_RM8,
    MOVZX_R_RM16,
    MOVSX_R_RM8,
    MOVSX_R_RM16,
];
const REG_WRITE: &[Opcode] = &[MOV_RM8_R8, MOV_RM_R];
const IMM_WRITE: &[Opcode] = &[MOV_RM8_IMM8, MOV_RM_IMM];
const REG_WIDTH8: &[Opcode] = &[MOV_RM8_R8, MOV_R8_RM8, MOV_RM8_IMM8];
const REG_WIDTH_VAR: &[Opcode] = &[
    MOV_RM_R,
    MOV_R_RM,
    MOV_RM_IMM,
    MOVZX_R_RM8,
    MOVZX_R_RM16,
    MOVSX_R_RM8,
    MOVSX_R_RM16,
];
const MEM_WIDTH8: &[Opcode] = &[MOV_RM8_R8, MOV_R8_RM8, MOV_RM8_IMM8, MOVZX_R_RM8, MOVSX_R_RM8];
const MEM_WIDTH16: &[Opcode] = &[MOVZX_R_RM16, MOVSX_R_RM16];

/// IA-32 tables (Intel SDM vol. 2, MOV/MOVZX/MOVSX)
pub mod ia32 {
    use super::*;

    /// Legacy prefixes: lock/rep, segment overrides, operand and address size
    pub const PREFIXES: &[u8] = &[
        0xF0, 0xF2, 0xF3, 0x2E, 0x36, 0x3E, 0x26, 0x64, 0x65, 0x66, 0x67,
    ];

    pub const TABLES: OpcodeTables = OpcodeTables {
        reg_read: REG_READ,
        reg_write: REG_WRITE,
        imm_write: IMM_WRITE,
        reg_width8: REG_WIDTH8,
        reg_width_var: REG_WIDTH_VAR,
        mem_width8: MEM_WIDTH8,
        mem_width16: MEM_WIDTH16,
        mem_width32: &[MOV_RM_R, MOV_R_RM, MOV_RM_IMM],
        mem_width64: &[],
    };
}

/// AMD64 tables (AMD64 APM vol. 3, appendix A)
pub mod amd64 {
    use super::*;

    /// Legacy prefixes followed by the sixteen REX prefixes
    pub const PREFIXES: &[u8] = &[
        0x66, 0x67, 0x2E, 0x3E, 0x26, 0x64, 0x65, 0x36, 0xF0, 0xF3, 0xF2, //
        0x40, 0x41, 0x42, 0x43, 0x44, 0x45, 0x46, 0x47, //
        0x48, 0x49, 0x4A, 0x4B, 0x4C, 0x4D, 0x4E, 0x4F,
    ];

    pub const TABLES: OpcodeTables = OpcodeTables {
        reg_read: REG_READ,
        reg_write: REG_WRITE,
        imm_write: IMM_WRITE,
        reg_width8: REG_WIDTH8,
        reg_width_var: REG_WIDTH_VAR,
        mem_width8: MEM_WIDTH8,
        mem_width16: MEM_WIDTH16,
        // MOV r/m, imm32 is sign-extended under REX.W; memory stays 4 bytes wide
        mem_width32: &[MOV_RM_IMM],
        mem_width64: &[MOV_RM_R, MOV_R_RM],
    };
}
