//! Error handling for mmio_decode
//!
//! Every query returns a typed failure instead of a zero value, so callers
//! can tell "the register held 0" apart from "the instruction could not be
//! decoded".

use std::fmt;

/// Result type for decode operations
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Failure codes returned by decode operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum DecodeError {
    /// Unknown error (should not be returned)
    Unknown = -1,

    /// The opcode is not in any classification or width table
    UnrecognizedOpcode = 1,

    /// The ModR/M byte encodes a register-direct operand (mod == 3)
    NotAMemoryOperand = 2,

    /// The register index and width do not name an architectural register
    UnsupportedRegister = 3,

    /// The byte view ended before the field being read
    Truncated = 4,

    /// Decoding would run past the 15 byte instruction length limit
    InstructionTooLong = 5,
}

impl DecodeError {
    /// Convert error to string representation
    pub fn as_str(self) -> &'static str {
        match self {
            DecodeError::Unknown => "Unknown error",
            DecodeError::UnrecognizedOpcode => "Unrecognized opcode",
            DecodeError::NotAMemoryOperand => "Not a memory access instruction",
            DecodeError::UnsupportedRegister => "Unsupported register",
            DecodeError::Truncated => "Instruction bytes truncated",
            DecodeError::InstructionTooLong => "Instruction too long",
        }
    }

    /// Convert from a numeric error code
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => DecodeError::UnrecognizedOpcode,
            2 => DecodeError::NotAMemoryOperand,
            3 => DecodeError::UnsupportedRegister,
            4 => DecodeError::Truncated,
            5 => DecodeError::InstructionTooLong,
            _ => DecodeError::Unknown,
        }
    }

    /// Numeric code of this error
    pub fn code(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::error::Error for DecodeError {}
