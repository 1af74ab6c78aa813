//! Opcode reading
//!
//! Reads the one byte or `0F`-escaped two byte opcode that follows the
//! prefix run. Any byte value is accepted here; meaning comes from the
//! classification tables.

use crate::error::{DecodeError, Result};
use std::fmt;

/// Two byte opcode escape marker
pub const TWO_BYTE_ESCAPE: u8 = 0x0F;

/// An 8-bit legacy opcode or a 16-bit `0F xx` opcode.
///
/// Two byte opcodes keep the escape marker in the high byte, so `0F B6`
/// (MOVZX r, r/m8) is `Opcode(0x0FB6)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Opcode(pub u16);

impl Opcode {
    /// Single byte opcode
    pub const fn one_byte(byte: u8) -> Self {
        Self(byte as u16)
    }

    /// `0F`-escaped opcode
    pub const fn two_byte(second: u8) -> Self {
        Self(((TWO_BYTE_ESCAPE as u16) << 8) | second as u16)
    }

    #[inline]
    pub const fn is_two_byte(self) -> bool {
        (self.0 >> 8) as u8 == TWO_BYTE_ESCAPE
    }

    /// Number of instruction bytes the opcode occupies
    #[inline]
    pub const fn encoded_len(self) -> usize {
        if self.is_two_byte() { 2 } else { 1 }
    }

    /// Raw value
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_two_byte() {
            write!(f, "0x{:04X}", self.0)
        } else {
            write!(f, "0x{:02X}", self.0)
        }
    }
}

/// Read the opcode at the start of `code`.
///
/// Returns the number of bytes consumed and the opcode.
pub fn read_opcode(code: &[u8]) -> Result<(usize, Opcode)> {
    match code {
        [TWO_BYTE_ESCAPE, second, ..] => Ok((2, Opcode::two_byte(*second))),
        [TWO_BYTE_ESCAPE] | [] => Err(DecodeError::Truncated),
        [first, ..] => Ok((1, Opcode::one_byte(*first))),
    }
}
