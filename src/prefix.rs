//! Prefix scanning
//!
//! Skips the contiguous run of legacy (and, in 64-bit mode, REX) prefixes at
//! the start of an instruction and records the ones that change operand
//! width or register selection.

use crate::error::{DecodeError, Result};
use crate::mode::Mode;
use bitflags::bitflags;

/// Architectural limit on the length of one instruction
pub const MAX_INSTRUCTION_LEN: usize = 15;

/// Operand-size override prefix
pub const PREFIX_OPERAND_SIZE: u8 = 0x66;

/// Address-size override prefix
pub const PREFIX_ADDRESS_SIZE: u8 = 0x67;

const REX_MASK: u8 = 0xF0;
const REX_BASE: u8 = 0x40;
const REX_W: u8 = 0x08;
const REX_R: u8 = 0x04;

bitflags! {
    /// Prefix state of one instruction
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DecodeFlags: u8 {
        /// 0x66 seen
        const OPERAND_SIZE_OVERRIDE = 1 << 0;
        /// REX.W seen
        const OPERAND_SIZE_EXTENDED = 1 << 1;
        /// REX.R seen
        const REGISTER_EXTENSION    = 1 << 2;
        /// Any REX prefix seen
        const REX                   = 1 << 3;
        /// 0x67 seen
        const ADDRESS_SIZE_OVERRIDE = 1 << 4;
    }
}

impl DecodeFlags {
    /// The REX.R bit as the value to OR into bit 3 of a register index
    #[inline]
    pub fn register_extension_bit(self) -> u8 {
        if self.contains(DecodeFlags::REGISTER_EXTENSION) { 1 } else { 0 }
    }
}

/// Scan the prefix run at the start of `code`.
///
/// Returns the number of prefix bytes and the flags they set. Stops at the
/// first byte that is not a prefix of mode `M`, or at the end of `code`.
pub fn scan_prefixes<M: Mode>(code: &[u8]) -> Result<(usize, DecodeFlags)> {
    let mut flags = DecodeFlags::empty();
    let mut pos = 0;

    while let Some(&byte) = code.get(pos) {
        if !M::is_prefix(byte) {
            break;
        }

        match byte {
            PREFIX_OPERAND_SIZE => flags |= DecodeFlags::OPERAND_SIZE_OVERRIDE,
            PREFIX_ADDRESS_SIZE => flags |= DecodeFlags::ADDRESS_SIZE_OVERRIDE,
            b if M::HAS_REX && (b & REX_MASK) == REX_BASE => {
                flags |= DecodeFlags::REX;
                if b & REX_W != 0 {
                    flags |= DecodeFlags::OPERAND_SIZE_EXTENDED;
                }
                if b & REX_R != 0 {
                    flags |= DecodeFlags::REGISTER_EXTENSION;
                }
            }
            _ => {} // segment override, lock, rep
        }

        pos += 1;
        // At least one opcode byte has to follow
        if pos >= MAX_INSTRUCTION_LEN {
            log::warn!("prefix run of {pos} bytes exceeds instruction length limit");
            return Err(DecodeError::InstructionTooLong);
        }
    }

    Ok((pos, flags))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Amd64, Ia32};

    #[test]
    fn no_prefixes() {
        assert_eq!(
            scan_prefixes::<Amd64>(&[0x8B, 0x00]),
            Ok((0, DecodeFlags::empty()))
        );
    }

    #[test]
    fn operand_size_override() {
        let (len, flags) = scan_prefixes::<Ia32>(&[0x66, 0x89, 0x00]).unwrap();
        assert_eq!(len, 1);
        assert_eq!(flags, DecodeFlags::OPERAND_SIZE_OVERRIDE);
    }

    #[test]
    fn segment_and_lock_prefixes_only_advance() {
        let (len, flags) = scan_prefixes::<Ia32>(&[0x2E, 0x64, 0xF0, 0x89, 0x00]).unwrap();
        assert_eq!(len, 3);
        assert!(flags.is_empty());
    }

    #[test]
    fn rex_w_and_r() {
        let (len, flags) = scan_prefixes::<Amd64>(&[0x4C, 0x89, 0x00]).unwrap();
        assert_eq!(len, 1);
        assert!(flags.contains(DecodeFlags::REX));
        assert!(flags.contains(DecodeFlags::OPERAND_SIZE_EXTENDED));
        assert!(flags.contains(DecodeFlags::REGISTER_EXTENSION));
        assert_eq!(flags.register_extension_bit(), 1);

        let (_, flags) = scan_prefixes::<Amd64>(&[0x40, 0x88, 0x00]).unwrap();
        assert_eq!(flags, DecodeFlags::REX);
        assert_eq!(flags.register_extension_bit(), 0);
    }

    #[test]
    fn rex_is_an_opcode_in_ia32() {
        // 0x48 is DEC EAX in 32-bit mode
        assert_eq!(
            scan_prefixes::<Ia32>(&[0x48, 0x89, 0x00]),
            Ok((0, DecodeFlags::empty()))
        );
    }

    #[test]
    fn scanning_stops_at_first_non_prefix() {
        // The trailing 0x66 belongs to the ModR/M/displacement bytes
        let (len, flags) = scan_prefixes::<Amd64>(&[0x3E, 0x8B, 0x66, 0x66]).unwrap();
        assert_eq!(len, 1);
        assert!(flags.is_empty());
    }

    #[test]
    fn address_size_override() {
        let (_, flags) = scan_prefixes::<Ia32>(&[0x67, 0x8B, 0x06]).unwrap();
        assert_eq!(flags, DecodeFlags::ADDRESS_SIZE_OVERRIDE);
    }

    #[test]
    fn overlong_prefix_run() {
        let code = [0x2E; 16];
        assert_eq!(
            scan_prefixes::<Amd64>(&code),
            Err(DecodeError::InstructionTooLong)
        );
        // Fourteen prefixes leave room for a one byte opcode
        let mut code = vec![0x2E; 14];
        code.push(0x90);
        assert_eq!(scan_prefixes::<Amd64>(&code), Ok((14, DecodeFlags::empty())));
    }

    #[test]
    fn prefixes_only_stop_at_end_of_input() {
        assert_eq!(
            scan_prefixes::<Amd64>(&[0x66, 0x48]),
            Ok((2, DecodeFlags::OPERAND_SIZE_OVERRIDE
                | DecodeFlags::REX
                | DecodeFlags::OPERAND_SIZE_EXTENDED))
        );
    }
}
