//! ModR/M and displacement walking
//!
//! Extracts the register field of the ModR/M byte and measures the
//! addressing bytes (SIB and displacement) that sit between ModR/M and a
//! trailing immediate.

use crate::error::{DecodeError, Result};
use crate::mode::Mode;
use crate::prefix::DecodeFlags;

const MOD_INDIRECT: u8 = 0;
const MOD_INDIRECT_DISP8: u8 = 1;
const MOD_INDIRECT_DISP32: u8 = 2;
const MOD_DIRECT: u8 = 3;
const RM_SIB: u8 = 4;
const RM_DISP32: u8 = 5;
const RM16_DISP16: u8 = 6;
const SIB_BASE_NONE: u8 = 5;

/// The addressing mode selected by ModR/M.mod
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mod {
    /// `[base]`, or an absolute/RIP-relative displacement for r/m == 5
    Indirect,
    /// `[base + disp8]`
    IndirectDisp8,
    /// `[base + disp32]` (`disp16` under 16-bit addressing)
    IndirectDisp32,
    /// Register operand, no memory access
    Direct,
}

/// A ModR/M byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModRm(pub u8);

impl From<u8> for ModRm {
    fn from(val: u8) -> Self {
        ModRm(val)
    }
}

impl ModRm {
    pub fn get_mod(self) -> Mod {
        match (self.0 >> 6) & 0x3 {
            MOD_INDIRECT => Mod::Indirect,
            MOD_INDIRECT_DISP8 => Mod::IndirectDisp8,
            MOD_INDIRECT_DISP32 => Mod::IndirectDisp32,
            MOD_DIRECT => Mod::Direct,
            _ => unreachable!("Mod has only two bits"),
        }
    }

    /// ModR/M.reg (bits 3..5)
    #[inline]
    pub fn reg(self) -> u8 {
        (self.0 >> 3) & 0x7
    }

    /// ModR/M.rm (bits 0..2)
    #[inline]
    pub fn rm(self) -> u8 {
        self.0 & 0x7
    }

    /// Register index named by the reg field, extended by REX.R
    #[inline]
    pub fn register_index(self, register_extension_bit: u8) -> u8 {
        self.reg() | ((register_extension_bit & 1) << 3)
    }
}

/// Split a ModR/M byte into its mode and (REX.R extended) register index.
pub fn decode_modrm(byte: u8, register_extension_bit: u8) -> (Mod, u8) {
    let modrm = ModRm(byte);
    (modrm.get_mod(), modrm.register_index(register_extension_bit))
}

/// Byte layout of a memory operand, starting at the ModR/M byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryOperand {
    pub modrm: ModRm,
    /// A SIB byte follows ModR/M
    pub has_sib: bool,
    /// Displacement size in bytes (0, 1, 2 or 4)
    pub displacement_len: usize,
}

impl MemoryOperand {
    /// ModR/M, SIB and displacement bytes together
    #[inline]
    pub fn encoded_len(&self) -> usize {
        1 + self.has_sib as usize + self.displacement_len
    }

    /// Read the displacement as a sign-extended value
    pub fn displacement(&self, code: &[u8]) -> Result<i64> {
        let start = 1 + self.has_sib as usize;
        let bytes = code
            .get(start..start + self.displacement_len)
            .ok_or(DecodeError::Truncated)?;
        Ok(match *bytes {
            [] => 0,
            [b] => b as i8 as i64,
            [b0, b1] => i16::from_le_bytes([b0, b1]) as i64,
            [b0, b1, b2, b3] => i32::from_le_bytes([b0, b1, b2, b3]) as i64,
            _ => unreachable!("displacement is 0, 1, 2 or 4 bytes"),
        })
    }
}

/// Walk the memory operand whose ModR/M byte starts `code`.
///
/// Fails with [`DecodeError::NotAMemoryOperand`] for register-direct forms.
pub fn walk_memory_operand<M: Mode>(code: &[u8], flags: DecodeFlags) -> Result<MemoryOperand> {
    let modrm = ModRm(*code.first().ok_or(DecodeError::Truncated)?);
    let r#mod = modrm.get_mod();

    if r#mod == Mod::Direct {
        log::warn!("not a memory access instruction, modrm=0x{:02x}", modrm.0);
        return Err(DecodeError::NotAMemoryOperand);
    }

    if M::ADDRESS_OVERRIDE_IS_16BIT && flags.contains(DecodeFlags::ADDRESS_SIZE_OVERRIDE) {
        let displacement_len = match r#mod {
            Mod::Indirect if modrm.rm() == RM16_DISP16 => 2,
            Mod::Indirect => 0,
            Mod::IndirectDisp8 => 1,
            _ => 2,
        };
        return Ok(MemoryOperand {
            modrm,
            has_sib: false,
            displacement_len,
        });
    }

    let mut displacement_len = match r#mod {
        Mod::Indirect if modrm.rm() == RM_DISP32 => 4,
        Mod::Indirect => 0,
        Mod::IndirectDisp8 => 1,
        _ => 4,
    };

    let has_sib = modrm.rm() == RM_SIB;
    if has_sib {
        let sib = *code.get(1).ok_or(DecodeError::Truncated)?;
        if r#mod == Mod::Indirect && (sib & 0x7) == SIB_BASE_NONE {
            displacement_len = 4;
        }
    }

    Ok(MemoryOperand {
        modrm,
        has_sib,
        displacement_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Amd64, Ia32};

    fn walk32(code: &[u8]) -> Result<MemoryOperand> {
        walk_memory_operand::<Ia32>(code, DecodeFlags::empty())
    }

    #[test]
    fn register_field_and_extension() {
        assert_eq!(decode_modrm(0x05, 0), (Mod::Indirect, 0));
        assert_eq!(decode_modrm(0x3D, 0), (Mod::Indirect, 7));
        assert_eq!(decode_modrm(0x3D, 1), (Mod::Indirect, 15));
        assert_eq!(decode_modrm(0x48, 0), (Mod::IndirectDisp8, 1));
        assert_eq!(decode_modrm(0x90, 1), (Mod::IndirectDisp32, 10));
        assert_eq!(decode_modrm(0xC1, 0), (Mod::Direct, 0));
    }

    #[test]
    fn absolute_displacement() {
        let op = walk32(&[0x05, 0x11, 0x22, 0x33, 0x44]).unwrap();
        assert!(!op.has_sib);
        assert_eq!(op.displacement_len, 4);
        assert_eq!(op.encoded_len(), 5);
        assert_eq!(op.displacement(&[0x05, 0x11, 0x22, 0x33, 0x44]), Ok(0x44332211));
    }

    #[test]
    fn displacement_sizes_by_mod() {
        assert_eq!(walk32(&[0x00]).unwrap().displacement_len, 0);
        assert_eq!(walk32(&[0x40]).unwrap().displacement_len, 1);
        assert_eq!(walk32(&[0x80]).unwrap().displacement_len, 4);
        assert_eq!(walk32(&[0xC0]), Err(DecodeError::NotAMemoryOperand));
    }

    #[test]
    fn negative_disp8() {
        let code = [0x43, 0xF0];
        let op = walk32(&code).unwrap();
        assert_eq!(op.displacement(&code), Ok(-16));
    }

    #[test]
    fn sib_forms() {
        // [eax + ecx*4]
        let op = walk32(&[0x04, 0x88]).unwrap();
        assert!(op.has_sib);
        assert_eq!(op.encoded_len(), 2);
        // [ecx*4 + disp32]: SIB base 5 with mod 0
        let op = walk32(&[0x04, 0x8D, 0, 0, 0, 0]).unwrap();
        assert_eq!(op.displacement_len, 4);
        assert_eq!(op.encoded_len(), 6);
        // [ebp + ecx*4 + disp8]
        let op = walk32(&[0x44, 0x8D, 0x10]).unwrap();
        assert_eq!(op.displacement_len, 1);
        assert_eq!(op.encoded_len(), 3);
        assert_eq!(walk32(&[0x04]), Err(DecodeError::Truncated));
    }

    #[test]
    fn sixteen_bit_addressing_in_ia32() {
        let flags = DecodeFlags::ADDRESS_SIZE_OVERRIDE;
        let op = walk_memory_operand::<Ia32>(&[0x06, 0x34, 0x12], flags).unwrap();
        assert_eq!(op.displacement_len, 2);
        assert_eq!(op.displacement(&[0x06, 0x34, 0x12]), Ok(0x1234));
        let op = walk_memory_operand::<Ia32>(&[0x84], flags).unwrap();
        assert!(!op.has_sib);
        assert_eq!(op.displacement_len, 2);
    }

    #[test]
    fn address_override_keeps_32bit_layout_in_amd64() {
        let flags = DecodeFlags::ADDRESS_SIZE_OVERRIDE;
        let op = walk_memory_operand::<Amd64>(&[0x05], flags).unwrap();
        assert_eq!(op.displacement_len, 4);
    }

    #[test]
    fn missing_modrm() {
        assert_eq!(walk32(&[]), Err(DecodeError::Truncated));
    }
}
