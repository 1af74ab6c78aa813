//! Addressing mode selection
//!
//! 32-bit and 64-bit decoding rules are two separate zero-sized types
//! implementing [`Mode`]. Queries are generic over the mode, so the choice
//! is made statically at each call site.

use crate::opcode::Opcode;
use crate::tables::{self, AccessKind, MemWidthClass, OpcodeTables, RegWidthClass};

/// Decoding rules for one addressing mode
pub trait Mode: Copy + Default + std::fmt::Debug + Send + Sync + 'static {
    /// Short name used in logs and serialized records
    const NAME: &'static str;

    /// Every byte that is skipped as a prefix
    const PREFIXES: &'static [u8];

    /// Classification and width tables
    const TABLES: &'static OpcodeTables;

    /// REX prefixes exist (64-bit mode only)
    const HAS_REX: bool;

    /// Highest general purpose register index reachable from ModR/M.reg
    const MAX_REGISTER_INDEX: u8;

    /// Widest general purpose register
    const MAX_REGISTER_BYTES: usize;

    /// An address-size override switches ModR/M to the 16-bit layout
    const ADDRESS_OVERRIDE_IS_16BIT: bool;

    #[inline]
    fn is_prefix(byte: u8) -> bool {
        Self::PREFIXES.contains(&byte)
    }

    #[inline]
    fn classify(opcode: Opcode) -> AccessKind {
        Self::TABLES.classify(opcode)
    }

    #[inline]
    fn reg_width_class(opcode: Opcode) -> Option<RegWidthClass> {
        Self::TABLES.reg_width_class(opcode)
    }

    #[inline]
    fn mem_width_class(opcode: Opcode) -> Option<MemWidthClass> {
        Self::TABLES.mem_width_class(opcode)
    }
}

/// Protected-mode IA-32 decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ia32;

/// Long-mode (64-bit) decoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Amd64;

impl Mode for Ia32 {
    const NAME: &'static str = "ia32";
    const PREFIXES: &'static [u8] = tables::ia32::PREFIXES;
    const TABLES: &'static OpcodeTables = &tables::ia32::TABLES;
    const HAS_REX: bool = false;
    const MAX_REGISTER_INDEX: u8 = 7;
    const MAX_REGISTER_BYTES: usize = 4;
    const ADDRESS_OVERRIDE_IS_16BIT: bool = true;
}

impl Mode for Amd64 {
    const NAME: &'static str = "amd64";
    const PREFIXES: &'static [u8] = tables::amd64::PREFIXES;
    const TABLES: &'static OpcodeTables = &tables::amd64::TABLES;
    const HAS_REX: bool = true;
    const MAX_REGISTER_INDEX: u8 = 15;
    const MAX_REGISTER_BYTES: usize = 8;
    const ADDRESS_OVERRIDE_IS_16BIT: bool = false;
}

/// The mode matching the host architecture
#[cfg(target_arch = "x86")]
pub type NativeMode = Ia32;

/// The mode matching the host architecture
#[cfg(not(target_arch = "x86"))]
pub type NativeMode = Amd64;
