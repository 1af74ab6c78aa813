//! Register snapshots and operand selection
//!
//! A trap handler captures the general purpose registers at fault time.
//! The decoder reads them through [`RegisterFile`] and selects the slice an
//! instruction names with [`RegisterOperand`], including the legacy
//! AH/CH/DH/BH encoding.

use crate::error::{DecodeError, Result};
use crate::mode::Mode;
use crate::prefix::DecodeFlags;
use crate::tables::OperandWidth;
use std::fmt;

/// General purpose register, numbered as in ModR/M and REX encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gpr {
    pub const ALL: [Gpr; 16] = [
        Gpr::Rax,
        Gpr::Rcx,
        Gpr::Rdx,
        Gpr::Rbx,
        Gpr::Rsp,
        Gpr::Rbp,
        Gpr::Rsi,
        Gpr::Rdi,
        Gpr::R8,
        Gpr::R9,
        Gpr::R10,
        Gpr::R11,
        Gpr::R12,
        Gpr::R13,
        Gpr::R14,
        Gpr::R15,
    ];

    pub fn from_index(index: u8) -> Option<Gpr> {
        Gpr::ALL.get(index as usize).copied()
    }

    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }
}

/// Read access to captured general purpose registers
pub trait RegisterFile {
    /// Full 64-bit value of `reg` (upper half zero on 32-bit captures)
    fn gpr(&self, reg: Gpr) -> u64;
}

/// Register state captured at fault time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterSnapshot {
    pub rax: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rbx: u64,
    pub rsp: u64,
    pub rbp: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rflags: u64,
}

impl RegisterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, reg: Gpr, value: u64) {
        *self.slot_mut(reg) = value;
    }

    /// Builder form of [`RegisterSnapshot::set`]
    pub fn with(mut self, reg: Gpr, value: u64) -> Self {
        self.set(reg, value);
        self
    }

    fn slot_mut(&mut self, reg: Gpr) -> &mut u64 {
        match reg {
            Gpr::Rax => &mut self.rax,
            Gpr::Rcx => &mut self.rcx,
            Gpr::Rdx => &mut self.rdx,
            Gpr::Rbx => &mut self.rbx,
            Gpr::Rsp => &mut self.rsp,
            Gpr::Rbp => &mut self.rbp,
            Gpr::Rsi => &mut self.rsi,
            Gpr::Rdi => &mut self.rdi,
            Gpr::R8 => &mut self.r8,
            Gpr::R9 => &mut self.r9,
            Gpr::R10 => &mut self.r10,
            Gpr::R11 => &mut self.r11,
            Gpr::R12 => &mut self.r12,
            Gpr::R13 => &mut self.r13,
            Gpr::R14 => &mut self.r14,
            Gpr::R15 => &mut self.r15,
        }
    }
}

impl RegisterFile for RegisterSnapshot {
    fn gpr(&self, reg: Gpr) -> u64 {
        match reg {
            Gpr::Rax => self.rax,
            Gpr::Rcx => self.rcx,
            Gpr::Rdx => self.rdx,
            Gpr::Rbx => self.rbx,
            Gpr::Rsp => self.rsp,
            Gpr::Rbp => self.rbp,
            Gpr::Rsi => self.rsi,
            Gpr::Rdi => self.rdi,
            Gpr::R8 => self.r8,
            Gpr::R9 => self.r9,
            Gpr::R10 => self.r10,
            Gpr::R11 => self.r11,
            Gpr::R12 => self.r12,
            Gpr::R13 => self.r13,
            Gpr::R14 => self.r14,
            Gpr::R15 => self.r15,
        }
    }
}

impl<R: RegisterFile + ?Sized> RegisterFile for &R {
    fn gpr(&self, reg: Gpr) -> u64 {
        (**self).gpr(reg)
    }
}

/// The slice of a register an instruction operates on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterOperand {
    /// Bits 0..7
    Low8(Gpr),
    /// Bits 8..15 (AH, CH, DH, BH)
    High8(Gpr),
    Word(Gpr),
    Dword(Gpr),
    Qword(Gpr),
}

impl RegisterOperand {
    /// Select the operand named by a ModR/M register index.
    ///
    /// Without a REX prefix, byte indices 4..7 name AH/CH/DH/BH. With any
    /// REX prefix they name SPL/BPL/SIL/DIL instead.
    pub fn select<M: Mode>(index: u8, width: OperandWidth, flags: DecodeFlags) -> Result<Self> {
        if index > M::MAX_REGISTER_INDEX || width.bytes() > M::MAX_REGISTER_BYTES {
            log::warn!("no {} register #{index} of width {}", M::NAME, width.bytes());
            return Err(DecodeError::UnsupportedRegister);
        }
        let reg = Gpr::from_index(index).ok_or(DecodeError::UnsupportedRegister)?;

        Ok(match width {
            OperandWidth::Byte => match index {
                4..=7 if !(M::HAS_REX && flags.contains(DecodeFlags::REX)) => {
                    RegisterOperand::High8(
                        Gpr::from_index(index - 4).ok_or(DecodeError::UnsupportedRegister)?,
                    )
                }
                _ => RegisterOperand::Low8(reg),
            },
            OperandWidth::Word => RegisterOperand::Word(reg),
            OperandWidth::Dword => RegisterOperand::Dword(reg),
            OperandWidth::Qword => RegisterOperand::Qword(reg),
        })
    }

    pub fn register(self) -> Gpr {
        match self {
            RegisterOperand::Low8(r)
            | RegisterOperand::High8(r)
            | RegisterOperand::Word(r)
            | RegisterOperand::Dword(r)
            | RegisterOperand::Qword(r) => r,
        }
    }

    pub fn width(self) -> OperandWidth {
        match self {
            RegisterOperand::Low8(_) | RegisterOperand::High8(_) => OperandWidth::Byte,
            RegisterOperand::Word(_) => OperandWidth::Word,
            RegisterOperand::Dword(_) => OperandWidth::Dword,
            RegisterOperand::Qword(_) => OperandWidth::Qword,
        }
    }

    /// Value of this operand in `regs`, zero-extended
    pub fn read<R: RegisterFile + ?Sized>(self, regs: &R) -> u64 {
        let full = regs.gpr(self.register());
        match self {
            RegisterOperand::High8(_) => (full >> 8) & 0xFF,
            other => full & other.width().mask(),
        }
    }

    /// Assembler name, e.g. `ah`, `r9d`, `sil`
    pub fn name(self) -> &'static str {
        const LOW8: [&str; 16] = [
            "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b",
            "r12b", "r13b", "r14b", "r15b",
        ];
        const HIGH8: [&str; 4] = ["ah", "ch", "dh", "bh"];
        const WORD: [&str; 16] = [
            "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w",
            "r13w", "r14w", "r15w",
        ];
        const DWORD: [&str; 16] = [
            "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d",
            "r12d", "r13d", "r14d", "r15d",
        ];
        const QWORD: [&str; 16] = [
            "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11",
            "r12", "r13", "r14", "r15",
        ];

        let i = self.register().index() as usize;
        match self {
            RegisterOperand::Low8(_) => LOW8[i],
            RegisterOperand::High8(_) => HIGH8[i & 3],
            RegisterOperand::Word(_) => WORD[i],
            RegisterOperand::Dword(_) => DWORD[i],
            RegisterOperand::Qword(_) => QWORD[i],
        }
    }
}

impl fmt::Display for RegisterOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value of register `index` at `width` under the legacy (non-REX) byte
/// register encoding.
pub fn register_value<M: Mode, R: RegisterFile + ?Sized>(
    index: u8,
    width: OperandWidth,
    regs: &R,
) -> Result<u64> {
    RegisterOperand::select::<M>(index, width, DecodeFlags::empty()).map(|op| op.read(regs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::{Amd64, Ia32};

    fn sample() -> RegisterSnapshot {
        RegisterSnapshot::new()
            .with(Gpr::Rax, 0x1122_3344_5566_1234)
            .with(Gpr::Rcx, 0xAABB)
            .with(Gpr::Rsp, 0x7FFE_0000_0000_0010)
            .with(Gpr::R9, 0x0102_0304_0506_0708)
    }

    #[test]
    fn low_bytes() {
        let regs = sample();
        assert_eq!(register_value::<Ia32, _>(0, OperandWidth::Byte, &regs), Ok(0x34));
        assert_eq!(register_value::<Ia32, _>(1, OperandWidth::Byte, &regs), Ok(0xBB));
    }

    #[test]
    fn high_bytes() {
        let regs = RegisterSnapshot::new().with(Gpr::Rax, 0x1234);
        assert_eq!(register_value::<Ia32, _>(4, OperandWidth::Byte, &regs), Ok(0x12));
        assert_eq!(register_value::<Amd64, _>(4, OperandWidth::Byte, &regs), Ok(0x12));
        let regs = sample();
        // CH
        assert_eq!(register_value::<Ia32, _>(5, OperandWidth::Byte, &regs), Ok(0xAA));
    }

    #[test]
    fn rex_turns_high_bytes_into_low_bytes() {
        let op = RegisterOperand::select::<Amd64>(4, OperandWidth::Byte, DecodeFlags::REX).unwrap();
        assert_eq!(op, RegisterOperand::Low8(Gpr::Rsp));
        assert_eq!(op.name(), "spl");
        assert_eq!(op.read(&sample()), 0x10);

        // REX has no meaning in 32-bit mode
        let op = RegisterOperand::select::<Ia32>(4, OperandWidth::Byte, DecodeFlags::REX).unwrap();
        assert_eq!(op, RegisterOperand::High8(Gpr::Rax));
    }

    #[test]
    fn truncating_widths() {
        let regs = sample();
        assert_eq!(register_value::<Amd64, _>(0, OperandWidth::Word, &regs), Ok(0x1234));
        assert_eq!(
            register_value::<Amd64, _>(0, OperandWidth::Dword, &regs),
            Ok(0x5566_1234)
        );
        assert_eq!(
            register_value::<Amd64, _>(0, OperandWidth::Qword, &regs),
            Ok(0x1122_3344_5566_1234)
        );
    }

    #[test]
    fn extended_registers() {
        let regs = sample();
        assert_eq!(register_value::<Amd64, _>(9, OperandWidth::Byte, &regs), Ok(0x08));
        assert_eq!(register_value::<Amd64, _>(9, OperandWidth::Dword, &regs), Ok(0x0506_0708));
        assert_eq!(
            register_value::<Ia32, _>(9, OperandWidth::Dword, &regs),
            Err(DecodeError::UnsupportedRegister)
        );
        assert_eq!(
            register_value::<Amd64, _>(16, OperandWidth::Dword, &regs),
            Err(DecodeError::UnsupportedRegister)
        );
    }

    #[test]
    fn no_qword_registers_in_ia32() {
        assert_eq!(
            register_value::<Ia32, _>(0, OperandWidth::Qword, &sample()),
            Err(DecodeError::UnsupportedRegister)
        );
    }

    #[test]
    fn operand_names() {
        let name = |index, width, flags| {
            RegisterOperand::select::<Amd64>(index, width, flags)
                .unwrap()
                .to_string()
        };
        let none = DecodeFlags::empty();
        assert_eq!(name(7, OperandWidth::Byte, none), "bh");
        assert_eq!(name(7, OperandWidth::Byte, DecodeFlags::REX), "dil");
        assert_eq!(name(12, OperandWidth::Byte, DecodeFlags::REX), "r12b");
        assert_eq!(name(2, OperandWidth::Word, none), "dx");
        assert_eq!(name(13, OperandWidth::Dword, none), "r13d");
        assert_eq!(name(15, OperandWidth::Qword, none), "r15");
    }

    #[test]
    fn snapshot_set_and_get() {
        let mut regs = RegisterSnapshot::new();
        for reg in Gpr::ALL {
            regs.set(reg, reg.index() as u64 * 3);
        }
        for reg in Gpr::ALL {
            assert_eq!(regs.gpr(reg), reg.index() as u64 * 3);
        }
    }
}
