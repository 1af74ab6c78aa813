//! Windows x64 fault adapter
//!
//! Turns the `EXCEPTION_POINTERS` handed to a vectored exception handler
//! into a [`FaultSite`] that the decoder can consume.

use crate::error::Result;
use crate::instruction::MemoryAccess;
use crate::mode::Amd64;
use crate::prefix::MAX_INSTRUCTION_LEN;
use crate::registers::{Gpr, RegisterFile, RegisterSnapshot};
use windows_sys::Win32::Foundation::EXCEPTION_ACCESS_VIOLATION;
use windows_sys::Win32::System::Diagnostics::Debug::{CONTEXT, EXCEPTION_POINTERS};

/// Access violation direction, from `ExceptionInformation[0]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultDirection {
    Read = 0,
    Write = 1,
    Execute = 8,
}

impl FaultDirection {
    fn from_info(info: usize) -> Option<Self> {
        match info {
            0 => Some(FaultDirection::Read),
            1 => Some(FaultDirection::Write),
            8 => Some(FaultDirection::Execute),
            _ => None,
        }
    }
}

impl RegisterFile for CONTEXT {
    fn gpr(&self, reg: Gpr) -> u64 {
        match reg {
            Gpr::Rax => self.Rax,
            Gpr::Rcx => self.Rcx,
            Gpr::Rdx => self.Rdx,
            Gpr::Rbx => self.Rbx,
            Gpr::Rsp => self.Rsp,
            Gpr::Rbp => self.Rbp,
            Gpr::Rsi => self.Rsi,
            Gpr::Rdi => self.Rdi,
            Gpr::R8 => self.R8,
            Gpr::R9 => self.R9,
            Gpr::R10 => self.R10,
            Gpr::R11 => self.R11,
            Gpr::R12 => self.R12,
            Gpr::R13 => self.R13,
            Gpr::R14 => self.R14,
            Gpr::R15 => self.R15,
        }
    }
}

impl From<&CONTEXT> for RegisterSnapshot {
    fn from(ctx: &CONTEXT) -> Self {
        let mut regs = RegisterSnapshot::new();
        for reg in Gpr::ALL {
            regs.set(reg, ctx.gpr(reg));
        }
        regs.rip = ctx.Rip;
        regs.rflags = ctx.EFlags as u64;
        regs
    }
}

/// A faulting access as seen by an exception handler
#[derive(Debug, Clone, Copy)]
pub struct FaultSite {
    /// Address of the faulting instruction
    pub instruction_address: usize,
    /// Data address that faulted (access violations only)
    pub data_address: Option<usize>,
    /// Direction of the faulting access (access violations only)
    pub direction: Option<FaultDirection>,
    /// Registers at fault time
    pub registers: RegisterSnapshot,
}

impl FaultSite {
    /// Capture a fault from the pointers given to an exception handler.
    ///
    /// Returns `None` for null pointers.
    ///
    /// # Safety
    ///
    /// `info` must be null or point to valid exception pointers for the
    /// duration of the call.
    pub unsafe fn from_exception_pointers(info: *const EXCEPTION_POINTERS) -> Option<Self> {
        let info = unsafe { info.as_ref()? };
        let record = unsafe { info.ExceptionRecord.as_ref()? };
        let context = unsafe { info.ContextRecord.as_ref()? };

        let (direction, data_address) =
            if record.ExceptionCode == EXCEPTION_ACCESS_VIOLATION && record.NumberParameters >= 2 {
                (
                    FaultDirection::from_info(record.ExceptionInformation[0]),
                    Some(record.ExceptionInformation[1]),
                )
            } else {
                (None, None)
            };

        Some(Self {
            instruction_address: record.ExceptionAddress as usize,
            data_address,
            direction,
            registers: RegisterSnapshot::from(context),
        })
    }

    /// Instruction bytes at the faulting address.
    ///
    /// # Safety
    ///
    /// `MAX_INSTRUCTION_LEN` bytes starting at `instruction_address` must be
    /// readable.
    pub unsafe fn code(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(self.instruction_address as *const u8, MAX_INSTRUCTION_LEN)
        }
    }

    /// Decode the faulting instruction against the captured registers.
    ///
    /// # Safety
    ///
    /// Same requirements as [`FaultSite::code`].
    pub unsafe fn decode(&self) -> Result<MemoryAccess> {
        let code = unsafe { self.code() };
        let access = crate::disasm::decode_access::<Amd64, _>(code, &self.registers)?;
        log::debug!(
            "fault at {:#x} (data {:?}, {:?}): {}",
            self.instruction_address,
            self.data_address,
            self.direction,
            access.to_json_string()
        );
        Ok(access)
    }
}
