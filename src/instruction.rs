//! Decoded memory access record
//!
//! This module defines the structure a trap handler receives after decoding
//! one faulting instruction, and its JSON form for trace logs.

use crate::opcode::Opcode;
use crate::prefix::DecodeFlags;
use crate::registers::RegisterOperand;
use crate::tables::{AccessKind, OperandWidth};
use serde_json::{Value, json};

/// Everything known about the memory access of one MOV-class instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryAccess {
    /// Name of the addressing mode used for decoding
    pub mode: &'static str,
    /// Number of prefix bytes
    pub prefix_len: usize,
    /// Prefix state
    pub flags: DecodeFlags,
    /// Opcode (two byte opcodes carry 0x0F in the high byte)
    pub opcode: Opcode,
    /// Direction of the access
    pub kind: AccessKind,
    /// Width of the memory operand
    pub mem_width: OperandWidth,
    /// Register operand of register read/write forms
    pub register: Option<RegisterOperand>,
    /// Value of `register` in the captured snapshot
    pub register_value: Option<u64>,
    /// Immediate of immediate write forms
    pub immediate: Option<u64>,
    /// Sign-extended displacement of the memory operand
    pub displacement: i64,
    /// Total instruction length in bytes
    pub len: usize,
}

impl MemoryAccess {
    /// The instruction stores to memory
    #[inline]
    pub fn is_write(&self) -> bool {
        matches!(
            self.kind,
            AccessKind::RegisterWrite | AccessKind::ImmediateWrite
        )
    }

    /// The data stored to memory, truncated to the memory width.
    ///
    /// `None` for loads: their data comes from the faulting location.
    pub fn stored_value(&self) -> Option<u64> {
        let value = match self.kind {
            AccessKind::RegisterWrite => self.register_value?,
            AccessKind::ImmediateWrite => self.immediate?,
            _ => return None,
        };
        Some(value & self.mem_width.mask())
    }

    /// Trace record for this access
    pub fn to_json(&self) -> Value {
        json!({
            "mode": self.mode,
            "opcode": self.opcode.to_string(),
            "prefix_len": self.prefix_len,
            "flags": self.flags.bits(),
            "kind": self.kind.as_str(),
            "width": self.mem_width.bytes(),
            "register": self.register.map(|r| r.name()),
            "register_value": self.register_value,
            "immediate": self.immediate,
            "displacement": self.displacement,
            "len": self.len,
        })
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::Gpr;

    fn store() -> MemoryAccess {
        MemoryAccess {
            mode: "amd64",
            prefix_len: 1,
            flags: DecodeFlags::OPERAND_SIZE_OVERRIDE,
            opcode: Opcode::one_byte(0x89),
            kind: AccessKind::RegisterWrite,
            mem_width: OperandWidth::Word,
            register: Some(RegisterOperand::Word(Gpr::Rcx)),
            register_value: Some(0xBEEF),
            immediate: None,
            displacement: 8,
            len: 4,
        }
    }

    #[test]
    fn stored_value_is_truncated() {
        let mut access = store();
        access.register_value = Some(0x1_BEEF);
        assert_eq!(access.stored_value(), Some(0xBEEF));
        assert!(access.is_write());

        access.kind = AccessKind::RegisterRead;
        assert_eq!(access.stored_value(), None);
        assert!(!access.is_write());
    }

    #[test]
    fn json_record() {
        let value = store().to_json();
        assert_eq!(value["kind"], "register_write");
        assert_eq!(value["opcode"], "0x89");
        assert_eq!(value["width"], 2);
        assert_eq!(value["register"], "cx");
        assert_eq!(value["register_value"], 0xBEEF);
        assert!(value["immediate"].is_null());

        let text = store().to_json_string();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, value);
    }
}
