//! The 32-bit instruction format.
//!
//! ```text
//! 0         8          16         24
//! | cmpaddr | arg0addr | arg1addr |
//! 24        26         28          31     32
//! | cmptype | opselect | negselect | zero |
//! ```
//!
//! Decoding masks every field and never rejects a word; bit 31 is dropped.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

const ADDR_MASK: u32 = 0xff;
const ARG0_SHIFT: u32 = 8;
const ARG1_SHIFT: u32 = 16;
const CMP_TYPE_SHIFT: u32 = 24;
const CMP_TYPE_MASK: u32 = 0x03;
const OP_SELECT_SHIFT: u32 = 26;
const OP_SELECT_MASK: u32 = 0x03;
const NEG_SELECT_SHIFT: u32 = 28;
const NEG_SELECT_MASK: u32 = 0x07;

/// Test applied to the compare cell before a cell is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpType {
    /// Write when the compare cell is zero.
    Zero,
    /// Write when the compare cell is non-zero.
    NotZero,
    /// Write when the compare cell is negative.
    Negative,
    /// Write when the compare cell is positive.
    Positive,
}

impl CmpType {
    /// Maps the low two bits of `bits` to a compare type.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & CMP_TYPE_MASK {
            0 => Self::Zero,
            1 => Self::NotZero,
            2 => Self::Negative,
            _ => Self::Positive,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// Operation producing the new cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpSelect {
    /// Copy the machine input. Cells that never pass their test act as storage.
    Input,
    Or,
    And,
    Xor,
}

impl OpSelect {
    /// Maps the low two bits of `bits` to an operation.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & OP_SELECT_MASK {
            0 => Self::Input,
            1 => Self::Or,
            2 => Self::And,
            _ => Self::Xor,
        }
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

bitflags! {
    /// Operands (and the result) to bitwise-complement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NegSelect: u8 {
        const ARG0 = 0b001;
        const ARG1 = 0b010;
        const RESULT = 0b100;
    }
}

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instruction {
    /// Cell tested by `cmp_type`.
    pub cmp_addr: u8,
    pub arg0_addr: u8,
    pub arg1_addr: u8,
    pub cmp_type: CmpType,
    pub op_select: OpSelect,
    pub neg_select: NegSelect,
}

impl Instruction {
    /// Unpacks a word. Bit 31 is ignored.
    #[must_use]
    pub fn decode(word: u32) -> Self {
        Self {
            cmp_addr: (word & ADDR_MASK) as u8,
            arg0_addr: ((word >> ARG0_SHIFT) & ADDR_MASK) as u8,
            arg1_addr: ((word >> ARG1_SHIFT) & ADDR_MASK) as u8,
            cmp_type: CmpType::from_bits(word >> CMP_TYPE_SHIFT),
            op_select: OpSelect::from_bits(word >> OP_SELECT_SHIFT),
            neg_select: NegSelect::from_bits_truncate(
                ((word >> NEG_SELECT_SHIFT) & NEG_SELECT_MASK) as u8,
            ),
        }
    }

    /// Packs the fields back into a word with bit 31 clear.
    #[must_use]
    pub fn encode(self) -> u32 {
        u32::from(self.cmp_addr)
            | (u32::from(self.arg0_addr) << ARG0_SHIFT)
            | (u32::from(self.arg1_addr) << ARG1_SHIFT)
            | ((self.cmp_type.bits() & CMP_TYPE_MASK) << CMP_TYPE_SHIFT)
            | ((self.op_select.bits() & OP_SELECT_MASK) << OP_SELECT_SHIFT)
            | ((u32::from(self.neg_select.bits()) & NEG_SELECT_MASK) << NEG_SELECT_SHIFT)
    }
}

impl From<u32> for Instruction {
    fn from(word: u32) -> Self {
        Self::decode(word)
    }
}

impl From<Instruction> for u32 {
    fn from(instruction: Instruction) -> Self {
        instruction.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        let inst = Instruction::decode(0x5B_33_22_11);
        assert_eq!(inst.cmp_addr, 0x11);
        assert_eq!(inst.arg0_addr, 0x22);
        assert_eq!(inst.arg1_addr, 0x33);
        // 0x5B = 0b0101_1011: cmp 0b11, op 0b10, neg 0b101
        assert_eq!(inst.cmp_type, CmpType::Positive);
        assert_eq!(inst.op_select, OpSelect::And);
        assert_eq!(inst.neg_select, NegSelect::ARG0 | NegSelect::RESULT);
    }

    #[test]
    fn test_bit_31_is_dropped() {
        let word = 0xFFFF_FFFF;
        assert_eq!(Instruction::decode(word).encode(), 0x7FFF_FFFF);
    }

    #[test]
    fn test_encode_all_fields() {
        let inst = Instruction {
            cmp_addr: 0xFF,
            arg0_addr: 0x01,
            arg1_addr: 0x80,
            cmp_type: CmpType::NotZero,
            op_select: OpSelect::Xor,
            neg_select: NegSelect::ARG1,
        };
        let word: u32 = inst.into();
        assert_eq!(word, 0x2D80_01FF);
        assert_eq!(Instruction::from(word), inst);
    }

    #[test]
    fn test_zero_word_is_input_on_zero() {
        let inst = Instruction::decode(0);
        assert_eq!(inst.cmp_type, CmpType::Zero);
        assert_eq!(inst.op_select, OpSelect::Input);
        assert!(inst.neg_select.is_empty());
    }
}
