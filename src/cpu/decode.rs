//! Instruction decoder for the DCPU-16.
//!
//! Every instruction starts with one 16-bit word laid out as
//! `bbbbbbaaaaaaoooo`: a 4-bit opcode in the low bits followed by two
//! 6-bit value codes. Values that need a literal or address take it from
//! the words that follow, which the value resolver consumes.

use crate::cpu::value::Value;
use serde::{Serialize, Deserialize};
use thiserror::Error;

const OP_MASK: u16 = 0x000F;
const A_SHIFT: u16 = 4;
const B_SHIFT: u16 = 10;
const VALUE_MASK: u16 = 0x003F;

/// Opcode of the reserved instruction, executed as a no-op.
pub const RESERVED: u16 = 0x0;

/// Basic opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    /// a = b
    Set = 0x1,
    /// a = a + b, sets O
    Add = 0x2,
    /// a = a - b, sets O
    Sub = 0x3,
    /// a = a * b, sets O
    Mul = 0x4,
    /// a = a / b, sets O
    Div = 0x5,
    /// a = a % b
    Mod = 0x6,
    /// a = a << b, sets O
    Shl = 0x7,
    /// a = a >> b, sets O
    Shr = 0x8,
    /// a = a & b
    And = 0x9,
    /// a = a | b
    Bor = 0xa,
    /// a = a ^ b
    Xor = 0xb,
    /// skip next word unless a == b
    Ife = 0xc,
    /// skip next word unless a != b
    Ifn = 0xd,
    /// skip next word unless a > b
    Ifg = 0xe,
    /// skip next word unless (a & b) != 0
    Ifb = 0xf,
}

impl Opcode {
    pub fn from_code(code: u16) -> Option<Self> {
        let op = match code {
            0x1 => Opcode::Set,
            0x2 => Opcode::Add,
            0x3 => Opcode::Sub,
            0x4 => Opcode::Mul,
            0x5 => Opcode::Div,
            0x6 => Opcode::Mod,
            0x7 => Opcode::Shl,
            0x8 => Opcode::Shr,
            0x9 => Opcode::And,
            0xa => Opcode::Bor,
            0xb => Opcode::Xor,
            0xc => Opcode::Ife,
            0xd => Opcode::Ifn,
            0xe => Opcode::Ifg,
            0xf => Opcode::Ifb,
            _ => return None,
        };
        Some(op)
    }

    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Set => "SET",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Shl => "SHL",
            Opcode::Shr => "SHR",
            Opcode::And => "AND",
            Opcode::Bor => "BOR",
            Opcode::Xor => "XOR",
            Opcode::Ife => "IFE",
            Opcode::Ifn => "IFN",
            Opcode::Ifg => "IFG",
            Opcode::Ifb => "IFB",
        }
    }

    /// Arithmetic opcodes rewrite O on every execution.
    pub fn sets_overflow(self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::Div
                | Opcode::Mod
                | Opcode::Shl
                | Opcode::Shr
        )
    }

    /// Conditional opcodes never write back; they may skip a word instead.
    pub fn is_conditional(self) -> bool {
        matches!(self, Opcode::Ife | Opcode::Ifn | Opcode::Ifg | Opcode::Ifb)
    }
}

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Reserved opcode 0. Operand fields are ignored.
    Nop,
    Basic { opcode: Opcode, a: Value, b: Value },
}

impl Instruction {
    /// Words occupied in memory, counting next-word operands.
    pub fn size(&self) -> u16 {
        match self {
            Instruction::Nop => 1,
            Instruction::Basic { a, b, .. } => {
                1 + u16::from(a.consumes_next_word()) + u16::from(b.consumes_next_word())
            }
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::Nop => write!(f, "NOP"),
            Instruction::Basic { opcode, a, b } => write!(f, "{} {}, {}", opcode.mnemonic(), a, b),
        }
    }
}

/// Split an instruction word into its (opcode, a, b) fields.
#[inline]
pub fn split(word: u16) -> (u16, u16, u16) {
    (
        word & OP_MASK,
        (word >> A_SHIFT) & VALUE_MASK,
        (word >> B_SHIFT) & VALUE_MASK,
    )
}

/// Decode an instruction word.
pub fn decode(word: u16) -> Result<Instruction, DecodeError> {
    let (op, a, b) = split(word);
    decode_fields(op, a, b)
}

/// Decode already-split instruction fields.
///
/// Both value codes are checked before anything is returned, so a fault
/// never leaves a half-decoded instruction behind.
pub fn decode_fields(op: u16, a: u16, b: u16) -> Result<Instruction, DecodeError> {
    if op == RESERVED {
        return Ok(Instruction::Nop);
    }

    let opcode = Opcode::from_code(op).ok_or(DecodeError::UnknownOpcode(op))?;
    let a = Value::from_code(a)?;
    let b = Value::from_code(b)?;

    Ok(Instruction::Basic { opcode, a, b })
}

/// Encode a basic instruction word.
///
/// Any next-word operands must be placed after it by the caller, `a`'s first.
pub fn encode(opcode: Opcode, a: Value, b: Value) -> u16 {
    opcode.code() | (a.code() << A_SHIFT) | (b.code() << B_SHIFT)
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode: {0:#x}")]
    UnknownOpcode(u16),

    #[error("unknown value code: {0:#x}")]
    UnknownValueCode(u16),
}
