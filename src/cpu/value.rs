//! Operand value codes and their resolution.
//!
//! Each instruction carries two 6-bit value codes. Resolving a code yields a
//! [`Location`] that can be read and written. Some codes consume the word
//! after the instruction (advancing PC) or move SP; resolution is a pure
//! function over a [`Cursor`] so those side effects happen exactly once and
//! in operand order.

use crate::cpu::decode::DecodeError;
use crate::cpu::memory::Memory;
use crate::cpu::registers::{Register, Registers};
use serde::{Serialize, Deserialize};

/// A decoded operand addressing form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// 0x00-0x07: register
    Register(Register),
    /// 0x08-0x0f: [register]
    RegisterIndirect(Register),
    /// 0x10-0x17: [next word + register]
    NextWordPlusRegister(Register),
    /// 0x18: [SP++]
    Pop,
    /// 0x19: [SP]
    Peek,
    /// 0x1a: [--SP]
    Push,
    /// 0x1b
    StackPointer,
    /// 0x1c
    ProgramCounter,
    /// 0x1d
    Overflow,
    /// 0x1e: [next word]
    NextWordIndirect,
    /// 0x1f: next word, as a literal
    NextWordLiteral,
    /// 0x20-0x3f: literal 0x00-0x1f
    Literal(u8),
}

impl Value {
    pub const POP: u16 = 0x18;
    pub const PEEK: u16 = 0x19;
    pub const PUSH: u16 = 0x1a;
    pub const SP: u16 = 0x1b;
    pub const PC: u16 = 0x1c;
    pub const O: u16 = 0x1d;
    pub const NEXT_WORD_INDIRECT: u16 = 0x1e;
    pub const NEXT_WORD_LITERAL: u16 = 0x1f;
    pub const LITERAL_BASE: u16 = 0x20;

    /// Decode a 6-bit value code.
    pub fn from_code(code: u16) -> Result<Self, DecodeError> {
        let reg = Register::ALL[(code & 0x7) as usize];
        let value = match code {
            0x00..=0x07 => Value::Register(reg),
            0x08..=0x0f => Value::RegisterIndirect(reg),
            0x10..=0x17 => Value::NextWordPlusRegister(reg),
            Self::POP => Value::Pop,
            Self::PEEK => Value::Peek,
            Self::PUSH => Value::Push,
            Self::SP => Value::StackPointer,
            Self::PC => Value::ProgramCounter,
            Self::O => Value::Overflow,
            Self::NEXT_WORD_INDIRECT => Value::NextWordIndirect,
            Self::NEXT_WORD_LITERAL => Value::NextWordLiteral,
            0x20..=0x3f => Value::Literal((code - Self::LITERAL_BASE) as u8),
            _ => return Err(DecodeError::UnknownValueCode(code)),
        };
        Ok(value)
    }

    /// Encode back to a 6-bit value code.
    ///
    /// Literals above 0x1f are truncated to their low five bits.
    pub fn code(self) -> u16 {
        match self {
            Value::Register(r) => r.index() as u16,
            Value::RegisterIndirect(r) => 0x08 + r.index() as u16,
            Value::NextWordPlusRegister(r) => 0x10 + r.index() as u16,
            Value::Pop => Self::POP,
            Value::Peek => Self::PEEK,
            Value::Push => Self::PUSH,
            Value::StackPointer => Self::SP,
            Value::ProgramCounter => Self::PC,
            Value::Overflow => Self::O,
            Value::NextWordIndirect => Self::NEXT_WORD_INDIRECT,
            Value::NextWordLiteral => Self::NEXT_WORD_LITERAL,
            Value::Literal(n) => Self::LITERAL_BASE + u16::from(n & 0x1f),
        }
    }

    /// Does resolving this value read the word following the instruction?
    pub fn consumes_next_word(self) -> bool {
        matches!(
            self,
            Value::NextWordPlusRegister(_) | Value::NextWordIndirect | Value::NextWordLiteral
        )
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Register(r) => write!(f, "{}", r),
            Value::RegisterIndirect(r) => write!(f, "[{}]", r),
            Value::NextWordPlusRegister(r) => write!(f, "[next+{}]", r),
            Value::Pop => write!(f, "POP"),
            Value::Peek => write!(f, "PEEK"),
            Value::Push => write!(f, "PUSH"),
            Value::StackPointer => write!(f, "SP"),
            Value::ProgramCounter => write!(f, "PC"),
            Value::Overflow => write!(f, "O"),
            Value::NextWordIndirect => write!(f, "[next]"),
            Value::NextWordLiteral => write!(f, "next"),
            Value::Literal(n) => write!(f, "{:#x}", n),
        }
    }
}

/// A concrete slot designated by a value for one instruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Register(Register),
    Memory(u16),
    StackPointer,
    ProgramCounter,
    Overflow,
    /// Read-only. Writes are silently discarded.
    Literal(u16),
}

impl Location {
    pub fn is_writable(self) -> bool {
        !matches!(self, Location::Literal(_))
    }
}

/// Program counter and stack pointer as seen during operand resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub pc: u16,
    pub sp: u16,
}

impl Cursor {
    /// Advance PC and read the word it now points at.
    fn next_word(self, mem: &Memory) -> (u16, Cursor) {
        let pc = self.pc.wrapping_add(1);
        (mem.read(pc), Cursor { pc, ..self })
    }
}

/// Resolve a value to a location, returning the cursor after any side effects.
pub fn resolve(value: Value, cursor: Cursor, regs: &Registers, mem: &Memory) -> (Location, Cursor) {
    match value {
        Value::Register(r) => (Location::Register(r), cursor),

        Value::RegisterIndirect(r) => (Location::Memory(regs.get(r)), cursor),

        Value::NextWordPlusRegister(r) => {
            let (offset, cursor) = cursor.next_word(mem);
            (Location::Memory(offset.wrapping_add(regs.get(r))), cursor)
        }

        Value::Pop => {
            let sp = cursor.sp.wrapping_add(1);
            (Location::Memory(cursor.sp), Cursor { sp, ..cursor })
        }

        Value::Peek => (Location::Memory(cursor.sp), cursor),

        Value::Push => {
            let sp = cursor.sp.wrapping_sub(1);
            (Location::Memory(sp), Cursor { sp, ..cursor })
        }

        Value::StackPointer => (Location::StackPointer, cursor),
        Value::ProgramCounter => (Location::ProgramCounter, cursor),
        Value::Overflow => (Location::Overflow, cursor),

        Value::NextWordIndirect => {
            let (addr, cursor) = cursor.next_word(mem);
            (Location::Memory(addr), cursor)
        }

        Value::NextWordLiteral => {
            let (word, cursor) = cursor.next_word(mem);
            (Location::Literal(word), cursor)
        }

        Value::Literal(n) => (Location::Literal(u16::from(n)), cursor),
    }
}
