//! DCPU-16 registers.
//!
//! The DCPU-16 has:
//! - 8 general purpose 16-bit registers: A, B, C, X, Y, Z, I, J
//! - PC: program counter
//! - SP: stack pointer (the stack grows downward)
//! - O: overflow flag

use crate::cpu::value::Cursor;
use serde::{Serialize, Deserialize};

/// Number of general purpose registers.
pub const NUM_REGISTERS: usize = 8;

/// A general purpose register name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    A,
    B,
    C,
    X,
    Y,
    Z,
    I,
    J,
}

impl Register {
    /// All registers in encoding order.
    pub const ALL: [Register; NUM_REGISTERS] = [
        Register::A,
        Register::B,
        Register::C,
        Register::X,
        Register::Y,
        Register::Z,
        Register::I,
        Register::J,
    ];

    /// Look up a register by its 3-bit index.
    pub fn from_index(index: u16) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Index into the register file (0-7).
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::B => "B",
            Register::C => "C",
            Register::X => "X",
            Register::Y => "Y",
            Register::Z => "Z",
            Register::I => "I",
            Register::J => "J",
        }
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The DCPU-16 register file.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registers {
    /// General purpose registers, indexed by [`Register::index`].
    pub gp: [u16; NUM_REGISTERS],

    /// Program counter.
    pub pc: u16,

    /// Stack pointer. PUSH decrements before writing, POP increments after reading.
    pub sp: u16,

    /// Overflow flag (the O register).
    /// Only arithmetic opcodes touch it.
    pub overflow: bool,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn get(&self, reg: Register) -> u16 {
        self.gp[reg.index()]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u16) {
        self.gp[reg.index()] = value;
    }

    /// Increment the program counter by 1, wrapping at 0xFFFF.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u16 {
        let old = self.pc;
        self.pc = self.pc.wrapping_add(1);
        old
    }

    /// The O register as a word: 1 when set, 0 otherwise.
    #[inline]
    pub fn overflow_word(&self) -> u16 {
        u16::from(self.overflow)
    }

    /// Snapshot PC and SP for operand resolution.
    pub fn cursor(&self) -> Cursor {
        Cursor { pc: self.pc, sp: self.sp }
    }

    /// Store PC and SP back after operand resolution.
    pub fn commit(&mut self, cursor: Cursor) {
        self.pc = cursor.pc;
        self.sp = cursor.sp;
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for reg in Register::ALL {
            write!(f, "{}={:04x} ", reg, self.get(reg))?;
        }
        write!(f, "PC={:04x} SP={:04x} O={}", self.pc, self.sp, self.overflow_word())
    }
}
