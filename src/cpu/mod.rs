//! CPU emulation for the DCPU-16.
//!
//! This module implements the complete DCPU-16 core:
//! - 0x10000 sixteen-bit memory words
//! - 8 general registers (A, B, C, X, Y, Z, I, J) plus PC, SP and O
//! - 15 basic opcodes with 64 operand value codes

pub mod memory;
pub mod registers;
pub mod decode;
pub mod value;
pub mod arith;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Register, Registers};
pub use decode::{Instruction, Opcode, DecodeError};
pub use value::{Value, Location, Cursor};
pub use execute::{Cpu, CpuError};
