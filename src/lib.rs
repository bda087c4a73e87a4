//! # DCPU-16 Emulator
//!
//! An emulator core for the DCPU-16, a 16-bit word-addressed CPU with
//! eight general registers, a downward-growing stack and a single overflow
//! register.
//!
//! The core is [`Cpu::step`]: one call executes exactly one instruction.
//! Program images, snapshots and the multi-instance [`host`] driver are
//! collaborators built around it.

pub mod cpu;
pub mod image;
pub mod snapshot;
pub mod host;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, DecodeError, Instruction, Memory, Opcode, Register, Registers, Value};
pub use image::{ImageError, ImageFormat, ProgramImage};
pub use snapshot::{load_snapshot, save_snapshot, SnapshotError};
pub use host::{FaultPolicy, Host, HostConfig};
