//! DCPU-16 memory subsystem.
//!
//! A flat, word-addressed space of 0x10000 sixteen-bit cells. Every `u16`
//! is a valid address, so plain reads and writes cannot fail.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of memory words.
pub const MEMORY_SIZE: usize = 0x10000;

/// DCPU-16 memory: 65536 words.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy a contiguous block of words into memory starting at `start`.
    ///
    /// A block that would run past the last address is rejected and
    /// memory is left untouched.
    pub fn load(&mut self, start: u16, words: &[u16]) -> Result<(), MemoryError> {
        let start = start as usize;
        let available = MEMORY_SIZE - start;
        if words.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: words.len(),
                available,
            });
        }

        self.cells[start..start + words.len()].copy_from_slice(words);
        Ok(())
    }

    /// Dump memory contents (for inspection).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        let start = start as usize;
        let end = (start + count).min(MEMORY_SIZE);
        (start..end)
            .map(|i| (i as u16, self.cells[i]))
            .collect()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 64K words is too much to print
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Program does not fit between its origin and the end of memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
