//! JSON snapshots of complete CPU state.

use crate::cpu::Cpu;
use std::path::Path;
use thiserror::Error;

pub fn to_json(cpu: &Cpu) -> Result<String, SnapshotError> {
    serde_json::to_string(cpu).map_err(|e| SnapshotError::Format(e.to_string()))
}

pub fn from_json(json: &str) -> Result<Cpu, SnapshotError> {
    let cpu: Cpu = serde_json::from_str(json).map_err(|e| SnapshotError::Format(e.to_string()))?;

    let words = cpu.memory().as_slice().len();
    if words != crate::cpu::memory::MEMORY_SIZE {
        return Err(SnapshotError::MemorySize(words));
    }
    Ok(cpu)
}

/// Write a snapshot to disk.
pub fn save_snapshot<P: AsRef<Path>>(path: P, cpu: &Cpu) -> Result<(), SnapshotError> {
    let json = to_json(cpu)?;
    std::fs::write(path.as_ref(), json).map_err(|e| SnapshotError::Io(e.to_string()))
}

/// Read a snapshot from disk.
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Cpu, SnapshotError> {
    let json =
        std::fs::read_to_string(path.as_ref()).map_err(|e| SnapshotError::Io(e.to_string()))?;
    from_json(&json)
}

/// Errors that can occur while saving or restoring snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("malformed snapshot: {0}")]
    Format(String),

    #[error("snapshot memory has {0} words, expected 65536")]
    MemorySize(usize),
}
