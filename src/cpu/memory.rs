//! 6502 memory subsystem.
//!
//! A flat 64 KiB byte array. The 16-bit address space spans the index
//! range exactly, so plain reads and writes cannot fail; address
//! arithmetic wraps at the 16-bit width where instructions compute
//! addresses past 0xFFFF.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The number of addressable bytes.
pub const MEMORY_SIZE: usize = 65536;

/// Flat 64 KiB memory image.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    bytes: Vec<u8>,
}

impl Memory {
    /// Create a new memory image with all bytes zeroed.
    pub fn new() -> Self {
        Self {
            bytes: vec![0; MEMORY_SIZE],
        }
    }

    /// Read the byte at `addr`.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.bytes[addr as usize]
    }

    /// Write a byte to `addr`.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        self.bytes[addr as usize] = value;
    }

    /// Read a little-endian 16-bit word starting at `addr`.
    ///
    /// The high byte comes from `addr + 1` with 16-bit wraparound.
    #[inline]
    pub fn read_word(&self, addr: u16) -> u16 {
        let lo = self.read(addr);
        let hi = self.read(addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    /// Clear all bytes to zero.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Copy `data` into memory starting at `origin`.
    pub fn load(&mut self, origin: u16, data: &[u8]) -> Result<(), MemoryError> {
        let available = MEMORY_SIZE - origin as usize;
        if data.len() > available {
            return Err(MemoryError::ImageTooLarge {
                size: data.len(),
                available,
            });
        }
        self.bytes[origin as usize..origin as usize + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Borrow a range of memory (for dumps and disassembly).
    pub fn slice(&self, start: u16, count: usize) -> &[u8] {
        let end = (start as usize + count).min(MEMORY_SIZE);
        &self.bytes[start as usize..end]
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|&&b| b != 0).count();
        f.debug_struct("Memory")
            .field("non_zero_bytes", &non_zero)
            .field("total_bytes", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur when populating memory.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("image size {size} exceeds available space {available}")]
    ImageTooLarge { size: usize, available: usize },
}
