//! The tiny16 memory subsystem.
//!
//! A flat, word-addressed store of 65_536 sixteen-bit words. Code and data
//! share the one address space; the loader fills it from address 0 and only
//! STR mutates it afterwards.
//!
//! Reads and writes are deliberately asymmetric at the boundary: a read of
//! a bad address returns 0 (a wild load observes memory that was never
//! written), while a write to a bad address is refused with an error, since
//! a wild store would corrupt state that cannot be un-corrupted.

use serde::{Deserialize, Serialize};

/// The number of memory words in the machine.
pub const MEMORY_SIZE: usize = 65_536;

/// tiny16 memory: 65_536 one-word cells.
#[derive(Clone, Serialize, Deserialize)]
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

    /// Read the word at `addr`, or 0 if the address is out of range.
    #[inline]
    pub fn read(&self, addr: usize) -> u16 {
        if addr < MEMORY_SIZE {
            self.cells[addr]
        } else {
            0
        }
    }

    /// Write `value` at `addr`.
    ///
    /// Fails with [`MemoryError::AddressOutOfRange`] if the address is out
    /// of range, leaving memory untouched.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u16) -> Result<(), MemoryError> {
        if addr >= MEMORY_SIZE {
            return Err(MemoryError::AddressOutOfRange(addr));
        }
        self.cells[addr] = value;
        Ok(())
    }

    /// The fixed capacity of the address space, in words.
    #[inline]
    pub fn capacity(&self) -> usize {
        MEMORY_SIZE
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = 0;
        }
    }

    /// Load a program image into memory at sequential addresses from 0.
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), MemoryError> {
        if program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE,
            });
        }

        self.cells[..program.len()].copy_from_slice(program);

        Ok(())
    }

    /// Dump a range of memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u16)> {
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        (start.min(MEMORY_SIZE)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// A store targeted an address outside the address space.
    AddressOutOfRange(usize),
    /// Program is too large to fit in memory.
    ProgramTooLarge { size: usize, available: usize },
}

impl std::fmt::Display for MemoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryError::AddressOutOfRange(addr) => {
                write!(
                    f,
                    "memory address {} out of range (0 to {})",
                    addr,
                    MEMORY_SIZE - 1
                )
            }
            MemoryError::ProgramTooLarge { size, available } => {
                write!(f, "program size {} exceeds available space {}", size, available)
            }
        }
    }
}

impl std::error::Error for MemoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();

        mem.write(10, 0xCAFE).unwrap();
        assert_eq!(mem.read(10), 0xCAFE);
    }

    #[test]
    fn test_write_to_last_word() {
        let mut mem = Memory::new();

        mem.write(MEMORY_SIZE - 1, 7).unwrap();
        assert_eq!(mem.read(MEMORY_SIZE - 1), 7);
    }

    #[test]
    fn test_write_out_of_range_fails() {
        let mut mem = Memory::new();

        let err = mem.write(MEMORY_SIZE, 1).unwrap_err();
        assert_eq!(err, MemoryError::AddressOutOfRange(MEMORY_SIZE));
    }

    #[test]
    fn test_read_out_of_range_returns_zero() {
        let mem = Memory::new();

        assert_eq!(mem.read(MEMORY_SIZE), 0);
        assert_eq!(mem.read(usize::MAX), 0);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        let program = vec![0x0123, 0xA105, 0xF000];

        mem.load_program(&program).unwrap();

        assert_eq!(mem.read(0), 0x0123);
        assert_eq!(mem.read(1), 0xA105);
        assert_eq!(mem.read(2), 0xF000);
        assert_eq!(mem.read(3), 0);
    }

    #[test]
    fn test_dump_clamps_to_capacity() {
        let mut mem = Memory::new();
        mem.write(MEMORY_SIZE - 2, 0xAAAA).unwrap();

        let cells = mem.dump(MEMORY_SIZE - 2, 10);

        assert_eq!(cells, vec![(MEMORY_SIZE - 2, 0xAAAA), (MEMORY_SIZE - 1, 0)]);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = Memory::new();
        let program = vec![0u16; MEMORY_SIZE + 1];

        let err = mem.load_program(&program).unwrap_err();
        assert_eq!(
            err,
            MemoryError::ProgramTooLarge {
                size: MEMORY_SIZE + 1,
                available: MEMORY_SIZE,
            }
        );
    }
}
