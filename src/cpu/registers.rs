//! The tiny16 register file.
//!
//! Sixteen one-word registers, addressed by the 4-bit fields of an
//! instruction. The hardware gives two of them special treatment:
//! - r0 is hardwired to zero: writes to it are silently discarded
//! - nothing else; the program counter and stack pointer are ordinary
//!   registers picked by software convention (r15 and r14 by default)
//!
//! Because r0 is maintained by discarding writes rather than special-casing
//! reads, `ADD r0, rX, rY` is the canonical no-op.

use serde::{Deserialize, Serialize};

/// Number of registers in the file.
pub const NUM_REGISTERS: usize = 16;

/// The register file: 16 one-word registers, r0 pinned to zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    regs: [u16; NUM_REGISTERS],
}

impl RegisterFile {
    /// Create a register file with every register zeroed.
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGISTERS],
        }
    }

    /// Read the register at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 16 or more. Indices decoded from instruction
    /// words are 4-bit fields and can never trip this.
    #[inline]
    pub fn read(&self, index: u8) -> u16 {
        assert!(
            (index as usize) < NUM_REGISTERS,
            "register index {} out of range [0, 15]",
            index
        );
        self.regs[index as usize]
    }

    /// Write `value` to the register at `index`.
    ///
    /// Writes to r0 are discarded; it always reads as zero.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 16 or more.
    #[inline]
    pub fn write(&mut self, index: u8, value: u16) {
        assert!(
            (index as usize) < NUM_REGISTERS,
            "register index {} out of range [0, 15]",
            index
        );
        if index != 0 {
            self.regs[index as usize] = value;
        }
    }

    /// Reset every register to zero.
    pub fn reset(&mut self) {
        self.regs = [0; NUM_REGISTERS];
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mut regs = RegisterFile::new();

        regs.write(1, 0xBEEF);
        regs.write(15, 0x0042);

        assert_eq!(regs.read(1), 0xBEEF);
        assert_eq!(regs.read(15), 0x0042);
        assert_eq!(regs.read(2), 0);
    }

    #[test]
    fn test_register_zero_discards_writes() {
        let mut regs = RegisterFile::new();

        regs.write(0, 0xFFFF);
        assert_eq!(regs.read(0), 0);

        regs.write(0, 1);
        assert_eq!(regs.read(0), 0);
    }

    #[test]
    fn test_reset() {
        let mut regs = RegisterFile::new();

        for i in 1..NUM_REGISTERS as u8 {
            regs.write(i, u16::from(i) * 100);
        }
        regs.reset();

        for i in 0..NUM_REGISTERS as u8 {
            assert_eq!(regs.read(i), 0);
        }
    }
}
