//! # tiny16 Emulator
//!
//! An emulator for the tiny16 teaching machine: a minimal 16-bit
//! von Neumann computer with 16 registers, 65_536 words of memory, and an
//! instruction set of exactly 16 opcodes packed one per nibble.
//!
//! The machine exists to make the fetch-decode-execute cycle, wraparound
//! arithmetic, and branch offset encoding small enough to hold in your head.

pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, CpuState, EngineConfig, Instruction, Memory, Opcode, RegisterFile};
pub use asm::{assemble, disassemble, AssemblerError, RomFile, load_rom, parse_rom, save_rom};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
