//! Assembler and disassembler for tiny16 programs.
//!
//! This module provides:
//! - A two-pass assembler (text -> ROM image words)
//! - A disassembler (words -> readable listing)
//! - The ROM image file format (16 binary digits per line)

pub mod assembler;
pub mod disasm;
pub mod rom;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use rom::{load_rom, parse_rom, save_rom, RomError, RomFile};
