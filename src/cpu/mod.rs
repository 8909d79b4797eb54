//! CPU emulation for the tiny16 machine.
//!
//! This module implements the complete tiny16 architecture:
//! - 65_536 sixteen-bit memory words in a single flat address space
//! - 16 general registers, r0 hardwired to zero, PC and SP by convention
//! - 16 fixed-width opcodes dispatched by a fetch-decode-execute loop

pub mod alu;
pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::RegisterFile;
pub use decode::{decode, Instruction, Opcode};
pub use execute::{Cpu, CpuError, CpuState, EngineConfig};
