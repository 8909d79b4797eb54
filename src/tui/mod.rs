//! TUI debugger for the tiny16 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Real-time register visualization
//! - Memory view around the program counter
//! - Step/run/breakpoint controls
//! - Disassembly view

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
