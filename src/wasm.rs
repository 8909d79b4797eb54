//! WebAssembly bindings for the tiny16 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_instruction;
use crate::asm::rom::parse_rom;
use crate::cpu::registers::NUM_REGISTERS;
use crate::Cpu;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
    program: Vec<u16>,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            program: Vec::new(),
        }
    }

    /// Load a program from assembly source code.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let words = assemble(source).map_err(|e| JsError::new(&format!("{}", e)))?;

        let len = words.len();
        self.program = words.clone();
        self.cpu = Cpu::new();
        self.cpu
            .load_program(&words)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(len)
    }

    /// Load a program from binary-text ROM source.
    #[wasm_bindgen]
    pub fn load_rom_text(&mut self, source: &str) -> Result<usize, JsError> {
        let rom = parse_rom(source).map_err(|e| JsError::new(&format!("{}", e)))?;

        let len = rom.words.len();
        self.program = rom.words.clone();
        self.cpu = Cpu::new();
        self.cpu
            .load_program(&rom.words)
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(len)
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        if !self.cpu.is_running() {
            return Err(JsError::new("CPU is halted"));
        }

        let instr = self
            .cpu
            .step()
            .map_err(|e| JsError::new(&format!("{}", e)))?;

        Ok(disassemble_instruction(instr.encode()))
    }

    /// Run until halt or max cycles.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> u64 {
        let _ = self.cpu.run_limited(u64::from(max_cycles));
        self.cpu.cycles
    }

    /// Reset CPU to initial state with loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        if !self.program.is_empty() {
            let _ = self.cpu.load_program(&self.program);
        }
    }

    /// Check if CPU is running.
    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.cpu.pc()
    }

    /// Get one register value (index 0-15).
    #[wasm_bindgen]
    pub fn register(&self, index: u8) -> u16 {
        if usize::from(index) < NUM_REGISTERS {
            self.cpu.regs.read(index)
        } else {
            0
        }
    }

    /// Get all sixteen registers as a typed array.
    #[wasm_bindgen]
    pub fn registers(&self) -> js_sys::Uint16Array {
        let mut regs = [0u16; NUM_REGISTERS];
        for (i, slot) in regs.iter_mut().enumerate() {
            *slot = self.cpu.regs.read(i as u8);
        }
        js_sys::Uint16Array::from(&regs[..])
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.cpu.state)
    }

    /// Get memory word at an address. Out of range reads as 0.
    #[wasm_bindgen]
    pub fn memory_at(&self, addr: u32) -> u16 {
        self.cpu.mem.read(addr as usize)
    }

    /// Get a window of memory as a typed array.
    #[wasm_bindgen]
    pub fn memory_window(&self, start: u16, count: u16) -> js_sys::Uint16Array {
        let words: Vec<u16> = (0..usize::from(count))
            .map(|i| self.cpu.mem.read(usize::from(start) + i))
            .collect();
        js_sys::Uint16Array::from(&words[..])
    }

    /// Get registers as JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> String {
        let regs: Vec<String> = (0..NUM_REGISTERS)
            .map(|i| self.cpu.regs.read(i as u8).to_string())
            .collect();
        format!(
            r#"{{"regs":[{}],"pc":{},"state":"{:?}","cycles":{}}}"#,
            regs.join(","),
            self.cpu.pc(),
            self.cpu.state,
            self.cpu.cycles
        )
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return instruction count.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let words = assemble(source).map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(words.len())
}

/// Disassemble a single instruction word.
#[wasm_bindgen]
pub fn wasm_disassemble(word: u16) -> String {
    disassemble_instruction(word)
}
