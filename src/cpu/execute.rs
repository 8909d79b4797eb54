//! CPU execution engine for the tiny16.
//!
//! Implements the fetch-decode-execute cycle and all sixteen instruction
//! behaviors. The engine owns its register file and memory outright; there
//! is one thread of control and no suspension point, so a run only ends at
//! HLT or on a fatal store fault.

use crate::cpu::alu;
use crate::cpu::decode::{self, Instruction, Opcode};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{RegisterFile, NUM_REGISTERS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which registers carry the program counter and stack pointer.
///
/// The hardware does not distinguish these registers; the assignment is a
/// software convention, passed in at construction instead of living in
/// process-wide globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Index of the register holding the program counter.
    pub pc_reg: u8,
    /// Index of the register initialized to the top of memory as a stack
    /// pointer. No instruction uses it implicitly; programs may repurpose it.
    pub sp_reg: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pc_reg: 15,
            sp_reg: 14,
        }
    }
}

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT).
    Halted,
}

/// The tiny16 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// The register file.
    pub regs: RegisterFile,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling and cycle caps).
    pub cycles: u64,
    /// Register convention in effect.
    config: EngineConfig,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with the default conventions: PC in r15, stack
    /// pointer in r14.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a new CPU with an explicit register convention.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range, or if the program counter is
    /// assigned to r0: writes to r0 are discarded, so a PC there could never
    /// advance.
    pub fn with_config(config: EngineConfig) -> Self {
        assert!(
            (config.pc_reg as usize) < NUM_REGISTERS && (config.sp_reg as usize) < NUM_REGISTERS,
            "register convention out of range: pc_reg={} sp_reg={}",
            config.pc_reg,
            config.sp_reg
        );
        assert!(
            config.pc_reg != 0,
            "r0 is hardwired to zero and cannot hold the program counter"
        );

        Self {
            regs: RegisterFile::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            config,
            last_instr: None,
        }
    }

    /// Reset the CPU to power-on state, keeping the register convention.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a program image at address 0 and establish the boot register
    /// state: PC := 0, stack pointer := top of memory.
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), MemoryError> {
        self.mem.load_program(program)?;
        self.regs.write(self.config.pc_reg, 0);
        self.regs.write(self.config.sp_reg, (self.mem.capacity() - 1) as u16);
        Ok(())
    }

    /// The register convention in effect.
    #[inline]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// The current program counter value.
    #[inline]
    pub fn pc(&self) -> u16 {
        self.regs.read(self.config.pc_reg)
    }

    #[inline]
    fn set_pc(&mut self, value: u16) {
        self.regs.write(self.config.pc_reg, value);
    }

    /// Execute a single fetch-decode-execute cycle.
    ///
    /// Returns the instruction that was executed. The PC advances once per
    /// cycle, unconditionally; every control-flow instruction pre-compensates
    /// with a -1 so it lands on its intended target after that increment.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        // Fetch
        let word = self.mem.read(usize::from(self.pc()));

        // Decode
        let instr = decode::decode(word);

        // Execute. Only STR can fail; a store fault aborts the cycle before
        // the increment, so the PC still points at the faulting instruction.
        self.execute(instr)?;

        self.set_pc(self.pc().wrapping_add(1));

        // Update state
        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed. A program that never
    /// reaches HLT never returns; use [`run_limited`](Self::run_limited) to
    /// put a ceiling on it.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        let Instruction {
            opcode,
            dest,
            reg1,
            reg2,
        } = instr;

        match opcode {
            // ==================== Arithmetic / Logic ====================
            Opcode::Add => {
                let result = alu::add(self.regs.read(reg1), self.regs.read(reg2));
                self.regs.write(dest, result);
            }

            Opcode::Sub => {
                let result = alu::sub(self.regs.read(reg1), self.regs.read(reg2));
                self.regs.write(dest, result);
            }

            Opcode::And => {
                let result = alu::and(self.regs.read(reg1), self.regs.read(reg2));
                self.regs.write(dest, result);
            }

            Opcode::Not => {
                // Unary: the second operand is fetched and ignored.
                let result = alu::not(self.regs.read(reg1), self.regs.read(reg2));
                self.regs.write(dest, result);
            }

            Opcode::Or => {
                let result = alu::or(self.regs.read(reg1), self.regs.read(reg2));
                self.regs.write(dest, result);
            }

            Opcode::Mul => {
                let result = alu::mul(self.regs.read(reg1), self.regs.read(reg2));
                self.regs.write(dest, result);
            }

            Opcode::Lsl => {
                // The raw reg2 nibble is the shift amount, not a register read.
                let result = alu::shift_left(self.regs.read(reg1), u16::from(reg2));
                self.regs.write(dest, result);
            }

            Opcode::Lsr => {
                let result = alu::shift_right(self.regs.read(reg1), u16::from(reg2));
                self.regs.write(dest, result);
            }

            // ==================== Memory ====================
            Opcode::Str => {
                // dest names the value register; a store has no destination
                // register to write.
                let value = self.regs.read(dest);
                let addr = self.regs.read(reg1).wrapping_add(self.regs.read(reg2));
                self.mem.write(usize::from(addr), value)?;
            }

            Opcode::Ldm => {
                // reg2 is an unsigned 4-bit displacement, not a register.
                let addr = self.regs.read(reg1).wrapping_add(u16::from(reg2));
                let value = self.mem.read(usize::from(addr));
                self.regs.write(dest, value);
            }

            // ==================== Immediate ====================
            Opcode::Addi => {
                let result = alu::add(self.regs.read(dest), instr.imm8() as u16);
                self.regs.write(dest, result);
            }

            // ==================== Control Flow ====================
            Opcode::Bra => {
                let target = self
                    .pc()
                    .wrapping_add(instr.offset12() as u16)
                    .wrapping_sub(1);
                self.set_pc(target);
            }

            Opcode::Beq => {
                if self.regs.read(dest) == 0 {
                    let target = self.pc().wrapping_add(instr.imm8() as u16).wrapping_sub(1);
                    self.set_pc(target);
                }
            }

            Opcode::Bne => {
                if self.regs.read(dest) != 0 {
                    let target = self.pc().wrapping_add(instr.imm8() as u16).wrapping_sub(1);
                    self.set_pc(target);
                }
            }

            Opcode::Jmp => {
                // Absolute target: register value OR'd with the literal byte
                // in reg1:reg2.
                let target =
                    self.regs.read(dest) | u16::from(reg1) << 4 | u16::from(reg2);
                self.set_pc(target.wrapping_sub(1));
            }

            Opcode::Hlt => {
                // Back up one so the post-dispatch increment leaves the PC
                // resting on the HLT word itself.
                self.set_pc(self.pc().wrapping_sub(1));
                self.state = CpuState::Halted;
            }
        }

        Ok(())
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("pc", &self.pc())
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("memory error: {0}")]
    MemoryError(#[from] MemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(opcode: Opcode, dest: u8, reg1: u8, reg2: u8) -> u16 {
        Instruction::new(opcode, dest, reg1, reg2).encode()
    }

    /// ADDI that loads a small constant into a zeroed register.
    fn load_imm(dest: u8, value: i8) -> u16 {
        let raw = value as u8;
        word(Opcode::Addi, dest, raw >> 4, raw & 0xF)
    }

    #[test]
    fn test_halt_leaves_pc_on_hlt() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[word(Opcode::Hlt, 0, 0, 0)]).unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn test_straight_line_execution() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 5),
            load_imm(2, 3),
            word(Opcode::Add, 3, 1, 2),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 4);
        assert_eq!(cpu.regs.read(3), 8);
        assert_eq!(cpu.pc(), 3);
    }

    #[test]
    fn test_boot_register_state() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[word(Opcode::Hlt, 0, 0, 0)]).unwrap();

        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.regs.read(14), 0xFFFF);
    }

    #[test]
    fn test_custom_register_convention() {
        let mut cpu = Cpu::with_config(EngineConfig {
            pc_reg: 12,
            sp_reg: 11,
        });
        cpu.load_program(&[load_imm(1, 7), word(Opcode::Hlt, 0, 0, 0)])
            .unwrap();

        assert_eq!(cpu.regs.read(11), 0xFFFF);

        cpu.run().unwrap();

        assert_eq!(cpu.regs.read(1), 7);
        assert_eq!(cpu.regs.read(12), 1);
        // The default convention registers stayed ordinary
        assert_eq!(cpu.regs.read(15), 0);
    }

    #[test]
    fn test_writes_to_r0_are_discarded() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 9),
            word(Opcode::Add, 0, 1, 1),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.read(0), 0);
    }

    #[test]
    fn test_sub_wraps_below_zero() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 1),
            word(Opcode::Sub, 2, 0, 1),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        // 0 - 1 wraps to 0xFFFF
        assert_eq!(cpu.regs.read(2), 0xFFFF);
    }

    #[test]
    fn test_not_builds_all_ones() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            word(Opcode::Not, 1, 0, 0),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.read(1), 0xFFFF);
    }

    #[test]
    fn test_shift_amount_is_the_nibble() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 1),
            word(Opcode::Lsl, 2, 1, 4),
            word(Opcode::Lsr, 3, 2, 3),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.read(2), 16);
        assert_eq!(cpu.regs.read(3), 2);
    }

    #[test]
    fn test_str_dest_is_the_value_source() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 42),
            load_imm(2, 9),
            word(Opcode::Str, 1, 2, 0),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        // mem[r2 + r0] := r1
        assert_eq!(cpu.mem.read(9), 42);
    }

    #[test]
    fn test_str_to_top_of_memory() {
        let mut cpu = Cpu::new();
        // NOT of r0 gives the highest address, 0xFFFF
        cpu.load_program(&[
            word(Opcode::Not, 1, 0, 0),
            load_imm(2, 7),
            word(Opcode::Str, 2, 1, 0),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        assert!(cpu.is_halted());
        assert_eq!(cpu.mem.read(0xFFFF), 7);
    }

    #[test]
    fn test_ldm_displacement_is_unsigned() {
        let mut cpu = Cpu::new();
        cpu.mem.write(23, 0xBEEF).unwrap();
        cpu.load_program(&[
            load_imm(1, 8),
            word(Opcode::Ldm, 3, 1, 15),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        // mem[8 + 15], displacement never sign-extends
        assert_eq!(cpu.regs.read(3), 0xBEEF);
    }

    #[test]
    fn test_addi_negative_decrements() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 10),
            load_imm(1, -1),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.read(1), 9);
    }

    #[test]
    fn test_bra_forward_skips() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            word(Opcode::Bra, 0, 0, 2),
            load_imm(1, 1), // skipped
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 2);
        assert_eq!(cpu.regs.read(1), 0);
        assert_eq!(cpu.pc(), 2);
    }

    #[test]
    fn test_bra_minus_one_never_halts() {
        let mut cpu = Cpu::new();
        // offset12 of -1: the PC bounces between the branch and the
        // (empty, no-op) word before it, wrapping at address 0
        cpu.load_program(&[word(Opcode::Bra, 0xF, 0xF, 0xF)]).unwrap();

        let executed = cpu.run_limited(1000).unwrap();

        assert_eq!(executed, 1000);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_beq_taken_and_not_taken() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            word(Opcode::Beq, 1, 0, 2), // r1 == 0: skip the poison
            load_imm(2, 99),            // skipped
            load_imm(1, 5),
            word(Opcode::Beq, 1, 0, 2), // r1 != 0: fall through
            load_imm(3, 1),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.read(2), 0);
        assert_eq!(cpu.regs.read(3), 1);
    }

    #[test]
    fn test_bne_taken_on_nonzero() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 1),
            word(Opcode::Bne, 1, 0, 2), // taken
            load_imm(2, 99),            // skipped
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        cpu.run().unwrap();

        assert_eq!(cpu.regs.read(2), 0);
    }

    #[test]
    fn test_jmp_combines_register_and_literal() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            word(Opcode::Jmp, 0, 0, 4), // r0 | 0x04 = 4
            load_imm(1, 1),             // skipped
            load_imm(1, 1),             // skipped
            load_imm(1, 1),             // skipped
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 2);
        assert_eq!(cpu.regs.read(1), 0);
        assert_eq!(cpu.pc(), 4);
    }

    #[test]
    fn test_countdown_loop() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 5),
            load_imm(1, -1),            // loop body
            word(Opcode::Bne, 1, 0xF, 0xF), // offset -1: back to the ADDI
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(cpu.regs.read(1), 0);
        // 1 load + 5 decrements + 5 branches + 1 halt
        assert_eq!(executed, 12);
    }

    #[test]
    fn test_run_limited_pauses_mid_program() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[
            load_imm(1, 1),
            load_imm(2, 2),
            load_imm(3, 3),
            word(Opcode::Hlt, 0, 0, 0),
        ])
        .unwrap();

        let executed = cpu.run_limited(2).unwrap();

        assert_eq!(executed, 2);
        assert!(cpu.is_running());
        assert_eq!(cpu.pc(), 2);

        cpu.run().unwrap();
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.read(3), 3);
    }

    #[test]
    fn test_step_after_halt_is_an_error() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[word(Opcode::Hlt, 0, 0, 0)]).unwrap();
        cpu.run().unwrap();

        let err = cpu.step().unwrap_err();
        assert!(matches!(err, CpuError::NotRunning(CpuState::Halted)));
    }

    #[test]
    fn test_empty_memory_runs_nops_until_capped() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[]).unwrap();

        // Word 0x0000 decodes to ADD r0, r0, r0: a no-op
        let executed = cpu.run_limited(100).unwrap();

        assert_eq!(executed, 100);
        assert!(cpu.is_running());
        assert_eq!(cpu.pc(), 100);
    }

    #[test]
    fn test_last_instruction_is_recorded() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[word(Opcode::Hlt, 0, 0, 0)]).unwrap();

        assert_eq!(cpu.last_instruction(), None);
        cpu.run().unwrap();

        assert_eq!(
            cpu.last_instruction(),
            Some(Instruction::new(Opcode::Hlt, 0, 0, 0))
        );
    }

    #[test]
    fn test_reset_restores_power_on_state() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[load_imm(1, 3), word(Opcode::Hlt, 0, 0, 0)])
            .unwrap();
        cpu.run().unwrap();

        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.regs.read(1), 0);
        assert_eq!(cpu.mem.read(0), 0);
    }
}
