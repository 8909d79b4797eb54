//! Two-pass assembler for tiny16 programs.
//!
//! Syntax:
//! ```text
//! ; comment
//! LOOP:                ; define a label
//!     ADDI r1, #-1     ; immediates: #decimal, #0x.. hex, #0b.. binary
//!     ADD r2, r1, r0
//!     NOT r3, r1
//!     LSL r4, r1, #2
//!     STR r2, [r1+r0]  ; store: value register, register-indexed address
//!     LDM r5, [r1+#3]  ; load: base register plus a 4-bit displacement
//!     BNE r1, LOOP     ; branches take a label or a numeric offset
//!     JMP r0, #8       ; absolute jump: register OR'd with a literal byte
//!     HLT
//!
//!     ORG 32           ; pad with zero words up to address 32
//!     DAT 0xBEEF       ; emit a raw data word
//! ```
//!
//! `NOP` assembles to `ADD r0, r0, r0`, the all-zero word.

use crate::cpu::decode::{Instruction, Opcode};
use crate::cpu::memory::MEMORY_SIZE;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source text into program words.
pub fn assemble(source: &str) -> Result<Vec<u16>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// One output slot, exactly one word. Branches and jumps that name a label
/// stay symbolic until pass 2.
enum Item {
    Word(u16),
    Branch {
        opcode: Opcode,
        cond: u8,
        label: String,
        addr: usize,
        line: usize,
    },
    Jump {
        dest: u8,
        label: String,
        line: usize,
    },
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, usize>,
    /// Output slots.
    items: Vec<Item>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            items: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u16>, AssemblerError> {
        // Pass 1: collect labels, encode everything that names no symbol
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: resolve label references
        self.resolve()
    }

    fn process_line(&mut self, raw: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Strip comments and whitespace
        let line = match raw.find(';') {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Label definition, optionally followed by an instruction
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "empty label".into(),
                });
            }
            if self.symbols.insert(label.clone(), self.items.len()).is_some() {
                return Err(AssemblerError::DuplicateLabel {
                    line: line_num,
                    label,
                });
            }

            let rest = line[colon_idx + 1..].trim();
            if rest.is_empty() {
                return Ok(());
            }
            return self.process_instruction(rest, line_num);
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
            Some((m, r)) => (m.to_uppercase(), r.trim()),
            None => (line.to_uppercase(), ""),
        };
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        match mnemonic.as_str() {
            // ==================== Directives ====================
            "ORG" => {
                expect(&operands, 1, "ORG <addr>", line_num)?;
                let target = parse_immediate(operands[0], line_num)?;
                if target < 0 || target as usize > MEMORY_SIZE {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: target,
                    });
                }
                let target = target as usize;
                if target < self.items.len() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!(
                            "ORG {} is behind the current address {}",
                            target,
                            self.items.len()
                        ),
                    });
                }
                while self.items.len() < target {
                    self.items.push(Item::Word(0));
                }
            }

            "DAT" | "DATA" => {
                expect(&operands, 1, "DAT <value>", line_num)?;
                let value = parse_immediate(operands[0], line_num)?;
                if value < i32::from(i16::MIN) || value > i32::from(u16::MAX) {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value,
                    });
                }
                self.items.push(Item::Word(value as u16));
            }

            // ==================== Arithmetic / Logic ====================
            "ADD" | "SUB" | "AND" | "OR" | "MUL" => {
                expect(&operands, 3, "rd, ra, rb", line_num)?;
                let opcode = match mnemonic.as_str() {
                    "ADD" => Opcode::Add,
                    "SUB" => Opcode::Sub,
                    "AND" => Opcode::And,
                    "OR" => Opcode::Or,
                    _ => Opcode::Mul,
                };
                let dest = parse_register(operands[0], line_num)?;
                let reg1 = parse_register(operands[1], line_num)?;
                let reg2 = parse_register(operands[2], line_num)?;
                self.emit(Instruction::new(opcode, dest, reg1, reg2).encode());
            }

            "NOT" => {
                expect(&operands, 2, "rd, ra", line_num)?;
                let dest = parse_register(operands[0], line_num)?;
                let reg1 = parse_register(operands[1], line_num)?;
                self.emit(Instruction::new(Opcode::Not, dest, reg1, 0).encode());
            }

            "LSL" | "LSR" => {
                expect(&operands, 3, "rd, ra, #amount", line_num)?;
                let opcode = if mnemonic == "LSL" {
                    Opcode::Lsl
                } else {
                    Opcode::Lsr
                };
                let dest = parse_register(operands[0], line_num)?;
                let reg1 = parse_register(operands[1], line_num)?;
                let amount = parse_immediate(operands[2], line_num)?;
                if !(0..=15).contains(&amount) {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: amount,
                    });
                }
                self.emit(Instruction::new(opcode, dest, reg1, amount as u8).encode());
            }

            // ==================== Memory ====================
            "STR" => {
                expect(&operands, 2, "rv, [ra+rb]", line_num)?;
                let value_reg = parse_register(operands[0], line_num)?;
                let (base, index) = parse_mem_operand(operands[1], line_num)?;
                let index_reg = match index {
                    MemIndex::None => 0,
                    MemIndex::Register(r) => r,
                    MemIndex::Literal(_) => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: "STR indexes by register, e.g. [r1+r2]".into(),
                        })
                    }
                };
                self.emit(Instruction::new(Opcode::Str, value_reg, base, index_reg).encode());
            }

            "LDM" => {
                expect(&operands, 2, "rd, [ra+#disp]", line_num)?;
                let dest = parse_register(operands[0], line_num)?;
                let (base, index) = parse_mem_operand(operands[1], line_num)?;
                let disp = match index {
                    MemIndex::None => 0,
                    MemIndex::Literal(n) => n,
                    MemIndex::Register(_) => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: "LDM displaces by a literal, e.g. [r1+#3]".into(),
                        })
                    }
                };
                if !(0..=15).contains(&disp) {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: disp,
                    });
                }
                self.emit(Instruction::new(Opcode::Ldm, dest, base, disp as u8).encode());
            }

            // ==================== Immediates ====================
            "ADDI" => {
                expect(&operands, 2, "rd, #imm", line_num)?;
                let dest = parse_register(operands[0], line_num)?;
                let imm = parse_immediate(operands[1], line_num)?;
                if !(-128..=127).contains(&imm) {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: imm,
                    });
                }
                let raw = imm as i8 as u8;
                self.emit(Instruction::new(Opcode::Addi, dest, raw >> 4, raw & 0xF).encode());
            }

            // ==================== Control Flow ====================
            "BRA" => {
                expect(&operands, 1, "<label|offset>", line_num)?;
                self.emit_branch(Opcode::Bra, 0, operands[0], line_num)?;
            }

            "BEQ" | "BNE" => {
                expect(&operands, 2, "rc, <label|offset>", line_num)?;
                let opcode = if mnemonic == "BEQ" {
                    Opcode::Beq
                } else {
                    Opcode::Bne
                };
                let cond = parse_register(operands[0], line_num)?;
                self.emit_branch(opcode, cond, operands[1], line_num)?;
            }

            "JMP" => {
                expect(&operands, 2, "rd, <label|#target>", line_num)?;
                let dest = parse_register(operands[0], line_num)?;
                let target = operands[1];
                if looks_numeric(target) {
                    let value = parse_immediate(target, line_num)?;
                    if !(0..=255).contains(&value) {
                        return Err(AssemblerError::ValueOutOfRange {
                            line: line_num,
                            value,
                        });
                    }
                    self.emit(jmp_word(dest, value as u8));
                } else {
                    self.items.push(Item::Jump {
                        dest,
                        label: target.to_uppercase(),
                        line: line_num,
                    });
                }
            }

            "HLT" | "HALT" => {
                expect(&operands, 0, "no operands", line_num)?;
                self.emit(Instruction::new(Opcode::Hlt, 0, 0, 0).encode());
            }

            "NOP" => {
                expect(&operands, 0, "no operands", line_num)?;
                self.emit(Instruction::new(Opcode::Add, 0, 0, 0).encode());
            }

            _ => {
                return Err(AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic,
                })
            }
        }

        Ok(())
    }

    fn emit(&mut self, word: u16) {
        self.items.push(Item::Word(word));
    }

    fn emit_branch(
        &mut self,
        opcode: Opcode,
        cond: u8,
        target: &str,
        line_num: usize,
    ) -> Result<(), AssemblerError> {
        if looks_numeric(target) {
            let offset = parse_immediate(target, line_num)?;
            let word = encode_branch(opcode, cond, offset, line_num)?;
            self.emit(word);
        } else {
            self.items.push(Item::Branch {
                opcode,
                cond,
                label: target.to_uppercase(),
                addr: self.items.len(),
                line: line_num,
            });
        }
        Ok(())
    }

    fn resolve(&self) -> Result<Vec<u16>, AssemblerError> {
        let mut words = Vec::with_capacity(self.items.len());

        for item in &self.items {
            let word = match item {
                Item::Word(w) => *w,
                Item::Branch {
                    opcode,
                    cond,
                    label,
                    addr,
                    line,
                } => {
                    let target = self.lookup(label, *line)?;
                    let offset = target as i64 - *addr as i64;
                    encode_branch(*opcode, *cond, offset as i32, *line)?
                }
                Item::Jump { dest, label, line } => {
                    let target = self.lookup(label, *line)?;
                    if target > 0xFF {
                        return Err(AssemblerError::ValueOutOfRange {
                            line: *line,
                            value: target as i32,
                        });
                    }
                    jmp_word(*dest, target as u8)
                }
            };
            words.push(word);
        }

        Ok(words)
    }

    fn lookup(&self, label: &str, line: usize) -> Result<usize, AssemblerError> {
        self.symbols
            .get(label)
            .copied()
            .ok_or_else(|| AssemblerError::UndefinedLabel {
                line,
                label: label.to_string(),
            })
    }
}

/// Encode a branch with its offset packed into the low fields.
///
/// BRA carries 12 signed bits; BEQ/BNE carry 8, with the condition register
/// in `cond`.
fn encode_branch(opcode: Opcode, cond: u8, offset: i32, line: usize) -> Result<u16, AssemblerError> {
    let (min, max) = if opcode == Opcode::Bra {
        (-2048, 2047)
    } else {
        (-128, 127)
    };
    if offset < min || offset > max {
        return Err(AssemblerError::BranchOutOfRange { line, offset });
    }

    let word = if opcode == Opcode::Bra {
        let raw = offset as u16 & 0x0FFF;
        Instruction::new(Opcode::Bra, (raw >> 8) as u8, (raw >> 4) as u8, raw as u8).encode()
    } else {
        let raw = offset as u16 & 0x00FF;
        Instruction::new(opcode, cond, (raw >> 4) as u8, raw as u8).encode()
    };

    Ok(word)
}

fn jmp_word(dest: u8, target: u8) -> u16 {
    Instruction::new(Opcode::Jmp, dest, target >> 4, target & 0xF).encode()
}

fn expect(operands: &[&str], count: usize, usage: &str, line: usize) -> Result<(), AssemblerError> {
    if operands.len() != count {
        return Err(AssemblerError::SyntaxError {
            line,
            message: format!("expected {}, found {} operand(s)", usage, operands.len()),
        });
    }
    Ok(())
}

/// A register token: `r0` through `r15`, case-insensitive.
fn parse_register(token: &str, line: usize) -> Result<u8, AssemblerError> {
    let rest = token
        .strip_prefix('r')
        .or_else(|| token.strip_prefix('R'))
        .ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: format!("expected a register, found {:?}", token),
        })?;

    match rest.parse::<u8>() {
        Ok(n) if n < 16 => Ok(n),
        _ => Err(AssemblerError::SyntaxError {
            line,
            message: format!("no such register {:?} (r0 through r15)", token),
        }),
    }
}

/// A numeric token: optional `#`, optional sign, then decimal, `0x` hex,
/// or `0b` binary digits.
fn parse_immediate(token: &str, line: usize) -> Result<i32, AssemblerError> {
    let body = token.strip_prefix('#').unwrap_or(token).trim();

    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body.strip_prefix('+').unwrap_or(body)),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i32::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
        i32::from_str_radix(bin, 2)
    } else {
        digits.parse::<i32>()
    };

    match parsed {
        Ok(value) => Ok(if negative { -value } else { value }),
        Err(_) => Err(AssemblerError::SyntaxError {
            line,
            message: format!("invalid numeric literal {:?}", token),
        }),
    }
}

/// Numeric operands start with a digit, a sign, or `#`; anything else is
/// taken as a label reference.
fn looks_numeric(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit() || c == '#' || c == '-' || c == '+')
}

/// The index half of a memory operand.
enum MemIndex {
    None,
    Register(u8),
    Literal(i32),
}

/// A memory operand: `[ra]`, `[ra+rb]`, or `[ra+#n]`.
fn parse_mem_operand(token: &str, line: usize) -> Result<(u8, MemIndex), AssemblerError> {
    let inner = token
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| AssemblerError::SyntaxError {
            line,
            message: format!("expected a memory operand like [r1+r2], found {:?}", token),
        })?;

    match inner.split_once('+') {
        None => Ok((parse_register(inner.trim(), line)?, MemIndex::None)),
        Some((base, index)) => {
            let base = parse_register(base.trim(), line)?;
            let index = index.trim();
            if looks_numeric(index) {
                Ok((base, MemIndex::Literal(parse_immediate(index, line)?)))
            } else {
                Ok((base, MemIndex::Register(parse_register(index, line)?)))
            }
        }
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i32 },

    #[error("branch out of range on line {line}: offset {offset}")]
    BranchOutOfRange { line: usize, offset: i32 },
}
