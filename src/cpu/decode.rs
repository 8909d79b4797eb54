//! Instruction decoder for the tiny16.
//!
//! Every instruction is exactly one 16-bit word, split into four nibbles:
//!
//! ```text
//! bits 15-12   opcode
//! bits 11-8    dest
//! bits  7-4    reg1
//! bits  3-0    reg2
//! ```
//!
//! Extraction never fails: all sixteen opcode encodings are assigned, so
//! every word decodes to some instruction. What a field *means* is up to
//! the opcode. Two cases to keep in mind:
//! - STR reads its value from `dest` (a store has no destination register)
//! - the immediate forms pack signed offsets into the register fields,
//!   recovered by [`Instruction::imm8`] and [`Instruction::offset12`]

use serde::{Deserialize, Serialize};

/// The sixteen tiny16 opcodes, one per 4-bit encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // ==================== Arithmetic / Logic ====================
    /// dest := reg1 + reg2
    Add = 0x0,
    /// dest := reg1 - reg2
    Sub = 0x2,
    /// dest := reg1 AND reg2
    And = 0x3,
    /// dest := NOT reg1 (reg2 is fetched and ignored)
    Not = 0x4,
    /// dest := reg1 OR reg2
    Or = 0x5,
    /// dest := reg1 * reg2 (low 16 bits)
    Mul = 0x6,
    /// dest := reg1 << reg2 (the raw nibble is the shift amount)
    Lsl = 0x7,
    /// dest := reg1 >> reg2 (the raw nibble is the shift amount)
    Lsr = 0x8,

    // ==================== Memory ====================
    /// mem[reg1 + reg2] := dest (dest names the value register)
    Str = 0x1,
    /// dest := mem[reg1 + reg2-as-displacement]
    Ldm = 0x9,

    // ==================== Immediate ====================
    /// dest := dest + imm8 (signed, packed in reg1:reg2)
    Addi = 0xA,

    // ==================== Control Flow ====================
    /// PC-relative branch by offset12 (signed, packed in dest:reg1:reg2)
    Bra = 0xB,
    /// Branch by imm8 if register `dest` == 0
    Beq = 0xC,
    /// Branch by imm8 if register `dest` != 0
    Bne = 0xD,
    /// Absolute jump to reg(dest) OR'd with the reg1:reg2 literal byte
    Jmp = 0xE,
    /// Stop the machine, leaving the PC on this instruction
    Hlt = 0xF,
}

impl Opcode {
    /// Decode a 4-bit opcode field. Total: every nibble names an opcode.
    pub fn from_nibble(nibble: u8) -> Self {
        match nibble & 0xF {
            0x0 => Opcode::Add,
            0x1 => Opcode::Str,
            0x2 => Opcode::Sub,
            0x3 => Opcode::And,
            0x4 => Opcode::Not,
            0x5 => Opcode::Or,
            0x6 => Opcode::Mul,
            0x7 => Opcode::Lsl,
            0x8 => Opcode::Lsr,
            0x9 => Opcode::Ldm,
            0xA => Opcode::Addi,
            0xB => Opcode::Bra,
            0xC => Opcode::Beq,
            0xD => Opcode::Bne,
            0xE => Opcode::Jmp,
            0xF => Opcode::Hlt,
            _ => unreachable!(),
        }
    }

    /// The 4-bit encoding of this opcode.
    #[inline]
    pub const fn to_nibble(self) -> u8 {
        self as u8
    }

    /// The assembly mnemonic for this opcode.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Str => "STR",
            Opcode::Sub => "SUB",
            Opcode::And => "AND",
            Opcode::Not => "NOT",
            Opcode::Or => "OR",
            Opcode::Mul => "MUL",
            Opcode::Lsl => "LSL",
            Opcode::Lsr => "LSR",
            Opcode::Ldm => "LDM",
            Opcode::Addi => "ADDI",
            Opcode::Bra => "BRA",
            Opcode::Beq => "BEQ",
            Opcode::Bne => "BNE",
            Opcode::Jmp => "JMP",
            Opcode::Hlt => "HLT",
        }
    }
}

/// A decoded tiny16 instruction: the opcode plus the three raw nibble
/// fields. Produced fresh each cycle and discarded after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Bits 11-8. Destination register, except for STR (value source),
    /// BEQ/BNE (condition register), and BRA (high offset nibble).
    pub dest: u8,
    /// Bits 7-4.
    pub reg1: u8,
    /// Bits 3-0.
    pub reg2: u8,
}

impl Instruction {
    /// Build an instruction from raw fields. Each field is masked to 4 bits.
    pub fn new(opcode: Opcode, dest: u8, reg1: u8, reg2: u8) -> Self {
        Self {
            opcode,
            dest: dest & 0xF,
            reg1: reg1 & 0xF,
            reg2: reg2 & 0xF,
        }
    }

    /// Pack the fields back into an instruction word.
    pub fn encode(&self) -> u16 {
        u16::from(self.opcode.to_nibble()) << 12
            | u16::from(self.dest & 0xF) << 8
            | u16::from(self.reg1 & 0xF) << 4
            | u16::from(self.reg2 & 0xF)
    }

    /// The signed 8-bit immediate packed into reg1:reg2.
    ///
    /// ADDI adds it to the destination register; BEQ and BNE use it as a
    /// branch offset while `dest` names the condition register.
    pub fn imm8(&self) -> i16 {
        let raw = (self.reg1 & 0xF) << 4 | (self.reg2 & 0xF);
        i16::from(raw as i8)
    }

    /// The signed 12-bit offset packed into dest:reg1:reg2, used by BRA.
    pub fn offset12(&self) -> i16 {
        let raw = u16::from(self.dest & 0xF) << 8
            | u16::from(self.reg1 & 0xF) << 4
            | u16::from(self.reg2 & 0xF);
        if raw & 0x0800 != 0 {
            (raw | 0xF000) as i16
        } else {
            raw as i16
        }
    }
}

/// Split an instruction word into its four nibble fields.
#[inline]
pub fn decode(word: u16) -> Instruction {
    Instruction {
        opcode: Opcode::from_nibble((word >> 12) as u8),
        dest: ((word >> 8) & 0xF) as u8,
        reg1: ((word >> 4) & 0xF) as u8,
        reg2: (word & 0xF) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fields() {
        // 0x1234: opcode 1 (STR), dest 2, reg1 3, reg2 4
        let instr = decode(0x1234);
        assert_eq!(instr.opcode, Opcode::Str);
        assert_eq!(instr.dest, 2);
        assert_eq!(instr.reg1, 3);
        assert_eq!(instr.reg2, 4);
    }

    #[test]
    fn test_decode_is_total() {
        // Every nibble maps to an opcode and back to the same nibble
        for nibble in 0..16u8 {
            assert_eq!(Opcode::from_nibble(nibble).to_nibble(), nibble);
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let cases = [
            Instruction::new(Opcode::Add, 1, 2, 3),
            Instruction::new(Opcode::Str, 15, 0, 14),
            Instruction::new(Opcode::Hlt, 0, 0, 0),
            Instruction::new(Opcode::Bra, 0xF, 0xF, 0xF),
            Instruction::new(Opcode::Addi, 7, 0x8, 0x1),
        ];

        for instr in cases {
            assert_eq!(decode(instr.encode()), instr);
        }
    }

    #[test]
    fn test_imm8_sign_extension() {
        // 0xFF -> -1
        assert_eq!(Instruction::new(Opcode::Addi, 1, 0xF, 0xF).imm8(), -1);
        // 0x7F -> 127
        assert_eq!(Instruction::new(Opcode::Addi, 1, 0x7, 0xF).imm8(), 127);
        // 0x80 -> -128
        assert_eq!(Instruction::new(Opcode::Addi, 1, 0x8, 0x0).imm8(), -128);
        assert_eq!(Instruction::new(Opcode::Addi, 1, 0x0, 0x5).imm8(), 5);
    }

    #[test]
    fn test_offset12_sign_extension() {
        // 0xFFF -> -1
        assert_eq!(Instruction::new(Opcode::Bra, 0xF, 0xF, 0xF).offset12(), -1);
        // 0x800 -> -2048
        assert_eq!(Instruction::new(Opcode::Bra, 0x8, 0x0, 0x0).offset12(), -2048);
        // 0x7FF -> 2047
        assert_eq!(Instruction::new(Opcode::Bra, 0x7, 0xF, 0xF).offset12(), 2047);
        assert_eq!(Instruction::new(Opcode::Bra, 0x0, 0x1, 0x2).offset12(), 0x12);
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::Add.mnemonic(), "ADD");
        assert_eq!(Opcode::Hlt.mnemonic(), "HLT");
        assert_eq!(decode(0xA105).opcode.mnemonic(), "ADDI");
    }

    #[test]
    fn test_new_masks_fields() {
        let instr = Instruction::new(Opcode::Add, 0x12, 0x34, 0x56);
        assert_eq!(instr.dest, 0x2);
        assert_eq!(instr.reg1, 0x4);
        assert_eq!(instr.reg2, 0x6);
    }
}
