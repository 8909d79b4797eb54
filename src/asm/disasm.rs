//! Disassembler for tiny16 programs.
//!
//! Converts instruction words back to readable assembly. The output is a
//! debugging aid rather than a stable format, but every line it produces is
//! accepted back by the assembler.

use crate::cpu::decode::{decode, Instruction, Opcode};

/// Disassemble a single instruction word to text.
pub fn disassemble_instruction(word: u16) -> String {
    format_instruction(&decode(word))
}

/// Disassemble a program into an addressed listing.
pub fn disassemble(words: &[u16]) -> String {
    let mut output = String::new();
    output.push_str("; tiny16 disassembly\n");
    output.push_str("; ------------------\n\n");

    for (addr, word) in words.iter().enumerate() {
        let line = disassemble_instruction(*word);
        output.push_str(&format!("{:<24} ; {:04X}  {:016b}\n", line, addr, word));
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction) -> String {
    let mnemonic = instr.opcode.mnemonic();

    match instr.opcode {
        // Three-register ALU group
        Opcode::Add | Opcode::Sub | Opcode::And | Opcode::Or | Opcode::Mul => {
            format!("{} r{}, r{}, r{}", mnemonic, instr.dest, instr.reg1, instr.reg2)
        }

        // Unary: the ignored reg2 field is not shown
        Opcode::Not => format!("NOT r{}, r{}", instr.dest, instr.reg1),

        // Shifts take a literal amount
        Opcode::Lsl | Opcode::Lsr => {
            format!("{} r{}, r{}, #{}", mnemonic, instr.dest, instr.reg1, instr.reg2)
        }

        // Memory
        Opcode::Str => format!("STR r{}, [r{}+r{}]", instr.dest, instr.reg1, instr.reg2),
        Opcode::Ldm => format!("LDM r{}, [r{}+#{}]", instr.dest, instr.reg1, instr.reg2),

        // Immediates and branches
        Opcode::Addi => format!("ADDI r{}, #{}", instr.dest, instr.imm8()),
        Opcode::Bra => format!("BRA {:+}", instr.offset12()),
        Opcode::Beq | Opcode::Bne => format!("{} r{}, {:+}", mnemonic, instr.dest, instr.imm8()),
        Opcode::Jmp => format!(
            "JMP r{}, #{}",
            instr.dest,
            u16::from(instr.reg1) << 4 | u16::from(instr.reg2)
        ),

        Opcode::Hlt => "HLT".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::Instruction;

    #[test]
    fn test_disassemble_hlt() {
        let word = Instruction::new(Opcode::Hlt, 0, 0, 0).encode();
        assert_eq!(disassemble_instruction(word), "HLT");
    }

    #[test]
    fn test_disassemble_add() {
        let word = Instruction::new(Opcode::Add, 3, 1, 2).encode();
        assert_eq!(disassemble_instruction(word), "ADD r3, r1, r2");
    }

    #[test]
    fn test_disassemble_store_and_load() {
        let str_word = Instruction::new(Opcode::Str, 1, 2, 0).encode();
        assert_eq!(disassemble_instruction(str_word), "STR r1, [r2+r0]");

        let ldm_word = Instruction::new(Opcode::Ldm, 4, 2, 3).encode();
        assert_eq!(disassemble_instruction(ldm_word), "LDM r4, [r2+#3]");
    }

    #[test]
    fn test_disassemble_signed_immediates() {
        let addi = Instruction::new(Opcode::Addi, 1, 0xF, 0xF).encode();
        assert_eq!(disassemble_instruction(addi), "ADDI r1, #-1");

        let bra = Instruction::new(Opcode::Bra, 0, 0, 2).encode();
        assert_eq!(disassemble_instruction(bra), "BRA +2");

        let beq = Instruction::new(Opcode::Beq, 5, 0xF, 0xE).encode();
        assert_eq!(disassemble_instruction(beq), "BEQ r5, -2");
    }

    #[test]
    fn test_disassemble_jmp_literal() {
        let word = Instruction::new(Opcode::Jmp, 0, 1, 2).encode();
        assert_eq!(disassemble_instruction(word), "JMP r0, #18");
    }

    #[test]
    fn test_listing_has_one_line_per_word() {
        let words = [0xF000, 0x0123];
        let listing = disassemble(&words);

        let body: Vec<&str> = listing
            .lines()
            .filter(|l| !l.starts_with(';') && !l.is_empty())
            .collect();
        assert_eq!(body.len(), 2);
        assert!(body[0].contains("HLT"));
        assert!(body[1].contains("ADD r1, r2, r3"));
    }
}
