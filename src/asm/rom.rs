//! ROM image format for tiny16 programs.
//!
//! The native program format is plain text, one instruction word per line,
//! written as 16 binary digits with the most significant bit first:
//!
//! ```text
//! ; comments run from a semicolon to end of line
//! 1010000100101010    ; ADDI r1, #42
//! 1111000000000000    ; HLT
//! ```
//!
//! Comments are stripped, surrounding whitespace is trimmed, and blank lines
//! are skipped. Whatever survives must be exactly sixteen '0'/'1' characters;
//! anything else fails the whole load with the offending line number. Words
//! occupy sequential addresses starting at 0.

use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// A loaded ROM image.
#[derive(Debug, Clone)]
pub struct RomFile {
    /// The program words, in address order.
    pub words: Vec<u16>,
    /// The source text each word came from (for listings and debugging).
    pub source_lines: Vec<String>,
}

impl RomFile {
    /// Create a new empty ROM image.
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            source_lines: Vec::new(),
        }
    }

    /// Append a word with its source text.
    pub fn push(&mut self, word: u16, source: &str) {
        self.words.push(word);
        self.source_lines.push(source.to_string());
    }

    /// Get the number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl Default for RomFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse ROM text into an image.
pub fn parse_rom(source: &str) -> Result<RomFile, RomError> {
    let mut rom = RomFile::new();

    for (line_num, raw) in source.lines().enumerate() {
        // Strip comments and whitespace
        let line = match raw.find(';') {
            Some(idx) => &raw[..idx],
            None => raw,
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        rom.push(parse_word(line, line_num + 1)?, line);
    }

    Ok(rom)
}

/// Parse one surviving line as a 16-digit binary word, MSB first.
fn parse_word(line: &str, line_num: usize) -> Result<u16, RomError> {
    let digits = line.chars().count();
    if digits != 16 {
        return Err(RomError::WrongLength {
            line: line_num,
            found: digits,
            text: line.to_string(),
        });
    }

    let mut word: u16 = 0;
    for c in line.chars() {
        let bit = match c {
            '0' => 0,
            '1' => 1,
            other => {
                return Err(RomError::InvalidDigit {
                    line: line_num,
                    digit: other,
                    text: line.to_string(),
                })
            }
        };
        word = word << 1 | bit;
    }

    Ok(word)
}

/// Load a ROM image from disk.
pub fn load_rom<P: AsRef<Path>>(path: P) -> Result<RomFile, RomError> {
    let source = std::fs::read_to_string(path.as_ref())
        .map_err(|e| RomError::IoError(e.to_string()))?;
    parse_rom(&source)
}

/// Save a ROM image to disk, one annotated word per line.
pub fn save_rom<P: AsRef<Path>>(path: P, rom: &RomFile) -> Result<(), RomError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| RomError::IoError(e.to_string()))?;

    writeln!(file, "; tiny16 ROM image")
        .map_err(|e| RomError::IoError(e.to_string()))?;
    writeln!(file, "; {} words", rom.len())
        .map_err(|e| RomError::IoError(e.to_string()))?;
    writeln!(file).map_err(|e| RomError::IoError(e.to_string()))?;

    for (addr, word) in rom.words.iter().enumerate() {
        match rom.source_lines.get(addr) {
            Some(src) if !src.is_empty() => writeln!(file, "{:016b} ; {:04X}  {}", word, addr, src),
            _ => writeln!(file, "{:016b} ; {:04X}", word, addr),
        }
        .map_err(|e| RomError::IoError(e.to_string()))?;
    }

    Ok(())
}

/// Errors that can occur during ROM image operations.
#[derive(Debug, Clone, Error)]
pub enum RomError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("line {line}: expected 16 binary digits, found {found} in {text:?}")]
    WrongLength {
        line: usize,
        found: usize,
        text: String,
    },

    #[error("line {line}: invalid digit {digit:?} in {text:?} (only '0' and '1' are allowed)")]
    InvalidDigit {
        line: usize,
        digit: char,
        text: String,
    },
}
