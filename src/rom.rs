//! Program image loading.
//!
//! The core never touches files; this module populates a [`Memory`]
//! image before the CPU is constructed. Two formats:
//! - raw binary: bytes copied verbatim to the load origin
//! - hex listing (`.hex`): hex byte pairs separated by whitespace,
//!   `;` starts a comment, blank lines are ignored

use crate::cpu::memory::MemoryError;
use crate::cpu::Memory;
use std::path::Path;
use thiserror::Error;

/// A loaded program image and where it belongs in memory.
#[derive(Debug, Clone)]
pub struct RomFile {
    /// The program bytes.
    pub data: Vec<u8>,
    /// Load origin address.
    pub origin: u16,
}

impl RomFile {
    /// Number of bytes in the image.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Copy the image into memory at its origin.
    pub fn load_into(&self, mem: &mut Memory) -> Result<(), MemoryError> {
        mem.load(self.origin, &self.data)
    }
}

/// Load a program from disk.
///
/// Files ending in `.hex` are parsed as hex listings; anything else is
/// read as raw binary.
pub fn load_rom<P: AsRef<Path>>(path: P, origin: u16) -> Result<RomFile, RomError> {
    let path = path.as_ref();
    let is_hex = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("hex"))
        .unwrap_or(false);

    let data = if is_hex {
        let source =
            std::fs::read_to_string(path).map_err(|e| RomError::IoError(e.to_string()))?;
        parse_hex(&source)?
    } else {
        std::fs::read(path).map_err(|e| RomError::IoError(e.to_string()))?
    };

    Ok(RomFile { data, origin })
}

/// Parse a hex listing into bytes.
pub fn parse_hex(source: &str) -> Result<Vec<u8>, RomError> {
    let mut data = Vec::new();

    for (line_num, line) in source.lines().enumerate() {
        // Strip comment, then split into byte tokens.
        let code = line.split(';').next().unwrap_or("");
        for token in code.split_whitespace() {
            if token.len() != 2 {
                return Err(RomError::ParseError {
                    line: line_num + 1,
                    message: format!("expected a two-digit hex byte, found `{}`", token),
                });
            }
            let byte = u8::from_str_radix(token, 16).map_err(|_| RomError::ParseError {
                line: line_num + 1,
                message: format!("invalid hex byte `{}`", token),
            })?;
            data.push(byte);
        }
    }

    Ok(data)
}

/// Errors that can occur while loading a program image.
#[derive(Debug, Clone, Error)]
pub enum RomError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("load error: {0}")]
    LoadError(#[from] MemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_basic() {
        let data = parse_hex("A9 05 69 03").unwrap();
        assert_eq!(data, vec![0xA9, 0x05, 0x69, 0x03]);
    }

    #[test]
    fn test_parse_hex_comments_and_blanks() {
        let source = "; a tiny program\nA9 05  ; LDA #$05\n\n69 03  ; ADC #$03\n";
        let data = parse_hex(source).unwrap();
        assert_eq!(data, vec![0xA9, 0x05, 0x69, 0x03]);
    }

    #[test]
    fn test_parse_hex_rejects_bad_token() {
        let err = parse_hex("A9 xyz").unwrap_err();
        match err {
            RomError::ParseError { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_into_memory() {
        let rom = RomFile {
            data: vec![0xEA, 0xEA],
            origin: 0x0700,
        };
        let mut mem = Memory::new();
        rom.load_into(&mut mem).unwrap();
        assert_eq!(mem.read(0x0700), 0xEA);
        assert_eq!(mem.read(0x0701), 0xEA);
    }

    #[test]
    fn test_load_into_overflow() {
        let rom = RomFile {
            data: vec![0; 4],
            origin: 0xFFFE,
        };
        let mut mem = Memory::new();
        assert!(rom.load_into(&mut mem).is_err());
    }
}
