//! Disassembler for 6502 machine code.
//!
//! Formats decoded instructions as conventional assembly text, for the
//! trace output of the run loop and the `disasm` command. Bytes that do
//! not decode are shown as `.byte` directives.

use crate::cpu::decode::{decode, AddrMode, Instruction};
use crate::cpu::Memory;

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the number of bytes the instruction occupies.
pub fn disassemble_at(mem: &Memory, addr: u16) -> (String, u16) {
    let opcode = mem.read(addr);
    match decode(opcode) {
        Ok(instr) => {
            let lo = mem.read(addr.wrapping_add(1));
            let hi = mem.read(addr.wrapping_add(2));
            (format_instruction(&instr, addr, lo, hi), instr.len())
        }
        Err(_) => (format!(".byte ${:02X}", opcode), 1),
    }
}

/// Disassemble a byte slice loaded at `origin` into a listing.
pub fn disassemble(bytes: &[u8], origin: u16) -> String {
    let mut output = String::new();
    let mut index = 0usize;

    while index < bytes.len() {
        let addr = origin.wrapping_add(index as u16);
        let fetch = |offset: usize| bytes.get(index + offset).copied().unwrap_or(0);

        let (text, len) = match decode(fetch(0)) {
            Ok(instr) => (
                format_instruction(&instr, addr, fetch(1), fetch(2)),
                instr.len() as usize,
            ),
            Err(_) => (format!(".byte ${:02X}", fetch(0)), 1),
        };

        let raw: Vec<String> = (0..len).map(|i| format!("{:02X}", fetch(i))).collect();
        output.push_str(&format!("{:04X}  {:<9} {}\n", addr, raw.join(" "), text));
        index += len;
    }

    output
}

/// Format a decoded instruction given its operand bytes.
///
/// `addr` is the instruction's own address, needed to show branch
/// targets as absolute addresses.
fn format_instruction(instr: &Instruction, addr: u16, lo: u8, hi: u8) -> String {
    let word = u16::from_le_bytes([lo, hi]);
    let name = instr.mnemonic;
    match instr.mode {
        AddrMode::Implied => name.to_string(),
        AddrMode::Accumulator => format!("{} A", name),
        AddrMode::Immediate => format!("{} #${:02X}", name, lo),
        AddrMode::Absolute => format!("{} ${:04X}", name, word),
        AddrMode::AbsoluteX => format!("{} ${:04X},X", name, word),
        AddrMode::AbsoluteY => format!("{} ${:04X},Y", name, word),
        AddrMode::Indirect => format!("{} (${:04X})", name, word),
        AddrMode::ZeroPage => format!("{} ${:02X}", name, lo),
        AddrMode::ZeroPageX => format!("{} ${:02X},X", name, lo),
        AddrMode::ZeroPageY => format!("{} ${:02X},Y", name, lo),
        AddrMode::IndexedIndirect => format!("{} (${:02X},X)", name, lo),
        AddrMode::IndirectIndexed => format!("{} (${:02X}),Y", name, lo),
        AddrMode::Relative => {
            let target = addr
                .wrapping_add(instr.len())
                .wrapping_add(i16::from(lo as i8) as u16);
            format!("{} ${:04X}", name, target)
        }
    }
}
