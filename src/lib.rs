//! # MOS 6502 Emulator
//!
//! An instruction-level emulator of the MOS 6502, the 8-bit processor
//! behind the Apple II, Commodore 64, and NES. It reproduces the
//! documented instruction set with bit-exact flag semantics; cycle
//! timing, decimal mode, and undocumented opcodes are out of scope.

pub mod cpu;
pub mod dis;
pub mod rom;

// Re-export commonly used types
pub use cpu::{AddrMode, Cpu, CpuError, Instruction, Memory, Mnemonic, Registers, Status};
pub use dis::{disassemble, disassemble_at};
pub use rom::{load_rom, RomError, RomFile};
