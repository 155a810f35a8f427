//! CPU emulation for the MOS 6502.
//!
//! This module implements the instruction-level architecture:
//! - 64 KiB flat memory image
//! - registers A, X, Y, P (flags), S (stack pointer), PC
//! - the documented 151-opcode instruction set
//!
//! Timing is not modeled; one `step` is one instruction.

pub mod decode;
pub mod execute;
pub mod memory;
pub mod registers;

pub use decode::{decode, AddrMode, DecodeError, Instruction, Mnemonic};
pub use execute::{Cpu, CpuError, BREAK_VECTOR};
pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Registers, Status, STACK_BASE};
