//! CPU execution engine for the 6502.
//!
//! Implements the fetch-decode-execute step and all instruction
//! behaviors. The caller drives iteration: `step` executes exactly one
//! instruction and the only error it can report is an unknown opcode,
//! which ends execution but not the process.

use crate::cpu::decode::{self, AddrMode, Instruction, Mnemonic};
use crate::cpu::registers::{Registers, Status};
use crate::cpu::Memory;
use thiserror::Error;

/// Address BRK loads its new program counter from.
pub const BREAK_VECTOR: u16 = 0xFFFA;

/// The 6502 CPU.
///
/// The memory image is borrowed for the CPU's lifetime; the CPU never
/// allocates or frees it, only reads and writes through the borrow.
pub struct Cpu<'m> {
    /// CPU registers.
    pub regs: Registers,
    /// Borrowed 64 KiB memory image.
    mem: &'m mut Memory,
    /// Instructions executed so far.
    pub cycles: u64,
}

impl<'m> Cpu<'m> {
    /// Create a CPU over `mem` with the program counter at `entry`.
    ///
    /// All other registers start at zero.
    pub fn new(mem: &'m mut Memory, entry: u16) -> Self {
        Self {
            regs: Registers::new(entry),
            mem,
            cycles: 0,
        }
    }

    /// Read access to the memory image.
    pub fn mem(&self) -> &Memory {
        self.mem
    }

    /// Write access to the memory image.
    pub fn mem_mut(&mut self) -> &mut Memory {
        self.mem
    }

    /// Execute a single instruction.
    ///
    /// Returns the decoded instruction, or [`CpuError::UnknownOpcode`]
    /// with the program counter left one past the opcode byte.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        let at = self.regs.pc;
        let opcode = self.fetch_byte();
        let instr =
            decode::decode(opcode).map_err(|_| CpuError::UnknownOpcode { opcode, at })?;
        self.execute(instr);
        self.cycles += 1;
        Ok(instr)
    }

    /// Step at most `max_steps` instructions.
    ///
    /// Returns the number executed, or the first error encountered.
    pub fn run_limited(&mut self, max_steps: u64) -> Result<u64, CpuError> {
        let start = self.cycles;
        while self.cycles - start < max_steps {
            self.step()?;
        }
        Ok(self.cycles - start)
    }

    // ==================== Fetch ====================

    /// Consume one instruction byte, advancing the program counter.
    #[inline]
    fn fetch_byte(&mut self) -> u8 {
        let byte = self.mem.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        byte
    }

    /// Consume two instruction bytes as a little-endian word.
    #[inline]
    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte();
        let hi = self.fetch_byte();
        u16::from_le_bytes([lo, hi])
    }

    // ==================== Addressing modes ====================

    /// Resolve a mode to an effective address, consuming its operand
    /// bytes. Used both for reads and for writable locations.
    fn effective_address(&mut self, mode: AddrMode) -> u16 {
        match mode {
            AddrMode::Absolute => self.fetch_word(),
            AddrMode::AbsoluteX => self.fetch_word().wrapping_add(u16::from(self.regs.x)),
            AddrMode::AbsoluteY => self.fetch_word().wrapping_add(u16::from(self.regs.y)),
            AddrMode::Indirect => {
                let ptr = self.fetch_word();
                self.mem.read_word(ptr)
            }
            AddrMode::ZeroPage => u16::from(self.fetch_byte()),
            AddrMode::ZeroPageX => u16::from(self.fetch_byte().wrapping_add(self.regs.x)),
            AddrMode::ZeroPageY => u16::from(self.fetch_byte().wrapping_add(self.regs.y)),
            AddrMode::IndexedIndirect => {
                // Pointer lives at (byte + X) wrapped to page zero; its
                // high byte comes from the next slot without wrapping,
                // so a pointer byte of 0xFF reads its high half at 0x0100.
                let ptr = u16::from(self.fetch_byte().wrapping_add(self.regs.x));
                let lo = self.mem.read(ptr);
                let hi = self.mem.read(ptr + 1);
                u16::from_le_bytes([lo, hi])
            }
            AddrMode::IndirectIndexed => {
                let ptr = u16::from(self.fetch_byte());
                let lo = self.mem.read(ptr);
                let hi = self.mem.read(ptr + 1);
                u16::from_le_bytes([lo, hi]).wrapping_add(u16::from(self.regs.y))
            }
            AddrMode::Implied | AddrMode::Accumulator | AddrMode::Immediate | AddrMode::Relative => {
                unreachable!("{:?} does not resolve to a memory address", mode)
            }
        }
    }

    /// Resolve a mode to an operand value, consuming its operand bytes.
    fn operand_value(&mut self, mode: AddrMode) -> u8 {
        match mode {
            AddrMode::Immediate => self.fetch_byte(),
            _ => {
                let addr = self.effective_address(mode);
                self.mem.read(addr)
            }
        }
    }

    /// Resolve a writable location, apply `op` to the value there, and
    /// write the result back. `Accumulator` mode targets A itself.
    fn read_modify_write<F>(&mut self, mode: AddrMode, op: F)
    where
        F: FnOnce(&mut Self, u8) -> u8,
    {
        match mode {
            AddrMode::Accumulator => {
                let value = self.regs.a;
                self.regs.a = op(self, value);
            }
            _ => {
                let addr = self.effective_address(mode);
                let value = self.mem.read(addr);
                let result = op(self, value);
                self.mem.write(addr, result);
            }
        }
    }

    // ==================== Stack ====================

    fn push(&mut self, value: u8) {
        self.mem.write(self.regs.stack_addr(), value);
        self.regs.s = self.regs.s.wrapping_sub(1);
    }

    fn pull(&mut self) -> u8 {
        self.regs.s = self.regs.s.wrapping_add(1);
        self.mem.read(self.regs.stack_addr())
    }

    // ==================== Execute ====================

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) {
        let mode = instr.mode;
        match instr.mnemonic {
            // ==================== Arithmetic ====================
            Mnemonic::ADC => {
                let operand = self.operand_value(mode);
                self.add_with_carry(operand);
            }
            Mnemonic::SBC => {
                let operand = self.operand_value(mode);
                self.subtract_with_carry(operand);
            }

            // ==================== Logic ====================
            Mnemonic::AND => {
                let operand = self.operand_value(mode);
                self.regs.a &= operand;
                self.regs.p.update_nz(self.regs.a);
            }
            Mnemonic::ORA => {
                let operand = self.operand_value(mode);
                self.regs.a |= operand;
                self.regs.p.update_nz(self.regs.a);
            }
            Mnemonic::EOR => {
                let operand = self.operand_value(mode);
                self.regs.a ^= operand;
                self.regs.p.update_nz(self.regs.a);
            }
            Mnemonic::BIT => {
                let operand = self.operand_value(mode);
                self.regs.p.set_negative(operand & 0x80 != 0);
                self.regs.p.set_overflow(operand & 0x40 != 0);
                self.regs.p.set_zero(self.regs.a & operand == 0);
            }

            // ==================== Shifts and rotates ====================
            Mnemonic::ASL => self.read_modify_write(mode, Self::shift_left),
            Mnemonic::LSR => self.read_modify_write(mode, Self::shift_right),
            Mnemonic::ROL => self.read_modify_write(mode, Self::rotate_left),
            Mnemonic::ROR => self.read_modify_write(mode, Self::rotate_right),

            // ==================== Compare ====================
            Mnemonic::CMP => {
                let operand = self.operand_value(mode);
                self.compare(self.regs.a, operand);
            }
            Mnemonic::CPX => {
                let operand = self.operand_value(mode);
                self.compare(self.regs.x, operand);
            }
            Mnemonic::CPY => {
                let operand = self.operand_value(mode);
                self.compare(self.regs.y, operand);
            }

            // ==================== Increment / decrement ====================
            Mnemonic::INC => self.read_modify_write(mode, |cpu, v| {
                let r = v.wrapping_add(1);
                cpu.regs.p.update_nz(r);
                r
            }),
            Mnemonic::DEC => self.read_modify_write(mode, |cpu, v| {
                let r = v.wrapping_sub(1);
                cpu.regs.p.update_nz(r);
                r
            }),
            Mnemonic::INX => {
                self.regs.x = self.regs.x.wrapping_add(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Mnemonic::INY => {
                self.regs.y = self.regs.y.wrapping_add(1);
                self.regs.p.update_nz(self.regs.y);
            }
            Mnemonic::DEX => {
                self.regs.x = self.regs.x.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.x);
            }
            Mnemonic::DEY => {
                self.regs.y = self.regs.y.wrapping_sub(1);
                self.regs.p.update_nz(self.regs.y);
            }

            // ==================== Loads and stores ====================
            Mnemonic::LDA => {
                self.regs.a = self.operand_value(mode);
                self.regs.p.update_nz(self.regs.a);
            }
            Mnemonic::LDX => {
                self.regs.x = self.operand_value(mode);
                self.regs.p.update_nz(self.regs.x);
            }
            Mnemonic::LDY => {
                self.regs.y = self.operand_value(mode);
                self.regs.p.update_nz(self.regs.y);
            }
            Mnemonic::STA => {
                let addr = self.effective_address(mode);
                self.mem.write(addr, self.regs.a);
            }
            Mnemonic::STX => {
                let addr = self.effective_address(mode);
                self.mem.write(addr, self.regs.x);
            }
            Mnemonic::STY => {
                let addr = self.effective_address(mode);
                self.mem.write(addr, self.regs.y);
            }

            // ==================== Transfers ====================
            Mnemonic::TAX => {
                self.regs.x = self.regs.a;
                self.regs.p.update_nz(self.regs.x);
            }
            Mnemonic::TAY => {
                self.regs.y = self.regs.a;
                self.regs.p.update_nz(self.regs.y);
            }
            Mnemonic::TXA => {
                self.regs.a = self.regs.x;
                self.regs.p.update_nz(self.regs.a);
            }
            Mnemonic::TYA => {
                self.regs.a = self.regs.y;
                self.regs.p.update_nz(self.regs.a);
            }
            Mnemonic::TSX => {
                self.regs.x = self.regs.s;
                self.regs.p.update_nz(self.regs.x);
            }
            Mnemonic::TXS => {
                // Transfers into S do not touch the flags.
                self.regs.s = self.regs.x;
            }

            // ==================== Stack ====================
            Mnemonic::PHA => self.push(self.regs.a),
            Mnemonic::PLA => {
                self.regs.a = self.pull();
                self.regs.p.update_nz(self.regs.a);
            }
            Mnemonic::PHP => {
                // The pushed copy always has the break and unused bits on.
                self.push(self.regs.p.bits() | Status::BREAK | Status::UNUSED);
            }
            Mnemonic::PLP => {
                // Restored verbatim, break and unused bits included.
                let bits = self.pull();
                self.regs.p.set_bits(bits);
            }

            // ==================== Branches ====================
            Mnemonic::BCC => self.branch(!self.regs.p.carry()),
            Mnemonic::BCS => self.branch(self.regs.p.carry()),
            Mnemonic::BEQ => self.branch(self.regs.p.zero()),
            Mnemonic::BNE => self.branch(!self.regs.p.zero()),
            Mnemonic::BMI => self.branch(self.regs.p.negative()),
            Mnemonic::BPL => self.branch(!self.regs.p.negative()),
            Mnemonic::BVS => self.branch(self.regs.p.overflow()),
            Mnemonic::BVC => self.branch(!self.regs.p.overflow()),

            // ==================== Jumps and subroutines ====================
            Mnemonic::JMP => {
                self.regs.pc = self.effective_address(mode);
            }
            Mnemonic::JSR => {
                let target = self.fetch_word();
                // Return address is the byte after the operand, minus
                // one; RTS adds the one back.
                let ret = self.regs.pc.wrapping_sub(1);
                self.push((ret >> 8) as u8);
                self.push(ret as u8);
                self.regs.pc = target;
            }
            Mnemonic::RTS => {
                let lo = self.pull();
                let hi = self.pull();
                self.regs.pc = u16::from_le_bytes([lo, hi]).wrapping_add(1);
            }

            // ==================== Interrupt entry and return ====================
            Mnemonic::BRK => {
                // Two-byte instruction: the padding byte is skipped.
                self.regs.pc = self.regs.pc.wrapping_add(1);
                self.push(self.regs.pch());
                self.push(self.regs.pcl());
                self.push(self.regs.p.bits() | Status::BREAK);
                self.regs.p.set_interrupt_disable(true);
                self.regs.pc = self.mem.read_word(BREAK_VECTOR);
            }
            Mnemonic::RTI => {
                let bits = self.pull() & !(Status::BREAK | Status::UNUSED);
                self.regs.p.set_bits(bits);
                let lo = self.pull();
                let hi = self.pull();
                // Unlike RTS, no +1 adjustment: the pushed address is
                // resumed exactly.
                self.regs.set_pc_parts(lo, hi);
            }

            // ==================== Flag manipulation ====================
            Mnemonic::CLC => self.regs.p.set_carry(false),
            Mnemonic::SEC => self.regs.p.set_carry(true),
            Mnemonic::CLD => self.regs.p.set_decimal(false),
            Mnemonic::SED => self.regs.p.set_decimal(true),
            Mnemonic::CLI => self.regs.p.set_interrupt_disable(false),
            Mnemonic::SEI => self.regs.p.set_interrupt_disable(true),
            Mnemonic::CLV => self.regs.p.set_overflow(false),

            // ==================== No-op ====================
            Mnemonic::NOP => {}
        }
    }

    // ==================== Instruction helpers ====================

    /// A := A + operand + carry, as a 9-bit computation.
    fn add_with_carry(&mut self, operand: u8) {
        let a = self.regs.a;
        let sum = u16::from(a) + u16::from(operand) + u16::from(self.regs.p.carry());
        let result = sum as u8;
        self.regs.p.set_carry(sum > 0xFF);
        // Overflow: both inputs share a sign bit the result lacks.
        self.regs.p
            .set_overflow((a ^ operand) & 0x80 == 0 && (a ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// A := A - operand - (1 - carry), widened; carry set when no
    /// borrow occurred.
    fn subtract_with_carry(&mut self, operand: u8) {
        let a = self.regs.a;
        let borrow = 1 - i16::from(self.regs.p.carry());
        let wide = i16::from(a) - i16::from(operand) - borrow;
        let result = wide as u8;
        self.regs.p.set_carry(wide >= 0);
        // Overflow: input signs differ and the result's sign differs
        // from the minuend's.
        self.regs.p
            .set_overflow((a ^ operand) & 0x80 != 0 && (a ^ result) & 0x80 != 0);
        self.regs.a = result;
        self.regs.p.update_nz(result);
    }

    /// Carry from the unsigned comparison, N/Z from the wrapped difference.
    fn compare(&mut self, register: u8, operand: u8) {
        self.regs.p.set_carry(register >= operand);
        self.regs.p.update_nz(register.wrapping_sub(operand));
    }

    fn shift_left(&mut self, value: u8) -> u8 {
        self.regs.p.set_carry(value & 0x80 != 0);
        let result = value << 1;
        self.regs.p.update_nz(result);
        result
    }

    fn shift_right(&mut self, value: u8) -> u8 {
        self.regs.p.set_carry(value & 0x01 != 0);
        let result = value >> 1;
        self.regs.p.update_nz(result);
        result
    }

    /// The vacated bit 0 takes the carry value from before the shift.
    fn rotate_left(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.carry());
        self.regs.p.set_carry(value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.regs.p.update_nz(result);
        result
    }

    /// The vacated bit 7 takes the carry value from before the shift.
    fn rotate_right(&mut self, value: u8) -> u8 {
        let carry_in = u8::from(self.regs.p.carry());
        self.regs.p.set_carry(value & 0x01 != 0);
        let result = (value >> 1) | (carry_in << 7);
        self.regs.p.update_nz(result);
        result
    }

    /// Consume the displacement byte; when `taken`, add it sign-extended
    /// to the program counter (which already points past the branch).
    fn branch(&mut self, taken: bool) {
        let offset = self.fetch_byte() as i8;
        if taken {
            self.regs.pc = self.regs.pc.wrapping_add(i16::from(offset) as u16);
        }
    }
}

impl std::fmt::Debug for Cpu<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("regs", &self.regs)
            .field("cycles", &self.cycles)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    /// The byte at `at` is not a documented opcode. The program
    /// counter is left one past it.
    #[error("unknown opcode ${opcode:02X} at ${at:04X}")]
    UnknownOpcode { opcode: u8, at: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ENTRY: u16 = 0x0600;

    /// Load `program` at the entry address and return a CPU ready to
    /// step it.
    fn cpu_with<'m>(mem: &'m mut Memory, program: &[u8]) -> Cpu<'m> {
        mem.load(ENTRY, program).unwrap();
        Cpu::new(mem, ENTRY)
    }

    #[test]
    fn test_lda_immediate_sets_flags() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x00]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.a, 0);
        assert!(cpu.regs.p.zero());
        assert!(!cpu.regs.p.negative());
    }

    #[test]
    fn test_end_to_end_lda_adc() {
        // A9 05 (LDA #$05) then 69 03 (ADC #$03)
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x05, 0x69, 0x03]);
        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.regs.a, 8);
        assert!(!cpu.regs.p.carry());
        assert!(!cpu.regs.p.zero());
        assert!(!cpu.regs.p.negative());
        assert_eq!(cpu.regs.pc, ENTRY + 4);
    }

    #[test]
    fn test_adc_carry_and_overflow() {
        // 0xFF + 0x01 carries and wraps to zero.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0xFF, 0x69, 0x01]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0);
        assert!(cpu.regs.p.carry());
        assert!(cpu.regs.p.zero());
        assert!(!cpu.regs.p.overflow());

        // 0x7F + 0x01 overflows into the sign bit.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x7F, 0x69, 0x01]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0x80);
        assert!(!cpu.regs.p.carry());
        assert!(cpu.regs.p.overflow());
        assert!(cpu.regs.p.negative());
    }

    #[test]
    fn test_adc_uses_carry_in() {
        // SEC then 2 + 3 + carry = 6.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x02, 0x38, 0x69, 0x03]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.a, 6);
        assert!(!cpu.regs.p.carry());
    }

    #[test]
    fn test_sbc_borrow_and_carry() {
        // SEC; LDA #$10; SBC #$08 -> 8, carry still set (no borrow).
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x38, 0xA9, 0x10, 0xE9, 0x08]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.a, 0x08);
        assert!(cpu.regs.p.carry());

        // SEC; LDA #$08; SBC #$10 -> 0xF8, carry clear (borrow).
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x38, 0xA9, 0x08, 0xE9, 0x10]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.a, 0xF8);
        assert!(!cpu.regs.p.carry());
        assert!(cpu.regs.p.negative());
    }

    #[test]
    fn test_sbc_overflow() {
        // SEC; LDA #$80; SBC #$01 -> 0x7F: signs differed, result sign
        // differs from the minuend's.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x38, 0xA9, 0x80, 0xE9, 0x01]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.a, 0x7F);
        assert!(cpu.regs.p.overflow());
    }

    #[test]
    fn test_logic_ops() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0xF0, 0x29, 0x0F]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0x00);
        assert!(cpu.regs.p.zero());

        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0xF0, 0x09, 0x0F]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0xFF);
        assert!(cpu.regs.p.negative());

        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0xFF, 0x49, 0x0F]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0xF0);
    }

    #[test]
    fn test_bit_copies_operand_bits() {
        let mut mem = Memory::new();
        mem.write(0x0010, 0xC0); // bits 7 and 6 set
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x01, 0x24, 0x10]);
        cpu.run_limited(2).unwrap();
        assert!(cpu.regs.p.negative());
        assert!(cpu.regs.p.overflow());
        assert!(cpu.regs.p.zero()); // A & operand == 0
        assert_eq!(cpu.regs.a, 0x01); // A untouched
    }

    #[test]
    fn test_asl_of_80() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x80, 0x0A]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0x00);
        assert!(cpu.regs.p.carry());
        assert!(cpu.regs.p.zero());
        assert!(!cpu.regs.p.negative());
    }

    #[test]
    fn test_lsr_and_rotates() {
        // LSR #$01 -> 0, carry out.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x01, 0x4A]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0x00);
        assert!(cpu.regs.p.carry());

        // SEC; LDA #$00; ROL -> old carry fills bit 0.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x38, 0xA9, 0x00, 0x2A]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.a, 0x01);
        assert!(!cpu.regs.p.carry());

        // SEC; LDA #$00; ROR -> old carry fills bit 7.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x38, 0xA9, 0x00, 0x6A]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.a, 0x80);
        assert!(!cpu.regs.p.carry());
        assert!(cpu.regs.p.negative());
    }

    #[test]
    fn test_rmw_shift_in_memory() {
        let mut mem = Memory::new();
        mem.write(0x0042, 0x41);
        let mut cpu = cpu_with(&mut mem, &[0x06, 0x42]);
        cpu.step().unwrap();
        assert_eq!(cpu.mem().read(0x0042), 0x82);
        assert!(!cpu.regs.p.carry());
        assert!(cpu.regs.p.negative());
    }

    #[test]
    fn test_cmp_equal_and_less() {
        // CMP #$10 with A = 0x10: carry and zero set.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x10, 0xC9, 0x10]);
        cpu.run_limited(2).unwrap();
        assert!(cpu.regs.p.carry());
        assert!(cpu.regs.p.zero());
        assert!(!cpu.regs.p.negative());

        // CMP #$20 with A = 0x10: carry clear, negative set.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x10, 0xC9, 0x20]);
        cpu.run_limited(2).unwrap();
        assert!(!cpu.regs.p.carry());
        assert!(!cpu.regs.p.zero());
        assert!(cpu.regs.p.negative());
    }

    #[test]
    fn test_inc_dec_wrap() {
        let mut mem = Memory::new();
        mem.write(0x0030, 0xFF);
        let mut cpu = cpu_with(&mut mem, &[0xE6, 0x30]);
        cpu.step().unwrap();
        assert_eq!(cpu.mem().read(0x0030), 0x00);
        assert!(cpu.regs.p.zero());
        assert!(!cpu.regs.p.carry()); // INC never touches carry

        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xCA]); // DEX with X = 0
        cpu.step().unwrap();
        assert_eq!(cpu.regs.x, 0xFF);
        assert!(cpu.regs.p.negative());
    }

    #[test]
    fn test_store_and_indexed_load() {
        // LDA #$07; STA $0200; LDX #$01; LDA $01FF,X
        let mut mem = Memory::new();
        let mut cpu = cpu_with(
            &mut mem,
            &[0xA9, 0x07, 0x8D, 0x00, 0x02, 0xA2, 0x01, 0xBD, 0xFF, 0x01],
        );
        cpu.run_limited(4).unwrap();
        assert_eq!(cpu.regs.a, 0x07);
        assert_eq!(cpu.mem().read(0x0200), 0x07);
    }

    #[test]
    fn test_zero_page_x_wraps() {
        // LDX #$10; LDA $F8,X reads from $08, not $108.
        let mut mem = Memory::new();
        mem.write(0x0008, 0x99);
        let mut cpu = cpu_with(&mut mem, &[0xA2, 0x10, 0xB5, 0xF8]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0x99);
    }

    #[test]
    fn test_indexed_indirect() {
        // LDX #$04; LDA ($20,X): pointer at $24/$25 -> $0300.
        let mut mem = Memory::new();
        mem.write(0x0024, 0x00);
        mem.write(0x0025, 0x03);
        mem.write(0x0300, 0x5A);
        let mut cpu = cpu_with(&mut mem, &[0xA2, 0x04, 0xA1, 0x20]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0x5A);
    }

    #[test]
    fn test_indexed_indirect_pointer_at_ff() {
        // Pointer byte 0xFF: high half read from $0100, not $0000.
        let mut mem = Memory::new();
        mem.write(0x00FF, 0x00);
        mem.write(0x0100, 0x03);
        mem.write(0x0300, 0x77);
        let mut cpu = cpu_with(&mut mem, &[0xA1, 0xFF]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.a, 0x77);
    }

    #[test]
    fn test_indirect_indexed() {
        // LDY #$10; LDA ($20),Y: pointer at $20/$21 -> $0300 + Y.
        let mut mem = Memory::new();
        mem.write(0x0020, 0x00);
        mem.write(0x0021, 0x03);
        mem.write(0x0310, 0x3C);
        let mut cpu = cpu_with(&mut mem, &[0xA0, 0x10, 0xB1, 0x20]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.a, 0x3C);
    }

    #[test]
    fn test_transfers() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x80, 0xAA, 0xA8]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.x, 0x80);
        assert_eq!(cpu.regs.y, 0x80);
        assert!(cpu.regs.p.negative());

        // TXS never touches flags; TSX does.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA2, 0x00, 0xA9, 0x01, 0x9A]);
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.s, 0x00);
        assert!(!cpu.regs.p.zero()); // still reflects LDA #$01
    }

    #[test]
    fn test_push_pull_accumulator_roundtrip() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0xC3, 0x48, 0xA9, 0x00, 0x68]);
        let s_before = cpu.regs.s;
        cpu.run_limited(4).unwrap();
        assert_eq!(cpu.regs.a, 0xC3);
        assert_eq!(cpu.regs.s, s_before);
        assert!(cpu.regs.p.negative());
        assert!(!cpu.regs.p.zero());
    }

    #[test]
    fn test_php_forces_break_unused_plp_does_not_mask() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x08, 0x28]);
        cpu.regs.s = 0xFF;
        cpu.step().unwrap(); // PHP
        let pushed = cpu.mem().read(cpu.regs.stack_addr().wrapping_add(1));
        assert_eq!(pushed & Status::BREAK, Status::BREAK);
        assert_eq!(pushed & Status::UNUSED, Status::UNUSED);

        cpu.step().unwrap(); // PLP restores verbatim
        assert!(cpu.regs.p.break_flag());
        assert_eq!(cpu.regs.p.bits() & Status::UNUSED, Status::UNUSED);
    }

    #[test]
    fn test_branch_taken_and_not_taken() {
        // BEQ not taken: PC just past the branch.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x01, 0xF0, 0x10]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.pc, ENTRY + 4);

        // BEQ taken forward.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x00, 0xF0, 0x10]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.pc, ENTRY + 4 + 0x10);

        // BNE taken backward.
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xA9, 0x01, 0xD0, 0xFC]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.regs.pc, ENTRY); // 4 - 4
    }

    #[test]
    fn test_jmp_absolute_and_indirect() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x4C, 0x34, 0x12]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0x1234);

        let mut mem = Memory::new();
        mem.write(0x0400, 0xCD);
        mem.write(0x0401, 0xAB);
        let mut cpu = cpu_with(&mut mem, &[0x6C, 0x00, 0x04]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0xABCD);
    }

    #[test]
    fn test_jsr_rts_roundtrip() {
        // JSR $0700 at entry; RTS at $0700 returns to entry + 3.
        let mut mem = Memory::new();
        mem.write(0x0700, 0x60);
        let mut cpu = cpu_with(&mut mem, &[0x20, 0x00, 0x07]);
        let s_before = cpu.regs.s;

        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0x0700);
        assert_eq!(cpu.regs.s, s_before.wrapping_sub(2));

        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, ENTRY + 3);
        assert_eq!(cpu.regs.s, s_before);
    }

    #[test]
    fn test_brk_vectors_and_sets_interrupt_disable() {
        let mut mem = Memory::new();
        mem.write(BREAK_VECTOR, 0x00);
        mem.write(BREAK_VECTOR.wrapping_add(1), 0x09);
        let mut cpu = cpu_with(&mut mem, &[0x00, 0xFF]); // BRK + padding
        cpu.regs.s = 0xFF;
        let s_before = cpu.regs.s;

        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, 0x0900);
        assert!(cpu.regs.p.interrupt_disable());
        assert_eq!(cpu.regs.s, s_before.wrapping_sub(3));

        // Pushed flags carry the break bit; pushed PC points past the
        // padding byte.
        let flags = cpu.mem().read(cpu.regs.stack_addr().wrapping_add(1));
        assert_eq!(flags & Status::BREAK, Status::BREAK);
        let pcl = cpu.mem().read(cpu.regs.stack_addr().wrapping_add(2));
        let pch = cpu.mem().read(cpu.regs.stack_addr().wrapping_add(3));
        assert_eq!(u16::from_le_bytes([pcl, pch]), ENTRY + 2);
    }

    #[test]
    fn test_rti_restores_masked_flags_and_exact_pc() {
        let mut mem = Memory::new();
        mem.write(BREAK_VECTOR, 0x00);
        mem.write(BREAK_VECTOR.wrapping_add(1), 0x09);
        mem.write(0x0900, 0x40); // RTI at the vector target
        let mut cpu = cpu_with(&mut mem, &[0x38, 0x00, 0xFF]); // SEC; BRK

        cpu.run_limited(3).unwrap();
        // Back at the byte after BRK's padding, carry restored, break
        // and unused masked off.
        assert_eq!(cpu.regs.pc, ENTRY + 3);
        assert!(cpu.regs.p.carry());
        assert!(!cpu.regs.p.break_flag());
        assert_eq!(cpu.regs.p.bits() & Status::UNUSED, 0);
    }

    #[test]
    fn test_flag_instructions() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0x38, 0xF8, 0x78, 0x18, 0xD8, 0x58]);
        cpu.run_limited(3).unwrap();
        assert!(cpu.regs.p.carry());
        assert!(cpu.regs.p.decimal());
        assert!(cpu.regs.p.interrupt_disable());
        cpu.run_limited(3).unwrap();
        assert_eq!(cpu.regs.p.bits(), 0);
    }

    #[test]
    fn test_unknown_opcode_reports_and_leaves_pc() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xFF]);
        let err = cpu.step().unwrap_err();
        assert_eq!(
            err,
            CpuError::UnknownOpcode {
                opcode: 0xFF,
                at: ENTRY
            }
        );
        assert_eq!(cpu.regs.pc, ENTRY + 1);
        assert_eq!(cpu.cycles, 0);
    }

    #[test]
    fn test_nop_only_advances_pc() {
        let mut mem = Memory::new();
        let mut cpu = cpu_with(&mut mem, &[0xEA]);
        cpu.step().unwrap();
        assert_eq!(cpu.regs.pc, ENTRY + 1);
        assert_eq!(cpu.regs.p.bits(), 0);
    }

    proptest! {
        #[test]
        fn prop_load_sets_nz_only(v in any::<u8>()) {
            let mut mem = Memory::new();
            let mut cpu = cpu_with(&mut mem, &[0xA9, v]);
            cpu.step().unwrap();
            prop_assert_eq!(cpu.regs.a, v);
            prop_assert_eq!(cpu.regs.p.zero(), v == 0);
            prop_assert_eq!(cpu.regs.p.negative(), v & 0x80 != 0);
            prop_assert!(!cpu.regs.p.carry());
            prop_assert!(!cpu.regs.p.overflow());
            prop_assert!(!cpu.regs.p.decimal());
            prop_assert!(!cpu.regs.p.interrupt_disable());
        }

        #[test]
        fn prop_adc_commutative(a in any::<u8>(), b in any::<u8>(), carry in any::<bool>()) {
            let run = |first: u8, second: u8| {
                let mut mem = Memory::new();
                let setup = if carry { 0x38 } else { 0x18 }; // SEC or CLC
                let mut cpu = cpu_with(&mut mem, &[0xA9, first, setup, 0x69, second]);
                cpu.run_limited(3).unwrap();
                (cpu.regs.a, cpu.regs.p.bits())
            };
            prop_assert_eq!(run(a, b), run(b, a));
        }

        #[test]
        fn prop_pha_pla_roundtrip(v in any::<u8>()) {
            let mut mem = Memory::new();
            let mut cpu = cpu_with(&mut mem, &[0xA9, v, 0x48, 0xA9, !v, 0x68]);
            let s_before = cpu.regs.s;
            cpu.run_limited(4).unwrap();
            prop_assert_eq!(cpu.regs.a, v);
            prop_assert_eq!(cpu.regs.s, s_before);
            prop_assert_eq!(cpu.regs.p.zero(), v == 0);
            prop_assert_eq!(cpu.regs.p.negative(), v & 0x80 != 0);
        }

        #[test]
        fn prop_cmp_carry_is_unsigned_comparison(reg in any::<u8>(), op in any::<u8>()) {
            let mut mem = Memory::new();
            let mut cpu = cpu_with(&mut mem, &[0xA9, reg, 0xC9, op]);
            cpu.run_limited(2).unwrap();
            prop_assert_eq!(cpu.regs.p.carry(), reg >= op);
            prop_assert_eq!(cpu.regs.p.zero(), reg == op);
            prop_assert_eq!(cpu.regs.a, reg); // compare never writes A
        }

        #[test]
        fn prop_jsr_rts_restores_pc_and_stack(target in 0x1000u16..0x2000) {
            let mut mem = Memory::new();
            mem.write(target, 0x60); // RTS
            let mut cpu = cpu_with(&mut mem, &[0x20, target as u8, (target >> 8) as u8]);
            let s_before = cpu.regs.s;
            cpu.run_limited(2).unwrap();
            prop_assert_eq!(cpu.regs.pc, ENTRY + 3);
            prop_assert_eq!(cpu.regs.s, s_before);
        }
    }
}
