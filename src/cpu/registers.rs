//! 6502 register file and status flags.
//!
//! The 6502 has 6 programmer-visible registers:
//! - A: 8-bit accumulator
//! - X, Y: 8-bit index registers
//! - P: 8-bit status flag register
//! - S: 8-bit stack pointer (stack lives at 0x0100 + S)
//! - PC: 16-bit program counter

use serde::{Deserialize, Serialize};

/// Base address of the hardware stack page.
pub const STACK_BASE: u16 = 0x0100;

/// The 6502 status register, bit layout `NV-BDIZC` (high to low).
///
/// Each flag has a named getter and setter so instruction contracts
/// can be stated (and tested) per flag instead of through raw masks.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    bits: u8,
}

impl Status {
    /// Carry flag (bit 0).
    pub const CARRY: u8 = 0x01;
    /// Zero flag (bit 1).
    pub const ZERO: u8 = 0x02;
    /// Interrupt-disable flag (bit 2).
    pub const INTERRUPT: u8 = 0x04;
    /// Decimal-mode flag (bit 3). Stored and restored but never
    /// consulted: arithmetic is always binary here.
    pub const DECIMAL: u8 = 0x08;
    /// Break flag (bit 4).
    pub const BREAK: u8 = 0x10;
    /// Unused flag (bit 5), forced on when the flag byte is pushed.
    pub const UNUSED: u8 = 0x20;
    /// Overflow flag (bit 6).
    pub const OVERFLOW: u8 = 0x40;
    /// Negative flag (bit 7).
    pub const NEGATIVE: u8 = 0x80;

    /// Create a status register with all flags clear.
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// The raw flag byte.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.bits
    }

    /// Replace the raw flag byte.
    #[inline]
    pub fn set_bits(&mut self, bits: u8) {
        self.bits = bits;
    }

    #[inline]
    fn get(self, mask: u8) -> bool {
        self.bits & mask != 0
    }

    #[inline]
    fn set(&mut self, mask: u8, on: bool) {
        if on {
            self.bits |= mask;
        } else {
            self.bits &= !mask;
        }
    }

    pub fn carry(self) -> bool {
        self.get(Self::CARRY)
    }

    pub fn set_carry(&mut self, on: bool) {
        self.set(Self::CARRY, on);
    }

    pub fn zero(self) -> bool {
        self.get(Self::ZERO)
    }

    pub fn set_zero(&mut self, on: bool) {
        self.set(Self::ZERO, on);
    }

    pub fn interrupt_disable(self) -> bool {
        self.get(Self::INTERRUPT)
    }

    pub fn set_interrupt_disable(&mut self, on: bool) {
        self.set(Self::INTERRUPT, on);
    }

    pub fn decimal(self) -> bool {
        self.get(Self::DECIMAL)
    }

    pub fn set_decimal(&mut self, on: bool) {
        self.set(Self::DECIMAL, on);
    }

    pub fn break_flag(self) -> bool {
        self.get(Self::BREAK)
    }

    pub fn set_break_flag(&mut self, on: bool) {
        self.set(Self::BREAK, on);
    }

    pub fn overflow(self) -> bool {
        self.get(Self::OVERFLOW)
    }

    pub fn set_overflow(&mut self, on: bool) {
        self.set(Self::OVERFLOW, on);
    }

    pub fn negative(self) -> bool {
        self.get(Self::NEGATIVE)
    }

    pub fn set_negative(&mut self, on: bool) {
        self.set(Self::NEGATIVE, on);
    }

    /// Recompute Negative and Zero from a result value.
    ///
    /// Every instruction that "sets flags by result" goes through here,
    /// so N and Z always come from the fresh result, never stale state.
    #[inline]
    pub fn update_nz(&mut self, value: u8) {
        self.set_zero(value == 0);
        self.set_negative(value & 0x80 != 0);
    }
}

impl std::fmt::Debug for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (${:02X})", self, self.bits)
    }
}

impl std::fmt::Display for Status {
    /// Renders as `NV-BDIZC` with `.` for clear bits.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (mask, ch) in [
            (Self::NEGATIVE, 'N'),
            (Self::OVERFLOW, 'V'),
            (Self::UNUSED, 'U'),
            (Self::BREAK, 'B'),
            (Self::DECIMAL, 'D'),
            (Self::INTERRUPT, 'I'),
            (Self::ZERO, 'Z'),
            (Self::CARRY, 'C'),
        ] {
            write!(f, "{}", if self.get(mask) { ch } else { '.' })?;
        }
        Ok(())
    }
}

/// The 6502 register file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Registers {
    /// A: accumulator.
    pub a: u8,
    /// X: index register.
    pub x: u8,
    /// Y: index register.
    pub y: u8,
    /// P: status flags.
    pub p: Status,
    /// S: stack pointer, an offset into the 0x0100 page.
    pub s: u8,
    /// PC: program counter.
    pub pc: u16,
}

impl Registers {
    /// Create a register file zeroed except for the program counter,
    /// which starts at `entry`.
    pub fn new(entry: u16) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            p: Status::new(),
            s: 0,
            pc: entry,
        }
    }

    /// Low byte of the program counter.
    #[inline]
    pub fn pcl(&self) -> u8 {
        self.pc as u8
    }

    /// High byte of the program counter.
    #[inline]
    pub fn pch(&self) -> u8 {
        (self.pc >> 8) as u8
    }

    /// Rebuild the program counter from low and high bytes.
    #[inline]
    pub fn set_pc_parts(&mut self, lo: u8, hi: u8) {
        self.pc = u16::from_le_bytes([lo, hi]);
    }

    /// The absolute address the stack pointer currently refers to.
    #[inline]
    pub fn stack_addr(&self) -> u16 {
        STACK_BASE + u16::from(self.s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_clear() {
        let regs = Registers::new(0x0600);
        assert_eq!(regs.p.bits(), 0);
        assert_eq!(regs.a, 0);
        assert_eq!(regs.s, 0);
        assert_eq!(regs.pc, 0x0600);
    }

    #[test]
    fn test_flag_set_clear_independent() {
        let mut p = Status::new();
        p.set_carry(true);
        p.set_negative(true);
        assert!(p.carry());
        assert!(p.negative());
        assert!(!p.zero());

        p.set_carry(false);
        assert!(!p.carry());
        assert!(p.negative());
    }

    #[test]
    fn test_update_nz() {
        let mut p = Status::new();
        p.update_nz(0x00);
        assert!(p.zero());
        assert!(!p.negative());

        p.update_nz(0x80);
        assert!(!p.zero());
        assert!(p.negative());

        p.update_nz(0x7F);
        assert!(!p.zero());
        assert!(!p.negative());
    }

    #[test]
    fn test_pc_parts() {
        let mut regs = Registers::new(0x1234);
        assert_eq!(regs.pcl(), 0x34);
        assert_eq!(regs.pch(), 0x12);

        regs.set_pc_parts(0xCD, 0xAB);
        assert_eq!(regs.pc, 0xABCD);
    }

    #[test]
    fn test_stack_addr() {
        let mut regs = Registers::new(0);
        regs.s = 0xFD;
        assert_eq!(regs.stack_addr(), 0x01FD);
    }

    #[test]
    fn test_status_display() {
        let mut p = Status::new();
        p.set_carry(true);
        p.set_negative(true);
        assert_eq!(format!("{}", p), "N......C");
    }
}
