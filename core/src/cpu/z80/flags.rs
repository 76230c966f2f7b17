//! The F register as named bits, with one composite setter per
//! instruction class.
//!
//! Every setter copies bits 3 and 5 of the result into X and Y.

use crate::core::cell::{ByteCell, WordStatus};

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flag {
    C = 0x01,  // Carry
    N = 0x02,  // Add/Subtract
    PV = 0x04, // Parity/Overflow
    X = 0x08,  // Unused (copy of bit 3)
    H = 0x10,  // Half Carry
    Y = 0x20,  // Unused (copy of bit 5)
    Z = 0x40,  // Zero
    S = 0x80,  // Sign
}

const XY: u8 = Flag::X as u8 | Flag::Y as u8;

/// Mutable view over the flag cell.
pub struct Flags<'a>(&'a mut ByteCell);

impl<'a> Flags<'a> {
    pub fn new(cell: &'a mut ByteCell) -> Self {
        Self(cell)
    }

    #[inline]
    pub fn bits(&self) -> u8 {
        self.0.value()
    }

    #[inline]
    pub fn get(&self, flag: Flag) -> bool {
        self.0.value() & flag as u8 != 0
    }

    #[inline]
    pub fn set(&mut self, flag: Flag, on: bool) {
        let f = self.0.value();
        self.0.set(if on { f | flag as u8 } else { f & !(flag as u8) });
    }

    /// X and Y from an arbitrary byte.
    pub fn undocumented(&mut self, byte: u8) {
        let f = self.0.value();
        self.0.set((f & !XY) | (byte & XY));
    }

    /// S and Z from the result.
    pub fn sign_zero(&mut self, result: &ByteCell) {
        self.set(Flag::S, result.is_negative());
        self.set(Flag::Z, result.is_zero());
        self.undocumented(result.value());
    }

    /// S, Z and even parity in P/V.
    pub fn sign_zero_parity(&mut self, result: &ByteCell) {
        self.sign_zero(result);
        self.set(Flag::PV, result.parity_even());
    }

    /// S, Z, overflow in P/V, H and N. Carry is left alone (INC/DEC).
    pub fn sign_zero_overflow_halfcarry_addsub(&mut self, result: &ByteCell) {
        self.sign_zero(result);
        self.set(Flag::PV, result.overflow);
        self.set(Flag::H, result.half_carry);
        self.set(Flag::N, result.subtract);
    }

    /// Full 8-bit arithmetic result (ADD, ADC, SUB, SBC, CP, NEG).
    pub fn arithmetic(&mut self, result: &ByteCell) {
        self.sign_zero_overflow_halfcarry_addsub(result);
        self.set(Flag::C, result.carry);
    }

    /// AND/OR/XOR: parity, H as given, N and C cleared.
    pub fn logic(&mut self, result: &ByteCell, half_carry: bool) {
        self.sign_zero_parity(result);
        self.set(Flag::H, half_carry);
        self.set(Flag::N, false);
        self.set(Flag::C, false);
    }

    /// After a shift or rotate: N and H cleared, C is the bit shifted out.
    pub fn shift_flags(&mut self, result: &ByteCell) {
        self.set(Flag::N, false);
        self.set(Flag::H, false);
        self.set(Flag::C, result.carry);
    }

    /// 16-bit ADD: H from bit 11, C from bit 15, N from the operation.
    /// S, Z and P/V are preserved; X/Y come from the high byte.
    pub fn math_flags16(&mut self, result: &WordStatus) {
        self.set(Flag::H, result.half_carry);
        self.set(Flag::C, result.carry);
        self.set(Flag::N, result.subtract);
        self.undocumented((result.value >> 8) as u8);
    }

    /// 16-bit ADC/SBC: everything `math_flags16` sets, plus S and Z from the
    /// word and signed overflow in P/V.
    pub fn arithmetic16(&mut self, result: &WordStatus) {
        self.math_flags16(result);
        self.set(Flag::S, result.value & 0x8000 != 0);
        self.set(Flag::Z, result.value == 0);
        self.set(Flag::PV, result.overflow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_after(op: impl FnOnce(&mut Flags)) -> u8 {
        let mut f = ByteCell::new(0);
        op(&mut Flags::new(&mut f));
        f.value()
    }

    #[test]
    fn add_overflow_into_sign() {
        let mut result = ByteCell::new(0x7F);
        result.add(0x01, false);
        let f = flags_after(|flags| flags.arithmetic(&result));
        assert_eq!(result.value(), 0x80);
        assert_eq!(f & Flag::S as u8, Flag::S as u8);
        assert_eq!(f & Flag::Z as u8, 0);
        assert_eq!(f & Flag::PV as u8, Flag::PV as u8);
        assert_eq!(f & Flag::H as u8, Flag::H as u8);
        assert_eq!(f & Flag::C as u8, 0);
        assert_eq!(f & Flag::N as u8, 0);
    }

    #[test]
    fn logic_zero_has_even_parity() {
        let f = flags_after(|flags| flags.logic(&ByteCell::new(0), true));
        assert_eq!(f, Flag::Z as u8 | Flag::PV as u8 | Flag::H as u8);
    }

    #[test]
    fn sign_zero_copies_undocumented_bits() {
        let f = flags_after(|flags| flags.sign_zero(&ByteCell::new(0x28)));
        assert_eq!(f, XY);
    }

    #[test]
    fn inc_dec_keeps_carry() {
        let mut f = ByteCell::new(Flag::C as u8);
        let mut result = ByteCell::new(0x00);
        result.decrease();
        Flags::new(&mut f).sign_zero_overflow_halfcarry_addsub(&result);
        assert_ne!(f.value() & Flag::C as u8, 0);
        assert_ne!(f.value() & Flag::N as u8, 0);
        assert_ne!(f.value() & Flag::H as u8, 0);
    }

    #[test]
    fn arithmetic16_reports_word_zero() {
        let status = WordStatus {
            value: 0,
            carry: true,
            subtract: true,
            ..Default::default()
        };
        let f = flags_after(|flags| flags.arithmetic16(&status));
        assert_eq!(f, Flag::Z as u8 | Flag::C as u8 | Flag::N as u8);
    }
}
