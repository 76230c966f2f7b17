//! Z80 register file.
//!
//! The eight main byte registers live in one array ordered so that the
//! 3-bit register field of an opcode indexes it directly (slot 6, F, is
//! never selected that way since field 6 means `(HL)`). BC, DE, HL and AF
//! are paired views over that array, never separate storage.

use crate::core::cell::{ByteCell, WordCell, pair_mut};
use crate::cpu::z80::flags::{Flag, Flags};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg8 {
    B = 0,
    C = 1,
    D = 2,
    E = 3,
    H = 4,
    L = 5,
    F = 6,
    A = 7,
}

impl Reg8 {
    /// Register named by an opcode's 3-bit field; `None` for 6, `(HL)`.
    pub const fn from_field(field: u8) -> Option<Self> {
        match field & 0x07 {
            0 => Some(Self::B),
            1 => Some(Self::C),
            2 => Some(Self::D),
            3 => Some(Self::E),
            4 => Some(Self::H),
            5 => Some(Self::L),
            6 => None,
            _ => Some(Self::A),
        }
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pair {
    BC,
    DE,
    HL,
    AF,
}

impl Pair {
    const fn halves(self) -> (Reg8, Reg8) {
        match self {
            Self::BC => (Reg8::B, Reg8::C),
            Self::DE => (Reg8::D, Reg8::E),
            Self::HL => (Reg8::H, Reg8::L),
            Self::AF => (Reg8::A, Reg8::F),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Registers {
    main: [ByteCell; 8],
    shadow: [ByteCell; 8],
    pub ix: WordCell,
    pub iy: WordCell,
    pub sp: WordCell,
    pub pc: WordCell,
    pub i: ByteCell,
    pub r: ByteCell,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Power-on values: every pair 0xFFFF, PC, I and R zero.
    pub fn new() -> Self {
        Self {
            main: [ByteCell::new(0xFF); 8],
            shadow: [ByteCell::new(0xFF); 8],
            ix: WordCell::new(0xFFFF),
            iy: WordCell::new(0xFFFF),
            sp: WordCell::new(0xFFFF),
            pc: WordCell::new(0x0000),
            i: ByteCell::new(0),
            r: ByteCell::new(0),
        }
    }

    #[inline]
    pub fn get(&self, reg: Reg8) -> u8 {
        self.main[reg.index()].value()
    }

    #[inline]
    pub fn set(&mut self, reg: Reg8, value: u8) {
        self.main[reg.index()].set(value);
    }

    #[inline]
    pub fn cell(&self, reg: Reg8) -> &ByteCell {
        &self.main[reg.index()]
    }

    #[inline]
    pub fn cell_mut(&mut self, reg: Reg8) -> &mut ByteCell {
        &mut self.main[reg.index()]
    }

    /// Accumulator and flag cells borrowed together.
    pub fn accumulator_and_flags(&mut self) -> (&mut ByteCell, Flags<'_>) {
        let (a, f) = pair_mut(&mut self.main, Reg8::A.index(), Reg8::F.index());
        (a, Flags::new(f))
    }

    pub fn pair(&mut self, pair: Pair) -> WordCell<&mut ByteCell> {
        let (high, low) = pair.halves();
        let (high, low) = pair_mut(&mut self.main, high.index(), low.index());
        WordCell::pair(high, low)
    }

    pub fn pair_value(&self, pair: Pair) -> u16 {
        let (high, low) = pair.halves();
        u16::from_be_bytes([self.get(high), self.get(low)])
    }

    pub fn set_pair(&mut self, pair: Pair, value: u16) {
        self.pair(pair).set(value);
    }

    pub fn shadow(&self, reg: Reg8) -> u8 {
        self.shadow[reg.index()].value()
    }

    pub fn shadow_pair_value(&self, pair: Pair) -> u16 {
        let (high, low) = pair.halves();
        u16::from_be_bytes([self.shadow(high), self.shadow(low)])
    }

    pub fn set_shadow_pair(&mut self, pair: Pair, value: u16) {
        let (high, low) = pair.halves();
        let [h, l] = value.to_be_bytes();
        self.shadow[high.index()].set(h);
        self.shadow[low.index()].set(l);
    }

    pub fn flags(&mut self) -> Flags<'_> {
        Flags::new(&mut self.main[Reg8::F.index()])
    }

    #[inline]
    pub fn flag(&self, flag: Flag) -> bool {
        self.get(Reg8::F) & flag as u8 != 0
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.get(Reg8::A)
    }

    #[inline]
    pub fn pc(&self) -> u16 {
        self.pc.value()
    }

    #[inline]
    pub fn sp(&self) -> u16 {
        self.sp.value()
    }

    /// EX AF,AF'
    pub fn exchange_af(&mut self) {
        for reg in [Reg8::A, Reg8::F] {
            std::mem::swap(&mut self.main[reg.index()], &mut self.shadow[reg.index()]);
        }
    }

    /// EXX
    pub fn exchange_main(&mut self) {
        for reg in [Reg8::B, Reg8::C, Reg8::D, Reg8::E, Reg8::H, Reg8::L] {
            std::mem::swap(&mut self.main[reg.index()], &mut self.shadow[reg.index()]);
        }
    }

    /// Bump the refresh counter: the low seven bits count, bit 7 holds.
    pub fn refresh(&mut self) {
        let r = self.r.value();
        self.r.set((r & 0x80) | (r.wrapping_add(1) & 0x7F));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_views_alias_byte_registers() {
        let mut regs = Registers::new();
        regs.set_pair(Pair::BC, 0x020A);
        assert_eq!(regs.get(Reg8::B), 0x02);
        assert_eq!(regs.get(Reg8::C), 0x0A);

        regs.set(Reg8::C, 0xFF);
        regs.pair(Pair::BC).increase();
        assert_eq!(regs.get(Reg8::B), 0x03);
        assert_eq!(regs.get(Reg8::C), 0x00);
        assert_eq!(regs.pair_value(Pair::BC), 0x0300);
    }

    #[test]
    fn af_pairs_accumulator_high() {
        let mut regs = Registers::new();
        regs.set_pair(Pair::AF, 0x3F28);
        assert_eq!(regs.a(), 0x3F);
        assert_eq!(regs.get(Reg8::F), 0x28);
    }

    #[test]
    fn exchanges_swap_banks() {
        let mut regs = Registers::new();
        regs.set_pair(Pair::HL, 0x1234);
        regs.set_pair(Pair::AF, 0x5600);
        regs.exchange_main();
        regs.exchange_af();
        assert_eq!(regs.shadow_pair_value(Pair::HL), 0x1234);
        assert_eq!(regs.shadow_pair_value(Pair::AF), 0x5600);
        assert_eq!(regs.pair_value(Pair::HL), 0xFFFF);
    }

    #[test]
    fn refresh_wraps_at_128_keeping_bit_seven() {
        let mut regs = Registers::new();
        regs.r.set(0x7F);
        regs.refresh();
        assert_eq!(regs.r.value(), 0x00);
        regs.r.set(0xFF);
        regs.refresh();
        assert_eq!(regs.r.value(), 0x80);
    }

    #[test]
    fn register_field_order() {
        assert_eq!(Reg8::from_field(0), Some(Reg8::B));
        assert_eq!(Reg8::from_field(6), None);
        assert_eq!(Reg8::from_field(7), Some(Reg8::A));
    }
}
