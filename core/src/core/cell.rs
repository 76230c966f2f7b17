//! 8- and 16-bit storage cells with two's-complement arithmetic status.
//!
//! Every register and every memory location is a [`ByteCell`]. Arithmetic
//! performed on a cell records carry, half carry, overflow and the
//! add/subtract kind of the operation, and the flag register later reads
//! that status back through the composite setters in
//! [`crate::cpu::z80::flags`].
//!
//! A [`WordCell`] is either an owned pair of bytes (SP, PC, IX, IY) or a
//! paired view that borrows two existing cells (BC over B and C, a 16-bit
//! memory operand over two adjacent memory bytes). Writes through a view
//! land in the cells it was built from.

use std::borrow::{Borrow, BorrowMut};

/// One byte of storage plus the status of the last operation performed on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ByteCell {
    value: u8,
    /// Signed overflow out of the last store or arithmetic operation.
    pub overflow: bool,
    /// Carry out of bit 3 (or borrow into bit 4) on the last arithmetic op.
    pub half_carry: bool,
    /// Carry out of bit 7, or the bit shifted out by a shift/rotate.
    pub carry: bool,
    /// Last arithmetic op was a subtraction (the Z80 N flag).
    pub subtract: bool,
}

impl ByteCell {
    pub const fn new(value: u8) -> Self {
        Self {
            value,
            overflow: false,
            half_carry: false,
            carry: false,
            subtract: false,
        }
    }

    #[inline]
    pub const fn value(&self) -> u8 {
        self.value
    }

    /// Two's-complement interpretation of the stored bit pattern.
    #[inline]
    pub const fn signed(&self) -> i8 {
        self.value as i8
    }

    /// Raw write; status bits are left untouched.
    #[inline]
    pub fn set(&mut self, value: u8) {
        self.value = value;
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.value == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.value & 0x80 != 0
    }

    #[inline]
    pub const fn parity_even(&self) -> bool {
        self.value.count_ones() % 2 == 0
    }

    /// Store a signed or unsigned integer, wrapping it into 8 bits.
    ///
    /// `overflow` is set when `n` lies outside `-128..=255`; `half_carry`
    /// records whether the upper nibble changed. Carry is not touched.
    pub fn store(&mut self, n: i32) {
        let previous = self.value;
        self.value = n.rem_euclid(0x100) as u8;
        self.overflow = !(-0x80..=0xFF).contains(&n);
        self.half_carry = (previous ^ self.value) & 0xF0 != 0;
    }

    /// `self += other + carry_in`.
    pub fn add(&mut self, other: u8, carry_in: bool) {
        let a = self.value;
        let c = carry_in as u8;
        let sum = a as u16 + other as u16 + c as u16;
        let signed = a as i8 as i16 + other as i8 as i16 + c as i16;

        self.value = sum as u8;
        self.carry = sum > 0xFF;
        self.half_carry = (a & 0x0F) + (other & 0x0F) + c > 0x0F;
        self.overflow = !(-0x80..=0x7F).contains(&signed);
        self.subtract = false;
    }

    /// `self -= other + borrow_in`.
    pub fn subtract(&mut self, other: u8, borrow_in: bool) {
        let a = self.value;
        let c = borrow_in as u8;
        let diff = a as i16 - other as i16 - c as i16;
        let signed = a as i8 as i16 - other as i8 as i16 - c as i16;

        self.value = diff as u8;
        self.carry = diff < 0;
        self.half_carry = (a & 0x0F) < (other & 0x0F) + c;
        self.overflow = !(-0x80..=0x7F).contains(&signed);
        self.subtract = true;
    }

    pub fn increase(&mut self) {
        self.add(1, false);
    }

    pub fn decrease(&mut self) {
        self.subtract(1, false);
    }

    /// Two's-complement negation (`0 - self`).
    pub fn negate(&mut self) {
        let mut zero = ByteCell::new(0);
        zero.subtract(self.value, false);
        *self = zero;
    }

    /// One's complement.
    pub fn complement(&mut self) {
        self.value = !self.value;
    }

    // --- Shifts and rotates: `carry` receives the bit shifted out ---

    pub fn shift_left(&mut self) {
        self.carry = self.value & 0x80 != 0;
        self.value <<= 1;
    }

    /// Shift left, filling bit 0 with 1 (undocumented SLL).
    pub fn shift_left_logical(&mut self) {
        self.shift_left();
        self.value |= 0x01;
    }

    pub fn shift_right(&mut self) {
        self.carry = self.value & 0x01 != 0;
        self.value >>= 1;
    }

    /// Shift right keeping the sign bit.
    pub fn shift_right_arithmetic(&mut self) {
        self.carry = self.value & 0x01 != 0;
        self.value = (self.value >> 1) | (self.value & 0x80);
    }

    pub fn rotate_left(&mut self) {
        self.carry = self.value & 0x80 != 0;
        self.value = self.value.rotate_left(1);
    }

    pub fn rotate_right(&mut self) {
        self.carry = self.value & 0x01 != 0;
        self.value = self.value.rotate_right(1);
    }

    /// 9-bit rotate left through the supplied carry.
    pub fn rotate_left_through(&mut self, carry_in: bool) {
        self.carry = self.value & 0x80 != 0;
        self.value = (self.value << 1) | carry_in as u8;
    }

    /// 9-bit rotate right through the supplied carry.
    pub fn rotate_right_through(&mut self, carry_in: bool) {
        self.carry = self.value & 0x01 != 0;
        self.value = (self.value >> 1) | ((carry_in as u8) << 7);
    }

    // --- Bit access ---

    pub fn bit(&self, n: u8) -> bool {
        assert!(n < 8, "bit index {n} out of range");
        self.value & (1 << n) != 0
    }

    pub fn set_bit(&mut self, n: u8, value: bool) {
        assert!(n < 8, "bit index {n} out of range");
        if value {
            self.value |= 1 << n;
        } else {
            self.value &= !(1 << n);
        }
    }

    pub fn reset_bit(&mut self, n: u8) {
        self.set_bit(n, false);
    }

    /// Split into `(high, low)` nibbles.
    pub const fn nibbles(&self) -> (u8, u8) {
        (self.value >> 4, self.value & 0x0F)
    }

    pub fn store_nibbles(&mut self, high: u8, low: u8) {
        assert!(high < 0x10 && low < 0x10, "nibble out of range: {high:#x}, {low:#x}");
        self.value = (high << 4) | low;
    }
}

impl From<u8> for ByteCell {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

/// Copyable result of a 16-bit operation, read by the flag setters after
/// the borrow on the word has ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WordStatus {
    pub value: u16,
    pub overflow: bool,
    pub half_carry: bool,
    pub carry: bool,
    pub subtract: bool,
}

/// A 16-bit value made of a high and a low [`ByteCell`].
///
/// `T` is `ByteCell` for standalone registers and `&mut ByteCell` for a
/// paired view over cells owned elsewhere.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WordCell<T = ByteCell> {
    high: T,
    low: T,
    pub overflow: bool,
    pub half_carry: bool,
    pub carry: bool,
    pub subtract: bool,
}

impl WordCell {
    pub const fn new(value: u16) -> Self {
        Self {
            high: ByteCell::new((value >> 8) as u8),
            low: ByteCell::new(value as u8),
            overflow: false,
            half_carry: false,
            carry: false,
            subtract: false,
        }
    }
}

impl<'a> WordCell<&'a mut ByteCell> {
    /// View two existing cells as one word.
    pub fn pair(high: &'a mut ByteCell, low: &'a mut ByteCell) -> Self {
        Self {
            high,
            low,
            overflow: false,
            half_carry: false,
            carry: false,
            subtract: false,
        }
    }
}

impl<T: BorrowMut<ByteCell>> WordCell<T> {
    #[inline]
    pub fn high(&self) -> &ByteCell {
        <T as Borrow<ByteCell>>::borrow(&self.high)
    }

    #[inline]
    pub fn low(&self) -> &ByteCell {
        <T as Borrow<ByteCell>>::borrow(&self.low)
    }

    #[inline]
    pub fn high_mut(&mut self) -> &mut ByteCell {
        <T as BorrowMut<ByteCell>>::borrow_mut(&mut self.high)
    }

    #[inline]
    pub fn low_mut(&mut self) -> &mut ByteCell {
        <T as BorrowMut<ByteCell>>::borrow_mut(&mut self.low)
    }

    #[inline]
    pub fn value(&self) -> u16 {
        u16::from_be_bytes([self.high().value(), self.low().value()])
    }

    #[inline]
    pub fn signed(&self) -> i16 {
        self.value() as i16
    }

    /// Raw write through to both bytes.
    #[inline]
    pub fn set(&mut self, value: u16) {
        let [high, low] = value.to_be_bytes();
        self.high_mut().set(high);
        self.low_mut().set(low);
    }

    /// Store a signed or unsigned integer, wrapping it into 16 bits.
    pub fn store(&mut self, n: i32) {
        let previous = self.value();
        let value = n.rem_euclid(0x1_0000) as u16;
        self.set(value);
        self.overflow = !(-0x8000..=0xFFFF).contains(&n);
        self.half_carry = (previous ^ value) & 0xF000 != 0;
    }

    /// `self += other + carry_in`; half carry is the carry out of bit 11.
    pub fn add(&mut self, other: u16, carry_in: bool) {
        let a = self.value();
        let c = carry_in as u32;
        let sum = a as u32 + other as u32 + c;
        let signed = a as i16 as i32 + other as i16 as i32 + c as i32;

        self.set(sum as u16);
        self.carry = sum > 0xFFFF;
        self.half_carry = (a as u32 & 0x0FFF) + (other as u32 & 0x0FFF) + c > 0x0FFF;
        self.overflow = !(-0x8000..=0x7FFF).contains(&signed);
        self.subtract = false;
    }

    /// `self -= other + borrow_in`; half carry is the borrow into bit 12.
    pub fn subtract(&mut self, other: u16, borrow_in: bool) {
        let a = self.value();
        let c = borrow_in as i32;
        let diff = a as i32 - other as i32 - c;
        let signed = a as i16 as i32 - other as i16 as i32 - c;

        self.set(diff as u16);
        self.carry = diff < 0;
        self.half_carry = (a as i32 & 0x0FFF) < (other as i32 & 0x0FFF) + c;
        self.overflow = !(-0x8000..=0x7FFF).contains(&signed);
        self.subtract = true;
    }

    /// Wrapping increment. Z80 16-bit INC affects no flags, so status is kept.
    pub fn increase(&mut self) {
        let value = self.value().wrapping_add(1);
        self.set(value);
    }

    pub fn decrease(&mut self) {
        let value = self.value().wrapping_sub(1);
        self.set(value);
    }

    /// Swap contents with another word, owned or aliased.
    pub fn exchange<U: BorrowMut<ByteCell>>(&mut self, other: &mut WordCell<U>) {
        let mine = self.value();
        self.set(other.value());
        other.set(mine);
    }

    pub fn copy_from<U: BorrowMut<ByteCell>>(&mut self, other: &WordCell<U>) {
        self.set(other.value());
    }

    pub fn status(&self) -> WordStatus {
        WordStatus {
            value: self.value(),
            overflow: self.overflow,
            half_carry: self.half_carry,
            carry: self.carry,
            subtract: self.subtract,
        }
    }
}

/// Two distinct mutable elements of one slice.
pub(crate) fn pair_mut<T>(slice: &mut [T], first: usize, second: usize) -> (&mut T, &mut T) {
    assert_ne!(first, second, "aliased cell pair");
    if first < second {
        let (head, tail) = slice.split_at_mut(second);
        (&mut head[first], &mut tail[0])
    } else {
        let (head, tail) = slice.split_at_mut(first);
        (&mut tail[0], &mut head[second])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_wraps_into_twos_complement() {
        let mut cell = ByteCell::default();
        cell.store(255);
        assert_eq!(cell.signed(), -1);
        assert!(!cell.overflow);

        cell.store(129);
        assert_eq!(cell.value(), 129);
        assert_eq!(cell.signed(), -127);
        assert!(!cell.overflow);

        cell.store(-129);
        assert_eq!(cell.signed(), 127);
        assert!(cell.overflow);

        cell.store(256);
        assert_eq!(cell.value(), 0);
        assert!(cell.overflow);
    }

    #[test]
    fn signed_round_trip_over_whole_range() {
        let mut cell = ByteCell::default();
        for n in -128..=255 {
            cell.store(n);
            assert_eq!(cell.signed(), n as u8 as i8, "n = {n}");
            assert!(!cell.overflow, "n = {n}");
        }
    }

    #[test]
    fn increase_from_max_positive() {
        let mut cell = ByteCell::new(0x7F);
        cell.increase();
        assert_eq!(cell.value(), 0x80);
        assert!(cell.overflow);
        assert!(cell.half_carry);
        assert!(cell.is_negative());
        assert!(!cell.carry);
    }

    #[test]
    fn increase_from_minus_one() {
        let mut cell = ByteCell::new(0xFF);
        cell.increase();
        assert!(cell.is_zero());
        assert!(cell.half_carry);
        assert!(cell.carry);
        assert!(!cell.overflow);
    }

    #[test]
    fn add_two_minimums() {
        let mut cell = ByteCell::new(0x80);
        cell.add(0x80, false);
        assert_eq!(cell.value(), 0);
        assert!(cell.overflow);
        assert!(cell.carry);
        assert!(!cell.half_carry);
        assert!(!cell.subtract);
    }

    #[test]
    fn subtract_borrows() {
        let mut cell = ByteCell::new(0x10);
        cell.subtract(0x01, false);
        assert_eq!(cell.value(), 0x0F);
        assert!(cell.half_carry);
        assert!(!cell.carry);
        assert!(cell.subtract);

        let mut cell = ByteCell::new(0x00);
        cell.subtract(0x00, true);
        assert_eq!(cell.value(), 0xFF);
        assert!(cell.carry);

        let mut cell = ByteCell::new(0x80);
        cell.decrease();
        assert_eq!(cell.value(), 0x7F);
        assert!(cell.overflow);
    }

    #[test]
    fn negate_is_twos_complement() {
        let mut cell = ByteCell::new(0x01);
        cell.negate();
        assert_eq!(cell.value(), 0xFF);
        assert!(cell.carry);

        let mut cell = ByteCell::new(0x80);
        cell.negate();
        assert_eq!(cell.value(), 0x80);
        assert!(cell.overflow);

        let mut cell = ByteCell::new(0);
        cell.negate();
        assert_eq!(cell.value(), 0);
        assert!(!cell.carry);
    }

    #[test]
    fn shifts_and_rotates_report_shifted_bit() {
        let mut cell = ByteCell::new(0x81);
        cell.rotate_left();
        assert_eq!(cell.value(), 0x03);
        assert!(cell.carry);

        let mut cell = ByteCell::new(0x81);
        cell.rotate_right_through(false);
        assert_eq!(cell.value(), 0x40);
        assert!(cell.carry);

        let mut cell = ByteCell::new(0x80);
        cell.shift_right_arithmetic();
        assert_eq!(cell.value(), 0xC0);
        assert!(!cell.carry);

        let mut cell = ByteCell::new(0x00);
        cell.shift_left_logical();
        assert_eq!(cell.value(), 0x01);
    }

    #[test]
    fn bit_operations() {
        let mut cell = ByteCell::new(0);
        cell.set_bit(7, true);
        assert!(cell.bit(7));
        assert_eq!(cell.value(), 0x80);
        cell.reset_bit(7);
        assert_eq!(cell.value(), 0);
    }

    #[test]
    #[should_panic(expected = "bit index 8 out of range")]
    fn bit_index_out_of_range_panics() {
        ByteCell::new(0).bit(8);
    }

    #[test]
    fn nibble_split_and_join() {
        let mut cell = ByteCell::new(0x10);
        assert_eq!(cell.nibbles(), (1, 0));
        cell.store_nibbles(0x0A, 0x05);
        assert_eq!(cell.value(), 0xA5);
    }

    #[test]
    #[should_panic]
    fn nibble_out_of_range_panics() {
        ByteCell::new(0).store_nibbles(0x10, 0);
    }

    #[test]
    fn word_view_writes_through() {
        let mut high = ByteCell::new(0x12);
        let mut low = ByteCell::new(0x34);
        {
            let mut word = WordCell::pair(&mut high, &mut low);
            assert_eq!(word.value(), 0x1234);
            word.increase();
            word.store(0x00FF);
            word.increase();
            assert_eq!(word.value(), 0x0100);
        }
        assert_eq!(high.value(), 0x01);
        assert_eq!(low.value(), 0x00);
    }

    #[test]
    fn word_add_carries_out_of_bit_fifteen() {
        let mut word = WordCell::new(0x4000);
        word.add(0xFFFF, false);
        assert_eq!(word.value(), 0x3FFF);
        assert!(word.carry);
        assert!(!word.half_carry);

        let mut word = WordCell::new(0x57FF);
        word.add(0x0701, false);
        assert_eq!(word.value(), 0x5F00);
        assert!(!word.carry);
        assert!(!word.half_carry);

        let mut word = WordCell::new(0x0FFF);
        word.add(0x0001, false);
        assert_eq!(word.value(), 0x1000);
        assert!(word.half_carry);
    }

    #[test]
    fn word_subtract_with_borrow() {
        let mut word = WordCell::new(0x1000);
        word.subtract(0x0001, false);
        assert_eq!(word.value(), 0x0FFF);
        assert!(word.half_carry);
        assert!(!word.carry);

        let mut word = WordCell::new(0x8000);
        word.subtract(0x0000, true);
        assert_eq!(word.value(), 0x7FFF);
        assert!(word.overflow);
    }

    #[test]
    fn word_exchange_between_owned_and_view() {
        let mut high = ByteCell::new(0xAB);
        let mut low = ByteCell::new(0xCD);
        let mut owned = WordCell::new(0x1234);
        let mut view = WordCell::pair(&mut high, &mut low);
        owned.exchange(&mut view);
        assert_eq!(owned.value(), 0xABCD);
        assert_eq!(view.value(), 0x1234);
    }

    #[test]
    fn pair_mut_returns_requested_order() {
        let mut cells = [1, 2, 3];
        let (a, b) = pair_mut(&mut cells, 2, 0);
        assert_eq!((*a, *b), (3, 1));
    }
}
