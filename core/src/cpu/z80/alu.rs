use crate::core::Bus;
use crate::core::cell::{ByteCell, WordCell};
use crate::cpu::z80::{Flag, Pair, Reg8, Z80};

/// BCD fixup for DAA as `(correction, carry_out)`.
///
/// Closed form of the documented table keyed on carry, half carry and the
/// two nibbles: 0x06 fixes the low digit, 0x60 the high one. After a
/// subtraction the same correction is subtracted instead, which yields
/// the table's 0xFA/0xA0/0x9A rows.
pub(crate) fn daa_correction(a: u8, half_carry: bool, carry: bool) -> (u8, bool) {
    let mut correction = 0;
    let mut carry_out = carry;
    if half_carry || (a & 0x0F) > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry_out = true;
    }
    (correction, carry_out)
}

impl Z80 {
    /// ADD ADC SUB SBC AND XOR OR CP against the accumulator.
    pub(crate) fn perform_alu_op(&mut self, op: u8, value: u8) {
        let carry = self.regs.flag(Flag::C);
        let (a, mut flags) = self.regs.accumulator_and_flags();
        match op & 0x07 {
            0 => {
                a.add(value, false);
                flags.arithmetic(a);
            }
            1 => {
                a.add(value, carry);
                flags.arithmetic(a);
            }
            2 => {
                a.subtract(value, false);
                flags.arithmetic(a);
            }
            3 => {
                a.subtract(value, carry);
                flags.arithmetic(a);
            }
            4 => {
                a.set(a.value() & value);
                flags.logic(a, true);
            }
            5 => {
                a.set(a.value() ^ value);
                flags.logic(a, false);
            }
            6 => {
                a.set(a.value() | value);
                flags.logic(a, false);
            }
            _ => {
                // CP: subtract into a scratch copy, A is untouched.
                let mut probe = *a;
                probe.subtract(value, false);
                flags.arithmetic(&probe);
                // X/Y come from the operand for CP, not the result
                flags.undocumented(value);
            }
        }
    }

    // --- Instructions ---

    /// ALU A, r: 4T (reg), 7T ((HL)), 19T ((IX+d))
    /// Opcode mask: 10 xxx zzz
    pub(crate) fn op_alu_r<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let operand = self.operand(opcode, bus);
        let value = self.read_operand(bus, operand);
        self.perform_alu_op(opcode >> 3, value);
        operand.cost(4, 7)
    }

    /// ALU A, n: 7T
    /// Opcode mask: 11 xxx 110
    pub(crate) fn op_alu_n<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let value = self.fetch8(bus);
        self.perform_alu_op(opcode >> 3, value);
        7
    }

    /// INC r: 4T (reg), 11T ((HL)), 23T ((IX+d)). Carry is preserved.
    pub(crate) fn op_inc_r<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let operand = self.operand(opcode >> 3, bus);
        let cell = self.cell(bus, operand);
        cell.increase();
        let result = *cell;
        self.regs.flags().sign_zero_overflow_halfcarry_addsub(&result);
        operand.cost(4, 11)
    }

    /// DEC r: 4T (reg), 11T ((HL)), 23T ((IX+d)). Carry is preserved.
    pub(crate) fn op_dec_r<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let operand = self.operand(opcode >> 3, bus);
        let cell = self.cell(bus, operand);
        cell.decrease();
        let result = *cell;
        self.regs.flags().sign_zero_overflow_halfcarry_addsub(&result);
        operand.cost(4, 11)
    }

    /// DAA: 4T
    pub(crate) fn op_daa(&mut self) -> u32 {
        let a = self.regs.a();
        let subtract = self.regs.flag(Flag::N);
        let half_carry = self.regs.flag(Flag::H);
        let (correction, carry) = daa_correction(a, half_carry, self.regs.flag(Flag::C));

        let result = ByteCell::new(if subtract {
            a.wrapping_sub(correction)
        } else {
            a.wrapping_add(correction)
        });
        let half = if subtract {
            half_carry && (a & 0x0F) < 6
        } else {
            (a & 0x0F) > 9
        };

        self.regs.set(Reg8::A, result.value());
        let mut flags = self.regs.flags();
        flags.sign_zero_parity(&result);
        flags.set(Flag::H, half);
        flags.set(Flag::C, carry);
        4
    }

    /// CPL: 4T
    pub(crate) fn op_cpl(&mut self) -> u32 {
        let (a, mut flags) = self.regs.accumulator_and_flags();
        a.complement();
        flags.set(Flag::H, true);
        flags.set(Flag::N, true);
        flags.undocumented(a.value());
        4
    }

    /// SCF: 4T
    pub(crate) fn op_scf(&mut self) -> u32 {
        let (a, mut flags) = self.regs.accumulator_and_flags();
        flags.set(Flag::C, true);
        flags.set(Flag::H, false);
        flags.set(Flag::N, false);
        flags.undocumented(a.value());
        4
    }

    /// CCF: 4T: H takes the old carry.
    pub(crate) fn op_ccf(&mut self) -> u32 {
        let (a, mut flags) = self.regs.accumulator_and_flags();
        let carry = flags.get(Flag::C);
        flags.set(Flag::H, carry);
        flags.set(Flag::C, !carry);
        flags.set(Flag::N, false);
        flags.undocumented(a.value());
        4
    }

    /// NEG: 8T (ED 44 and mirrors)
    pub(crate) fn op_neg(&mut self) -> u32 {
        let (a, mut flags) = self.regs.accumulator_and_flags();
        a.negate();
        flags.arithmetic(a);
        8
    }

    /// RLCA / RRCA / RLA / RRA: 4T. S, Z and P/V are preserved.
    pub(crate) fn op_rotate_a(&mut self, opcode: u8) -> u32 {
        let carry = self.regs.flag(Flag::C);
        let (a, mut flags) = self.regs.accumulator_and_flags();
        match opcode {
            0x07 => a.rotate_left(),
            0x0F => a.rotate_right(),
            0x17 => a.rotate_left_through(carry),
            _ => a.rotate_right_through(carry),
        }
        flags.shift_flags(a);
        flags.undocumented(a.value());
        4
    }

    // --- 16-bit ---

    /// ADD HL, rr: 11T (ADD IX/IY, rr: 15T with prefix)
    pub(crate) fn op_add_hl_rp(&mut self, opcode: u8) -> u32 {
        let rhs = self.rp(opcode >> 4);
        let mut word = WordCell::new(self.index_value());
        word.add(rhs, false);
        self.set_index_value(word.value());
        self.regs.flags().math_flags16(&word.status());
        11
    }

    /// INC rr / DEC rr: 6T, no flags
    pub(crate) fn op_inc_dec_rp(&mut self, opcode: u8) -> u32 {
        let p = opcode >> 4;
        let value = self.rp(p);
        if opcode & 0x08 == 0 {
            self.set_rp(p, value.wrapping_add(1));
        } else {
            self.set_rp(p, value.wrapping_sub(1));
        }
        6
    }

    /// ADC HL, rr (ED 4A/5A/6A/7A) / SBC HL, rr (ED 42/52/62/72): 15T
    pub(crate) fn op_adc_sbc_hl(&mut self, opcode: u8) -> u32 {
        let rhs = self.rp(opcode >> 4);
        let carry = self.regs.flag(Flag::C);
        let status = {
            let mut hl = self.regs.pair(Pair::HL);
            if opcode & 0x08 != 0 {
                hl.add(rhs, carry);
            } else {
                hl.subtract(rhs, carry);
            }
            hl.status()
        };
        self.regs.flags().arithmetic16(&status);
        15
    }
}
