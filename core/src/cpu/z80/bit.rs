use crate::core::Bus;
use crate::core::cell::ByteCell;
use crate::cpu::z80::{Flag, Operand, Z80};

impl Z80 {
    /// CB page: rotate/shift 8T (reg) / 15T ((HL)); BIT 8T / 12T; RES/SET 8T / 15T
    pub(crate) fn execute_cb<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let opcode = self.fetch_opcode(bus);
        let operand = self.operand(opcode, bus);
        self.perform_cb_op(opcode, operand, bus);
        if opcode >> 6 == 1 {
            operand.cost(8, 12)
        } else {
            operand.cost(8, 15)
        }
    }

    /// Apply CB-page operation `opcode` to `operand` and return the
    /// resulting byte (the tested byte for BIT).
    ///
    /// Opcode layout: xx yyy zzz, x = group, y = shift kind or bit number.
    pub(crate) fn perform_cb_op<B: Bus + ?Sized>(
        &mut self,
        opcode: u8,
        operand: Operand,
        bus: &mut B,
    ) -> u8 {
        let y = (opcode >> 3) & 0x07;
        match opcode >> 6 {
            0 => {
                let carry = self.regs.flag(Flag::C);
                let cell = self.cell(bus, operand);
                match y {
                    0 => cell.rotate_left(),
                    1 => cell.rotate_right(),
                    2 => cell.rotate_left_through(carry),
                    3 => cell.rotate_right_through(carry),
                    4 => cell.shift_left(),
                    5 => cell.shift_right_arithmetic(),
                    6 => cell.shift_left_logical(),
                    _ => cell.shift_right(),
                }
                let result = *cell;
                let mut flags = self.regs.flags();
                flags.sign_zero_parity(&result);
                flags.shift_flags(&result);
                result.value()
            }
            1 => {
                let value = self.read_operand(bus, operand);
                let set = ByteCell::new(value).bit(y);
                let undocumented = match operand {
                    Operand::Memory { addr, .. } => (addr >> 8) as u8,
                    _ => value,
                };
                let mut flags = self.regs.flags();
                flags.set(Flag::Z, !set);
                flags.set(Flag::PV, !set);
                flags.set(Flag::S, y == 7 && set);
                flags.set(Flag::H, true);
                flags.set(Flag::N, false);
                flags.undocumented(undocumented);
                value
            }
            2 => {
                let cell = self.cell(bus, operand);
                cell.reset_bit(y);
                cell.value()
            }
            _ => {
                let cell = self.cell(bus, operand);
                cell.set_bit(y, true);
                cell.value()
            }
        }
    }
}
