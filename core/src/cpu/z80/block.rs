use crate::core::Bus;
use crate::core::cell::ByteCell;
use crate::cpu::z80::{Flag, Pair, Reg8, Z80};

impl Z80 {
    /// Step HL (and DE for transfers) one element forward or back.
    fn advance_pair(&mut self, pair: Pair, decrement: bool) {
        let mut word = self.regs.pair(pair);
        if decrement {
            word.decrease();
        } else {
            word.increase();
        }
    }

    /// BC--, returning the new count.
    fn count_down(&mut self) -> u16 {
        let mut bc = self.regs.pair(Pair::BC);
        bc.decrease();
        bc.value()
    }

    /// Repeating forms refetch themselves by rewinding PC over the two
    /// opcode bytes: 21T while repeating, 16T on the last element.
    fn repeat_block(&mut self, again: bool) -> u32 {
        if again {
            let pc = self.regs.pc().wrapping_sub(2);
            self.regs.pc.set(pc);
            21
        } else {
            16
        }
    }

    // --- Block Transfer ---

    /// LDI (A0) / LDD (A8) / LDIR (B0) / LDDR (B8): (DE)←(HL), HL±, DE±, BC--
    pub(crate) fn op_block_load<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let decrement = opcode & 0x08 != 0;
        let repeat = opcode & 0x10 != 0;

        let value = bus.memory().read8(self.regs.pair_value(Pair::HL)).value();
        bus.memory().read8(self.regs.pair_value(Pair::DE)).set(value);
        self.advance_pair(Pair::HL, decrement);
        self.advance_pair(Pair::DE, decrement);
        let bc = self.count_down();

        // Undocumented: X = bit 3 of (val+A), Y = bit 1 of (val+A)
        let n = value.wrapping_add(self.regs.a());
        let mut flags = self.regs.flags();
        flags.set(Flag::H, false);
        flags.set(Flag::N, false);
        flags.set(Flag::PV, bc != 0);
        flags.undocumented((n & 0x08) | ((n & 0x02) << 4));

        self.repeat_block(repeat && bc != 0)
    }

    // --- Block Compare ---

    /// CPI (A1) / CPD (A9) / CPIR (B1) / CPDR (B9): compare A-(HL), HL±, BC--
    ///
    /// The repeating forms stop on a match or when BC reaches zero.
    pub(crate) fn op_block_compare<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let decrement = opcode & 0x08 != 0;
        let repeat = opcode & 0x10 != 0;

        let value = bus.memory().read8(self.regs.pair_value(Pair::HL)).value();
        let mut probe = ByteCell::new(self.regs.a());
        probe.subtract(value, false);
        self.advance_pair(Pair::HL, decrement);
        let bc = self.count_down();

        let n = probe.value().wrapping_sub(probe.half_carry as u8);
        let mut flags = self.regs.flags();
        flags.sign_zero(&probe);
        flags.set(Flag::H, probe.half_carry);
        flags.set(Flag::N, true);
        flags.set(Flag::PV, bc != 0);
        flags.undocumented((n & 0x08) | ((n & 0x02) << 4));

        self.repeat_block(repeat && bc != 0 && !probe.is_zero())
    }

    // --- Block I/O ---

    /// Flags shared by the block I/O group, given the byte moved and the
    /// helper sum `k` (byte + C±1 for input, byte + L for output).
    fn block_io_flags(&mut self, value: u8, k: u16) {
        let b = *self.regs.cell(Reg8::B);
        let parity = ByteCell::new((k as u8 & 0x07) ^ b.value()).parity_even();
        let mut flags = self.regs.flags();
        flags.sign_zero(&b);
        flags.set(Flag::N, value & 0x80 != 0);
        flags.set(Flag::H, k > 0xFF);
        flags.set(Flag::C, k > 0xFF);
        flags.set(Flag::PV, parity);
    }

    /// INI (A2) / IND (AA) / INIR (B2) / INDR (BA): (HL)←port(BC), HL±, B--
    pub(crate) fn op_block_in<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let decrement = opcode & 0x08 != 0;
        let repeat = opcode & 0x10 != 0;

        let value = bus.io_read(self.regs.pair_value(Pair::BC));
        bus.memory().read8(self.regs.pair_value(Pair::HL)).set(value);
        self.advance_pair(Pair::HL, decrement);
        self.regs.cell_mut(Reg8::B).decrease();

        let c = self.regs.get(Reg8::C);
        let c = if decrement { c.wrapping_sub(1) } else { c.wrapping_add(1) };
        self.block_io_flags(value, value as u16 + c as u16);

        self.repeat_block(repeat && self.regs.get(Reg8::B) != 0)
    }

    /// OUTI (A3) / OUTD (AB) / OTIR (B3) / OTDR (BB): B--, port(BC)←(HL), HL±
    pub(crate) fn op_block_out<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let decrement = opcode & 0x08 != 0;
        let repeat = opcode & 0x10 != 0;

        let value = bus.memory().read8(self.regs.pair_value(Pair::HL)).value();
        self.regs.cell_mut(Reg8::B).decrease();
        bus.io_write(self.regs.pair_value(Pair::BC), value);
        self.advance_pair(Pair::HL, decrement);

        let l = self.regs.get(Reg8::L);
        self.block_io_flags(value, value as u16 + l as u16);

        self.repeat_block(repeat && self.regs.get(Reg8::B) != 0)
    }
}
