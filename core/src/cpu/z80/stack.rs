use crate::core::Bus;
use crate::core::cell::WordCell;
use crate::cpu::z80::Z80;

impl Z80 {
    pub(crate) fn push16<B: Bus + ?Sized>(&mut self, bus: &mut B, value: u16) {
        let sp = self.regs.sp().wrapping_sub(2);
        self.regs.sp.set(sp);
        bus.memory().read16(sp).set(value);
    }

    pub(crate) fn pop16<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let sp = self.regs.sp();
        let value = bus.memory().read16(sp).value();
        self.regs.sp.set(sp.wrapping_add(2));
        value
    }

    /// PUSH rr: 11T (BC, DE, HL/IX/IY, AF)
    pub(crate) fn op_push<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let value = self.rp_af(opcode >> 4);
        self.push16(bus, value);
        11
    }

    /// POP rr: 10T
    pub(crate) fn op_pop<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let value = self.pop16(bus);
        self.set_rp_af(opcode >> 4, value);
        10
    }

    /// EX (SP), HL: 19T
    pub(crate) fn op_ex_sp_hl<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let mut word = WordCell::new(self.index_value());
        bus.memory().read16(self.regs.sp()).exchange(&mut word);
        self.set_index_value(word.value());
        19
    }
}
