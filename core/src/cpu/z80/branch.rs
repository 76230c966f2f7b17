use crate::core::Bus;
use crate::cpu::z80::{Reg8, Z80};

impl Z80 {
    fn jump_relative(&mut self, displacement: u8) {
        let pc = self.regs.pc().wrapping_add_signed(displacement as i8 as i16);
        self.regs.pc.set(pc);
    }

    /// JP nn: 10T
    pub(crate) fn op_jp<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let target = self.fetch16(bus);
        self.regs.pc.set(target);
        10
    }

    /// JP cc, nn: 10T taken or not
    pub(crate) fn op_jp_cc<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let target = self.fetch16(bus);
        if self.eval_condition(opcode >> 3) {
            self.regs.pc.set(target);
        }
        10
    }

    /// JP (HL): 4T
    pub(crate) fn op_jp_hl(&mut self) -> u32 {
        let target = self.index_value();
        self.regs.pc.set(target);
        4
    }

    /// JR e: 12T
    pub(crate) fn op_jr<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let displacement = self.fetch8(bus);
        self.jump_relative(displacement);
        12
    }

    /// JR NZ/Z/NC/C, e: 12T taken / 7T not taken
    pub(crate) fn op_jr_cc<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let displacement = self.fetch8(bus);
        if self.eval_condition((opcode >> 3) & 0x03) {
            self.jump_relative(displacement);
            12
        } else {
            7
        }
    }

    /// DJNZ e: 13T taken / 8T not taken
    pub(crate) fn op_djnz<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let displacement = self.fetch8(bus);
        let b = self.regs.get(Reg8::B).wrapping_sub(1);
        self.regs.set(Reg8::B, b);
        if b != 0 {
            self.jump_relative(displacement);
            13
        } else {
            8
        }
    }

    /// CALL nn: 17T
    pub(crate) fn op_call<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let target = self.fetch16(bus);
        let ret = self.regs.pc();
        self.push16(bus, ret);
        self.regs.pc.set(target);
        17
    }

    /// CALL cc, nn: 17T taken / 10T not taken
    pub(crate) fn op_call_cc<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let target = self.fetch16(bus);
        if self.eval_condition(opcode >> 3) {
            let ret = self.regs.pc();
            self.push16(bus, ret);
            self.regs.pc.set(target);
            17
        } else {
            10
        }
    }

    /// RET: 10T
    pub(crate) fn op_ret<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let target = self.pop16(bus);
        self.regs.pc.set(target);
        10
    }

    /// RET cc: 11T taken / 5T not taken
    pub(crate) fn op_ret_cc<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        if self.eval_condition(opcode >> 3) {
            let target = self.pop16(bus);
            self.regs.pc.set(target);
            11
        } else {
            5
        }
    }

    /// RST p: 11T
    pub(crate) fn op_rst<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let ret = self.regs.pc();
        self.push16(bus, ret);
        self.regs.pc.set((opcode & 0x38) as u16);
        11
    }
}
