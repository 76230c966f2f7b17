use tracing::debug;

use crate::core::Bus;
use crate::cpu::z80::{DecodeFault, Flag, Pair, Prefix, Reg8, Z80};

impl Z80 {
    /// ED page. Opcodes outside the documented set and its mirrors fault.
    pub(crate) fn execute_ed<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u32, DecodeFault> {
        let opcode = self.fetch_opcode(bus);
        let t = match opcode {
            0x47 => self.op_ld_i_a(),
            0x4F => self.op_ld_r_a(),
            0x57 => self.op_ld_a_i(),
            0x5F => self.op_ld_a_r(),
            0x67 => self.op_rrd(bus),
            0x6F => self.op_rld(bus),
            op if (op & 0xC7) == 0x40 => self.op_in_r_c(op, bus),
            op if (op & 0xC7) == 0x41 => self.op_out_c_r(op, bus),
            op if (op & 0xC7) == 0x42 => self.op_adc_sbc_hl(op),
            op if (op & 0xCF) == 0x43 => self.op_ld_nn_rp(op, bus),
            op if (op & 0xCF) == 0x4B => self.op_ld_rp_nn_indirect(op, bus),
            op if (op & 0xC7) == 0x44 => self.op_neg(),
            op if (op & 0xC7) == 0x45 => self.op_retn(op, bus),
            op if (op & 0xC7) == 0x46 => self.op_im(op),
            0xA0 | 0xA8 | 0xB0 | 0xB8 => self.op_block_load(opcode, bus),
            0xA1 | 0xA9 | 0xB1 | 0xB9 => self.op_block_compare(opcode, bus),
            0xA2 | 0xAA | 0xB2 | 0xBA => self.op_block_in(opcode, bus),
            0xA3 | 0xAB | 0xB3 | 0xBB => self.op_block_out(opcode, bus),
            _ => {
                let fault = DecodeFault {
                    prefix: Prefix::ED,
                    opcode,
                    pc: self.regs.pc().wrapping_sub(2),
                };
                debug!(%fault, "decode fault");
                return Err(fault);
            }
        };
        Ok(t)
    }

    /// IN r, (C): 12T. Field 6 only sets flags.
    fn op_in_r_c<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let value = bus.io_read(self.regs.pair_value(Pair::BC));
        if let Some(reg) = Reg8::from_field(opcode >> 3) {
            self.regs.set(reg, value);
        }
        let mut flags = self.regs.flags();
        flags.sign_zero_parity(&value.into());
        flags.set(Flag::H, false);
        flags.set(Flag::N, false);
        12
    }

    /// OUT (C), r: 12T. Field 6 outputs zero.
    fn op_out_c_r<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let value = Reg8::from_field(opcode >> 3).map_or(0, |reg| self.regs.get(reg));
        bus.io_write(self.regs.pair_value(Pair::BC), value);
        12
    }

    /// LD (nn), rr: 20T
    fn op_ld_nn_rp<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let addr = self.fetch16(bus);
        let value = self.rp(opcode >> 4);
        bus.memory().read16(addr).set(value);
        20
    }

    /// LD rr, (nn): 20T
    fn op_ld_rp_nn_indirect<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let addr = self.fetch16(bus);
        let value = bus.memory().read16(addr).value();
        self.set_rp(opcode >> 4, value);
        20
    }

    /// RETN / RETI: 14T. Both restore IFF1 from IFF2; RETI (ED 4D) also
    /// tells the bus the service routine finished.
    fn op_retn<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let target = self.pop16(bus);
        self.regs.pc.set(target);
        self.iff1 = self.iff2;
        if opcode == 0x4D {
            bus.interrupt_serviced();
        }
        14
    }

    /// IM 0/1/2: 8T. The undefined "IM 0/1" encodings select mode 0.
    fn op_im(&mut self, opcode: u8) -> u32 {
        self.im = [0, 0, 1, 2][((opcode >> 3) & 0x03) as usize];
        8
    }

    /// LD I, A: 9T
    fn op_ld_i_a(&mut self) -> u32 {
        self.regs.i.set(self.regs.a());
        9
    }

    /// LD R, A: 9T. All eight bits are loaded.
    fn op_ld_r_a(&mut self) -> u32 {
        self.regs.r.set(self.regs.a());
        9
    }

    /// LD A, I / LD A, R share flags: P/V reflects IFF2.
    fn load_a_special(&mut self, value: u8) -> u32 {
        self.regs.set(Reg8::A, value);
        let iff2 = self.iff2;
        let mut flags = self.regs.flags();
        flags.sign_zero(&value.into());
        flags.set(Flag::H, false);
        flags.set(Flag::N, false);
        flags.set(Flag::PV, iff2);
        9
    }

    /// LD A, I: 9T
    fn op_ld_a_i(&mut self) -> u32 {
        self.load_a_special(self.regs.i.value())
    }

    /// LD A, R: 9T
    fn op_ld_a_r(&mut self) -> u32 {
        self.load_a_special(self.regs.r.value())
    }

    /// RRD: 18T: low nibble of (HL) into A, A's low nibble into the high
    /// nibble of (HL), old high nibble of (HL) down to its low nibble.
    fn op_rrd<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let (a_high, a_low) = self.regs.cell(Reg8::A).nibbles();
        let cell = bus.memory().read8(self.regs.pair_value(Pair::HL));
        let (m_high, m_low) = cell.nibbles();
        cell.store_nibbles(a_low, m_high);
        self.regs.cell_mut(Reg8::A).store_nibbles(a_high, m_low);
        self.nibble_rotate_flags()
    }

    /// RLD: 18T: the mirror image of RRD.
    fn op_rld<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let (a_high, a_low) = self.regs.cell(Reg8::A).nibbles();
        let cell = bus.memory().read8(self.regs.pair_value(Pair::HL));
        let (m_high, m_low) = cell.nibbles();
        cell.store_nibbles(m_low, a_low);
        self.regs.cell_mut(Reg8::A).store_nibbles(a_high, m_high);
        self.nibble_rotate_flags()
    }

    fn nibble_rotate_flags(&mut self) -> u32 {
        let (a, mut flags) = self.regs.accumulator_and_flags();
        flags.sign_zero_parity(a);
        flags.set(Flag::H, false);
        flags.set(Flag::N, false);
        18
    }
}
