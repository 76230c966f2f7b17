use tracing::trace;

use crate::core::Bus;
use crate::cpu::z80::{DecodeFault, Z80};

impl Z80 {
    /// Sample the request lines at an instruction boundary. Returns the
    /// T-states of the acknowledge sequence when an interrupt is taken.
    ///
    /// NMI wins over INT and ignores IFF1 and the EI delay. INT stays
    /// pending while masked.
    pub(crate) fn check_interrupts<B: Bus + ?Sized>(
        &mut self,
        bus: &mut B,
    ) -> Result<Option<u32>, DecodeFault> {
        if self.lines.take_nmi() {
            return Ok(Some(self.accept_nmi(bus)));
        }
        if self.ei_delay {
            self.ei_delay = false;
            return Ok(None);
        }
        if self.iff1 && self.lines.int_pending() {
            self.lines.acknowledge_int();
            return self.accept_int(bus).map(Some);
        }
        Ok(None)
    }

    /// NMI: 11T: push PC, jump to 0x0066. IFF2 keeps the old IFF1.
    fn accept_nmi<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        trace!(pc = self.regs.pc(), "NMI accepted");
        self.halted = false;
        self.regs.refresh();
        self.iff2 = self.iff1;
        self.iff1 = false;
        let ret = self.regs.pc();
        self.push16(bus, ret);
        self.regs.pc.set(0x0066);
        11
    }

    /// Maskable interrupt acknowledge.
    ///
    /// IM 0: executes the data bus byte as an opcode, +2T
    /// IM 1: RST 38h, 13T
    /// IM 2: jump through the vector at (I:data bus), 19T
    fn accept_int<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u32, DecodeFault> {
        let data = self.lines.data_bus();
        trace!(pc = self.regs.pc(), im = self.im, data, "interrupt accepted");
        self.halted = false;
        self.regs.refresh();
        self.iff1 = false;
        self.iff2 = false;

        match self.im {
            0 => Ok(self.execute(data, bus)? + 2),
            1 => {
                let ret = self.regs.pc();
                self.push16(bus, ret);
                self.regs.pc.set(0x0038);
                Ok(13)
            }
            _ => {
                let ret = self.regs.pc();
                self.push16(bus, ret);
                let vector = u16::from_be_bytes([self.regs.i.value(), data]);
                let target = bus.memory().read16(vector).value();
                self.regs.pc.set(target);
                Ok(19)
            }
        }
    }
}
