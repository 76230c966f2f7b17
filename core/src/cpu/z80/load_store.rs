use crate::core::Bus;
use crate::cpu::z80::{Operand, Pair, Reg8, Z80};

impl Z80 {
    // --- 8-bit loads ---

    /// LD r, r': 4T; LD r, (HL) / LD (HL), r: 7T; indexed 19T
    /// Opcode mask: 01 ddd sss (0x76 is HALT)
    ///
    /// When one side is `(IX+d)` the other side names plain H or L.
    pub(crate) fn op_ld_r_r<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let dst_field = (opcode >> 3) & 0x07;
        let src_field = opcode & 0x07;

        let (dst, src) = if dst_field == 6 {
            (self.operand(6, bus), Operand::Reg(Self::register(src_field)))
        } else if src_field == 6 {
            (Operand::Reg(Self::register(dst_field)), self.operand(6, bus))
        } else {
            (self.operand(dst_field, bus), self.operand(src_field, bus))
        };

        let value = self.read_operand(bus, src);
        self.write_operand(bus, dst, value);
        if dst.is_memory() {
            dst.cost(4, 7)
        } else {
            src.cost(4, 7)
        }
    }

    /// LD r, n: 7T; LD (HL), n: 10T; LD (IX+d), n: 15T (+4 prefix)
    pub(crate) fn op_ld_r_n<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let dst = self.operand(opcode >> 3, bus);
        let value = self.fetch8(bus);
        self.write_operand(bus, dst, value);
        match dst {
            Operand::Memory { indexed: true, .. } => 15,
            Operand::Memory { .. } => 10,
            _ => 7,
        }
    }

    /// LD (BC), A / LD (DE), A: 7T
    pub(crate) fn op_ld_indirect_a<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let pair = if opcode == 0x02 { Pair::BC } else { Pair::DE };
        let addr = self.regs.pair_value(pair);
        bus.memory().read8(addr).set(self.regs.a());
        7
    }

    /// LD A, (BC) / LD A, (DE): 7T
    pub(crate) fn op_ld_a_indirect<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let pair = if opcode == 0x0A { Pair::BC } else { Pair::DE };
        let addr = self.regs.pair_value(pair);
        let value = bus.memory().read8(addr).value();
        self.regs.set(Reg8::A, value);
        7
    }

    /// LD (nn), A: 13T
    pub(crate) fn op_ld_nn_a<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch16(bus);
        bus.memory().read8(addr).set(self.regs.a());
        13
    }

    /// LD A, (nn): 13T
    pub(crate) fn op_ld_a_nn<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch16(bus);
        let value = bus.memory().read8(addr).value();
        self.regs.set(Reg8::A, value);
        13
    }

    // --- 16-bit loads ---

    /// LD rr, nn: 10T
    pub(crate) fn op_ld_rp_nn<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> u32 {
        let value = self.fetch16(bus);
        self.set_rp(opcode >> 4, value);
        10
    }

    /// LD (nn), HL: 16T
    pub(crate) fn op_ld_nn_hl<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch16(bus);
        let value = self.index_value();
        bus.memory().read16(addr).set(value);
        16
    }

    /// LD HL, (nn): 16T
    pub(crate) fn op_ld_hl_nn<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let addr = self.fetch16(bus);
        let value = bus.memory().read16(addr).value();
        self.set_index_value(value);
        16
    }

    /// LD SP, HL: 6T
    pub(crate) fn op_ld_sp_hl(&mut self) -> u32 {
        let value = self.index_value();
        self.regs.sp.set(value);
        6
    }

    // --- Exchanges ---

    /// EX AF, AF': 4T
    pub(crate) fn op_ex_af(&mut self) -> u32 {
        self.regs.exchange_af();
        4
    }

    /// EXX: 4T
    pub(crate) fn op_exx(&mut self) -> u32 {
        self.regs.exchange_main();
        4
    }

    /// EX DE, HL: 4T. Always HL, even under a DD/FD prefix.
    pub(crate) fn op_ex_de_hl(&mut self) -> u32 {
        let de = self.regs.pair_value(Pair::DE);
        let hl = self.regs.pair_value(Pair::HL);
        self.regs.set_pair(Pair::DE, hl);
        self.regs.set_pair(Pair::HL, de);
        4
    }

    // --- I/O ---

    /// OUT (n), A: 11T. Port address is A:n.
    pub(crate) fn op_out_n_a<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let n = self.fetch8(bus);
        let a = self.regs.a();
        bus.io_write(u16::from_be_bytes([a, n]), a);
        11
    }

    /// IN A, (n): 11T. Port address is A:n; flags unaffected.
    pub(crate) fn op_in_a_n<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let n = self.fetch8(bus);
        let port = u16::from_be_bytes([self.regs.a(), n]);
        let value = bus.io_read(port);
        self.regs.set(Reg8::A, value);
        11
    }
}
