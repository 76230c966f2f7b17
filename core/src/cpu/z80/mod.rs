mod alu;
mod bit;
mod block;
mod branch;
mod extended;
pub mod flags;
mod index;
mod interrupt;
mod load_store;
pub mod registers;
mod stack;

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::core::bus::{Bus, InterruptLines};
use crate::core::cell::ByteCell;
use crate::cpu::{
    Cpu, InterruptRequest,
    state::{CpuStateTrait, Z80State},
};

pub use flags::{Flag, Flags};
pub use registers::{Pair, Reg8, Registers};

/// Opcode page an instruction was decoded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prefix {
    None,
    CB,
    DD,
    ED,
    FD,
    DDCB,
    FDCB,
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "",
            Self::CB => "CB ",
            Self::DD => "DD ",
            Self::ED => "ED ",
            Self::FD => "FD ",
            Self::DDCB => "DD CB ",
            Self::FDCB => "FD CB ",
        };
        f.write_str(name)
    }
}

/// An opcode with no defined behaviour. Execution cannot meaningfully
/// continue past one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeFault {
    pub prefix: Prefix,
    pub opcode: u8,
    /// Address of the first byte of the faulting instruction.
    pub pc: u16,
}

impl fmt::Display for DecodeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "undefined opcode {}{:02X} at {:04X}",
            self.prefix, self.opcode, self.pc
        )
    }
}

impl std::error::Error for DecodeFault {}

/// Register that stands in for HL under a DD/FD prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexMode {
    HL,
    IX,
    IY,
}

/// Where an 8-bit operand lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operand {
    Reg(Reg8),
    /// IXH or IYH.
    IndexHigh,
    /// IXL or IYL.
    IndexLow,
    /// `(HL)`, or `(IX+d)`/`(IY+d)` when `indexed`.
    Memory { addr: u16, indexed: bool },
}

impl Operand {
    /// T-states for an instruction costing `register` on a register and
    /// `memory` on `(HL)`. The displacement of `(IX+d)` adds 8 more.
    pub(crate) const fn cost(self, register: u32, memory: u32) -> u32 {
        match self {
            Operand::Memory { indexed: true, .. } => memory + 8,
            Operand::Memory { indexed: false, .. } => memory,
            _ => register,
        }
    }

    pub(crate) const fn is_memory(self) -> bool {
        matches!(self, Operand::Memory { .. })
    }
}

pub struct Z80 {
    pub regs: Registers,

    // Interrupt state
    pub iff1: bool,
    pub iff2: bool,
    pub im: u8,
    pub halted: bool,
    pub ei_delay: bool,

    pub(crate) index_mode: IndexMode,
    lines: Arc<InterruptLines>,
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

impl Z80 {
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            iff1: false,
            iff2: false,
            im: 0,
            halted: false,
            ei_delay: false,
            index_mode: IndexMode::HL,
            lines: Arc::new(InterruptLines::new()),
        }
    }

    /// Request lines to hand to timers and peripherals.
    pub fn interrupt_lines(&self) -> Arc<InterruptLines> {
        Arc::clone(&self.lines)
    }

    pub fn request_nmi(&self) {
        self.lines.request_nmi();
    }

    /// Assert INT with `data_bus` as the acknowledge byte.
    pub fn request_interrupt(&self, data_bus: u8) {
        self.lines.request_int_with(data_bus);
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc()
    }

    // --- Fetch ---

    /// M1 fetch: read at PC, advance PC, bump R.
    pub(crate) fn fetch_opcode<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let opcode = self.fetch8(bus);
        self.regs.refresh();
        opcode
    }

    /// Operand byte at PC.
    pub(crate) fn fetch8<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let value = bus.memory().read8(self.regs.pc()).value();
        self.regs.pc.increase();
        value
    }

    /// Little-endian operand word at PC.
    pub(crate) fn fetch16<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let value = bus.memory().read16(self.regs.pc()).value();
        self.regs.pc.set(self.regs.pc().wrapping_add(2));
        value
    }

    /// Run one instruction, or take a pending interrupt, or idle one
    /// halted cycle. Returns the T-states consumed.
    pub fn step<B: Bus + ?Sized>(&mut self, bus: &mut B) -> Result<u32, DecodeFault> {
        if let Some(t) = self.check_interrupts(bus)? {
            return Ok(t);
        }
        if self.halted {
            self.regs.refresh();
            return Ok(4);
        }
        let opcode = self.fetch_opcode(bus);
        self.execute(opcode, bus)
    }

    /// Execute `opcode`, already fetched, reading any further bytes from PC.
    pub fn execute<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> Result<u32, DecodeFault> {
        self.index_mode = IndexMode::HL;
        self.dispatch(opcode, bus)
    }

    // --- Register helpers ---

    /// HL, IX or IY depending on the active prefix.
    pub(crate) fn index_value(&self) -> u16 {
        match self.index_mode {
            IndexMode::HL => self.regs.pair_value(Pair::HL),
            IndexMode::IX => self.regs.ix.value(),
            IndexMode::IY => self.regs.iy.value(),
        }
    }

    pub(crate) fn set_index_value(&mut self, value: u16) {
        match self.index_mode {
            IndexMode::HL => self.regs.set_pair(Pair::HL, value),
            IndexMode::IX => self.regs.ix.set(value),
            IndexMode::IY => self.regs.iy.set(value),
        }
    }

    /// Register pair field `p`: BC, DE, HL/IX/IY, SP.
    pub(crate) fn rp(&self, p: u8) -> u16 {
        match p & 0x03 {
            0 => self.regs.pair_value(Pair::BC),
            1 => self.regs.pair_value(Pair::DE),
            2 => self.index_value(),
            _ => self.regs.sp(),
        }
    }

    pub(crate) fn set_rp(&mut self, p: u8, value: u16) {
        match p & 0x03 {
            0 => self.regs.set_pair(Pair::BC, value),
            1 => self.regs.set_pair(Pair::DE, value),
            2 => self.set_index_value(value),
            _ => self.regs.sp.set(value),
        }
    }

    /// Register pair field for PUSH/POP: AF replaces SP.
    pub(crate) fn rp_af(&self, p: u8) -> u16 {
        match p & 0x03 {
            3 => self.regs.pair_value(Pair::AF),
            p => self.rp(p),
        }
    }

    pub(crate) fn set_rp_af(&mut self, p: u8, value: u16) {
        match p & 0x03 {
            3 => self.regs.set_pair(Pair::AF, value),
            p => self.set_rp(p, value),
        }
    }

    /// Resolve a 3-bit register field, honouring the active prefix:
    /// H/L become the index halves and `(HL)` becomes `(IX+d)`, whose
    /// displacement byte is consumed here.
    pub(crate) fn operand<B: Bus + ?Sized>(&mut self, field: u8, bus: &mut B) -> Operand {
        match (field & 0x07, self.index_mode) {
            (6, IndexMode::HL) => Operand::Memory {
                addr: self.regs.pair_value(Pair::HL),
                indexed: false,
            },
            (6, _) => {
                let displacement = ByteCell::new(self.fetch8(bus));
                let addr = self
                    .index_value()
                    .wrapping_add_signed(displacement.signed() as i16);
                Operand::Memory { addr, indexed: true }
            }
            (4, IndexMode::IX | IndexMode::IY) => Operand::IndexHigh,
            (5, IndexMode::IX | IndexMode::IY) => Operand::IndexLow,
            (field, _) => Operand::Reg(Self::register(field)),
        }
    }

    /// Register named by a field that is known not to be 6.
    pub(crate) fn register(field: u8) -> Reg8 {
        Reg8::from_field(field).unwrap_or(Reg8::A)
    }

    /// The storage behind an operand.
    pub(crate) fn cell<'a, B: Bus + ?Sized>(
        &'a mut self,
        bus: &'a mut B,
        operand: Operand,
    ) -> &'a mut ByteCell {
        match operand {
            Operand::Reg(reg) => self.regs.cell_mut(reg),
            Operand::IndexHigh => self.index_word_mut().high_mut(),
            Operand::IndexLow => self.index_word_mut().low_mut(),
            Operand::Memory { addr, .. } => bus.memory().read8(addr),
        }
    }

    fn index_word_mut(&mut self) -> &mut crate::core::cell::WordCell {
        match self.index_mode {
            IndexMode::IY => &mut self.regs.iy,
            _ => &mut self.regs.ix,
        }
    }

    pub(crate) fn read_operand<B: Bus + ?Sized>(&mut self, bus: &mut B, operand: Operand) -> u8 {
        self.cell(bus, operand).value()
    }

    pub(crate) fn write_operand<B: Bus + ?Sized>(&mut self, bus: &mut B, operand: Operand, value: u8) {
        self.cell(bus, operand).set(value);
    }

    /// Condition field `cc`: NZ, Z, NC, C, PO, PE, P, M.
    pub(crate) fn eval_condition(&self, cc: u8) -> bool {
        match cc & 0x07 {
            0 => !self.regs.flag(Flag::Z),
            1 => self.regs.flag(Flag::Z),
            2 => !self.regs.flag(Flag::C),
            3 => self.regs.flag(Flag::C),
            4 => !self.regs.flag(Flag::PV),
            5 => self.regs.flag(Flag::PV),
            6 => !self.regs.flag(Flag::S),
            _ => self.regs.flag(Flag::S),
        }
    }

    // --- Dispatch ---

    /// Decode one unprefixed (or DD/FD-modified) opcode.
    pub(crate) fn dispatch<B: Bus + ?Sized>(&mut self, opcode: u8, bus: &mut B) -> Result<u32, DecodeFault> {
        let t = match opcode {
            0x00 => 4, // NOP
            0x76 => self.op_halt(),

            // 8-bit loads
            0x40..=0x7F => self.op_ld_r_r(opcode, bus),
            op if (op & 0xC7) == 0x06 => self.op_ld_r_n(op, bus),
            0x02 | 0x12 => self.op_ld_indirect_a(opcode, bus),
            0x0A | 0x1A => self.op_ld_a_indirect(opcode, bus),
            0x32 => self.op_ld_nn_a(bus),
            0x3A => self.op_ld_a_nn(bus),

            // 16-bit loads
            op if (op & 0xCF) == 0x01 => self.op_ld_rp_nn(op, bus),
            0x22 => self.op_ld_nn_hl(bus),
            0x2A => self.op_ld_hl_nn(bus),
            0xF9 => self.op_ld_sp_hl(),

            // Exchanges
            0x08 => self.op_ex_af(),
            0xD9 => self.op_exx(),
            0xEB => self.op_ex_de_hl(),
            0xE3 => self.op_ex_sp_hl(bus),

            // Stack
            op if (op & 0xCF) == 0xC5 => self.op_push(op, bus),
            op if (op & 0xCF) == 0xC1 => self.op_pop(op, bus),

            // 8-bit arithmetic and logic
            0x80..=0xBF => self.op_alu_r(opcode, bus),
            op if (op & 0xC7) == 0xC6 => self.op_alu_n(op, bus),
            op if (op & 0xC7) == 0x04 => self.op_inc_r(op, bus),
            op if (op & 0xC7) == 0x05 => self.op_dec_r(op, bus),
            0x27 => self.op_daa(),
            0x2F => self.op_cpl(),
            0x37 => self.op_scf(),
            0x3F => self.op_ccf(),

            // 16-bit arithmetic
            op if (op & 0xCF) == 0x09 => self.op_add_hl_rp(op),
            op if (op & 0xC7) == 0x03 => self.op_inc_dec_rp(op),

            // Accumulator rotates
            0x07 | 0x0F | 0x17 | 0x1F => self.op_rotate_a(opcode),

            // Jumps, calls, returns
            0xC3 => self.op_jp(bus),
            op if (op & 0xC7) == 0xC2 => self.op_jp_cc(op, bus),
            0x18 => self.op_jr(bus),
            0x20 | 0x28 | 0x30 | 0x38 => self.op_jr_cc(opcode, bus),
            0x10 => self.op_djnz(bus),
            0xE9 => self.op_jp_hl(),
            0xCD => self.op_call(bus),
            op if (op & 0xC7) == 0xC4 => self.op_call_cc(op, bus),
            0xC9 => self.op_ret(bus),
            op if (op & 0xC7) == 0xC0 => self.op_ret_cc(op, bus),
            op if (op & 0xC7) == 0xC7 => self.op_rst(op, bus),

            // I/O
            0xD3 => self.op_out_n_a(bus),
            0xDB => self.op_in_a_n(bus),

            // Interrupt enable
            0xF3 => self.op_di(),
            0xFB => self.op_ei(),

            // Prefixes
            0xCB => self.execute_cb(bus),
            0xED => return self.execute_ed(bus),
            0xDD => return self.execute_indexed(IndexMode::IX, bus),
            0xFD => return self.execute_indexed(IndexMode::IY, bus),

            _ => unreachable!("opcode {opcode:02X} is decoded above"),
        };
        Ok(t)
    }

    /// HALT: 4T: stop fetching until an interrupt arrives.
    fn op_halt(&mut self) -> u32 {
        trace!(pc = self.regs.pc().wrapping_sub(1), "halted");
        self.halted = true;
        4
    }

    /// DI: 4T
    fn op_di(&mut self) -> u32 {
        self.iff1 = false;
        self.iff2 = false;
        4
    }

    /// EI: 4T: interrupts are accepted only after the next instruction.
    fn op_ei(&mut self) -> u32 {
        self.iff1 = true;
        self.iff2 = true;
        self.ei_delay = true;
        4
    }
}

impl Cpu for Z80 {
    fn reset(&mut self) {
        self.regs = Registers::new();
        self.iff1 = false;
        self.iff2 = false;
        self.im = 0;
        self.halted = false;
        self.ei_delay = false;
        self.index_mode = IndexMode::HL;
        self.lines.clear();
    }

    fn signal_interrupt(&mut self, int: InterruptRequest) {
        match int {
            InterruptRequest::Nmi => self.request_nmi(),
            InterruptRequest::Int { data_bus } => self.request_interrupt(data_bus),
        }
    }

    fn is_sleeping(&self) -> bool {
        self.halted
    }
}

impl CpuStateTrait for Z80 {
    type Snapshot = Z80State;

    fn snapshot(&self) -> Z80State {
        let regs = &self.regs;
        Z80State {
            a: regs.get(Reg8::A),
            f: regs.get(Reg8::F),
            b: regs.get(Reg8::B),
            c: regs.get(Reg8::C),
            d: regs.get(Reg8::D),
            e: regs.get(Reg8::E),
            h: regs.get(Reg8::H),
            l: regs.get(Reg8::L),
            a_prime: regs.shadow(Reg8::A),
            f_prime: regs.shadow(Reg8::F),
            b_prime: regs.shadow(Reg8::B),
            c_prime: regs.shadow(Reg8::C),
            d_prime: regs.shadow(Reg8::D),
            e_prime: regs.shadow(Reg8::E),
            h_prime: regs.shadow(Reg8::H),
            l_prime: regs.shadow(Reg8::L),
            ix: regs.ix.value(),
            iy: regs.iy.value(),
            sp: regs.sp(),
            pc: regs.pc(),
            i: regs.i.value(),
            r: regs.r.value(),
            iff1: self.iff1,
            iff2: self.iff2,
            im: self.im,
            halted: self.halted,
        }
    }
}

/// One-line register dump for trace logs.
impl fmt::Display for Z80 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let regs = &self.regs;
        let flags = regs.get(Reg8::F);
        let flag_str: String = "SZ5H3PNC"
            .chars()
            .enumerate()
            .map(|(i, c)| if flags & (0x80 >> i) != 0 { c } else { '.' })
            .collect();
        write!(
            f,
            "PC={:04X} SP={:04X} AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} \
             AF'={:04X} BC'={:04X} DE'={:04X} HL'={:04X} I={:02X} R={:02X} IM{} IFF1={} [{}]{}",
            regs.pc(),
            regs.sp(),
            regs.pair_value(Pair::AF),
            regs.pair_value(Pair::BC),
            regs.pair_value(Pair::DE),
            regs.pair_value(Pair::HL),
            regs.ix.value(),
            regs.iy.value(),
            regs.shadow_pair_value(Pair::AF),
            regs.shadow_pair_value(Pair::BC),
            regs.shadow_pair_value(Pair::DE),
            regs.shadow_pair_value(Pair::HL),
            regs.i.value(),
            regs.r.value(),
            self.im,
            self.iff1 as u8,
            flag_str,
            if self.halted { " HALT" } else { "" },
        )
    }
}
