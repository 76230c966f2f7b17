use tracing::trace;

use crate::core::Bus;
use crate::core::cell::ByteCell;
use crate::cpu::z80::{DecodeFault, IndexMode, Operand, Reg8, Z80};

impl Z80 {
    /// DD / FD prefix: 4T on top of the prefixed instruction.
    ///
    /// HL becomes IX/IY, `(HL)` becomes `(IX+d)`/`(IY+d)`, and H/L become
    /// the index halves where no `(HL)` operand is involved. Opcodes that
    /// do not touch HL run as if unprefixed. A prefix followed by another
    /// prefix is dropped.
    pub(crate) fn execute_indexed<B: Bus + ?Sized>(
        &mut self,
        mode: IndexMode,
        bus: &mut B,
    ) -> Result<u32, DecodeFault> {
        let opcode = self.fetch_opcode(bus);
        match opcode {
            0xDD | 0xFD | 0xED => {
                trace!(opcode, "index prefix dropped");
                self.index_mode = IndexMode::HL;
                Ok(4 + self.dispatch(opcode, bus)?)
            }
            0xCB => {
                self.index_mode = mode;
                let t = self.execute_indexed_cb(bus);
                self.index_mode = IndexMode::HL;
                Ok(4 + t)
            }
            _ => {
                self.index_mode = mode;
                let t = self.dispatch(opcode, bus);
                self.index_mode = IndexMode::HL;
                Ok(4 + t?)
            }
        }
    }

    /// DD CB d op / FD CB d op: BIT 16T, others 19T (plus the prefix).
    ///
    /// Neither d nor op is an M1 fetch, so R is not bumped for them.
    /// Rotates, shifts, RES and SET also copy the result into the register
    /// named by the low three bits unless that field is 6.
    fn execute_indexed_cb<B: Bus + ?Sized>(&mut self, bus: &mut B) -> u32 {
        let displacement = ByteCell::new(self.fetch8(bus));
        let opcode = self.fetch8(bus);
        let addr = self
            .index_value()
            .wrapping_add_signed(displacement.signed() as i16);
        let operand = Operand::Memory { addr, indexed: true };

        let result = self.perform_cb_op(opcode, operand, bus);
        if opcode >> 6 == 1 {
            return 16;
        }
        if let Some(reg) = Reg8::from_field(opcode) {
            self.regs.set(reg, result);
        }
        19
    }
}
