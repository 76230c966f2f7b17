pub mod core;
pub mod cpu;
pub mod device;

pub mod prelude {
    pub use crate::core::machine::{InputButton, Machine};
    pub use crate::core::{Bus, ByteCell, InterruptLines, Memory, WordCell};
    pub use crate::cpu::{Cpu, CpuStateTrait, InterruptRequest, Z80, Z80State};
    pub use crate::cpu::z80::DecodeFault;
}
