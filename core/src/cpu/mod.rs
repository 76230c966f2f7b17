/// Generic CPU interface
pub trait Cpu: CpuStateTrait {
    /// Return to the power-on register state
    fn reset(&mut self);

    /// Raise an interrupt request line (sampled at the next instruction boundary)
    fn signal_interrupt(&mut self, int: InterruptRequest);

    /// Query if CPU is halted internally (HALT instruction)
    fn is_sleeping(&self) -> bool;
}

/// Interrupt request kinds a CPU can be signalled with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptRequest {
    /// Non-maskable interrupt.
    Nmi,
    /// Maskable interrupt with the byte the device places on the data bus.
    Int { data_bus: u8 },
}

// Re-export state types
pub mod state;
pub use state::{CpuStateTrait, Z80State};

// Z80 CPU
pub mod z80;
pub use z80::Z80;
