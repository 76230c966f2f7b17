use std::sync::Arc;

use zeta_core::core::machine::{InputButton, Machine};
use zeta_core::core::{InterruptLines, Memory};
use zeta_core::cpu::z80::{DecodeFault, Z80};
use zeta_core::cpu::{Cpu, CpuStateTrait, Z80State};

use crate::registry::MachineEntry;
use crate::rom_loader::{RomImage, RomLoadError};

/// T-states per frame of the bare system, 20 ms at 3.5 MHz.
pub const PLAIN_FRAME_T_STATES: u32 = 70_000;

/// A Z80 with 64K of RAM and nothing else: every port floats, nothing is
/// displayed. Runs flat binaries loaded at address 0.
pub struct PlainZ80 {
    pub cpu: Z80,
    pub memory: Memory,
    frame_clock: u32,
    frames: u64,
}

impl Default for PlainZ80 {
    fn default() -> Self {
        Self::new()
    }
}

impl PlainZ80 {
    pub fn new() -> Self {
        Self {
            cpu: Z80::new(),
            memory: Memory::new(),
            frame_clock: 0,
            frames: 0,
        }
    }

    /// Frame boundaries crossed since reset.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// T-states into the current frame.
    pub fn frame_clock(&self) -> u32 {
        self.frame_clock
    }

    /// Build with `image` loaded at 0x0000. The whole space stays writable.
    pub fn with_image(image: &[u8]) -> Result<Self, RomLoadError> {
        let mut machine = Self::new();
        machine
            .memory
            .load(image)
            .map_err(|_| RomLoadError::TooLarge { size: image.len() })?;
        Ok(machine)
    }
}

impl Machine for PlainZ80 {
    fn display_size(&self) -> (u32, u32) {
        (0, 0)
    }

    fn frame_t_states(&self) -> u32 {
        PLAIN_FRAME_T_STATES
    }

    fn step(&mut self) -> Result<u32, DecodeFault> {
        let t = self.cpu.step(&mut self.memory)?;
        self.frame_clock += t;
        while self.frame_clock >= PLAIN_FRAME_T_STATES {
            self.frame_clock -= PLAIN_FRAME_T_STATES;
            self.frames += 1;
        }
        Ok(t)
    }

    /// Run until the next frame boundary.
    fn run_frame(&mut self) -> Result<(), DecodeFault> {
        let frame = self.frames;
        while self.frames == frame {
            self.step()?;
        }
        Ok(())
    }

    fn render_frame(&self, _buffer: &mut [u8]) {}

    fn set_input(&mut self, _button: u8, _pressed: bool) {}

    fn input_map(&self) -> &[InputButton] {
        &[]
    }

    fn interrupt_lines(&self) -> Arc<InterruptLines> {
        self.cpu.interrupt_lines()
    }

    fn cpu_state(&self) -> Z80State {
        self.cpu.snapshot()
    }

    fn peek(&self, addr: u16) -> u8 {
        self.memory.peek(addr)
    }

    fn reset(&mut self) {
        self.cpu.reset();
        self.frame_clock = 0;
        self.frames = 0;
    }
}

fn create_machine(image: Option<&RomImage>) -> Result<Box<dyn Machine>, RomLoadError> {
    let machine = match image {
        Some(image) => PlainZ80::with_image(image.data())?,
        None => PlainZ80::new(),
    };
    Ok(Box::new(machine))
}

inventory::submit! {
    MachineEntry::new("plain", "Z80 with 64K RAM and no peripherals", None, create_machine)
}
