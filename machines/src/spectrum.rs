use std::sync::Arc;

use tracing::debug;
use zeta_core::core::machine::{InputButton, Machine};
use zeta_core::core::{Bus, FLOATING_BUS, InterruptLines, Memory};
use zeta_core::cpu::{Cpu, CpuStateTrait, Z80State};
use zeta_core::cpu::z80::{DecodeFault, Z80};
use zeta_core::device::keyboard::{Key, Keyboard, UnknownKey};
use zeta_core::device::ula::{self, FlashCounter};

use crate::registry::MachineEntry;
use crate::rom_loader::{RomImage, RomLoadError};

// ---------------------------------------------------------------------------
// Memory map and ports
// ---------------------------------------------------------------------------

/// The 16 KiB ROM at 0x0000-0x3FFF; everything above is RAM.
pub const ROM_SIZE: usize = 0x4000;

/// ROM file name looked up in ROM directories and archives.
pub const ROM_NAME: &str = "48.rom";

/// Bits 5-7 of a ULA port read are not driven by the keyboard and read high.
const ULA_READ_HIGH_BITS: u8 = 0xE0;

/// Data bus value during the interrupt acknowledge; nothing drives it.
const INT_DATA_BUS: u8 = 0xFF;

/// The ULA answers every even port.
const fn is_ula_port(port: u16) -> bool {
    port & 0x0001 == 0
}

// ---------------------------------------------------------------------------
// Input definitions
// ---------------------------------------------------------------------------

/// One button per matrix key; the button id is the key's matrix index.
static SPECTRUM_INPUT_MAP: [InputButton; 40] = {
    const NONE: InputButton = InputButton { id: 0, name: "" };
    let mut map = [NONE; 40];
    let mut i = 0;
    while i < 40 {
        map[i] = InputButton {
            id: i as u8,
            name: Key::ALL[i].name(),
        };
        i += 1;
    }
    map
};

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

/// Everything the CPU sees: memory with a write-protected ROM, the
/// keyboard matrix behind the ULA port, and the border latch.
pub struct SpectrumBus {
    pub memory: Memory,
    pub keyboard: Keyboard,
    border: u8,
}

impl SpectrumBus {
    fn new(rom: &[u8]) -> Result<Self, RomLoadError> {
        if rom.is_empty() {
            return Err(RomLoadError::Empty);
        }
        if rom.len() > ROM_SIZE {
            return Err(RomLoadError::TooLarge { size: rom.len() });
        }
        let mut memory = Memory::new();
        memory
            .load(rom)
            .map_err(|_| RomLoadError::TooLarge { size: rom.len() })?;
        memory.set_read_only(ROM_SIZE);
        Ok(Self {
            memory,
            keyboard: Keyboard::new(),
            border: 7,
        })
    }

    /// Border colour (palette index 0-7) last written to the ULA.
    pub fn border(&self) -> u8 {
        self.border
    }
}

impl Bus for SpectrumBus {
    fn memory(&mut self) -> &mut Memory {
        &mut self.memory
    }

    fn io_read(&mut self, port: u16) -> u8 {
        if is_ula_port(port) {
            ULA_READ_HIGH_BITS | self.keyboard.read8(port)
        } else {
            FLOATING_BUS
        }
    }

    fn io_write(&mut self, port: u16, data: u8) {
        // Bits 3 and 4 drive the MIC and speaker, which are not emulated.
        if is_ula_port(port) {
            self.border = data & 0x07;
        }
    }
}

// ---------------------------------------------------------------------------
// Spectrum48
// ---------------------------------------------------------------------------

/// Sinclair ZX Spectrum 48K: Z80 at 3.5 MHz, 16K ROM, 48K RAM, ULA
/// keyboard port and a 256x192 display file at 0x4000.
pub struct Spectrum48 {
    pub cpu: Z80,
    pub bus: SpectrumBus,
    flash: FlashCounter,
    /// T-states into the current frame.
    frame_clock: u32,
    frames: u64,
}

impl Spectrum48 {
    pub fn new(rom: &[u8]) -> Result<Self, RomLoadError> {
        Ok(Self {
            cpu: Z80::new(),
            bus: SpectrumBus::new(rom)?,
            flash: FlashCounter::default(),
            frame_clock: 0,
            frames: 0,
        })
    }

    pub fn from_image(image: &RomImage) -> Result<Self, RomLoadError> {
        Self::new(image.data())
    }

    /// Frames completed since power-on.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn border(&self) -> u8 {
        self.bus.border()
    }

    /// Press (`released == false`) or release a key by name.
    pub fn key_press(&mut self, name: &str, released: bool) -> Result<Key, UnknownKey> {
        self.bus.keyboard.key_press(name, released)
    }

    /// Current screen as palette indices, 256x192 row-major.
    pub fn screen_indices(&self) -> Vec<u8> {
        let mut indices = vec![0; ula::SCREEN_WIDTH * ula::SCREEN_HEIGHT];
        ula::decode_screen(&self.bus.memory, self.flash.inverted(), &mut indices);
        indices
    }

    /// The 6912-byte display file (bitmap then attributes), as saved in
    /// `.scr` files.
    pub fn display_file(&self) -> Vec<u8> {
        self.bus
            .memory
            .window(ula::BITMAP_START..ula::DISPLAY_FILE_END)
            .collect()
    }

    /// Advance the frame clock; the flash phase follows whole frames.
    fn account(&mut self, t_states: u32) {
        self.frame_clock += t_states;
        while self.frame_clock >= ula::FRAME_T_STATES {
            self.frame_clock -= ula::FRAME_T_STATES;
            self.frames += 1;
            self.flash.tick();
        }
    }
}

impl Machine for Spectrum48 {
    fn display_size(&self) -> (u32, u32) {
        (ula::SCREEN_WIDTH as u32, ula::SCREEN_HEIGHT as u32)
    }

    fn frame_t_states(&self) -> u32 {
        ula::FRAME_T_STATES
    }

    fn step(&mut self) -> Result<u32, DecodeFault> {
        let t = self.cpu.step(&mut self.bus)?;
        self.account(t);
        Ok(t)
    }

    /// One ULA frame: INT is held for the first 32 T-states, then the CPU
    /// runs until the frame clock wraps.
    fn run_frame(&mut self) -> Result<(), DecodeFault> {
        let lines = self.cpu.interrupt_lines();
        let frame = self.frames;
        let mut elapsed = 0;
        lines.request_int_with(INT_DATA_BUS);
        while self.frames == frame {
            elapsed += self.step()?;
            if elapsed >= ula::INT_LENGTH {
                lines.withdraw_int();
            }
        }
        debug!(frame = self.frames, pc = self.cpu.pc(), "frame complete");
        Ok(())
    }

    fn render_frame(&self, buffer: &mut [u8]) {
        for (pixel, &index) in buffer.chunks_exact_mut(3).zip(&self.screen_indices()) {
            pixel.copy_from_slice(&ula::PALETTE[index as usize]);
        }
    }

    fn set_input(&mut self, button: u8, pressed: bool) {
        if let Some(&key) = Key::ALL.get(button as usize) {
            self.bus.keyboard.set(key, pressed);
        }
    }

    fn input_map(&self) -> &[InputButton] {
        &SPECTRUM_INPUT_MAP
    }

    fn interrupt_lines(&self) -> Arc<InterruptLines> {
        self.cpu.interrupt_lines()
    }

    fn cpu_state(&self) -> Z80State {
        self.cpu.snapshot()
    }

    fn peek(&self, addr: u16) -> u8 {
        self.bus.memory.peek(addr)
    }

    /// Power-on state: RAM cleared, ROM kept.
    fn reset(&mut self) {
        self.cpu.reset();
        self.bus.memory.fill((ROM_SIZE as u16).., 0);
        self.bus.keyboard.release_all();
        self.bus.border = 7;
        self.flash = FlashCounter::default();
        self.frame_clock = 0;
        self.frames = 0;
    }
}

// ---------------------------------------------------------------------------
// Machine registry
// ---------------------------------------------------------------------------

fn create_machine(rom: Option<&RomImage>) -> Result<Box<dyn Machine>, RomLoadError> {
    let rom = rom.ok_or_else(|| RomLoadError::Missing(ROM_NAME.to_string()))?;
    Ok(Box::new(Spectrum48::from_image(rom)?))
}

inventory::submit! {
    MachineEntry::new("spectrum", "Sinclair ZX Spectrum 48K", Some(ROM_NAME), create_machine)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_map_follows_matrix_order() {
        assert_eq!(SPECTRUM_INPUT_MAP[0].name, "CapsShift");
        assert_eq!(SPECTRUM_INPUT_MAP[25].name, "P");
        assert_eq!(SPECTRUM_INPUT_MAP[39].id, 39);
        assert!(SPECTRUM_INPUT_MAP.iter().all(|b| !b.name.is_empty()));
    }

    #[test]
    fn odd_ports_float() {
        let mut bus = SpectrumBus::new(&[0x00]).unwrap();
        assert_eq!(bus.io_read(0x00FF), FLOATING_BUS);
        assert_eq!(bus.io_read(0xFEFE), 0xFF);
        bus.keyboard.press(Key::Z);
        assert_eq!(bus.io_read(0xFEFE), 0xFD);
    }

    #[test]
    fn rom_larger_than_sixteen_k_rejected() {
        let result = Spectrum48::new(&[0; ROM_SIZE + 1]);
        assert!(matches!(result, Err(RomLoadError::TooLarge { .. })));
    }
}
