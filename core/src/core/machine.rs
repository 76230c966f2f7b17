use std::sync::Arc;

use crate::core::bus::InterruptLines;
use crate::cpu::state::Z80State;
use crate::cpu::z80::DecodeFault;

/// Describes a single input button that a machine accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputButton {
    /// Machine-defined button identifier, passed to `set_input()`.
    pub id: u8,
    /// Human-readable name for display/configuration (e.g., "Q", "Enter").
    pub name: &'static str,
}

/// Machine-agnostic interface for emulated systems.
///
/// Each machine implements this trait so the frontend can drive it without
/// knowing about its ports, keyboard matrix or video memory layout.
pub trait Machine {
    /// Native display resolution as (width, height) in pixels.
    fn display_size(&self) -> (u32, u32);

    /// T-states in one video frame.
    fn frame_t_states(&self) -> u32;

    /// Execute one instruction (or one interrupt acknowledge / halted tick)
    /// and return the T-states it took.
    fn step(&mut self) -> Result<u32, DecodeFault>;

    /// Run one frame of emulation (advance the clock by one frame's worth of T-states).
    fn run_frame(&mut self) -> Result<(), DecodeFault>;

    /// Render the current video state into an RGB24 pixel buffer.
    ///
    /// The buffer must be at least `width * height * 3` bytes (from `display_size()`).
    /// Pixels are stored left-to-right, top-to-bottom, 3 bytes per pixel (R, G, B).
    fn render_frame(&self, buffer: &mut [u8]);

    /// Handle an input event. `button` is a machine-defined ID from `input_map()`.
    /// `pressed` is true for key-down, false for key-up.
    fn set_input(&mut self, button: u8, pressed: bool);

    /// Get the list of input buttons this machine accepts.
    fn input_map(&self) -> &[InputButton];

    /// Interrupt request lines, for timers running outside the emulation loop.
    fn interrupt_lines(&self) -> Arc<InterruptLines>;

    /// Snapshot of the CPU registers for tracing and debugging.
    fn cpu_state(&self) -> Z80State;

    /// Raw access to the address space, for dumps and debuggers.
    fn peek(&self, addr: u16) -> u8;

    /// Reset the CPU and peripherals to their power-on state. Machines with
    /// a ROM also clear RAM; a RAM-only machine keeps its loaded program.
    fn reset(&mut self);
}
