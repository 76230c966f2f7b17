use std::fmt::Write as _;
use std::ops::ControlFlow;
use std::path::Path;

use tracing::{debug, info};
use zeta_core::core::machine::Machine;
use zeta_core::cpu::Z80State;
use zeta_machines::{MachineError, Runner};

use crate::input::{KeyMap, KeyScript};

/// Spectrum display file: bitmap then attributes.
const DISPLAY_FILE: std::ops::Range<u16> = 0x4000..0x5B00;

fn apply_keys(machine: &mut dyn Machine, keys: &KeyMap, script: &KeyScript, frame: u64) {
    for event in script.due(frame) {
        if let Some(button) = keys.get(&event.key) {
            debug!(frame, key = %event.key, pressed = event.pressed, "scripted key");
            machine.set_input(button, event.pressed);
        }
    }
}

/// Run `frames` frames as fast as the host allows.
pub fn run_frames(
    machine: &mut dyn Machine,
    frames: u64,
    script: &KeyScript,
) -> Result<(), MachineError> {
    let keys = KeyMap::new(machine.input_map());
    for frame in 0..frames {
        apply_keys(machine, &keys, script, frame);
        machine.run_frame()?;
    }
    info!(frames, pc = machine.cpu_state().pc, "run complete");
    Ok(())
}

/// Run in real time for `seconds`, with a timer thread raising INT.
pub fn run_realtime(
    machine: &mut dyn Machine,
    runner: &Runner,
    frame_rate: u32,
    seconds: f64,
    script: &KeyScript,
) -> Result<(), MachineError> {
    let keys = KeyMap::new(machine.input_map());
    let limit = (seconds * frame_rate as f64).round() as u64;
    apply_keys(machine, &keys, script, 0);
    let stats = runner.run(machine, |machine, frame| {
        if frame >= limit {
            return ControlFlow::Break(());
        }
        apply_keys(machine, &keys, script, frame);
        ControlFlow::Continue(())
    })?;
    info!(
        frames = stats.frames,
        instructions = stats.instructions,
        "real-time run complete"
    );
    Ok(())
}

/// Execute `count` instructions, printing the state after each.
pub fn step(machine: &mut dyn Machine, count: u64) -> Result<(), MachineError> {
    println!("{}", format_state(&machine.cpu_state(), 0));
    for _ in 0..count {
        let t_states = machine.step()?;
        println!("{}", format_state(&machine.cpu_state(), t_states));
    }
    Ok(())
}

/// One line per state: registers in hex, then interrupt state and the
/// T-states of the instruction just executed.
pub fn format_state(s: &Z80State, t_states: u32) -> String {
    let mut line = String::with_capacity(96);
    let _ = write!(
        line,
        "PC={:04X} AF={:04X} BC={:04X} DE={:04X} HL={:04X} IX={:04X} IY={:04X} SP={:04X} \
         I={:02X} R={:02X} IFF={}{} IM{} T={t_states}",
        s.pc,
        s.af(),
        s.bc(),
        s.de(),
        s.hl(),
        s.ix,
        s.iy,
        s.sp,
        s.i,
        s.r,
        s.iff1 as u8,
        s.iff2 as u8,
        s.im,
    );
    if s.halted {
        line.push_str(" HALT");
    }
    line
}

/// Write the 6912-byte display file, as used by `.scr` files.
pub fn dump_screen(machine: &dyn Machine, path: &Path) -> std::io::Result<()> {
    let data: Vec<u8> = DISPLAY_FILE.map(|addr| machine.peek(addr)).collect();
    std::fs::write(path, data)?;
    info!(path = %path.display(), "screen dumped");
    Ok(())
}
