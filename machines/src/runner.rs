//! Free-running execution in real time.
//!
//! The machine runs on the calling thread, paced to wall-clock time. A
//! timer thread raises INT at the frame rate through the machine's shared
//! interrupt lines, so requests arrive asynchronously and are sampled at
//! the next instruction boundary. One `AtomicBool` stops both.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};
use zeta_core::core::machine::Machine;

use crate::MachineError;
use crate::pacing::Pacer;

/// Data bus value during an acknowledge of the timer interrupt.
const TIMER_DATA_BUS: u8 = 0xFF;

/// Totals for one call to [`Runner::run`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub t_states: u64,
    pub instructions: u64,
    pub elapsed: Duration,
}

pub struct Runner {
    clock_hz: u32,
    frame_rate: u32,
    stop: Arc<AtomicBool>,
}

impl Runner {
    pub fn new(clock_hz: u32, frame_rate: u32) -> Self {
        Self {
            clock_hz,
            frame_rate: frame_rate.max(1),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the run when set, from any thread.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Run until `on_frame` breaks, the stop flag is raised, or the CPU
    /// faults. `on_frame` is called with the frame number after every
    /// frame's worth of T-states.
    pub fn run<M, F>(&self, machine: &mut M, mut on_frame: F) -> Result<RunStats, MachineError>
    where
        M: Machine + ?Sized,
        F: FnMut(&mut M, u64) -> ControlFlow<()>,
    {
        self.stop.store(false, Ordering::Release);
        let timer = self.spawn_timer(machine);

        let frame_t_states = machine.frame_t_states().max(1);
        let mut pacer = Pacer::new(self.clock_hz, self.frame_rate);
        let mut stats = RunStats::default();
        let mut frame_clock = 0u32;
        let started = Instant::now();

        let result = loop {
            if self.stop.load(Ordering::Acquire) {
                break Ok(());
            }
            let t = match machine.step() {
                Ok(t) => t,
                Err(fault) => break Err(MachineError::Decode(fault)),
            };
            stats.instructions += 1;
            stats.t_states += t as u64;
            pacer.add(t);
            frame_clock += t;
            if frame_clock >= frame_t_states {
                frame_clock -= frame_t_states;
                stats.frames += 1;
                if on_frame(machine, stats.frames).is_break() {
                    break Ok(());
                }
                pacer.pace();
            }
        };

        self.stop.store(true, Ordering::Release);
        if timer.join().is_err() {
            debug!("interrupt timer thread panicked");
        }
        stats.elapsed = started.elapsed();
        info!(
            frames = stats.frames,
            t_states = stats.t_states,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "run finished"
        );
        result.map(|()| stats)
    }

    fn spawn_timer<M: Machine + ?Sized>(&self, machine: &M) -> thread::JoinHandle<()> {
        let lines = machine.interrupt_lines();
        let stop = Arc::clone(&self.stop);
        let period = Duration::from_secs(1) / self.frame_rate;
        thread::spawn(move || {
            let mut next = Instant::now() + period;
            while !stop.load(Ordering::Acquire) {
                thread::sleep(next.saturating_duration_since(Instant::now()));
                next += period;
                lines.request_int_with(TIMER_DATA_BUS);
            }
        })
    }
}
