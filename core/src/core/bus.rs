use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::core::memory::Memory;

/// Value read from an I/O port nothing drives.
pub const FLOATING_BUS: u8 = 0xFF;

/// What the CPU sees of the machine around it: the address space plus the
/// separate Z80 I/O port space.
pub trait Bus {
    fn memory(&mut self) -> &mut Memory;

    /// Read from I/O port address space. Unmapped ports float high.
    fn io_read(&mut self, _port: u16) -> u8 {
        FLOATING_BUS
    }

    /// Write to I/O port address space. Unmapped ports ignore writes.
    fn io_write(&mut self, _port: u16, _data: u8) {}

    /// RETI was executed; daisy-chained peripherals may release their request.
    fn interrupt_serviced(&mut self) {}
}

impl Bus for Memory {
    fn memory(&mut self) -> &mut Memory {
        self
    }
}

/// Interrupt request lines, shared between the run loop and whatever
/// raises requests (a frame timer thread, a peripheral).
///
/// Requests are only sampled at instruction boundaries.
#[derive(Debug)]
pub struct InterruptLines {
    nmi: AtomicBool,
    int: AtomicBool,
    data_bus: AtomicU8,
}

impl Default for InterruptLines {
    fn default() -> Self {
        Self {
            nmi: AtomicBool::new(false),
            int: AtomicBool::new(false),
            data_bus: AtomicU8::new(FLOATING_BUS),
        }
    }
}

impl InterruptLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a non-maskable request (edge triggered, consumed on acceptance).
    pub fn request_nmi(&self) {
        self.nmi.store(true, Ordering::Release);
    }

    /// Assert INT. It stays asserted until accepted or withdrawn.
    pub fn request_int(&self) {
        self.int.store(true, Ordering::Release);
    }

    /// Assert INT with `data` placed on the data bus for mode 0/2 acknowledge.
    pub fn request_int_with(&self, data: u8) {
        self.data_bus.store(data, Ordering::Release);
        self.request_int();
    }

    pub fn withdraw_int(&self) {
        self.int.store(false, Ordering::Release);
    }

    pub fn set_data_bus(&self, data: u8) {
        self.data_bus.store(data, Ordering::Release);
    }

    pub fn data_bus(&self) -> u8 {
        self.data_bus.load(Ordering::Acquire)
    }

    pub fn nmi_pending(&self) -> bool {
        self.nmi.load(Ordering::Acquire)
    }

    pub fn int_pending(&self) -> bool {
        self.int.load(Ordering::Acquire)
    }

    pub(crate) fn take_nmi(&self) -> bool {
        self.nmi.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn acknowledge_int(&self) {
        self.int.store(false, Ordering::Release);
    }

    pub fn clear(&self) {
        self.nmi.store(false, Ordering::Release);
        self.int.store(false, Ordering::Release);
        self.data_bus.store(FLOATING_BUS, Ordering::Release);
    }
}
