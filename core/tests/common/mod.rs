use std::collections::{HashMap, VecDeque};

use zeta_core::core::{Bus, Memory};

/// Minimal bus for testing: flat 64KB read/write memory, scripted input
/// ports and a log of port writes.
pub struct TestBus {
    pub memory: Memory,
    /// Bytes returned by successive reads of a port; exhausted ports float.
    pub port_input: HashMap<u16, VecDeque<u8>>,
    pub port_writes: Vec<(u16, u8)>,
    pub port_reads: Vec<u16>,
    pub reti_count: u32,
}

#[allow(dead_code)]
impl TestBus {
    pub fn new() -> Self {
        Self {
            memory: Memory::new(),
            port_input: HashMap::new(),
            port_writes: Vec::new(),
            port_reads: Vec::new(),
            reti_count: 0,
        }
    }

    pub fn load(&mut self, addr: u16, data: &[u8]) {
        self.memory.load_at(addr, data).unwrap();
    }

    pub fn peek(&self, addr: u16) -> u8 {
        self.memory.peek(addr)
    }

    pub fn queue_input(&mut self, port: u16, data: &[u8]) {
        self.port_input.entry(port).or_default().extend(data);
    }
}

impl Bus for TestBus {
    fn memory(&mut self) -> &mut Memory {
        &mut self.memory
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.port_reads.push(port);
        self.port_input
            .get_mut(&port)
            .and_then(VecDeque::pop_front)
            .unwrap_or(0xFF)
    }

    fn io_write(&mut self, port: u16, data: u8) {
        self.port_writes.push((port, data));
    }

    fn interrupt_serviced(&mut self) {
        self.reti_count += 1;
    }
}
