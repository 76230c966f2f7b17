//! 64 KiB address space of [`ByteCell`]s.

use std::fmt;
use std::io;
use std::ops::{Bound, Range, RangeBounds};
use std::path::Path;

use crate::core::cell::{ByteCell, WordCell, pair_mut};

/// Size of the Z80 address space.
pub const MEMORY_SIZE: usize = 0x1_0000;

#[derive(Debug)]
pub enum MemoryError {
    /// Image does not fit between the load address and the end of memory.
    CapacityExceeded { len: usize, capacity: usize },
    /// ROM file could not be read.
    Io(io::Error),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { len, capacity } => {
                write!(f, "image of {len} bytes exceeds memory capacity of {capacity} bytes")
            }
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for MemoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MemoryError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Flat memory. Cells below `read_only` behave as ROM: references handed
/// out for them point at scratch copies, so writes are discarded.
pub struct Memory {
    cells: Box<[ByteCell]>,
    read_only: usize,
    scratch: [ByteCell; 2],
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            cells: vec![ByteCell::default(); MEMORY_SIZE].into_boxed_slice(),
            read_only: 0,
            scratch: [ByteCell::default(); 2],
        }
    }

    /// Copy `data` into memory starting at address 0.
    pub fn load(&mut self, data: &[u8]) -> Result<(), MemoryError> {
        self.load_at(0, data)
    }

    /// Copy `data` into memory starting at `addr`. Bypasses write protection.
    pub fn load_at(&mut self, addr: u16, data: &[u8]) -> Result<(), MemoryError> {
        let start = addr as usize;
        let capacity = MEMORY_SIZE - start;
        if data.len() > capacity {
            return Err(MemoryError::CapacityExceeded {
                len: data.len(),
                capacity,
            });
        }
        for (cell, &byte) in self.cells[start..start + data.len()].iter_mut().zip(data) {
            *cell = ByteCell::new(byte);
        }
        Ok(())
    }

    /// Read a flat binary file and load it at address 0.
    pub fn load_rom(&mut self, path: &Path) -> Result<usize, MemoryError> {
        let data = std::fs::read(path)?;
        self.load(&data)?;
        Ok(data.len())
    }

    /// Treat `0..len` as ROM from now on.
    pub fn set_read_only(&mut self, len: usize) {
        self.read_only = len.min(MEMORY_SIZE);
    }

    pub fn read_only(&self) -> usize {
        self.read_only
    }

    /// The cell at `addr`, mutable in place.
    pub fn read8(&mut self, addr: u16) -> &mut ByteCell {
        let index = addr as usize;
        if index < self.read_only {
            self.scratch[0] = self.cells[index];
            &mut self.scratch[0]
        } else {
            &mut self.cells[index]
        }
    }

    /// The cell at `base + displacement` (signed, wrapping).
    pub fn read8_indexed(&mut self, base: u16, displacement: &ByteCell) -> &mut ByteCell {
        self.read8(base.wrapping_add_signed(displacement.signed() as i16))
    }

    /// Little-endian word view over `addr` and `addr + 1`; address 0xFFFF
    /// pairs with address 0 as its high byte.
    pub fn read16(&mut self, addr: u16) -> WordCell<&mut ByteCell> {
        let low = addr as usize;
        let high = addr.wrapping_add(1) as usize;
        let read_only = self.read_only;
        let [scratch_low, scratch_high] = &mut self.scratch;

        match (low < read_only, high < read_only) {
            (false, false) => {
                let (low_cell, high_cell) = pair_mut(&mut self.cells, low, high);
                WordCell::pair(high_cell, low_cell)
            }
            (true, false) => {
                *scratch_low = self.cells[low];
                WordCell::pair(&mut self.cells[high], scratch_low)
            }
            (false, true) => {
                *scratch_high = self.cells[high];
                WordCell::pair(scratch_high, &mut self.cells[low])
            }
            (true, true) => {
                *scratch_low = self.cells[low];
                *scratch_high = self.cells[high];
                WordCell::pair(scratch_high, scratch_low)
            }
        }
    }

    #[inline]
    pub fn peek(&self, addr: u16) -> u8 {
        self.cells[addr as usize].value()
    }

    pub fn peek16(&self, addr: u16) -> u16 {
        u16::from_le_bytes([self.peek(addr), self.peek(addr.wrapping_add(1))])
    }

    /// Store a byte, honouring write protection.
    pub fn poke(&mut self, addr: u16, value: u8) {
        self.read8(addr).set(value);
    }

    /// Byte values in `range`, for peripherals that scan a memory window.
    /// Inclusive ranges reach 0xFFFF.
    pub fn window(&self, range: impl RangeBounds<u16>) -> impl Iterator<Item = u8> + '_ {
        self.cells[span(range)].iter().map(ByteCell::value)
    }

    /// Set every byte in `range` to `value`. Like `load`, this ignores
    /// write protection.
    pub fn fill(&mut self, range: impl RangeBounds<u16>, value: u8) {
        for cell in &mut self.cells[span(range)] {
            cell.set(value);
        }
    }
}

fn span(range: impl RangeBounds<u16>) -> Range<usize> {
    let start = match range.start_bound() {
        Bound::Included(&n) => n as usize,
        Bound::Excluded(&n) => n as usize + 1,
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&n) => n as usize + 1,
        Bound::Excluded(&n) => n as usize,
        Bound::Unbounded => MEMORY_SIZE,
    };
    start..end.max(start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_places_bytes_from_zero() {
        let mut memory = Memory::new();
        memory.load(&[0x01, 0x0A, 0x02]).unwrap();
        assert_eq!(memory.peek(0), 0x01);
        assert_eq!(memory.peek(2), 0x02);
        assert_eq!(memory.peek(3), 0x00);
    }

    #[test]
    fn load_rejects_oversized_image() {
        let mut memory = Memory::new();
        let image = vec![0; MEMORY_SIZE + 1];
        match memory.load(&image) {
            Err(MemoryError::CapacityExceeded { len, capacity }) => {
                assert_eq!(len, MEMORY_SIZE + 1);
                assert_eq!(capacity, MEMORY_SIZE);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
        assert!(memory.load_at(0xFFFF, &[1, 2]).is_err());
        assert!(memory.load_at(0xFFFF, &[1]).is_ok());
    }

    #[test]
    fn full_image_fits() {
        let mut memory = Memory::new();
        assert!(memory.load(&vec![0xAA; MEMORY_SIZE]).is_ok());
        assert_eq!(memory.peek(0xFFFF), 0xAA);
    }

    #[test]
    fn load_rom_reports_missing_file() {
        let mut memory = Memory::new();
        let result = memory.load_rom(Path::new("/nonexistent/zeta/test.rom"));
        assert!(matches!(result, Err(MemoryError::Io(_))));
    }

    #[test]
    fn read8_mutates_in_place() {
        let mut memory = Memory::new();
        memory.read8(0x4000).increase();
        memory.read8(0x4000).increase();
        assert_eq!(memory.peek(0x4000), 2);
    }

    #[test]
    fn indexed_read_wraps_both_ways() {
        let mut memory = Memory::new();
        memory.poke(0xFFFF, 0x11);
        memory.poke(0x0001, 0x22);
        assert_eq!(memory.read8_indexed(0x0001, &ByteCell::new(0xFE)).value(), 0x11);
        assert_eq!(memory.read8_indexed(0xFFFF, &ByteCell::new(0x02)).value(), 0x22);
    }

    #[test]
    fn read16_is_little_endian_and_wraps() {
        let mut memory = Memory::new();
        memory.load_at(0x8000, &[0x34, 0x12]).unwrap();
        assert_eq!(memory.read16(0x8000).value(), 0x1234);

        memory.poke(0xFFFF, 0xCD);
        memory.poke(0x0000, 0xAB);
        assert_eq!(memory.read16(0xFFFF).value(), 0xABCD);

        memory.read16(0xFFFF).set(0x5678);
        assert_eq!(memory.peek(0xFFFF), 0x78);
        assert_eq!(memory.peek(0x0000), 0x56);
    }

    #[test]
    fn read_only_region_discards_writes() {
        let mut memory = Memory::new();
        memory.load(&[0xF3; 0x4000]).unwrap();
        memory.set_read_only(0x4000);

        memory.read8(0x0000).set(0x00);
        assert_eq!(memory.peek(0x0000), 0xF3);

        memory.read16(0x3FFF).set(0x1234);
        assert_eq!(memory.peek(0x3FFF), 0xF3);
        assert_eq!(memory.peek(0x4000), 0x12);
    }

    #[test]
    fn window_reaches_top_of_memory() {
        let mut memory = Memory::new();
        memory.poke(0xFFFE, 0x12);
        memory.poke(0xFFFF, 0x34);
        assert_eq!(memory.window(0xFFFE..=0xFFFF).collect::<Vec<_>>(), vec![0x12, 0x34]);
        assert_eq!(memory.window(0xFFFE..).count(), 2);
        assert_eq!(memory.window(..).count(), MEMORY_SIZE);
        assert_eq!(memory.window(0x10..0x10).count(), 0);
    }

    #[test]
    fn fill_covers_range_only() {
        let mut memory = Memory::new();
        memory.fill(0x4000.., 0xAA);
        assert_eq!(memory.peek(0x3FFF), 0x00);
        assert_eq!(memory.peek(0x4000), 0xAA);
        assert_eq!(memory.peek(0xFFFF), 0xAA);
    }
}
