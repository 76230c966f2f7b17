//! ZX Spectrum ULA screen layout and frame timing.
//!
//! The display file is a 256x192 one-bit bitmap at 0x4000 followed by a
//! 32x24 attribute map at 0x5800. Bitmap rows are interleaved: address
//! bits 8-10 carry the pixel row within a character cell, bits 5-7 the
//! character row within a third of the screen, bits 11-12 the third.
//!
//! Decoding reads memory without coordinating with the CPU; a frame that
//! races a screen update may tear, as it does on the real machine.

use crate::core::Memory;

pub const SCREEN_WIDTH: usize = 256;
pub const SCREEN_HEIGHT: usize = 192;

pub const BITMAP_START: u16 = 0x4000;
pub const ATTRIBUTE_START: u16 = 0x5800;
/// First byte past the attribute map.
pub const DISPLAY_FILE_END: u16 = 0x5B00;
/// Size of a `.scr` display file dump.
pub const DISPLAY_FILE_LEN: usize = (DISPLAY_FILE_END - BITMAP_START) as usize;

pub const T_STATES_PER_LINE: u32 = 224;
pub const LINES_PER_FRAME: u32 = 312;
pub const FRAME_T_STATES: u32 = T_STATES_PER_LINE * LINES_PER_FRAME;
/// How long the ULA holds INT low at the start of a frame.
pub const INT_LENGTH: u32 = 32;
/// Frames between flash phase changes.
pub const FLASH_FRAMES: u32 = 16;

/// RGB for palette indices 0-7 (normal) and 8-15 (bright).
pub const PALETTE: [[u8; 3]; 16] = [
    [0x00, 0x00, 0x00],
    [0x00, 0x00, 0xD7],
    [0xD7, 0x00, 0x00],
    [0xD7, 0x00, 0xD7],
    [0x00, 0xD7, 0x00],
    [0x00, 0xD7, 0xD7],
    [0xD7, 0xD7, 0x00],
    [0xD7, 0xD7, 0xD7],
    [0x00, 0x00, 0x00],
    [0x00, 0x00, 0xFF],
    [0xFF, 0x00, 0x00],
    [0xFF, 0x00, 0xFF],
    [0x00, 0xFF, 0x00],
    [0x00, 0xFF, 0xFF],
    [0xFF, 0xFF, 0x00],
    [0xFF, 0xFF, 0xFF],
];

/// Address of the bitmap byte holding pixels `column*8 .. column*8+8` of
/// pixel row `row`.
pub const fn bitmap_address(row: u8, column: u8) -> u16 {
    let y = row as u16;
    BITMAP_START | ((y & 0xC0) << 5) | ((y & 0x07) << 8) | ((y & 0x38) << 2) | (column as u16 & 0x1F)
}

/// Address of the attribute governing pixel row `row`, byte `column`.
pub const fn attribute_address(row: u8, column: u8) -> u16 {
    ATTRIBUTE_START + (row as u16 / 8) * 32 + (column as u16 & 0x1F)
}

/// A decoded attribute byte: FBPPPIII.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub ink: u8,
    pub paper: u8,
    pub bright: bool,
    pub flash: bool,
}

impl From<u8> for Attribute {
    fn from(byte: u8) -> Self {
        Self {
            ink: byte & 0x07,
            paper: (byte >> 3) & 0x07,
            bright: byte & 0x40 != 0,
            flash: byte & 0x80 != 0,
        }
    }
}

impl Attribute {
    /// Palette indices `(foreground, background)`; flashing cells swap
    /// ink and paper during the inverted phase.
    pub fn colours(self, flash_inverted: bool) -> (u8, u8) {
        let bright = if self.bright { 8 } else { 0 };
        let (ink, paper) = (self.ink + bright, self.paper + bright);
        if self.flash && flash_inverted {
            (paper, ink)
        } else {
            (ink, paper)
        }
    }

    pub fn pixel_colour(self, pixel_set: bool, flash_inverted: bool) -> u8 {
        let (ink, paper) = self.colours(flash_inverted);
        if pixel_set { ink } else { paper }
    }
}

/// Counts frames and reports the current flash phase.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlashCounter {
    frames: u32,
}

impl FlashCounter {
    pub fn tick(&mut self) {
        self.frames = (self.frames + 1) % (FLASH_FRAMES * 2);
    }

    pub fn inverted(&self) -> bool {
        self.frames >= FLASH_FRAMES
    }
}

/// Decode the whole display file into palette indices, one byte per pixel,
/// row-major. `out` must hold `SCREEN_WIDTH * SCREEN_HEIGHT` bytes.
pub fn decode_screen(memory: &Memory, flash_inverted: bool, out: &mut [u8]) {
    for (row, line) in out.chunks_exact_mut(SCREEN_WIDTH).take(SCREEN_HEIGHT).enumerate() {
        let row = row as u8;
        for (column, cell) in line.chunks_exact_mut(8).enumerate() {
            let column = column as u8;
            let bits = memory.peek(bitmap_address(row, column));
            let attribute = Attribute::from(memory.peek(attribute_address(row, column)));
            for (bit, pixel) in cell.iter_mut().enumerate() {
                *pixel = attribute.pixel_colour(bits & (0x80 >> bit) != 0, flash_inverted);
            }
        }
    }
}
