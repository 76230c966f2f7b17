//! ZX Spectrum keyboard matrix.
//!
//! Forty keys wired as eight half-rows of five. A port read selects
//! half-rows with the zero bits of the port's high byte and returns the
//! AND of the selected rows: bit n is 0 while key n of any selected row is
//! held (active low). Bits 5-7 are not driven by the matrix.
//!
//! | Addr bit | Row | Keys (bit 0-4)                |
//! |----------|-----|-------------------------------|
//! | A8       | 0   | Caps Shift, Z, X, C, V        |
//! | A9       | 1   | A, S, D, F, G                 |
//! | A10      | 2   | Q, W, E, R, T                 |
//! | A11      | 3   | 1, 2, 3, 4, 5                 |
//! | A12      | 4   | 0, 9, 8, 7, 6                 |
//! | A13      | 5   | P, O, I, U, Y                 |
//! | A14      | 6   | Enter, L, K, J, H             |
//! | A15      | 7   | Space, Symbol Shift, M, N, B  |

use std::fmt;
use std::str::FromStr;

/// Nothing pressed in a half-row.
pub const ROW_IDLE: u8 = 0x1F;

#[rustfmt::skip]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    CapsShift, Z, X, C, V,
    A, S, D, F, G,
    Q, W, E, R, T,
    Num1, Num2, Num3, Num4, Num5,
    Num0, Num9, Num8, Num7, Num6,
    P, O, I, U, Y,
    Enter, L, K, J, H,
    Space, SymbolShift, M, N, B,
}

impl Key {
    /// Every key in matrix order: five per half-row.
    #[rustfmt::skip]
    pub const ALL: [Key; 40] = [
        Key::CapsShift, Key::Z, Key::X, Key::C, Key::V,
        Key::A, Key::S, Key::D, Key::F, Key::G,
        Key::Q, Key::W, Key::E, Key::R, Key::T,
        Key::Num1, Key::Num2, Key::Num3, Key::Num4, Key::Num5,
        Key::Num0, Key::Num9, Key::Num8, Key::Num7, Key::Num6,
        Key::P, Key::O, Key::I, Key::U, Key::Y,
        Key::Enter, Key::L, Key::K, Key::J, Key::H,
        Key::Space, Key::SymbolShift, Key::M, Key::N, Key::B,
    ];

    #[rustfmt::skip]
    const NAMES: [&'static str; 40] = [
        "CapsShift", "Z", "X", "C", "V",
        "A", "S", "D", "F", "G",
        "Q", "W", "E", "R", "T",
        "1", "2", "3", "4", "5",
        "0", "9", "8", "7", "6",
        "P", "O", "I", "U", "Y",
        "Enter", "L", "K", "J", "H",
        "Space", "SymShift", "M", "N", "B",
    ];

    /// Position in the matrix as (half-row, bit).
    pub const fn position(self) -> (usize, u8) {
        let index = self as usize;
        (index / 5, (index % 5) as u8)
    }

    pub const fn name(self) -> &'static str {
        Self::NAMES[self as usize]
    }
}

/// Key name that maps to nothing on the matrix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key: {:?}", self.0)
    }
}

impl std::error::Error for UnknownKey {}

impl FromStr for Key {
    type Err = UnknownKey;

    /// Single characters name themselves; the modifiers and the two wide
    /// keys accept a few spellings, case insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let key = match lower.as_str() {
            "enter" | "return" => Key::Enter,
            "space" | " " => Key::Space,
            "shift" | "caps" | "capsshift" | "caps_shift" => Key::CapsShift,
            "sym" | "symbol" | "symshift" | "symbol_shift" => Key::SymbolShift,
            _ => {
                let upper = lower.to_ascii_uppercase();
                let found = Self::NAMES.iter().position(|&name| name == upper);
                match found {
                    Some(index) if upper.len() == 1 => Self::ALL[index],
                    _ => return Err(UnknownKey(s.to_string())),
                }
            }
        };
        Ok(key)
    }
}

/// Current state of the forty switches.
#[derive(Clone, Debug)]
pub struct Keyboard {
    rows: [u8; 8],
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    pub fn new() -> Self {
        Self {
            rows: [ROW_IDLE; 8],
        }
    }

    pub fn set(&mut self, key: Key, pressed: bool) {
        let (row, bit) = key.position();
        if pressed {
            self.rows[row] &= !(1 << bit);
        } else {
            self.rows[row] |= 1 << bit;
        }
    }

    pub fn press(&mut self, key: Key) {
        self.set(key, true);
    }

    pub fn release(&mut self, key: Key) {
        self.set(key, false);
    }

    pub fn release_all(&mut self) {
        self.rows = [ROW_IDLE; 8];
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        let (row, bit) = key.position();
        self.rows[row] & (1 << bit) == 0
    }

    /// Input-layer entry point: `released == false` means the key went down.
    pub fn key_press(&mut self, name: &str, released: bool) -> Result<Key, UnknownKey> {
        let key: Key = name.parse()?;
        self.set(key, !released);
        Ok(key)
    }

    /// Matrix value for a read of `port` (bits 0-4, active low).
    pub fn read8(&self, port: u16) -> u8 {
        let select = (port >> 8) as u8;
        self.rows
            .iter()
            .enumerate()
            .filter(|&(row, _)| select & (1 << row) == 0)
            .fold(ROW_IDLE, |acc, (_, &bits)| acc & bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p_shows_in_its_half_row() {
        let mut keyboard = Keyboard::new();
        keyboard.key_press("p", false).unwrap();
        assert_eq!(keyboard.read8(0xDFFE), 0x1E);
        assert_eq!(keyboard.read8(0xDEFE), 0x1E);
        assert_eq!(keyboard.read8(0xFEFE), ROW_IDLE);

        keyboard.key_press("p", true).unwrap();
        assert_eq!(keyboard.read8(0xDFFE), ROW_IDLE);
        assert_eq!(keyboard.read8(0xDEFE), ROW_IDLE);
    }

    #[test]
    fn scanning_all_rows_combines_keys() {
        let mut keyboard = Keyboard::new();
        keyboard.press(Key::CapsShift);
        keyboard.press(Key::B);
        assert_eq!(keyboard.read8(0xFEFE), 0x1E);
        assert_eq!(keyboard.read8(0x7FFE), 0x0F);
        assert_eq!(keyboard.read8(0x00FE), 0x0E);
    }

    #[test]
    fn key_names_parse() {
        assert_eq!("a".parse::<Key>(), Ok(Key::A));
        assert_eq!("7".parse::<Key>(), Ok(Key::Num7));
        assert_eq!("Enter".parse::<Key>(), Ok(Key::Enter));
        assert_eq!("SPACE".parse::<Key>(), Ok(Key::Space));
        assert_eq!("sym".parse::<Key>(), Ok(Key::SymbolShift));
        assert!("f1".parse::<Key>().is_err());
        assert!("enterx".parse::<Key>().is_err());
    }

    #[test]
    fn positions_follow_matrix_order() {
        assert_eq!(Key::CapsShift.position(), (0, 0));
        assert_eq!(Key::Num6.position(), (4, 4));
        assert_eq!(Key::Enter.position(), (6, 0));
        assert_eq!(Key::B.position(), (7, 4));
    }

    #[test]
    fn unknown_key_leaves_matrix_alone() {
        let mut keyboard = Keyboard::new();
        assert!(keyboard.key_press("F13", false).is_err());
        assert_eq!(keyboard.read8(0x00FE), ROW_IDLE);
    }
}
