pub mod keyboard;
pub mod ula;

pub use keyboard::{Key, Keyboard, UnknownKey};
pub use ula::{Attribute, FlashCounter};
