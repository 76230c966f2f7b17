pub mod bus;
pub mod cell;
pub mod machine;
pub mod memory;

pub use bus::{Bus, FLOATING_BUS, InterruptLines};
pub use cell::{ByteCell, WordCell, WordStatus};
pub use machine::{InputButton, Machine};
pub use memory::{MEMORY_SIZE, Memory, MemoryError};
