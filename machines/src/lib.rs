pub mod pacing;
pub mod plain;
pub mod registry;
pub mod rom_loader;
pub mod runner;
pub mod spectrum;

pub use plain::PlainZ80;
pub use rom_loader::{RomImage, RomLoadError};
pub use runner::{RunStats, Runner};
pub use spectrum::Spectrum48;

use zeta_core::cpu::z80::DecodeFault;

/// Anything that stops a machine from being built or from running.
#[derive(Debug)]
pub enum MachineError {
    Decode(DecodeFault),
    Rom(RomLoadError),
}

impl std::fmt::Display for MachineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode(fault) => write!(f, "CPU fault: {fault}"),
            Self::Rom(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MachineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Decode(fault) => Some(fault),
            Self::Rom(e) => Some(e),
        }
    }
}

impl From<DecodeFault> for MachineError {
    fn from(fault: DecodeFault) -> Self {
        Self::Decode(fault)
    }
}

impl From<RomLoadError> for MachineError {
    fn from(e: RomLoadError) -> Self {
        Self::Rom(e)
    }
}
