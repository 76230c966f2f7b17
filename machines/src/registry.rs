//! Machine registry for automatic front-end discovery.
//!
//! Each machine self-registers via [`inventory::submit!`] with a
//! [`MachineEntry`] holding its CLI name, the ROM file it boots from, and a
//! factory function. The front-end discovers available machines at runtime
//! without any central list.

use zeta_core::core::machine::Machine;

use crate::rom_loader::{RomImage, RomLoadError};

/// Factory: construct a Machine from an optional ROM image.
pub type CreateFn = fn(Option<&RomImage>) -> Result<Box<dyn Machine>, RomLoadError>;

/// Describes a front-end-capable machine.
pub struct MachineEntry {
    /// CLI name used to select this machine (e.g., "spectrum").
    pub name: &'static str,
    /// One-line description for `list`.
    pub description: &'static str,
    /// ROM file looked up in the ROM path, if the machine needs one.
    pub rom_name: Option<&'static str>,
    pub create: CreateFn,
}

impl MachineEntry {
    pub const fn new(
        name: &'static str,
        description: &'static str,
        rom_name: Option<&'static str>,
        create: CreateFn,
    ) -> Self {
        Self {
            name,
            description,
            rom_name,
            create,
        }
    }
}

inventory::collect!(MachineEntry);

/// Return all registered machines, sorted by name.
pub fn all() -> Vec<&'static MachineEntry> {
    let mut entries: Vec<_> = inventory::iter::<MachineEntry>.into_iter().collect();
    entries.sort_by_key(|e| e.name);
    entries
}

/// Look up a machine by its CLI name.
pub fn find(name: &str) -> Option<&'static MachineEntry> {
    inventory::iter::<MachineEntry>
        .into_iter()
        .find(|e| e.name == name)
}
