//! ROM image loading and identification.
//!
//! A machine boots from one flat image mapped at address 0. Images can come
//! from a file on disk or from bytes already in memory (an archive entry,
//! a test fixture). Every image is fingerprinted with CRC-32 so known dumps
//! can be recognised in the log; unknown images are still accepted.

use std::path::Path;

use tracing::{info, warn};
use zeta_core::core::MEMORY_SIZE;

// ---------------------------------------------------------------------------
// CRC-32 (private)
// ---------------------------------------------------------------------------

/// CRC-32 lookup table (reflected polynomial 0xEDB88320), as used by ZIP.
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0u32;
    while i < 256 {
        let mut crc = i;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

fn crc32(data: &[u8]) -> u32 {
    let crc = data.iter().fold(0xFFFF_FFFFu32, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ byte as u32) & 0xFF) as usize]
    });
    crc ^ 0xFFFF_FFFF
}

/// Dumps recognised by checksum.
const KNOWN_ROMS: &[(u32, &str)] = &[(0xDDEE_531F, "Sinclair ZX Spectrum 48K (issue 1-6)")];

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum RomLoadError {
    /// Underlying I/O error (file not found, permission denied, etc.)
    Io(std::io::Error),

    /// The image has no bytes.
    Empty,

    /// The image does not fit where the machine maps it.
    TooLarge { size: usize },

    /// The archive holding the image could not be read.
    Zip(String),

    /// No image was found under this name.
    Missing(String),
}

impl std::fmt::Display for RomLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Empty => write!(f, "ROM image is empty"),
            Self::TooLarge { size } => write!(f, "ROM image of {size} bytes is too large"),
            Self::Zip(msg) => write!(f, "ROM archive: {msg}"),
            Self::Missing(name) => write!(f, "missing ROM: {name}"),
        }
    }
}

impl std::error::Error for RomLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RomLoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

// ---------------------------------------------------------------------------
// RomImage
// ---------------------------------------------------------------------------

/// A validated ROM image: non-empty and no larger than the address space.
#[derive(Clone, Debug)]
pub struct RomImage {
    name: String,
    data: Vec<u8>,
    crc32: u32,
}

impl RomImage {
    /// Read an image from disk. The file name becomes the image name.
    pub fn from_file(path: &Path) -> Result<Self, RomLoadError> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        Self::from_bytes(&name, data)
    }

    pub fn from_bytes(name: &str, data: Vec<u8>) -> Result<Self, RomLoadError> {
        if data.is_empty() {
            return Err(RomLoadError::Empty);
        }
        if data.len() > MEMORY_SIZE {
            return Err(RomLoadError::TooLarge { size: data.len() });
        }
        let checksum = crc32(&data);
        let crc = format!("{checksum:08X}");
        match identify(checksum) {
            Some(title) => info!(rom = name, crc = %crc, "ROM identified as {title}"),
            None => warn!(rom = name, crc = %crc, size = data.len(), "unrecognised ROM"),
        }
        Ok(Self {
            name: name.to_string(),
            data,
            crc32: checksum,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Title of the dump if its checksum is known.
    pub fn title(&self) -> Option<&'static str> {
        identify(self.crc32)
    }
}

fn identify(crc: u32) -> Option<&'static str> {
    KNOWN_ROMS
        .iter()
        .find(|&&(known, _)| known == crc)
        .map(|&(_, title)| title)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- CRC32 ---------------------------------------------------------------

    #[test]
    fn crc32_empty() {
        assert_eq!(crc32(&[]), 0x0000_0000);
    }

    #[test]
    fn crc32_canonical_123456789() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn crc32_single_zero_byte() {
        assert_eq!(crc32(&[0x00]), 0xD202_EF8D);
    }

    // -- RomImage ------------------------------------------------------------

    #[test]
    fn from_bytes_fingerprints_image() {
        let image = RomImage::from_bytes("test.rom", b"123456789".to_vec()).unwrap();
        assert_eq!(image.name(), "test.rom");
        assert_eq!(image.len(), 9);
        assert_eq!(image.crc32(), 0xCBF4_3926);
        assert_eq!(image.title(), None);
    }

    #[test]
    fn empty_image_rejected() {
        let result = RomImage::from_bytes("empty.rom", Vec::new());
        assert!(matches!(result, Err(RomLoadError::Empty)));
    }

    #[test]
    fn oversized_image_rejected() {
        let result = RomImage::from_bytes("big.rom", vec![0; MEMORY_SIZE + 1]);
        assert!(matches!(result, Err(RomLoadError::TooLarge { size }) if size == MEMORY_SIZE + 1));
    }

    #[test]
    fn full_address_space_accepted() {
        assert!(RomImage::from_bytes("full.bin", vec![0; MEMORY_SIZE]).is_ok());
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = RomImage::from_file(Path::new("/nonexistent/zeta/48.rom"));
        assert!(matches!(result, Err(RomLoadError::Io(_))));
    }

    #[test]
    fn from_file_uses_file_name() {
        let dir = std::env::temp_dir().join("zeta_rom_loader_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("test.rom"), [0xAA, 0xBB]).unwrap();

        let image = RomImage::from_file(&dir.join("test.rom")).unwrap();
        assert_eq!(image.name(), "test.rom");
        assert_eq!(image.data(), &[0xAA, 0xBB]);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
