//! ROM path resolution: loads a [`RomImage`] from an explicit file, a ZIP
//! archive, or the configured ROM directory.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;
use zeta_machines::rom_loader::{RomImage, RomLoadError};

/// Resolve the image named `rom_name`.
///
/// Resolution order:
/// 1. `explicit` ending in `.zip` → the matching entry of that archive.
/// 2. `explicit` directory → searched like the ROM directory.
/// 3. `explicit` file → loaded as is, whatever its name.
/// 4. `rom_dir/{rom_name}`, then any `.zip` in `rom_dir` holding it.
pub fn resolve(
    rom_name: &str,
    explicit: Option<&Path>,
    rom_dir: Option<&Path>,
) -> Result<RomImage, RomLoadError> {
    if let Some(path) = explicit {
        if is_zip(path) {
            return load_from_zip(path, rom_name);
        }
        if path.is_dir() {
            return load_from_dir(path, rom_name);
        }
        return RomImage::from_file(path);
    }
    match rom_dir {
        Some(dir) => load_from_dir(dir, rom_name),
        None => Err(RomLoadError::Missing(format!(
            "{rom_name} (no --rom given and no rom_dir configured)"
        ))),
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

fn load_from_dir(dir: &Path, rom_name: &str) -> Result<RomImage, RomLoadError> {
    let loose = dir.join(rom_name);
    if loose.is_file() {
        debug!(path = %loose.display(), "loading loose ROM");
        return RomImage::from_file(&loose);
    }

    let mut archives: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_zip(path))
        .collect();
    archives.sort();
    for archive in archives {
        match load_from_zip(&archive, rom_name) {
            Ok(image) => return Ok(image),
            Err(RomLoadError::Missing(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(RomLoadError::Missing(format!(
        "{rom_name} in {}",
        dir.display()
    )))
}

/// The first entry whose file name is `rom_name` (any case), or failing
/// that the first `.rom` entry.
fn load_from_zip(path: &Path, rom_name: &str) -> Result<RomImage, RomLoadError> {
    let reader = BufReader::new(File::open(path)?);
    let mut archive =
        zip::ZipArchive::new(reader).map_err(|e| RomLoadError::Zip(format!("{}: {e}", path.display())))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let base_name = |entry: &str| entry.rsplit('/').next().unwrap_or(entry).to_string();
    let chosen = names
        .iter()
        .find(|name| base_name(name).eq_ignore_ascii_case(rom_name))
        .or_else(|| {
            names
                .iter()
                .find(|name| base_name(name).to_ascii_lowercase().ends_with(".rom"))
        })
        .ok_or_else(|| RomLoadError::Missing(format!("{rom_name} in {}", path.display())))?;

    let mut entry = archive
        .by_name(chosen)
        .map_err(|e| RomLoadError::Zip(format!("{}: {e}", path.display())))?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data)?;
    debug!(archive = %path.display(), entry = %chosen, "loading ROM from archive");
    RomImage::from_bytes(&base_name(chosen), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn create_test_zip(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> PathBuf {
        let zip_path = dir.join(name);
        let file = File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (fname, data) in files {
            zip.start_file(*fname, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap();
        zip_path
    }

    #[test]
    fn resolve_zip_file_directly() {
        let dir = test_dir("zeta_rompath_test_zip");
        let zip_path = create_test_zip(
            &dir,
            "spectrum.zip",
            &[("readme.txt", b"hello"), ("roms/48.rom", &[0xAA; 16])],
        );

        let image = resolve("48.rom", Some(&zip_path), None).unwrap();
        assert_eq!(image.name(), "48.rom");
        assert_eq!(image.data(), &[0xAA; 16][..]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zip_falls_back_to_any_rom_entry() {
        let dir = test_dir("zeta_rompath_test_fallback");
        let zip_path = create_test_zip(&dir, "other.zip", &[("spec48.ROM", &[0xBB; 8])]);

        let image = resolve("48.rom", Some(&zip_path), None).unwrap();
        assert_eq!(image.name(), "spec48.ROM");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn zip_without_rom_is_missing() {
        let dir = test_dir("zeta_rompath_test_missing");
        let zip_path = create_test_zip(&dir, "empty.zip", &[("notes.txt", b"none")]);

        let result = resolve("48.rom", Some(&zip_path), None);
        assert!(matches!(result, Err(RomLoadError::Missing(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_zip_reported() {
        let dir = test_dir("zeta_rompath_test_corrupt");
        let zip_path = dir.join("bad.zip");
        std::fs::write(&zip_path, b"not a zip").unwrap();

        let result = resolve("48.rom", Some(&zip_path), None);
        assert!(matches!(result, Err(RomLoadError::Zip(_))));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn explicit_file_loaded_as_is() {
        let dir = test_dir("zeta_rompath_test_file");
        let path = dir.join("custom.bin");
        std::fs::write(&path, [0xCC; 4]).unwrap();

        let image = resolve("48.rom", Some(&path), None).unwrap();
        assert_eq!(image.name(), "custom.bin");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rom_dir_loose_file_then_archive() {
        let dir = test_dir("zeta_rompath_test_dir");
        create_test_zip(&dir, "zx.zip", &[("48.rom", &[0xDD; 8])]);

        let image = resolve("48.rom", None, Some(&dir)).unwrap();
        assert_eq!(image.data(), &[0xDD; 8][..]);

        std::fs::write(dir.join("48.rom"), [0xEE; 4]).unwrap();
        let image = resolve("48.rom", None, Some(&dir)).unwrap();
        assert_eq!(image.data(), &[0xEE; 4][..]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn nothing_configured_is_missing() {
        assert!(matches!(
            resolve("48.rom", None, None),
            Err(RomLoadError::Missing(_))
        ));
    }
}
