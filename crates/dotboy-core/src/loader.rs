use std::{
    fs,
    path::{Path, PathBuf},
};

use log::info;
use thiserror::Error;

use crate::{cartridge::Cartridge, cartridge::CartridgeError, mmu::BOOT_ROM_SIZE};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Cartridge(#[from] CartridgeError),
    #[error("boot ROM must be {expected} bytes, got {actual}")]
    BootRomSize { expected: usize, actual: usize },
}

fn read(path: &Path) -> Result<Vec<u8>, LoadError> {
    fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a ROM image from disk and build its cartridge.
pub fn load_rom(path: &Path) -> Result<Cartridge, LoadError> {
    let data = read(path)?;
    info!("Loaded ROM {} ({} bytes)", path.display(), data.len());
    Ok(Cartridge::from_bytes(data)?)
}

/// Read a 256-byte boot ROM.
pub fn load_boot_rom(path: &Path) -> Result<Vec<u8>, LoadError> {
    let data = read(path)?;
    if data.len() != BOOT_ROM_SIZE {
        return Err(LoadError::BootRomSize {
            expected: BOOT_ROM_SIZE,
            actual: data.len(),
        });
    }
    Ok(data)
}
