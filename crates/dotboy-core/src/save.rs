use std::{
    fs, io,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use log::{debug, error, warn};

use crate::cartridge::Cartridge;

/// Storage for battery-backed cartridge RAM and the MBC3 clock.
pub trait BatteryStore {
    /// Returns `Ok(None)` when nothing has been saved yet.
    fn load_ram(&mut self) -> io::Result<Option<Vec<u8>>>;
    fn save_ram(&mut self, data: &[u8]) -> io::Result<()>;
    fn load_rtc(&mut self) -> io::Result<Option<Vec<u8>>>;
    fn save_rtc(&mut self, data: &[u8]) -> io::Result<()>;
}

/// `.sav` / `.rtc` files next to the ROM, or in a dedicated save directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    ram_path: PathBuf,
    rtc_path: PathBuf,
}

impl FileStore {
    pub fn for_rom(rom: &Path, save_dir: Option<&Path>) -> Self {
        let base = match (save_dir, rom.file_name()) {
            (Some(dir), Some(name)) => dir.join(name),
            _ => rom.to_path_buf(),
        };
        Self {
            ram_path: base.with_extension("sav"),
            rtc_path: base.with_extension("rtc"),
        }
    }

    pub fn ram_path(&self) -> &Path {
        &self.ram_path
    }

    pub fn rtc_path(&self) -> &Path {
        &self.rtc_path
    }

    fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(path: &Path, data: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)
    }
}

impl BatteryStore for FileStore {
    fn load_ram(&mut self) -> io::Result<Option<Vec<u8>>> {
        Self::read_optional(&self.ram_path)
    }

    fn save_ram(&mut self, data: &[u8]) -> io::Result<()> {
        Self::write(&self.ram_path, data)
    }

    fn load_rtc(&mut self) -> io::Result<Option<Vec<u8>>> {
        Self::read_optional(&self.rtc_path)
    }

    fn save_rtc(&mut self, data: &[u8]) -> io::Result<()> {
        Self::write(&self.rtc_path, data)
    }
}

/// In-memory store, handy for frontends without a filesystem and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub ram: Option<Vec<u8>>,
    pub rtc: Option<Vec<u8>>,
}

impl BatteryStore for MemoryStore {
    fn load_ram(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.ram.clone())
    }

    fn save_ram(&mut self, data: &[u8]) -> io::Result<()> {
        self.ram = Some(data.to_vec());
        Ok(())
    }

    fn load_rtc(&mut self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.rtc.clone())
    }

    fn save_rtc(&mut self, data: &[u8]) -> io::Result<()> {
        self.rtc = Some(data.to_vec());
        Ok(())
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Fill cartridge RAM (and clock) from `store`. Failures are logged and leave
/// the RAM zeroed.
pub fn restore(cart: &mut Cartridge, store: &mut dyn BatteryStore) {
    if cart.has_battery() {
        match store.load_ram() {
            Ok(Some(data)) => {
                if !cart.load_ram(&data) {
                    warn!(
                        "Save data is {} bytes, expected {}; starting with empty RAM",
                        data.len(),
                        cart.ram.len()
                    );
                }
            }
            Ok(None) => debug!("No save data found"),
            Err(e) => {
                cart.ram.fill(0);
                warn!("Failed to read save data: {e}");
            }
        }
    }

    if let Some(rtc) = cart.rtc_mut() {
        match store.load_rtc() {
            Ok(Some(data)) => {
                if !rtc.load_bytes(&data, now_unix()) {
                    warn!("Ignoring malformed RTC data");
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read RTC data: {e}"),
        }
    }
}

/// Write cartridge RAM to `store` if it changed since the last successful
/// flush. The clock, when present, is always written.
pub fn flush(cart: &mut Cartridge, store: &mut dyn BatteryStore) {
    if cart.is_dirty() {
        if !cart.has_battery() {
            cart.clear_dirty();
        } else {
            match store.save_ram(&cart.ram) {
                Ok(()) => {
                    cart.clear_dirty();
                    debug!("Battery RAM flushed");
                }
                // Stays dirty so the next flush retries.
                Err(e) => error!("Failed to write save data: {e}"),
            }
        }
    }
    if let Some(rtc) = cart.rtc()
        && let Err(e) = store.save_rtc(&rtc.to_bytes(now_unix()))
    {
        error!("Failed to write RTC data: {e}");
    }
}
