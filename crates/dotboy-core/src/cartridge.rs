use log::{debug, info};
use thiserror::Error;

use crate::{hardware::CPU_HZ, mmu::BusFault};

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Smallest image that still holds a complete header (0x100-0x14F).
const HEADER_END: usize = 0x0150;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("ROM image is {0} bytes, too small to contain a cartridge header")]
    TooSmall(usize),
    #[error("unsupported cartridge controller type {0:#04X}")]
    UnsupportedController(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcType {
    NoMbc,
    Mbc1,
    Mbc3,
    Mbc5,
}

/// Fields decoded from the cartridge header at 0x0134-0x014F.
/// See gbdev.io/pandocs/The_Cartridge_Header.html
#[derive(Debug, Clone)]
pub struct Header {
    pub title: String,
    pub cart_type: u8,
    pub mbc: MbcType,
    pub cgb_flag: u8,
    /// External RAM size the header declares, in bytes.
    pub ram_size: usize,
    pub battery: bool,
    pub rtc: bool,
}

impl Header {
    pub fn parse(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < HEADER_END {
            return Err(CartridgeError::TooSmall(data.len()));
        }

        let cart_type = data[0x0147];
        let mbc = match cart_type {
            0x00 => MbcType::NoMbc,
            0x01..=0x03 => MbcType::Mbc1,
            0x0F..=0x13 => MbcType::Mbc3,
            0x19..=0x1E => MbcType::Mbc5,
            other => return Err(CartridgeError::UnsupportedController(other)),
        };

        let ram_size = match data[0x0149] {
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0,
        };

        let mut title = &data[0x0134..0x0143];
        if let Some(pos) = title.iter().position(|&b| b == 0) {
            title = &title[..pos];
        }

        Ok(Self {
            title: String::from_utf8_lossy(title).trim().to_string(),
            cart_type,
            mbc,
            cgb_flag: data[0x0143],
            ram_size,
            battery: matches!(cart_type, 0x03 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E),
            rtc: matches!(cart_type, 0x0F | 0x10),
        })
    }
}

#[derive(Debug)]
enum MbcState {
    NoMbc,
    Mbc1 {
        /// 7-bit ROM bank; 0x2000-0x3FFF sets bits 0-4, 0x4000-0x5FFF bits 5-6
        /// while `mode` is 0.
        rom_bank: u8,
        /// Set from 0x4000-0x5FFF while `mode` is 1.
        ram_bank: u8,
        mode: u8,
    },
    Mbc3 {
        rom_bank: u8,
        /// 0x00-0x03 select RAM, 0x08-0x0C select a clock register.
        ram_bank: u8,
        latch_armed: bool,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
    },
}

/// MBC3 real-time clock.
///
/// Time is kept as a running count of seconds; the S/M/H/DL/DH registers are
/// derived from it. See gbdev.io/pandocs/MBC3.html
#[derive(Debug, Clone)]
pub struct Rtc {
    seconds: u64,
    subsecond_cycles: u32,
    halted: bool,
    carry: bool,
    latched: [u8; 5],
}

const SECONDS_PER_DAY: u64 = 86_400;
/// The day counter is 9 bits wide.
const DAY_LIMIT: u64 = 512;

const RTC_MAGIC: &[u8; 4] = b"DRTC";
const RTC_BLOB_LEN: usize = 4 + 8 + 8 + 4 + 1;

impl Rtc {
    pub fn new() -> Self {
        Self {
            seconds: 0,
            subsecond_cycles: 0,
            halted: false,
            carry: false,
            latched: [0; 5],
        }
    }

    fn registers(&self) -> [u8; 5] {
        let days = self.seconds / SECONDS_PER_DAY;
        let mut dh = ((days >> 8) & 0x01) as u8;
        if self.halted {
            dh |= 0x40;
        }
        if self.carry {
            dh |= 0x80;
        }
        [
            (self.seconds % 60) as u8,
            ((self.seconds / 60) % 60) as u8,
            ((self.seconds / 3600) % 24) as u8,
            days as u8,
            dh,
        ]
    }

    fn set_from_registers(&mut self, regs: [u8; 5]) {
        let days = regs[3] as u64 | (((regs[4] & 0x01) as u64) << 8);
        self.seconds = days * SECONDS_PER_DAY
            + (regs[2] as u64 % 24) * 3600
            + (regs[1] as u64 % 60) * 60
            + regs[0] as u64 % 60;
        self.halted = regs[4] & 0x40 != 0;
        self.carry = regs[4] & 0x80 != 0;
    }

    pub fn latch(&mut self) {
        self.latched = self.registers();
    }

    /// Reads a latched register; `reg` is the 0x08-0x0C bank value.
    pub fn read(&self, reg: u8) -> u8 {
        match reg {
            0x08..=0x0C => self.latched[(reg - 0x08) as usize],
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, reg: u8, val: u8) {
        let mut regs = self.registers();
        match reg {
            0x08 => {
                regs[0] = val & 0x3F;
                self.subsecond_cycles = 0;
            }
            0x09 => regs[1] = val & 0x3F,
            0x0A => regs[2] = val & 0x1F,
            0x0B => regs[3] = val,
            0x0C => regs[4] = val & 0xC1,
            _ => return,
        }
        self.set_from_registers(regs);
    }

    pub fn step(&mut self, cycles: u32) {
        if self.halted {
            return;
        }
        self.subsecond_cycles += cycles;
        if self.subsecond_cycles >= CPU_HZ {
            let elapsed = self.subsecond_cycles / CPU_HZ;
            self.subsecond_cycles %= CPU_HZ;
            self.advance_seconds(elapsed as u64);
        }
    }

    pub fn advance_seconds(&mut self, seconds: u64) {
        if self.halted {
            return;
        }
        self.seconds += seconds;
        let limit = DAY_LIMIT * SECONDS_PER_DAY;
        if self.seconds >= limit {
            self.seconds %= limit;
            self.carry = true;
        }
    }

    /// Serialize the clock together with the wall-clock time it was saved at.
    pub fn to_bytes(&self, now_unix: u64) -> Vec<u8> {
        let mut data = Vec::with_capacity(RTC_BLOB_LEN);
        data.extend_from_slice(RTC_MAGIC);
        data.extend_from_slice(&self.seconds.to_le_bytes());
        data.extend_from_slice(&now_unix.to_le_bytes());
        data.extend_from_slice(&self.subsecond_cycles.to_le_bytes());
        data.push(self.halted as u8 | (self.carry as u8) << 1);
        data
    }

    /// Restore a blob written by [`Rtc::to_bytes`], catching up on the
    /// wall-clock time spent switched off. Returns `false` for malformed data.
    pub fn load_bytes(&mut self, data: &[u8], now_unix: u64) -> bool {
        if data.len() < RTC_BLOB_LEN || &data[..4] != RTC_MAGIC {
            return false;
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(&data[4..12]);
        self.seconds = u64::from_le_bytes(word);
        word.copy_from_slice(&data[12..20]);
        let saved_at = u64::from_le_bytes(word);
        let mut half = [0u8; 4];
        half.copy_from_slice(&data[20..24]);
        self.subsecond_cycles = u32::from_le_bytes(half) % CPU_HZ;
        self.halted = data[24] & 0x01 != 0;
        self.carry = data[24] & 0x02 != 0;

        self.advance_seconds(now_unix.saturating_sub(saved_at));
        self.latch();
        true
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub header: Header,
    ram_enabled: bool,
    /// External RAM has been written since the last save.
    dirty: bool,
    rtc: Option<Rtc>,
    state: MbcState,
}

impl Cartridge {
    /// Validate a ROM image and map it behind the controller its header names.
    pub fn from_bytes(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = Header::parse(&rom)?;

        let state = match header.mbc {
            MbcType::NoMbc => MbcState::NoMbc,
            MbcType::Mbc1 => MbcState::Mbc1 {
                rom_bank: 1,
                ram_bank: 0,
                mode: 0,
            },
            MbcType::Mbc3 => MbcState::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                latch_armed: false,
            },
            MbcType::Mbc5 => MbcState::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
            },
        };

        info!(
            "Loaded ROM: {} (type {:#04X}, {:?}, {} KiB ROM, {} KiB RAM, CGB flag {:#04X})",
            header.title,
            header.cart_type,
            header.mbc,
            rom.len() / 1024,
            header.ram_size / 1024,
            header.cgb_flag
        );

        Ok(Self {
            rom,
            ram: vec![0; header.ram_size],
            rtc: header.rtc.then(Rtc::new),
            header,
            ram_enabled: true,
            dirty: false,
            state,
        })
    }

    #[inline]
    fn rom_banks(&self) -> usize {
        self.rom.len().div_ceil(ROM_BANK_SIZE).max(1)
    }

    #[inline]
    fn ram_banks(&self) -> usize {
        self.ram.len().div_ceil(RAM_BANK_SIZE).max(1)
    }

    /// ROM bank mapped at 0x4000-0x7FFF. Bank 0 is always at 0x0000-0x3FFF.
    pub fn rom_bank(&self) -> usize {
        let bank = match self.state {
            MbcState::NoMbc => 1,
            MbcState::Mbc1 { rom_bank, .. } => rom_bank as usize,
            MbcState::Mbc3 { rom_bank, .. } => rom_bank as usize,
            MbcState::Mbc5 { rom_bank, .. } => rom_bank as usize,
        };
        match bank % self.rom_banks() {
            // Only reachable when the image is smaller than the register.
            0 => 1 % self.rom_banks(),
            bank => bank,
        }
    }

    /// RAM bank mapped at 0xA000-0xBFFF, or `None` when a clock register is.
    fn ram_bank(&self) -> Option<usize> {
        let bank = match self.state {
            MbcState::NoMbc => 0,
            MbcState::Mbc1 { ram_bank, .. } => ram_bank as usize,
            MbcState::Mbc3 { ram_bank, .. } => match ram_bank {
                0x00..=0x03 => ram_bank as usize,
                _ => return None,
            },
            MbcState::Mbc5 { ram_bank, .. } => ram_bank as usize,
        };
        Some(bank % self.ram_banks())
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        let offset = match addr {
            0x0000..=0x3FFF => addr as usize,
            0x4000..=0x7FFF => self.rom_bank() * ROM_BANK_SIZE + (addr as usize - ROM_BANK_SIZE),
            _ => return 0xFF,
        };
        self.rom.get(offset).copied().unwrap_or(0xFF)
    }

    /// Handle a write to the controller registers at 0x0000-0x7FFF.
    pub fn write_control(&mut self, addr: u16, val: u8) {
        if addr < 0x2000 {
            if !matches!(self.state, MbcState::NoMbc) {
                self.ram_enabled = val & 0x0F == 0x0A;
                debug!("External RAM enabled: {}", self.ram_enabled);
            }
            return;
        }

        match (&mut self.state, addr) {
            (MbcState::NoMbc, _) => {}
            (MbcState::Mbc1 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = (*rom_bank & 0x60) | mbc1_low_bits(val);
            }
            (MbcState::Mbc1 { ram_bank, mode: 1, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x03;
            }
            (MbcState::Mbc1 { rom_bank, .. }, 0x4000..=0x5FFF) => {
                *rom_bank = ((val & 0x03) << 5) | mbc1_low_bits(*rom_bank);
            }
            (MbcState::Mbc1 { mode, .. }, _) => {
                *mode = val & 0x01;
            }
            (MbcState::Mbc3 { rom_bank, .. }, 0x2000..=0x3FFF) => {
                *rom_bank = match val & 0x7F {
                    0 => 1,
                    bank => bank,
                };
            }
            (MbcState::Mbc3 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }
            (MbcState::Mbc3 { latch_armed, .. }, _) => {
                if *latch_armed && val == 0x01 {
                    if let Some(rtc) = self.rtc.as_mut() {
                        rtc.latch();
                    }
                }
                *latch_armed = val == 0x00;
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x2000..=0x2FFF) => {
                *rom_bank = nonzero_bank((*rom_bank & 0x100) | val as u16);
            }
            (MbcState::Mbc5 { rom_bank, .. }, 0x3000..=0x3FFF) => {
                *rom_bank = nonzero_bank((*rom_bank & 0x0FF) | (((val & 0x01) as u16) << 8));
            }
            (MbcState::Mbc5 { ram_bank, .. }, 0x4000..=0x5FFF) => {
                *ram_bank = val & 0x0F;
            }
            (MbcState::Mbc5 { .. }, _) => {}
        }
        debug!(
            "Cartridge banks: ROM {:#04X}, RAM {:?}",
            self.rom_bank(),
            self.ram_bank()
        );
    }

    fn ram_offset(&self, addr: u16, bank: usize) -> Result<usize, BusFault> {
        if self.ram.is_empty() {
            return Err(BusFault::NoExternalRam { addr });
        }
        Ok((bank * RAM_BANK_SIZE + (addr as usize - 0xA000)) % self.ram.len())
    }

    pub fn read_ram(&self, addr: u16) -> Result<u8, BusFault> {
        if !self.ram_enabled {
            return Err(BusFault::ExternalRamDisabled { addr });
        }
        match self.ram_bank() {
            Some(bank) => Ok(self.ram[self.ram_offset(addr, bank)?]),
            None => Ok(self.rtc_register().map_or(0xFF, |(rtc, reg)| rtc.read(reg))),
        }
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) -> Result<(), BusFault> {
        if !self.ram_enabled {
            return Err(BusFault::ExternalRamDisabled { addr });
        }
        match self.ram_bank() {
            Some(bank) => {
                let i = self.ram_offset(addr, bank)?;
                self.ram[i] = val;
                self.dirty = true;
            }
            None => {
                if let MbcState::Mbc3 { ram_bank, .. } = self.state
                    && let Some(rtc) = self.rtc.as_mut()
                {
                    rtc.write(ram_bank, val);
                    self.dirty = true;
                }
            }
        }
        Ok(())
    }

    fn rtc_register(&self) -> Option<(&Rtc, u8)> {
        match self.state {
            MbcState::Mbc3 { ram_bank, .. } => self.rtc.as_ref().map(|rtc| (rtc, ram_bank)),
            _ => None,
        }
    }

    pub fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    /// Advance the cartridge clock by `cycles` normal-speed CPU cycles.
    pub fn step(&mut self, cycles: u32) {
        if let Some(rtc) = self.rtc.as_mut() {
            rtc.step(cycles);
        }
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        self.rtc.as_ref()
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        self.rtc.as_mut()
    }

    pub fn has_battery(&self) -> bool {
        self.header.battery && !self.ram.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Replace external RAM with a saved image. Images that do not cover the
    /// whole RAM leave it zeroed and return `false`.
    pub fn load_ram(&mut self, data: &[u8]) -> bool {
        if data.len() < self.ram.len() {
            self.ram.fill(0);
            return false;
        }
        let len = self.ram.len();
        self.ram.copy_from_slice(&data[..len]);
        true
    }
}

/// Bits 0-4 of an MBC1 bank number. Zero reads as one, so banks 0x20, 0x40
/// and 0x60 are never selected.
fn mbc1_low_bits(val: u8) -> u8 {
    match val & 0x1F {
        0 => 1,
        low => low,
    }
}

fn nonzero_bank(bank: u16) -> u16 {
    if bank == 0 { 1 } else { bank }
}
