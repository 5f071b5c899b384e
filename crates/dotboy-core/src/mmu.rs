use log::debug;
use thiserror::Error;

use crate::{
    cartridge::Cartridge,
    hardware::Model,
    input::Input,
    interrupts::INTERRUPT_MASK,
    ppu::{OAM_SIZE, Ppu},
    serial::Serial,
    timer::Timer,
};

const WRAM_BANK_SIZE: usize = 0x1000;
const HDMA_BLOCK: u16 = 0x10;

/// Boot ROM image size mapped over 0x0000-0x00FF.
pub const BOOT_ROM_SIZE: usize = 0x100;

/// An access the emulated hardware has no defined answer for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusFault {
    #[error("external RAM accessed at {addr:#06X} while disabled")]
    ExternalRamDisabled { addr: u16 },
    #[error("external RAM accessed at {addr:#06X} on a cartridge without RAM")]
    NoExternalRam { addr: u16 },
    #[error("OAM DMA requested from page {page:#04X}, which has no backing memory")]
    InvalidDmaSource { page: u8 },
}

#[derive(Debug, Default)]
struct HdmaState {
    /// 16-bit source pointer (low nibble ignored)
    src: u16,
    /// Destination offset into VRAM (0x0000-0x1FF0)
    dst: u16,
    /// Blocks of 0x10 bytes left to copy
    remaining: u8,
    /// H-blank transfer in progress
    active: bool,
}

pub struct Mmu {
    pub wram: [[u8; WRAM_BANK_SIZE]; 8],
    pub wram_bank: usize,
    pub hram: [u8; 0x7F],
    pub cart: Option<Cartridge>,
    boot_rom: Option<Vec<u8>>,
    boot_mapped: bool,
    pub if_reg: u8,
    pub ie_reg: u8,
    pub serial: Serial,
    pub ppu: Ppu,
    pub timer: Timer,
    pub input: Input,
    /// Sound registers 0xFF10-0xFF3F, kept so programs can read back what
    /// they wrote.
    sound: [u8; 0x30],
    hdma: HdmaState,
    pub key1: u8,
    cgb_mode: bool,
    fault: Option<BusFault>,
}

impl Mmu {
    pub fn new_with_mode(model: Model) -> Self {
        let cgb = model.is_cgb();
        Self {
            wram: [[0; WRAM_BANK_SIZE]; 8],
            wram_bank: 1,
            hram: [0; 0x7F],
            cart: None,
            boot_rom: None,
            boot_mapped: false,
            if_reg: 0,
            ie_reg: 0,
            serial: Serial::new(cgb),
            ppu: Ppu::new_with_mode(cgb),
            timer: Timer::new(),
            input: Input::new(),
            sound: [0; 0x30],
            hdma: HdmaState::default(),
            key1: 0,
            cgb_mode: cgb,
            fault: None,
        }
    }

    pub fn new() -> Self {
        Self::new_with_mode(Model::Dmg)
    }

    /// Load the I/O register values the boot ROM leaves behind.
    /// See gbdev.io/pandocs/Power_Up_State.html
    pub fn apply_boot_state(&mut self) {
        const SOUND_DEFAULTS: [(u16, u8); 15] = [
            (0xFF10, 0x80),
            (0xFF11, 0xBF),
            (0xFF12, 0xF3),
            (0xFF14, 0xBF),
            (0xFF16, 0x3F),
            (0xFF19, 0xBF),
            (0xFF1A, 0x7F),
            (0xFF1B, 0xFF),
            (0xFF1C, 0x9F),
            (0xFF1E, 0xBF),
            (0xFF20, 0xFF),
            (0xFF23, 0xBF),
            (0xFF24, 0x77),
            (0xFF25, 0xF3),
            (0xFF26, 0xF1),
        ];
        for (addr, val) in SOUND_DEFAULTS {
            self.sound[(addr - 0xFF10) as usize] = val;
        }
        self.if_reg = 0x01;
        self.ppu.apply_boot_state();
    }

    pub fn load_cart(&mut self, cart: Cartridge) {
        self.cart = Some(cart);
    }

    /// Map a 256-byte boot ROM over the start of the cartridge until 0xFF50
    /// is written.
    pub fn load_boot_rom(&mut self, data: Vec<u8>) {
        self.boot_rom = Some(data);
        self.boot_mapped = true;
    }

    #[inline]
    pub fn boot_mapped(&self) -> bool {
        self.boot_mapped
    }

    #[inline]
    pub fn is_cgb(&self) -> bool {
        self.cgb_mode
    }

    #[inline]
    pub fn double_speed(&self) -> bool {
        self.key1 & 0x80 != 0
    }

    /// Requested and enabled interrupts.
    #[inline]
    pub fn pending_interrupts(&self) -> u8 {
        self.if_reg & self.ie_reg & INTERRUPT_MASK
    }

    /// Perform a speed switch if one was armed through KEY1. Returns whether
    /// the speed changed.
    pub fn take_speed_switch(&mut self) -> bool {
        if !self.cgb_mode || self.key1 & 0x01 == 0 {
            return false;
        }
        self.key1 = (self.key1 ^ 0x80) & 0x80;
        debug!("Switched to {} speed", if self.double_speed() { "double" } else { "normal" });
        true
    }

    /// Take the first fault recorded since the last call.
    pub fn take_fault(&mut self) -> Option<BusFault> {
        self.fault.take()
    }

    fn record_fault(&mut self, fault: BusFault) {
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }

    /// Drain the bytes the game sent through the serial port.
    pub fn take_serial(&mut self) -> Vec<u8> {
        self.serial.take_output()
    }

    pub fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.read_byte(addr) as u16;
        let hi = self.read_byte(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write_word(&mut self, addr: u16, val: u16) {
        self.write_byte(addr, val as u8);
        self.write_byte(addr.wrapping_add(1), (val >> 8) as u8);
    }

    pub fn read_byte(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x00FF if self.boot_mapped => self
                .boot_rom
                .as_ref()
                .and_then(|b| b.get(addr as usize).copied())
                .unwrap_or(0xFF),
            0x0000..=0x7FFF => self.cart.as_ref().map_or(0xFF, |c| c.read_rom(addr)),
            0x8000..=0x9FFF => self.ppu.vram[self.ppu.vram_bank][(addr - 0x8000) as usize],
            0xA000..=0xBFFF => match self.cart.as_ref().map(|c| c.read_ram(addr)) {
                Some(Ok(val)) => val,
                Some(Err(fault)) => {
                    self.record_fault(fault);
                    0xFF
                }
                None => 0xFF,
            },
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize],
            0xD000..=0xDFFF => self.wram[self.wram_bank][(addr - 0xD000) as usize],
            0xE000..=0xFDFF => self.read_byte(addr - 0x2000),
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize],
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00 => self.input.read(),
            0xFF01 | 0xFF02 => self.serial.read(addr),
            0xFF04..=0xFF07 => self.timer.read(addr),
            0xFF0F => self.if_reg | 0xE0,
            0xFF10..=0xFF3F => self.sound[(addr - 0xFF10) as usize],
            0xFF40..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => self.ppu.read_reg(addr),
            0xFF4D if self.cgb_mode => self.key1 | 0x7E,
            0xFF55 if self.cgb_mode => {
                let len = self.hdma.remaining.wrapping_sub(1) & 0x7F;
                if self.hdma.active { len } else { 0x80 | len }
            }
            0xFF70 if self.cgb_mode => 0xF8 | self.wram_bank as u8,
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.ie_reg,
            _ => 0xFF,
        }
    }

    pub fn write_byte(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => {
                if let Some(cart) = self.cart.as_mut() {
                    cart.write_control(addr, val);
                }
            }
            0x8000..=0x9FFF => {
                self.ppu.vram[self.ppu.vram_bank][(addr - 0x8000) as usize] = val;
            }
            0xA000..=0xBFFF => {
                if let Some(Err(fault)) = self.cart.as_mut().map(|c| c.write_ram(addr, val)) {
                    self.record_fault(fault);
                }
            }
            0xC000..=0xCFFF => self.wram[0][(addr - 0xC000) as usize] = val,
            0xD000..=0xDFFF => self.wram[self.wram_bank][(addr - 0xD000) as usize] = val,
            0xE000..=0xFDFF => self.write_byte(addr - 0x2000, val),
            0xFE00..=0xFE9F => self.ppu.oam[(addr - 0xFE00) as usize] = val,
            0xFEA0..=0xFEFF => {}
            0xFF00 => self.input.write(val),
            0xFF01 | 0xFF02 => self.serial.write(addr, val),
            0xFF04..=0xFF07 => self.timer.write(addr, val),
            0xFF0F => self.if_reg = val & INTERRUPT_MASK,
            0xFF10..=0xFF3F => self.sound[(addr - 0xFF10) as usize] = val,
            0xFF46 => {
                self.ppu.dma = val;
                self.oam_dma(val);
            }
            0xFF40..=0xFF4B | 0xFF4F | 0xFF68..=0xFF6B => {
                self.ppu.write_reg(addr, val, &mut self.if_reg);
            }
            0xFF4D if self.cgb_mode => self.key1 = (self.key1 & 0x80) | (val & 0x01),
            0xFF50 => {
                if self.boot_mapped && val & 0x01 != 0 {
                    self.boot_mapped = false;
                    debug!("Boot ROM unmapped");
                }
            }
            0xFF51 if self.cgb_mode => self.hdma.src = (self.hdma.src & 0x00FF) | (val as u16) << 8,
            0xFF52 if self.cgb_mode => {
                self.hdma.src = (self.hdma.src & 0xFF00) | (val & 0xF0) as u16;
            }
            0xFF53 if self.cgb_mode => {
                self.hdma.dst = (self.hdma.dst & 0x00FF) | ((val & 0x1F) as u16) << 8;
            }
            0xFF54 if self.cgb_mode => {
                self.hdma.dst = (self.hdma.dst & 0x1F00) | (val & 0xF0) as u16;
            }
            0xFF55 if self.cgb_mode => self.write_hdma_control(val),
            0xFF70 if self.cgb_mode => {
                self.wram_bank = match val & 0x07 {
                    0 => 1,
                    bank => bank as usize,
                };
            }
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.ie_reg = val,
            _ => {}
        }
    }

    /// Copy 160 bytes from `page << 8` into OAM.
    /// See gbdev.io/pandocs/OAM_DMA_Transfer.html
    fn oam_dma(&mut self, page: u8) {
        if page >= 0xFE {
            self.record_fault(BusFault::InvalidDmaSource { page });
            return;
        }
        let src = (page as u16) << 8;
        for i in 0..OAM_SIZE as u16 {
            self.ppu.oam[i as usize] = self.read_byte(src + i);
        }
    }

    fn write_hdma_control(&mut self, val: u8) {
        if self.hdma.active && val & 0x80 == 0 {
            self.hdma.active = false;
            debug!("HDMA cancelled with {} blocks left", self.hdma.remaining);
            return;
        }

        self.hdma.remaining = (val & 0x7F) + 1;
        if val & 0x80 != 0 {
            self.hdma.active = true;
        } else {
            while self.hdma.remaining > 0 {
                self.copy_hdma_block();
            }
        }
    }

    fn copy_hdma_block(&mut self) {
        for _ in 0..HDMA_BLOCK {
            let byte = self.read_byte(self.hdma.src);
            let dst = (self.hdma.dst & 0x1FFF) as usize;
            self.ppu.vram[self.ppu.vram_bank][dst] = byte;
            self.hdma.src = self.hdma.src.wrapping_add(1);
            self.hdma.dst = (self.hdma.dst + 1) & 0x1FFF;
        }
        self.hdma.remaining -= 1;
    }

    /// Copy one block of an active H-blank DMA. Called on every H-blank entry.
    pub fn hdma_hblank_transfer(&mut self) {
        if !self.hdma.active {
            return;
        }
        self.copy_hdma_block();
        if self.hdma.remaining == 0 {
            self.hdma.active = false;
        }
    }

    pub fn hdma_active(&self) -> bool {
        self.hdma.active
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
