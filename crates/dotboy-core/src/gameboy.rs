use log::debug;

use crate::{
    cartridge::Cartridge,
    cpu::Cpu,
    hardware::Model,
    mmu::Mmu,
    session::{EmulationError, ProcessorFault},
};

/// What one [`GameBoy::step`] did, in normal-speed clock cycles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepInfo {
    /// Elapsed time in 4.19 MHz cycles (CPU cycles halved in double speed).
    pub cycles: u32,
    /// A frame finished and is available from the PPU framebuffer.
    pub frame_ready: bool,
}

pub struct GameBoy {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub model: Model,
    /// A boot ROM is executing; the CPU is switched to the post-boot state
    /// once it unmaps itself.
    boot_running: bool,
}

impl GameBoy {
    /// Create a machine in the post-boot state, as if the boot ROM had run.
    pub fn new_with_mode(model: Model) -> Self {
        let mut mmu = Mmu::new_with_mode(model);
        mmu.apply_boot_state();
        Self {
            cpu: Cpu::new_with_mode(model),
            mmu,
            model,
            boot_running: false,
        }
    }

    /// Create a machine that starts executing `boot_rom` at 0x0000.
    pub fn new_power_on(model: Model, boot_rom: Vec<u8>) -> Self {
        let mut mmu = Mmu::new_with_mode(model);
        mmu.load_boot_rom(boot_rom);
        Self {
            cpu: Cpu::new_power_on(),
            mmu,
            model,
            boot_running: true,
        }
    }

    /// Build a machine for `cart`, picking the model from its header unless
    /// one is forced.
    pub fn with_cartridge(
        cart: Cartridge,
        model: Option<Model>,
        boot_rom: Option<Vec<u8>>,
    ) -> Self {
        let model = model.unwrap_or_else(|| Model::for_cgb_flag(cart.header.cgb_flag));
        let mut gb = match boot_rom {
            Some(boot) => Self::new_power_on(model, boot),
            None => Self::new_with_mode(model),
        };
        gb.mmu.load_cart(cart);
        gb
    }

    pub fn new() -> Self {
        Self::new_with_mode(Model::Dmg)
    }

    pub fn boot_running(&self) -> bool {
        self.boot_running
    }

    /// Run one CPU step and advance the PPU, timer, serial port and cartridge
    /// clock by the time it took.
    pub fn step(&mut self) -> Result<StepInfo, EmulationError> {
        if self.boot_running && !self.mmu.boot_mapped() {
            self.boot_running = false;
            self.cpu.apply_boot_state(self.model);
            debug!("Boot ROM finished, starting cartridge at {:#06X}", self.cpu.pc);
        }

        let cpu_cycles = self.cpu.step(&mut self.mmu).map_err(ProcessorFault::from)?;
        if let Some(fault) = self.mmu.take_fault() {
            return Err(ProcessorFault::Bus(fault).into());
        }

        let cycles = if self.mmu.double_speed() {
            cpu_cycles / 2
        } else {
            cpu_cycles
        };

        let events = self.mmu.ppu.step(cycles, &mut self.mmu.if_reg);
        for _ in 0..events.hblank_entries {
            self.mmu.hdma_hblank_transfer();
        }
        if let Some(fault) = self.mmu.take_fault() {
            return Err(EmulationError::PixelProcessor(fault));
        }

        if !self.cpu.stopped {
            self.mmu.timer.advance(cpu_cycles, &mut self.mmu.if_reg);
            self.mmu.serial.step(cpu_cycles, &mut self.mmu.if_reg);
        }
        if let Some(cart) = self.mmu.cart.as_mut() {
            cart.step(cycles);
        }

        Ok(StepInfo {
            cycles,
            frame_ready: events.frame_ready,
        })
    }

    /// Reset to the post-boot state while preserving the loaded cartridge.
    pub fn reset(&mut self) {
        let cart = self.mmu.cart.take();
        *self = Self::new_with_mode(self.model);
        if let Some(cart) = cart {
            self.mmu.load_cart(cart);
        }
    }
}

impl Default for GameBoy {
    fn default() -> Self {
        Self::new()
    }
}
