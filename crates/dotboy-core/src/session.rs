use log::{debug, error, info};
use thiserror::Error;

use crate::{
    cpu::CpuError,
    gameboy::GameBoy,
    hardware::CPU_HZ,
    host::Host,
    mmu::BusFault,
    save::{self, BatteryStore},
};

/// Emulated cycles executed per [`Session::run_batch`] call (a quarter second).
pub const BATCH_CYCLES: u32 = CPU_HZ / 4;
/// Host input is polled after this many cycles.
pub const INPUT_POLL_CYCLES: u32 = 15_000;
/// Battery RAM is flushed every this many input polls when it changed.
pub const SAVE_FLUSH_POLLS: u32 = 10_000;
/// Emulation is paced against the host clock every this many cycles.
pub const PACING_CYCLES: u32 = 100_000;

#[derive(Debug, Error)]
pub enum ProcessorFault {
    #[error(transparent)]
    Cpu(#[from] CpuError),
    #[error("bus fault: {0}")]
    Bus(BusFault),
}

/// Fatal fault that ends a session.
#[derive(Debug, Error)]
pub enum EmulationError {
    #[error("processor fault: {0}")]
    Processor(#[from] ProcessorFault),
    #[error("pixel processor fault: {0}")]
    PixelProcessor(BusFault),
}

impl EmulationError {
    /// Distinct process exit status per faulting unit.
    pub fn exit_code(&self) -> i32 {
        match self {
            EmulationError::Processor(_) => 2,
            EmulationError::PixelProcessor(_) => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// The batch ran to completion.
    Continue,
    /// The host asked to stop.
    Quit,
}

/// Keeps emulated time from running ahead of the host clock.
struct Pacer {
    /// Emulated time since the window opened, in cycles times 1000 so whole
    /// milliseconds divide out exactly and the remainder carries over.
    pending: u64,
    window_start_ms: u64,
}

impl Pacer {
    fn new(now_ms: u64) -> Self {
        Self {
            pending: 0,
            window_start_ms: now_ms,
        }
    }

    fn sync<H: Host>(&mut self, cycles: u32, host: &mut H) {
        self.pending += cycles as u64 * 1000;
        if self.pending <= PACING_CYCLES as u64 * 1000 {
            return;
        }
        let window_ms = self.pending / CPU_HZ as u64;
        self.pending %= CPU_HZ as u64;

        let elapsed = host.ticks_ms().saturating_sub(self.window_start_ms);
        if elapsed < window_ms {
            host.delay_ms(window_ms - elapsed);
        } else if elapsed > window_ms {
            debug!("Running behind: {window_ms} ms of emulation took {elapsed} ms");
        }
        self.window_start_ms = host.ticks_ms();
    }
}

/// A running machine attached to its frontend.
pub struct Session<H: Host> {
    gb: GameBoy,
    host: H,
    store: Option<Box<dyn BatteryStore>>,
    pacer: Pacer,
    pacing: bool,
    input_cycles: u32,
    polls_since_flush: u32,
}

impl<H: Host> Session<H> {
    pub fn new(gb: GameBoy, mut host: H) -> Self {
        let pacer = Pacer::new(host.ticks_ms());
        Self {
            gb,
            host,
            store: None,
            pacer,
            pacing: true,
            input_cycles: 0,
            polls_since_flush: 0,
        }
    }

    /// Attach battery storage, restoring cartridge RAM from it.
    pub fn with_battery(mut self, mut store: Box<dyn BatteryStore>) -> Self {
        if let Some(cart) = self.gb.mmu.cart.as_mut() {
            save::restore(cart, store.as_mut());
        }
        self.store = Some(store);
        self
    }

    /// Disable to run as fast as the host allows.
    pub fn set_pacing(&mut self, enabled: bool) {
        self.pacing = enabled;
    }

    pub fn set_color_correction(&mut self, enabled: bool) {
        self.gb.mmu.ppu.set_color_correction(enabled);
    }

    pub fn gameboy(&self) -> &GameBoy {
        &self.gb
    }

    pub fn gameboy_mut(&mut self) -> &mut GameBoy {
        &mut self.gb
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Run [`BATCH_CYCLES`] worth of emulation, servicing the host along
    /// the way.
    pub fn run_batch(&mut self) -> Result<RunStatus, EmulationError> {
        let mut budget = BATCH_CYCLES as i64;
        while budget > 0 {
            let step = match self.gb.step() {
                Ok(step) => step,
                Err(e) => {
                    error!("{e}");
                    error!("{}", self.gb.cpu.debug_state());
                    return Err(e);
                }
            };

            for byte in self.gb.mmu.take_serial() {
                self.host.serial_byte(byte);
            }
            if step.frame_ready {
                self.host.frame_ready(self.gb.mmu.ppu.framebuffer());
            }

            if self.input_cycles > INPUT_POLL_CYCLES {
                self.input_cycles = 0;
                if self.poll_input() == RunStatus::Quit {
                    info!("Host requested quit");
                    return Ok(RunStatus::Quit);
                }
            } else {
                self.input_cycles += step.cycles;
            }

            if self.pacing {
                self.pacer.sync(step.cycles, &mut self.host);
            }

            budget -= step.cycles as i64;
        }
        Ok(RunStatus::Continue)
    }

    /// Run batches until the host quits or a fault occurs.
    pub fn run(&mut self) -> Result<(), EmulationError> {
        while self.run_batch()? == RunStatus::Continue {}
        Ok(())
    }

    fn poll_input(&mut self) -> RunStatus {
        self.polls_since_flush += 1;
        if self.polls_since_flush >= SAVE_FLUSH_POLLS {
            self.polls_since_flush = 0;
            self.flush_save();
        }

        let input = self.host.poll_input();
        if input.quit {
            return RunStatus::Quit;
        }
        if self.gb.mmu.input.update(input.buttons, &mut self.gb.mmu.if_reg) {
            self.gb.cpu.halted = false;
            self.gb.cpu.stopped = false;
        }
        RunStatus::Continue
    }

    /// Write battery RAM to the attached store if it changed.
    pub fn flush_save(&mut self) {
        if let (Some(cart), Some(store)) = (self.gb.mmu.cart.as_mut(), self.store.as_mut()) {
            save::flush(cart, store.as_mut());
        }
    }

    /// Flush battery RAM and hand back the machine and the host.
    pub fn shutdown(mut self) -> (GameBoy, H) {
        self.flush_save();
        (self.gb, self.host)
    }
}
