use crate::interrupts::{self, Interrupt};

/// CPU cycles per DIV increment (16384 Hz at normal speed).
const DIV_PERIOD: u32 = 256;

/// TIMA periods in CPU cycles, indexed by TAC bits 0-1.
/// See gbdev.io/pandocs/Timer_and_Divider_Registers.html
const TIMA_PERIODS: [u32; 4] = [1024, 16, 64, 256];

const TAC_ENABLE: u8 = 0x04;

pub struct Timer {
    /// Divider register
    pub div: u8,
    /// Timer counter
    pub tima: u8,
    /// Timer modulo
    pub tma: u8,
    /// Timer control
    pub tac: u8,
    div_counter: u32,
    tima_counter: u32,
    /// Period the TIMA sub-counter was last accumulating against.
    last_period: u32,
    /// Set by a DIV write; consumed on the next advance.
    reset_requested: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            div: 0,
            tima: 0,
            tma: 0,
            tac: 0,
            div_counter: 0,
            tima_counter: 0,
            last_period: TIMA_PERIODS[0],
            reset_requested: false,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => self.div,
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF04 => self.reset_div(),
            0xFF05 => self.tima = val,
            0xFF06 => self.tma = val,
            0xFF07 => self.tac = val & 0x07,
            _ => {}
        }
    }

    /// Zero DIV and ask for both sub-counters to restart on the next advance.
    pub fn reset_div(&mut self) {
        self.div = 0;
        self.reset_requested = true;
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.tac & TAC_ENABLE != 0
    }

    /// Selected TIMA period in CPU cycles.
    #[inline]
    pub fn period(&self) -> u32 {
        TIMA_PERIODS[(self.tac & 0x03) as usize]
    }

    /// Advance the divider and counter by `cycles` CPU cycles, requesting the
    /// timer interrupt in `if_reg` on each TIMA overflow.
    pub fn advance(&mut self, cycles: u32, if_reg: &mut u8) {
        if self.reset_requested {
            self.reset_requested = false;
            self.div_counter = 0;
            self.tima_counter = 0;
        }

        self.div_counter += cycles;
        while self.div_counter >= DIV_PERIOD {
            self.div_counter -= DIV_PERIOD;
            self.div = self.div.wrapping_add(1);
        }

        if !self.enabled() {
            return;
        }

        let period = self.period();
        if period != self.last_period {
            self.last_period = period;
            self.tima_counter = 0;
        }

        self.tima_counter += cycles;
        while self.tima_counter >= period {
            self.tima_counter -= period;
            let (next, overflow) = self.tima.overflowing_add(1);
            if overflow {
                self.tima = self.tma;
                interrupts::request(if_reg, Interrupt::Timer);
            } else {
                self.tima = next;
            }
        }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
