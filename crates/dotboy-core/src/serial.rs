use crate::interrupts::{self, Interrupt};

/// CPU cycles to shift out one byte on the internal 8192 Hz clock.
const TRANSFER_CYCLES: u32 = 4096;
/// CGB high-speed clock (SC bit 1) runs 32 times faster.
const FAST_TRANSFER_CYCLES: u32 = TRANSFER_CYCLES / 32;

/// Serial registers with no cable attached.
///
/// Every byte written to SB is captured for the host so test ROMs that print
/// through the link port can be observed. Transfers started on the internal
/// clock complete after one byte time, shifting in 0xFF and raising the
/// serial interrupt.
pub struct Serial {
    sb: u8,
    sc: u8,
    pub(crate) out_buf: Vec<u8>,
    /// Remaining cycles of the transfer in flight.
    remaining: Option<u32>,
    cgb_mode: bool,
}

impl Serial {
    pub fn new(cgb_mode: bool) -> Self {
        Self {
            sb: 0,
            sc: if cgb_mode { 0x7F } else { 0x7E },
            out_buf: Vec::new(),
            remaining: None,
            cgb_mode,
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => {
                if self.cgb_mode {
                    self.sc | 0x7C
                } else {
                    self.sc | 0x7E
                }
            }
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF01 => {
                self.sb = val;
                self.out_buf.push(val);
            }
            0xFF02 => {
                self.sc = val;
                let internal_clock = val & 0x01 != 0;
                self.remaining = if val & 0x80 != 0 && internal_clock {
                    if self.cgb_mode && val & 0x02 != 0 {
                        Some(FAST_TRANSFER_CYCLES)
                    } else {
                        Some(TRANSFER_CYCLES)
                    }
                } else {
                    None
                };
            }
            _ => {}
        }
    }

    /// Advance an in-flight transfer by `cycles` CPU cycles.
    pub fn step(&mut self, cycles: u32, if_reg: &mut u8) {
        let Some(remaining) = self.remaining else {
            return;
        };
        if remaining > cycles {
            self.remaining = Some(remaining - cycles);
            return;
        }
        self.remaining = None;
        self.sb = 0xFF;
        self.sc &= 0x7F;
        interrupts::request(if_reg, Interrupt::Serial);
    }

    /// Drain the bytes written to SB since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}
