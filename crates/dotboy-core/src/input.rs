use crate::interrupts::{self, Interrupt};

/// P1/JOYP register.
///
/// Bits 4 and 5 select the direction and action groups (0 = selected); the
/// low nibble reads 0 for each pressed button of the selected groups.
/// See gbdev.io/pandocs/Joypad_Input.html
pub struct Input {
    select: u8,
    /// Pressed buttons, laid out as [`crate::host::Button`] bits.
    pressed: u8,
}

impl Input {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            pressed: 0,
        }
    }

    pub fn read(&self) -> u8 {
        let mut low = 0x0F;
        if self.select & 0x10 == 0 {
            low &= !(self.pressed & 0x0F);
        }
        if self.select & 0x20 == 0 {
            low &= !(self.pressed >> 4);
        }
        0xC0 | self.select | low
    }

    pub fn write(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    /// Replace the pressed-button snapshot. Returns `true` and requests the
    /// joypad interrupt when a button was newly pressed.
    pub fn update(&mut self, pressed: u8, if_reg: &mut u8) -> bool {
        let newly_pressed = pressed & !self.pressed;
        self.pressed = pressed;
        if newly_pressed != 0 {
            interrupts::request(if_reg, Interrupt::Joypad);
            true
        } else {
            false
        }
    }

    pub fn pressed(&self) -> u8 {
        self.pressed
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}
