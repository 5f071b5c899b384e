use crate::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

/// Joypad buttons, with their bit in [`InputState::buttons`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Button {
    Right = 0x01,
    Left = 0x02,
    Up = 0x04,
    Down = 0x08,
    A = 0x10,
    B = 0x20,
    Select = 0x40,
    Start = 0x80,
}

/// Snapshot of the frontend's input, returned from [`Host::poll_input`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputState {
    /// Pressed buttons as a bitmask of [`Button`] values (1 = pressed).
    pub buttons: u8,
    /// Stop the session at the end of the current poll.
    pub quit: bool,
}

impl InputState {
    pub fn pressed(buttons: &[Button]) -> Self {
        Self {
            buttons: buttons.iter().fold(0, |acc, b| acc | *b as u8),
            quit: false,
        }
    }

    pub fn quit() -> Self {
        Self {
            buttons: 0,
            quit: true,
        }
    }

    #[inline]
    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons & button as u8 != 0
    }
}

/// Size in bytes of the RGBA frame handed to [`Host::frame_ready`].
pub const FRAME_BYTES: usize = SCREEN_WIDTH * SCREEN_HEIGHT * 4;

/// Services a running [`crate::Session`] needs from its frontend.
pub trait Host {
    /// Return the current button state and whether to stop the session.
    fn poll_input(&mut self) -> InputState;

    /// Monotonic milliseconds used to pace emulation against real time.
    fn ticks_ms(&mut self) -> u64;

    /// Block for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u64);

    /// Called once per frame with a 160x144 RGBA8 image.
    fn frame_ready(&mut self, frame: &[u8]);

    /// Called for every byte the game writes to the serial data register.
    fn serial_byte(&mut self, _byte: u8) {}
}
