//! Game Boy / Game Boy Color emulation core.
//!
//! This crate contains the platform-agnostic emulator logic (CPU/MMU/PPU/timer).
//! Frontends implement [`host::Host`] and drive the core through
//! [`session::Session`].

/// Cartridge header parsing, bank controllers (MBC) and the MBC3 clock.
pub mod cartridge;

/// SM83 CPU core.
pub mod cpu;

/// Machine that wires the CPU and MMU together.
pub mod gameboy;

/// Hardware models.
pub mod hardware;

/// Callbacks a frontend provides to a running session.
pub mod host;

/// ROM and boot ROM loading from disk.
pub mod loader;

/// Joypad register and edge-triggered interrupt behavior.
pub mod input;

/// Interrupt sources, priorities and vectors.
pub mod interrupts;

/// Memory map and hardware plumbing.
pub mod mmu;

/// Pixel Processing Unit (PPU) emulation.
pub mod ppu;

/// Battery-backed RAM and clock persistence.
pub mod save;

/// Serial port byte sink.
pub mod serial;

/// Fixed-budget run loop.
pub mod session;

/// Divider/timer unit.
pub mod timer;

pub use cartridge::{Cartridge, CartridgeError};
pub use gameboy::GameBoy;
pub use hardware::Model;
pub use host::{Button, Host, InputState};
pub use loader::{LoadError, load_boot_rom, load_rom};
pub use save::{BatteryStore, FileStore, MemoryStore};
pub use session::{EmulationError, RunStatus, Session};
