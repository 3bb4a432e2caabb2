//! Cycle-stepped Game Boy core: CPU, MMU with five bank controllers, PPU,
//! timer and joypad. Hosts drive it through [`GameBoy`].

pub mod cartridge;
pub mod cpu;
pub mod diagnostics;
pub mod gameboy;
pub mod instructions;
pub mod joypad;
pub mod mmu;
pub mod ppu;
pub mod register;
mod rtc;
mod timer;
mod wram;

pub use cartridge::{Cartridge, MbcKind};
pub use diagnostics::Event;
pub use gameboy::{Config, GameBoy};
pub use joypad::Key;
pub use ppu::{FRAME_CYCLES, SCREEN_HEIGHT, SCREEN_WIDTH};
