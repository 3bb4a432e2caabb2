use log::info;

use crate::cartridge::Cartridge;
use crate::cpu::Cpu;
use crate::diagnostics::{Diagnostics, Event};
use crate::joypad::Key;
use crate::mmu::Mmu;
use crate::ppu::FRAME_CYCLES;
use crate::register::Registers;

/// Configuration of the emulator.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) color: bool,
    pub(crate) boot_rom: Option<Vec<u8>>,
    pub(crate) diagnostic_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self {
            color: false,
            boot_rom: None,
            diagnostic_capacity: 256,
        }
    }

    /// Set the flag to enable Gameboy Color.
    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Map a boot ROM at 0x0000 and start from power-on state.
    pub fn boot_rom(mut self, boot_rom: Vec<u8>) -> Self {
        self.boot_rom = Some(boot_rom);
        self
    }

    /// Set how many diagnostic events are kept.
    pub fn diagnostic_capacity(mut self, capacity: usize) -> Self {
        self.diagnostic_capacity = capacity;
        self
    }
}

/// CPU, memory and peripherals stepped together.
pub struct GameBoy {
    pub cpu: Cpu,
}

impl GameBoy {
    pub fn new(cfg: Config, rom: Vec<u8>) -> Self {
        info!("Initializing...");

        let regs = match (&cfg.boot_rom, cfg.color) {
            (Some(_), _) => Registers::default(),
            (None, false) => Registers::post_boot(),
            (None, true) => Registers::post_boot_color(),
        };
        let diagnostics = Diagnostics::new(cfg.diagnostic_capacity);
        let mmu = Mmu::new(rom, cfg.color, cfg.boot_rom, diagnostics);

        GameBoy {
            cpu: Cpu::new(mmu, regs),
        }
    }

    /// Runs one instruction, advances the peripherals by its cost and then
    /// services a pending interrupt. Returns the cycles consumed.
    pub fn step(&mut self) -> u32 {
        let mut cycles = self.cpu.step();
        self.cpu.mmu.update(cycles);

        let service = self.cpu.handle_interrupts();
        if service > 0 {
            self.cpu.mmu.update(service);
            cycles += service;
        }
        cycles
    }

    /// Steps until a whole frame's worth of cycles has elapsed.
    pub fn run_frame(&mut self) -> u32 {
        let mut elapsed_tick = 0;
        while elapsed_tick < FRAME_CYCLES {
            elapsed_tick += self.step();
        }
        elapsed_tick
    }

    pub fn pc(&self) -> u16 {
        self.cpu.regs.pc
    }

    pub fn dump_registers(&self) -> String {
        self.cpu.regs.to_string()
    }

    pub fn next_instruction(&self) -> String {
        self.cpu.next_instruction()
    }

    /// RGBA pixels of the last rendered frame.
    pub fn framebuffer(&self) -> &[u8] {
        self.cpu.mmu.ppu.get_frame()
    }

    pub fn key_down(&mut self, key: Key) {
        self.cpu.mmu.key_down(key);
    }

    pub fn key_up(&mut self, key: Key) {
        self.cpu.mmu.key_up(key);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.cpu.mmu.take_events()
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cpu.mmu.cartridge
    }

    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cpu.mmu.cartridge
    }
}
