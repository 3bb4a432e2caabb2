use log::{debug, info};

use crate::cartridge::Cartridge;
use crate::diagnostics::{Diagnostics, Event};
use crate::joypad::{Joypad, Key};
use crate::ppu::Ppu;
use crate::timer::Timer;
use crate::wram::Wram;

pub const INT_VBLANK: u8 = 0x01;
pub const INT_LCD: u8 = 0x02;
pub const INT_TIMER: u8 = 0x04;
pub const INT_JOYPAD: u8 = 0x10;

const DMG_BOOT_SIZE: usize = 0x100;

/// 64 KiB address router. Owns every peripheral the CPU can reach and
/// gathers their interrupt requests into IF.
pub struct Mmu {
    pub cartridge: Cartridge,
    pub ppu: Ppu,
    timer: Timer,
    joypad: Joypad,
    wram: Wram,
    hram: [u8; 0x7f],
    io: [u8; 0x80],
    int_flag: u8,
    int_enable: u8,
    boot_rom: Option<Vec<u8>>,
    color: bool,
    diagnostics: Diagnostics,
}

impl Mmu {
    /// Builds the address space around a cartridge image.
    ///
    /// With a boot ROM the peripherals start from power-on state and the
    /// overlay stays mapped until the program leaves it; without one they
    /// start as the boot ROM would have left them.
    pub fn new(
        rom: Vec<u8>,
        color: bool,
        boot_rom: Option<Vec<u8>>,
        mut diagnostics: Diagnostics,
    ) -> Self {
        let cartridge = Cartridge::new(rom, &mut diagnostics);
        let booting = boot_rom.is_some();
        if booting {
            info!("Boot ROM mapped");
        }

        Mmu {
            cartridge,
            ppu: if booting {
                Ppu::new(color)
            } else {
                Ppu::post_boot(color)
            },
            timer: if booting {
                Timer::new()
            } else {
                Timer::post_boot()
            },
            joypad: Joypad::new(),
            wram: Wram::new(),
            hram: [0; 0x7f],
            io: [0; 0x80],
            int_flag: if booting { 0 } else { INT_VBLANK },
            int_enable: 0,
            boot_rom,
            color,
            diagnostics,
        }
    }

    pub fn is_booting(&self) -> bool {
        self.boot_rom.is_some()
    }

    fn boot_covers(boot: &[u8], addr: u16) -> bool {
        let addr = addr as usize;
        // Colour boot ROMs also overlay 0x200-0x8FF, leaving the header visible.
        addr < boot.len() && (addr < DMG_BOOT_SIZE || addr >= 0x200)
    }

    /// Unmaps the boot overlay for good once the program counter leaves it.
    pub(crate) fn observe_pc(&mut self, pc: u16) {
        let leaving = match &self.boot_rom {
            Some(boot) => !Self::boot_covers(boot, pc),
            None => false,
        };
        if leaving {
            self.disable_boot_rom();
        }
    }

    fn disable_boot_rom(&mut self) {
        if self.boot_rom.take().is_some() {
            info!("Boot ROM unmapped");
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn report(&mut self, event: Event) {
        self.diagnostics.report(event);
    }

    pub(crate) fn take_events(&mut self) -> Vec<Event> {
        self.diagnostics.take_events()
    }

    pub fn int_flag(&self) -> u8 {
        self.int_flag
    }

    pub fn int_enable(&self) -> u8 {
        self.int_enable
    }

    /// Interrupts both requested and enabled.
    pub(crate) fn pending_interrupts(&self) -> u8 {
        self.int_flag & self.int_enable & 0x1f
    }

    pub(crate) fn request_interrupt(&mut self, mask: u8) {
        self.int_flag |= mask & 0x1f;
    }

    pub(crate) fn clear_interrupt(&mut self, mask: u8) {
        self.int_flag &= !mask;
    }

    /// Advances the PPU and timer by `ticks` cycles.
    pub fn update(&mut self, ticks: u32) {
        let irq = self.ppu.update(ticks) | self.timer.update(ticks);
        self.request_interrupt(irq);
    }

    pub fn key_down(&mut self, key: Key) {
        let irq = self.joypad.keydown(key);
        self.request_interrupt(irq);
    }

    pub fn key_up(&mut self, key: Key) {
        self.joypad.keyup(key);
    }

    /// Copies 160 bytes from `value << 8` into OAM.
    fn dma(&mut self, value: u8) {
        let src = (value as u16) << 8;
        debug!("OAM DMA from 0x{:04x}", src);
        for i in 0..0xa0 {
            let byte = self.read_byte(src.wrapping_add(i));
            self.write_byte(0xfe00 + i, byte);
        }
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x08ff => match &self.boot_rom {
                Some(boot) if Self::boot_covers(boot, addr) => boot[addr as usize],
                _ => self.cartridge.read(addr),
            },
            0x0900..=0x7fff => self.cartridge.read(addr),
            0x8000..=0x9fff => self.ppu.read(addr),
            0xa000..=0xbfff => self.cartridge.read(addr),
            0xc000..=0xfdff => self.wram.read_byte(addr),
            0xfe00..=0xfe9f => self.ppu.read(addr),
            0xfea0..=0xfeff => 0xff,
            0xff00 => self.joypad.read(),
            0xff04..=0xff07 => self.timer.read(addr),
            0xff0f => self.int_flag | 0xe0,
            0xff40..=0xff4b | 0xff4f | 0xff68..=0xff6b => self.ppu.read(addr),
            0xff50 => 0xff,
            0xff70 if self.color => 0xf8 | self.wram.bank_index(),
            0xff70 => 0xff,
            0xff01..=0xff7f => self.io[(addr & 0x7f) as usize],
            0xff80..=0xfffe => self.hram[(addr & 0x7f) as usize],
            0xffff => self.int_enable,
        }
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x7fff => self.cartridge.write(addr, value, &mut self.diagnostics),
            0x8000..=0x9fff => {
                let irq = self.ppu.write(addr, value);
                self.request_interrupt(irq);
            }
            0xa000..=0xbfff => self.cartridge.write(addr, value, &mut self.diagnostics),
            0xc000..=0xfdff => self.wram.write_byte(addr, value),
            0xfe00..=0xfe9f => {
                self.ppu.write(addr, value);
            }
            0xfea0..=0xfeff => (),
            0xff00 => self.joypad.write(value),
            0xff04..=0xff07 => self.timer.write(addr, value),
            0xff0f => self.int_flag = value & 0x1f,
            0xff46 => self.dma(value),
            0xff40..=0xff4b | 0xff4f | 0xff68..=0xff6b => {
                let irq = self.ppu.write(addr, value);
                self.request_interrupt(irq);
            }
            0xff50 => {
                if value != 0 {
                    self.disable_boot_rom();
                }
            }
            0xff70 => {
                if self.color {
                    self.wram.set_bank_index(value);
                }
            }
            0xff01..=0xff7f => self.io[(addr & 0x7f) as usize] = value,
            0xff80..=0xfffe => self.hram[(addr & 0x7f) as usize] = value,
            0xffff => self.int_enable = value,
        }
    }

    /// Little-endian 16-bit read.
    pub fn read_word(&self, addr: u16) -> u16 {
        let low = self.read_byte(addr) as u16;
        let high = self.read_byte(addr.wrapping_add(1)) as u16;
        high << 8 | low
    }

    pub fn write_word(&mut self, addr: u16, value: u16) {
        self.write_byte(addr, value as u8);
        self.write_byte(addr.wrapping_add(1), (value >> 8) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn rom(kind: u8) -> Vec<u8> {
        let mut rom = vec![0; 0x8000 * 4];
        rom[0x147] = kind;
        for bank in 0..rom.len() / 0x4000 {
            rom[bank * 0x4000 + 0x100] = bank as u8;
        }
        rom
    }

    fn mmu(kind: u8) -> Mmu {
        Mmu::new(rom(kind), false, None, Diagnostics::new(16))
    }

    #[test]
    fn interrupt_flag_keeps_five_bits() {
        init();
        let mut mmu = mmu(0x00);
        mmu.write_byte(0xff0f, 0xff);
        assert_eq!(mmu.int_flag(), 0x1f);
        assert_eq!(mmu.read_byte(0xff0f), 0xff);
        mmu.write_byte(0xff0f, 0x04);
        assert_eq!(mmu.read_byte(0xff0f), 0xe4);

        mmu.write_byte(0xffff, 0x15);
        assert_eq!(mmu.read_byte(0xffff), 0x15);
        assert_eq!(mmu.pending_interrupts(), 0x04);
    }

    #[test]
    fn work_ram_is_echoed() {
        init();
        let mut mmu = mmu(0x00);
        mmu.write_byte(0xc010, 0x5a);
        assert_eq!(mmu.read_byte(0xe010), 0x5a);
        mmu.write_byte(0xfdff, 0xa5);
        assert_eq!(mmu.read_byte(0xddff), 0xa5);
    }

    #[test]
    fn high_ram_and_unusable_area() {
        init();
        let mut mmu = mmu(0x00);
        mmu.write_byte(0xff80, 1);
        mmu.write_byte(0xfffe, 2);
        assert_eq!(mmu.read_byte(0xff80), 1);
        assert_eq!(mmu.read_byte(0xfffe), 2);

        mmu.write_byte(0xfea0, 3);
        assert_eq!(mmu.read_byte(0xfea0), 0xff);
    }

    #[test]
    fn rom_writes_only_switch_banks() {
        init();
        let mut mmu = mmu(0x01);
        assert_eq!(mmu.read_byte(0x4100), 1);
        mmu.write_byte(0x2000, 3);
        assert_eq!(mmu.read_byte(0x4100), 3);
        assert_eq!(mmu.read_byte(0x2000), 0);
        assert_eq!(mmu.read_byte(0x0100), 0);
    }

    #[test]
    fn dma_copies_into_oam() {
        init();
        let mut mmu = mmu(0x00);
        for i in 0..0xa0 {
            mmu.write_byte(0xc100 + i, i as u8 ^ 0x55);
        }
        mmu.write_byte(0xff46, 0xc1);
        for i in 0..0xa0 {
            assert_eq!(mmu.read_byte(0xfe00 + i), i as u8 ^ 0x55);
        }
    }

    #[test]
    fn boot_overlay_until_pc_leaves() {
        init();
        let mut mmu = Mmu::new(rom(0x00), false, Some(vec![0xaa; 0x100]), Diagnostics::new(16));
        assert!(mmu.is_booting());
        assert_eq!(mmu.read_byte(0x0000), 0xaa);
        assert_eq!(mmu.read_byte(0x0100), 0);

        mmu.observe_pc(0x00fe);
        assert!(mmu.is_booting());
        mmu.observe_pc(0x0100);
        assert!(!mmu.is_booting());
        assert_eq!(mmu.read_byte(0x0000), 0);

        mmu.observe_pc(0x0000);
        assert_eq!(mmu.read_byte(0x0000), 0);
    }

    #[test]
    fn color_boot_overlay_skips_the_header() {
        init();
        let mut cart = rom(0x00);
        cart[0x0150] = 0x11;
        cart[0x0200] = 0x22;
        cart[0x0900] = 0x33;
        let mut mmu = Mmu::new(cart, true, Some(vec![0xbb; 0x900]), Diagnostics::new(16));

        assert_eq!(mmu.read_byte(0x0000), 0xbb);
        assert_eq!(mmu.read_byte(0x00ff), 0xbb);
        assert_eq!(mmu.read_byte(0x0100), 0x00);
        assert_eq!(mmu.read_byte(0x0150), 0x11);
        assert_eq!(mmu.read_byte(0x0200), 0xbb);
        assert_eq!(mmu.read_byte(0x08ff), 0xbb);
        assert_eq!(mmu.read_byte(0x0900), 0x33);

        mmu.observe_pc(0x0200);
        mmu.observe_pc(0x08ff);
        assert!(mmu.is_booting());
        mmu.observe_pc(0x0150);
        assert!(!mmu.is_booting());
        assert_eq!(mmu.read_byte(0x0200), 0x22);
    }

    #[test]
    fn ff50_unmaps_boot_overlay() {
        init();
        let mut mmu = Mmu::new(rom(0x00), false, Some(vec![0xaa; 0x100]), Diagnostics::new(16));
        mmu.write_byte(0xff50, 0);
        assert!(mmu.is_booting());
        mmu.write_byte(0xff50, 1);
        assert!(!mmu.is_booting());
    }

    #[test]
    fn power_on_state_has_lcd_off() {
        init();
        let mmu = Mmu::new(rom(0x00), false, Some(vec![0; 0x100]), Diagnostics::new(16));
        assert_eq!(mmu.read_byte(0xff40), 0x00);
        assert_eq!(mmu.read_byte(0xff0f), 0xe0);

        let mmu = mmu_post_boot();
        assert_eq!(mmu.read_byte(0xff40), 0x91);
        assert_eq!(mmu.read_byte(0xff47), 0xfc);
        assert_eq!(mmu.read_byte(0xff0f), 0xe1);
    }

    fn mmu_post_boot() -> Mmu {
        mmu(0x00)
    }

    #[test]
    fn work_ram_banks_only_in_color_mode() {
        init();
        let mut mmu = Mmu::new(rom(0x00), true, None, Diagnostics::new(16));
        mmu.write_byte(0xd000, 1);
        mmu.write_byte(0xff70, 2);
        assert_eq!(mmu.read_byte(0xff70), 0xfa);
        assert_eq!(mmu.read_byte(0xd000), 0);
        mmu.write_byte(0xff70, 0);
        assert_eq!(mmu.read_byte(0xd000), 1);

        let mut mmu = mmu_post_boot();
        mmu.write_byte(0xd000, 1);
        mmu.write_byte(0xff70, 2);
        assert_eq!(mmu.read_byte(0xff70), 0xff);
        assert_eq!(mmu.read_byte(0xd000), 1);
    }

    #[test]
    fn peripherals_raise_interrupt_flags() {
        init();
        let mut mmu = mmu(0x00);
        mmu.write_byte(0xff0f, 0);

        mmu.write_byte(0xff06, 0x10);
        mmu.write_byte(0xff05, 0xff);
        mmu.write_byte(0xff07, 0x05);
        mmu.update(16);
        assert_eq!(mmu.int_flag() & INT_TIMER, INT_TIMER);
        assert_eq!(mmu.read_byte(0xff05), 0x10);

        mmu.key_down(Key::Start);
        assert_eq!(mmu.int_flag() & INT_JOYPAD, INT_JOYPAD);
        mmu.write_byte(0xff00, 0x10);
        assert_eq!(mmu.read_byte(0xff00), 0xd7);
        mmu.key_up(Key::Start);
        assert_eq!(mmu.read_byte(0xff00), 0xdf);
        assert_eq!(mmu.int_flag() & INT_JOYPAD, INT_JOYPAD);
    }

    #[test]
    fn vblank_reaches_interrupt_flag() {
        init();
        let mut mmu = mmu(0x00);
        mmu.write_byte(0xff0f, 0);
        mmu.update(456 * 144);
        assert_eq!(mmu.int_flag() & INT_VBLANK, INT_VBLANK);
    }

    #[test]
    fn unsupported_cartridge_is_reported() {
        init();
        let mut mmu = mmu(0xfc);
        assert_eq!(
            mmu.take_events(),
            vec![Event::UnsupportedCartridge { code: 0xfc }]
        );
        assert_eq!(mmu.read_byte(0x4100), 1);
    }

    #[test]
    fn words_are_little_endian() {
        init();
        let mut mmu = mmu(0x00);
        mmu.write_word(0xc000, 0x1234);
        assert_eq!(mmu.read_byte(0xc000), 0x34);
        assert_eq!(mmu.read_word(0xc000), 0x1234);
    }
}
