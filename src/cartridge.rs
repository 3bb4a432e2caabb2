use log::{info, warn};

use crate::diagnostics::{Diagnostics, Event};
use crate::rtc::Rtc;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;
const MIN_ROM_SIZE: usize = 2 * ROM_BANK_SIZE;
const MBC2_RAM_SIZE: usize = 0x200;

/// Memory bank controllers understood by the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MbcKind {
    RomOnly,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BankingMode {
    Rom,
    Ram,
}

pub struct Cartridge {
    rom: Vec<u8>,
    ram: Vec<u8>,
    kind: MbcKind,
    title: String,
    battery: bool,
    rom_bank: u16,
    ram_bank: u8,
    ram_enable: bool,
    banking_mode: BankingMode,
    rtc: Option<Rtc>,
    rtc_select: Option<u8>,
}

/// Decodes the type byte at 0x147 into (controller, battery, clock).
fn decode_type(code: u8) -> Option<(MbcKind, bool, bool)> {
    let decoded = match code {
        0x00 | 0x08 => (MbcKind::RomOnly, false, false),
        0x09 => (MbcKind::RomOnly, true, false),
        0x01 | 0x02 => (MbcKind::Mbc1, false, false),
        0x03 => (MbcKind::Mbc1, true, false),
        0x05 => (MbcKind::Mbc2, false, false),
        0x06 => (MbcKind::Mbc2, true, false),
        0x0f | 0x10 => (MbcKind::Mbc3, true, true),
        0x11 | 0x12 => (MbcKind::Mbc3, false, false),
        0x13 => (MbcKind::Mbc3, true, false),
        0x19 | 0x1a | 0x1c | 0x1d => (MbcKind::Mbc5, false, false),
        0x1b | 0x1e => (MbcKind::Mbc5, true, false),
        _ => return None,
    };
    Some(decoded)
}

fn ram_size(code: u8) -> usize {
    match code {
        0x01 => 2 * 1024, // Listed in various unofficial docs as 2KB
        0x02 => 8 * 1024,
        0x03 => 32 * 1024,
        0x04 => 128 * 1024,
        0x05 => 64 * 1024,
        _ => 0,
    }
}

impl Cartridge {
    pub fn new(mut rom: Vec<u8>, diagnostics: &mut Diagnostics) -> Self {
        if rom.len() < MIN_ROM_SIZE {
            diagnostics.report(Event::ShortRom { len: rom.len() });
            rom.resize(MIN_ROM_SIZE, 0xff);
        }

        let title = rom[0x134..=0x143]
            .iter()
            .take_while(|&&s| s != 0)
            .map(|&s| s as char)
            .collect::<String>();

        info!("ROM title: {}", title);

        let code = rom[0x147];
        let (kind, battery, clock) = match decode_type(code) {
            Some(decoded) => decoded,
            None => {
                diagnostics.report(Event::UnsupportedCartridge { code });
                (MbcKind::RomOnly, false, false)
            }
        };

        let ram_len = match kind {
            MbcKind::Mbc2 => MBC2_RAM_SIZE,
            _ => ram_size(rom[0x149]),
        };

        let mut checksum: u8 = 0;
        for &byte in &rom[0x134..=0x14c] {
            checksum = checksum.wrapping_sub(byte).wrapping_sub(1);
        }
        if checksum != rom[0x14d] {
            warn!(
                "Header checksum mismatch: expected 0x{:02x}, computed 0x{:02x}",
                rom[0x14d], checksum
            );
        }

        info!("ROM size: {}KB", rom.len() / 1024);
        info!("RAM size: {}B", ram_len);
        info!("MBC type: {:?} (0x{:02x})", kind, code);

        Cartridge {
            rom,
            ram: vec![0; ram_len],
            kind,
            title,
            battery,
            rom_bank: 1,
            ram_bank: 0,
            ram_enable: false,
            banking_mode: BankingMode::Rom,
            rtc: if clock { Some(Rtc::new()) } else { None },
            rtc_select: None,
        }
    }

    pub fn kind(&self) -> MbcKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn has_battery(&self) -> bool {
        self.battery
    }

    /// Bank currently mapped at 0x4000-0x7FFF.
    pub fn rom_bank(&self) -> u16 {
        self.rom_bank
    }

    pub fn ram_bank(&self) -> u8 {
        self.ram_bank
    }

    pub fn is_ram_enabled(&self) -> bool {
        self.ram_enable
    }

    /// External RAM contents, for hosts persisting battery-backed saves.
    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn load_ram(&mut self, data: &[u8]) {
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
    }

    fn ram_accessible(&self) -> bool {
        self.kind == MbcKind::RomOnly || self.ram_enable
    }

    fn ram_offset(&self, addr: u16) -> Option<usize> {
        if self.ram.is_empty() {
            return None;
        }
        let offset = match self.kind {
            MbcKind::Mbc2 => (addr & 0x01ff) as usize,
            _ => self.ram_bank as usize * RAM_BANK_SIZE + (addr - 0xa000) as usize,
        };
        Some(offset % self.ram.len())
    }

    pub(crate) fn read(&self, addr: u16) -> u8 {
        match addr {
            // ROM bank 00
            0x0000..=0x3fff => self.rom[addr as usize],
            // Switchable ROM bank
            0x4000..=0x7fff => {
                let offset = ROM_BANK_SIZE * self.rom_bank as usize;
                self.rom[((addr & 0x3fff) as usize + offset) % self.rom.len()]
            }
            0xa000..=0xbfff => self.read_ram(addr),
            _ => 0xff,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_accessible() {
            return 0xff;
        }

        if let Some(reg) = self.rtc_select {
            return match &self.rtc {
                Some(rtc) => rtc.read(reg),
                None => 0xff,
            };
        }

        match self.ram_offset(addr) {
            Some(offset) if self.kind == MbcKind::Mbc2 => self.ram[offset] | 0xf0,
            Some(offset) => self.ram[offset],
            None => 0xff,
        }
    }

    pub(crate) fn write(&mut self, addr: u16, value: u8, diagnostics: &mut Diagnostics) {
        match addr {
            0x0000..=0x7fff => match self.kind {
                MbcKind::RomOnly => (),
                MbcKind::Mbc1 => self.write_mbc1(addr, value, diagnostics),
                MbcKind::Mbc2 => self.write_mbc2(addr, value, diagnostics),
                MbcKind::Mbc3 => self.write_mbc3(addr, value, diagnostics),
                MbcKind::Mbc5 => self.write_mbc5(addr, value),
            },
            0xa000..=0xbfff => self.write_ram(addr, value),
            _ => (),
        }
    }

    fn write_ram(&mut self, addr: u16, value: u8) {
        if !self.ram_accessible() {
            return;
        }

        if let Some(reg) = self.rtc_select {
            if let Some(rtc) = self.rtc.as_mut() {
                rtc.write(reg, value);
            }
            return;
        }

        match self.ram_offset(addr) {
            Some(offset) if self.kind == MbcKind::Mbc2 => self.ram[offset] = value & 0x0f,
            Some(offset) => self.ram[offset] = value,
            None => (),
        }
    }

    fn set_ram_enable(&mut self, value: u8) {
        self.ram_enable = value & 0x0f == 0x0a;
    }

    /// Bank 0 cannot be mapped into the switchable window.
    fn coerce_bank(requested: u16, diagnostics: &mut Diagnostics) -> u16 {
        if requested == 0 {
            diagnostics.report(Event::BankCoerced {
                requested,
                effective: 1,
            });
            1
        } else {
            requested
        }
    }

    fn write_mbc1(&mut self, addr: u16, value: u8, diagnostics: &mut Diagnostics) {
        match addr {
            0x0000..=0x1fff => self.set_ram_enable(value),
            0x2000..=0x3fff => {
                let low = Self::coerce_bank((value & 0x1f) as u16, diagnostics);
                self.rom_bank = (self.rom_bank & 0x60) | low;
            }
            0x4000..=0x5fff => match self.banking_mode {
                BankingMode::Rom => {
                    self.rom_bank = (self.rom_bank & 0x1f) | ((value as u16 & 0x03) << 5);
                }
                BankingMode::Ram => self.ram_bank = value & 0x03,
            },
            _ => {
                if value & 0x01 == 0 {
                    self.banking_mode = BankingMode::Rom;
                    self.ram_bank = 0;
                } else {
                    self.banking_mode = BankingMode::Ram;
                }
            }
        }
    }

    fn write_mbc2(&mut self, addr: u16, value: u8, diagnostics: &mut Diagnostics) {
        if addr >= 0x4000 {
            return;
        }
        if addr & 0x0100 == 0 {
            self.set_ram_enable(value);
        } else {
            self.rom_bank = Self::coerce_bank((value & 0x0f) as u16, diagnostics);
        }
    }

    fn write_mbc3(&mut self, addr: u16, value: u8, diagnostics: &mut Diagnostics) {
        match addr {
            0x0000..=0x1fff => self.set_ram_enable(value),
            0x2000..=0x3fff => {
                self.rom_bank = Self::coerce_bank((value & 0x7f) as u16, diagnostics);
            }
            0x4000..=0x5fff => match value {
                0x00..=0x07 => {
                    self.rtc_select = None;
                    self.ram_bank = value & 0x07;
                }
                0x08..=0x0c => self.rtc_select = Some(value),
                _ => (),
            },
            _ => {
                if let Some(rtc) = self.rtc.as_mut() {
                    rtc.write_latch(value);
                }
            }
        }
    }

    fn write_mbc5(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1fff => self.set_ram_enable(value),
            0x2000..=0x2fff => self.rom_bank = (self.rom_bank & 0x100) | value as u16,
            0x3000..=0x3fff => {
                self.rom_bank = (self.rom_bank & 0xff) | ((value as u16 & 0x01) << 8);
            }
            0x4000..=0x5fff => self.ram_bank = value & 0x0f,
            _ => (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    /// Builds a ROM where every byte of bank `n` holds `n`.
    fn banked_rom(code: u8, banks: usize, ram_code: u8) -> Vec<u8> {
        let mut rom = Vec::with_capacity(banks * ROM_BANK_SIZE);
        for bank in 0..banks {
            rom.extend(std::iter::repeat(bank as u8).take(ROM_BANK_SIZE));
        }
        rom[0x147] = code;
        rom[0x149] = ram_code;
        rom
    }

    fn cartridge(code: u8, banks: usize, ram_code: u8) -> (Cartridge, Diagnostics) {
        init();
        let mut diag = Diagnostics::default();
        let cart = Cartridge::new(banked_rom(code, banks, ram_code), &mut diag);
        (cart, diag)
    }

    #[test]
    fn rom_only_ignores_bank_writes() {
        let (mut cart, mut diag) = cartridge(0x00, 2, 0);
        assert_eq!(cart.kind(), MbcKind::RomOnly);
        cart.write(0x2000, 0x05, &mut diag);
        assert_eq!(cart.rom_bank(), 1);
        assert_eq!(cart.read(0x4000), 1);
    }

    #[test]
    fn mbc1_zero_bank_is_coerced_to_one() {
        let (mut cart, mut diag) = cartridge(0x01, 8, 0);
        cart.write(0x2000, 0x03, &mut diag);
        assert_eq!(cart.read(0x4000), 3);

        cart.write(0x2000, 0x00, &mut diag);
        assert_eq!(cart.rom_bank(), 1);
        assert_eq!(cart.read(0x4000), 1);
        assert_eq!(
            diag.take_events(),
            vec![Event::BankCoerced {
                requested: 0,
                effective: 1
            }]
        );
    }

    #[test]
    fn mbc1_low_bits_are_masked() {
        let (mut cart, mut diag) = cartridge(0x01, 64, 0);
        cart.write(0x2000, 0xff, &mut diag);
        assert_eq!(cart.rom_bank(), 0x1f);
        assert_eq!(cart.read(0x4000), 0x1f);
        assert_eq!(diag.total(), 0);
    }

    #[test]
    fn mbc1_upper_bits_follow_banking_mode() {
        let (mut cart, mut diag) = cartridge(0x03, 128, 0x03);
        cart.write(0x2000, 0x02, &mut diag);
        cart.write(0x4000, 0x01, &mut diag);
        assert_eq!(cart.rom_bank(), 0x22);
        assert_eq!(cart.read(0x4000), 0x22);

        cart.write(0x6000, 0x01, &mut diag);
        cart.write(0x4000, 0x02, &mut diag);
        assert_eq!(cart.rom_bank(), 0x22);
        assert_eq!(cart.ram_bank(), 2);

        cart.write(0x6000, 0x00, &mut diag);
        assert_eq!(cart.ram_bank(), 0);
    }

    #[test]
    fn external_ram_is_gated_by_enable() {
        let (mut cart, mut diag) = cartridge(0x03, 4, 0x03);
        cart.write(0xa000, 0x12, &mut diag);
        assert_eq!(cart.read(0xa000), 0xff);

        cart.write(0x0000, 0x0a, &mut diag);
        cart.write(0xa000, 0x12, &mut diag);
        assert_eq!(cart.read(0xa000), 0x12);

        cart.write(0x6000, 0x01, &mut diag);
        cart.write(0x4000, 0x01, &mut diag);
        assert_eq!(cart.read(0xa000), 0x00);
        cart.write(0xa000, 0x34, &mut diag);

        cart.write(0x4000, 0x00, &mut diag);
        assert_eq!(cart.read(0xa000), 0x12);

        cart.write(0x0000, 0x00, &mut diag);
        assert_eq!(cart.read(0xa000), 0xff);
        assert_eq!(cart.ram()[RAM_BANK_SIZE], 0x34);
    }

    #[test]
    fn mbc2_uses_address_bit_8_and_nibble_ram() {
        let (mut cart, mut diag) = cartridge(0x06, 16, 0);
        cart.write(0x2100, 0x07, &mut diag);
        assert_eq!(cart.read(0x4000), 7);

        cart.write(0x0000, 0x0a, &mut diag);
        assert!(cart.is_ram_enabled());
        cart.write(0xa001, 0xab, &mut diag);
        assert_eq!(cart.read(0xa001), 0xfb);
        assert_eq!(cart.read(0xa201), 0xfb);
    }

    #[test]
    fn mbc3_selects_banks_and_clock_registers() {
        let (mut cart, mut diag) = cartridge(0x10, 128, 0x03);
        cart.write(0x2000, 0x85, &mut diag);
        assert_eq!(cart.rom_bank(), 0x05);

        cart.write(0x2000, 0x00, &mut diag);
        assert_eq!(cart.rom_bank(), 1);

        cart.write(0x0000, 0x0a, &mut diag);
        cart.write(0x4000, 0x02, &mut diag);
        cart.write(0xa000, 0x99, &mut diag);
        assert_eq!(cart.ram()[2 * RAM_BANK_SIZE], 0x99);

        cart.write(0x4000, 0x08, &mut diag);
        cart.write(0x6000, 0x00, &mut diag);
        cart.write(0x6000, 0x01, &mut diag);
        assert!(cart.read(0xa000) < 60);

        cart.write(0x4000, 0x02, &mut diag);
        assert_eq!(cart.read(0xa000), 0x99);
    }

    #[test]
    fn mbc5_has_nine_bank_bits() {
        let (mut cart, mut diag) = cartridge(0x19, 512, 0);
        cart.write(0x2000, 0x34, &mut diag);
        cart.write(0x3000, 0x01, &mut diag);
        assert_eq!(cart.rom_bank(), 0x134);
        assert_eq!(cart.read(0x4000), 0x34);

        cart.write(0x3000, 0x00, &mut diag);
        cart.write(0x2000, 0x00, &mut diag);
        assert_eq!(cart.rom_bank(), 0);
        assert_eq!(cart.read(0x4000), 0);

        cart.write(0x4000, 0xff, &mut diag);
        assert_eq!(cart.ram_bank(), 0x0f);
    }

    #[test]
    fn unsupported_type_falls_back_to_rom_only() {
        let (cart, mut diag) = cartridge(0xfc, 2, 0);
        assert_eq!(cart.kind(), MbcKind::RomOnly);
        assert_eq!(
            diag.take_events(),
            vec![Event::UnsupportedCartridge { code: 0xfc }]
        );
    }

    #[test]
    fn short_images_are_padded() {
        init();
        let mut diag = Diagnostics::default();
        let cart = Cartridge::new(vec![0x00; 0x100], &mut diag);
        assert_eq!(cart.read(0x7fff), 0xff);
        // The type byte lands in the padding, so it reads as 0xff too.
        assert_eq!(
            diag.take_events(),
            vec![
                Event::ShortRom { len: 0x100 },
                Event::UnsupportedCartridge { code: 0xff }
            ]
        );
    }

    #[test]
    fn save_ram_round_trips_through_host() {
        let (mut cart, _) = cartridge(0x03, 4, 0x02);
        cart.load_ram(&[1, 2, 3]);
        assert_eq!(&cart.ram()[..4], &[1, 2, 3, 0]);
        assert!(cart.has_battery());
    }
}
