/// Work RAM at 0xC000-0xDFFF. Color mode switches the upper 4 KiB between
/// seven banks through 0xFF70; otherwise bank 1 stays mapped.
pub struct Wram {
    bank_index: u8,
    wram: Box<[u8; 0x8000]>,
}

impl Wram {
    pub fn new() -> Self {
        Self {
            bank_index: 1,
            wram: Box::new([0; 0x8000]),
        }
    }

    pub fn set_bank_index(&mut self, index: u8) {
        self.bank_index = match index & 0x07 {
            0 => 1,
            n => n,
        };
    }

    pub fn bank_index(&self) -> u8 {
        self.bank_index
    }

    fn offset(&self, addr: u16) -> usize {
        let addr = (addr & 0x1fff) as usize;
        match addr {
            0x0000..=0x0fff => addr,
            _ => addr + (self.bank_index as usize - 1) * 0x1000,
        }
    }

    pub fn read_byte(&self, addr: u16) -> u8 {
        self.wram[self.offset(addr)]
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) {
        let offset = self.offset(addr);
        self.wram[offset] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_bank0() {
        let mut wram = Wram::new();
        for i in 0xc000..0xd000 {
            wram.write_byte(i, 100);
        }
        for bank in 1..8 {
            wram.set_bank_index(bank);
            let value = wram.read_byte(0xc500);
            assert_eq!(value, 100);
        }
    }

    #[test]
    fn read_write_bank1_to_bank7() {
        let mut wram = Wram::new();
        for bank in 1..8 {
            wram.set_bank_index(bank);
            wram.write_byte(0xd000, bank);
        }

        for bank in 0..8 {
            wram.set_bank_index(bank);
            let value = wram.read_byte(0xd000);
            if bank == 0 {
                assert_eq!(value, 1);
            } else {
                assert_eq!(value, bank);
            }
        }
    }

    #[test]
    fn echo_addresses_alias_work_ram() {
        let mut wram = Wram::new();
        wram.write_byte(0xc123, 0x42);
        assert_eq!(wram.read_byte(0xe123), 0x42);
    }
}
