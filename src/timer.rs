use log::debug;

use crate::mmu::INT_TIMER;

pub struct Timer {
    div_counter: u16,
    tima: u8,
    tima_total_count: u16,
    tma: u8,
    tac: u8,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            div_counter: 0,
            tima: 0,
            tima_total_count: 0,
            tma: 0,
            tac: 0,
        }
    }

    /// Divider value the boot ROM leaves behind.
    pub fn post_boot() -> Self {
        Timer {
            div_counter: 0xab00,
            ..Timer::new()
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0xff04 => (self.div_counter >> 8) as u8,
            0xff05 => self.tima,
            0xff06 => self.tma,
            0xff07 => self.tac | 0xf8,
            _ => 0xff,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0xff04 => self.div_counter = 0,
            0xff05 => self.tima = value,
            0xff06 => self.tma = value,
            0xff07 => {
                debug!("Timer control: 0x{:02x}", value);
                self.tac = value & 7;
            }
            _ => (),
        }
    }

    fn threshold(&self) -> u16 {
        match self.tac & 3 {
            0 => 1024,
            1 => 16,
            2 => 64,
            _ => 256,
        }
    }

    /// Advances the timer by `clock` cycles and returns the interrupt bits raised.
    pub fn update(&mut self, clock: u32) -> u8 {
        let mut irq = 0;
        self.div_counter = self.div_counter.wrapping_add(clock as u16);

        if self.tac & 4 == 0 {
            return irq;
        }

        let divider = self.threshold();
        let mut pending = self.tima_total_count as u32 + clock;
        while pending >= divider as u32 {
            pending -= divider as u32;
            let (res, overflow_flag) = self.tima.overflowing_add(1);

            if overflow_flag {
                self.tima = self.tma;
                irq |= INT_TIMER;
            } else {
                self.tima = res;
            }
        }
        self.tima_total_count = pending as u16;

        irq
    }
}
