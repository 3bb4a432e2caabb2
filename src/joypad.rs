use log::debug;

use crate::mmu::INT_JOYPAD;

/// The eight buttons of the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Key {
    fn is_direction(self) -> bool {
        matches!(self, Key::Right | Key::Left | Key::Up | Key::Down)
    }

    /// Bit of the key inside its 4-bit group.
    fn mask(self) -> u8 {
        match self {
            Key::Right | Key::A => 0x1,
            Key::Left | Key::B => 0x2,
            Key::Up | Key::Select => 0x4,
            Key::Down | Key::Start => 0x8,
        }
    }
}

/// Joypad register (0xFF00). Key masks are active low.
pub struct Joypad {
    select: u8,
    direction_keys: u8,
    button_keys: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Joypad {
            select: 0x30,
            direction_keys: 0xf,
            button_keys: 0xf,
        }
    }

    pub fn read(&self) -> u8 {
        let mut keys = 0xf;
        if self.select & 0x10 == 0 {
            keys &= self.direction_keys;
        }
        if self.select & 0x20 == 0 {
            keys &= self.button_keys;
        }
        0xc0 | self.select | keys
    }

    pub fn write(&mut self, value: u8) {
        debug!("Joypad select: 0x{:02x}", value);
        self.select = value & 0x30;
    }

    /// Presses `key`, returning the interrupt bits raised.
    pub fn keydown(&mut self, key: Key) -> u8 {
        let mask = key.mask();
        let keys = if key.is_direction() {
            &mut self.direction_keys
        } else {
            &mut self.button_keys
        };
        let was_released = *keys & mask != 0;
        *keys &= !mask;

        if was_released {
            INT_JOYPAD
        } else {
            0
        }
    }

    /// Releases `key`. A pending joypad request in IF is left alone.
    pub fn keyup(&mut self, key: Key) {
        let mask = key.mask();
        if key.is_direction() {
            self.direction_keys |= mask;
        } else {
            self.button_keys |= mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nothing_selected_reads_high() {
        let mut joypad = Joypad::new();
        joypad.keydown(Key::A);
        assert_eq!(joypad.read(), 0xff);
    }

    #[test]
    fn selected_group_is_reported() {
        let mut joypad = Joypad::new();
        joypad.keydown(Key::Down);
        joypad.keydown(Key::Start);

        joypad.write(0x20);
        assert_eq!(joypad.read(), 0xe0 | 0x7);

        joypad.write(0x10);
        assert_eq!(joypad.read(), 0xd0 | 0x7);

        joypad.keyup(Key::Start);
        assert_eq!(joypad.read(), 0xdf);
    }

    #[test]
    fn both_groups_selected_are_combined() {
        let mut joypad = Joypad::new();
        joypad.keydown(Key::Right);
        joypad.keydown(Key::B);
        joypad.write(0x00);
        assert_eq!(joypad.read(), 0xc0 | 0xc);
    }

    #[test]
    fn only_fresh_presses_request_interrupt() {
        let mut joypad = Joypad::new();
        assert_eq!(joypad.keydown(Key::Select), INT_JOYPAD);
        assert_eq!(joypad.keydown(Key::Select), 0);
        joypad.keyup(Key::Select);
        assert_eq!(joypad.keydown(Key::Select), INT_JOYPAD);
    }
}
