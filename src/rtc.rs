use chrono::{DateTime, Duration, Utc};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;
const MAX_DAYS: i64 = 512;

const DH_DAY_HIGH: u8 = 0x01;
const DH_HALT: u8 = 0x40;
const DH_CARRY: u8 = 0x80;

/// MBC3 real-time clock backed by the host wall clock.
///
/// The clock is stored as the instant at which the counter read zero, so the
/// registers are derived on demand rather than ticked.
pub struct Rtc {
    origin: DateTime<Utc>,
    halted: Option<i64>,
    carry: bool,
    latched: [u8; 5],
    latch_armed: bool,
}

impl Rtc {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    fn starting_at(now: DateTime<Utc>) -> Self {
        Rtc {
            origin: now,
            halted: None,
            carry: false,
            latched: [0; 5],
            latch_armed: false,
        }
    }

    fn elapsed(&self, now: DateTime<Utc>) -> i64 {
        match self.halted {
            Some(seconds) => seconds,
            None => (now - self.origin).num_seconds().max(0),
        }
    }

    fn normalize(&mut self, now: DateTime<Utc>) -> i64 {
        let mut elapsed = self.elapsed(now);
        if elapsed >= MAX_DAYS * SECONDS_PER_DAY {
            elapsed %= MAX_DAYS * SECONDS_PER_DAY;
            self.carry = true;
            self.rebase(now, elapsed);
        }
        elapsed
    }

    fn rebase(&mut self, now: DateTime<Utc>, elapsed: i64) {
        match self.halted {
            Some(_) => self.halted = Some(elapsed),
            None => self.origin = now - Duration::seconds(elapsed),
        }
    }

    fn live(&mut self, now: DateTime<Utc>) -> [u8; 5] {
        let elapsed = self.normalize(now);
        let days = elapsed / SECONDS_PER_DAY;

        let mut dh = ((days >> 8) as u8) & DH_DAY_HIGH;
        if self.halted.is_some() {
            dh |= DH_HALT;
        }
        if self.carry {
            dh |= DH_CARRY;
        }

        [
            (elapsed % 60) as u8,
            (elapsed / 60 % 60) as u8,
            (elapsed / 3600 % 24) as u8,
            days as u8,
            dh,
        ]
    }

    /// Handles writes to 0x6000-0x7FFF: 0x00 followed by 0x01 latches the clock.
    pub fn write_latch(&mut self, value: u8) {
        self.write_latch_at(value, Utc::now());
    }

    fn write_latch_at(&mut self, value: u8, now: DateTime<Utc>) {
        match value {
            0x00 => self.latch_armed = true,
            0x01 if self.latch_armed => {
                self.latched = self.live(now);
                self.latch_armed = false;
            }
            _ => self.latch_armed = false,
        }
    }

    /// Reads a latched register; `reg` is the 0x08-0x0C select value.
    pub fn read(&self, reg: u8) -> u8 {
        match reg {
            0x08..=0x0c => self.latched[(reg - 0x08) as usize],
            _ => 0xff,
        }
    }

    pub fn write(&mut self, reg: u8, value: u8) {
        self.write_at(reg, value, Utc::now());
    }

    fn write_at(&mut self, reg: u8, value: u8, now: DateTime<Utc>) {
        let mut regs = self.live(now);
        match reg {
            0x08 => regs[0] = value % 60,
            0x09 => regs[1] = value % 60,
            0x0a => regs[2] = value % 24,
            0x0b => regs[3] = value,
            0x0c => regs[4] = value,
            _ => return,
        }

        let days = (regs[4] as i64 & DH_DAY_HIGH as i64) << 8 | regs[3] as i64;
        let elapsed = days * SECONDS_PER_DAY
            + regs[2] as i64 * 3600
            + regs[1] as i64 * 60
            + regs[0] as i64;

        self.carry = regs[4] & DH_CARRY != 0;
        let halt = regs[4] & DH_HALT != 0;
        match (self.halted.is_some(), halt) {
            (_, true) => self.halted = Some(elapsed),
            (true, false) => {
                self.halted = None;
                self.origin = now - Duration::seconds(elapsed);
            }
            (false, false) => self.origin = now - Duration::seconds(elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + seconds, 0).unwrap()
    }

    fn latch(rtc: &mut Rtc, now: DateTime<Utc>) {
        rtc.write_latch_at(0x00, now);
        rtc.write_latch_at(0x01, now);
    }

    #[test]
    fn latched_registers_follow_wall_clock() {
        let mut rtc = Rtc::starting_at(at(0));
        latch(&mut rtc, at(SECONDS_PER_DAY * 300 + 3600 * 5 + 60 * 7 + 9));

        assert_eq!(rtc.read(0x08), 9);
        assert_eq!(rtc.read(0x09), 7);
        assert_eq!(rtc.read(0x0a), 5);
        assert_eq!(rtc.read(0x0b), (300 & 0xff) as u8);
        assert_eq!(rtc.read(0x0c), DH_DAY_HIGH);
    }

    #[test]
    fn latch_needs_zero_then_one() {
        let mut rtc = Rtc::starting_at(at(0));
        rtc.write_latch_at(0x01, at(30));
        assert_eq!(rtc.read(0x08), 0);

        latch(&mut rtc, at(30));
        assert_eq!(rtc.read(0x08), 30);
    }

    #[test]
    fn halt_freezes_the_counter() {
        let mut rtc = Rtc::starting_at(at(0));
        rtc.write_at(0x0c, DH_HALT, at(10));
        latch(&mut rtc, at(500));
        assert_eq!(rtc.read(0x08), 10);
        assert_eq!(rtc.read(0x0c), DH_HALT);

        rtc.write_at(0x0c, 0, at(500));
        latch(&mut rtc, at(505));
        assert_eq!(rtc.read(0x08), 15);
    }

    #[test]
    fn day_overflow_sets_carry() {
        let mut rtc = Rtc::starting_at(at(0));
        latch(&mut rtc, at(SECONDS_PER_DAY * 513));
        assert_eq!(rtc.read(0x0b), 1);
        assert_eq!(rtc.read(0x0c) & DH_CARRY, DH_CARRY);
    }

    #[test]
    fn seconds_write_moves_the_clock() {
        let mut rtc = Rtc::starting_at(at(0));
        rtc.write_at(0x08, 42, at(100));
        latch(&mut rtc, at(101));
        assert_eq!(rtc.read(0x08), 43);
        assert_eq!(rtc.read(0x09), 1);
    }
}
