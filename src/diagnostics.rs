use std::collections::VecDeque;
use std::fmt;

use log::{debug, warn};

/// Conditions the core recovers from instead of aborting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// An opcode with no decode entry was fetched and executed as a no-op.
    UnknownOpcode { pc: u16, opcode: u8 },
    /// The cartridge type byte at 0x147 names a controller that is not modeled.
    UnsupportedCartridge { code: u8 },
    /// A bank-select write named an invalid bank and was redirected.
    BankCoerced { requested: u16, effective: u16 },
    /// The ROM image was shorter than the minimum and got padded.
    ShortRom { len: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Event::UnknownOpcode { pc, opcode } => {
                write!(f, "unknown opcode 0x{:02x} at 0x{:04x}", opcode, pc)
            }
            Event::UnsupportedCartridge { code } => {
                write!(f, "unsupported cartridge type 0x{:02x}, using ROM only", code)
            }
            Event::BankCoerced {
                requested,
                effective,
            } => write!(f, "bank {} coerced to {}", requested, effective),
            Event::ShortRom { len } => write!(f, "ROM image of {} bytes padded", len),
        }
    }
}

/// Bounded event log owned by the MMU.
///
/// Every report is also forwarded to the `log` facade. Only the most recent
/// `capacity` events are kept, while `total()` counts everything reported.
pub struct Diagnostics {
    events: VecDeque<Event>,
    capacity: usize,
    total: u64,
}

impl Diagnostics {
    pub fn new(capacity: usize) -> Self {
        Diagnostics {
            events: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            total: 0,
        }
    }

    pub fn report(&mut self, event: Event) {
        match event {
            // Games rewrite bank 0 routinely; keep it out of the warning stream.
            Event::BankCoerced { .. } => debug!("{}", event),
            _ => warn!("{}", event),
        }

        self.total += 1;
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_the_newest_events() {
        let mut diag = Diagnostics::new(2);
        for code in 0..3 {
            diag.report(Event::UnsupportedCartridge { code });
        }

        assert_eq!(diag.total(), 3);
        let events = diag.take_events();
        assert_eq!(
            events,
            vec![
                Event::UnsupportedCartridge { code: 1 },
                Event::UnsupportedCartridge { code: 2 }
            ]
        );
        assert_eq!(diag.events().count(), 0);
    }

    #[test]
    fn zero_capacity_still_counts() {
        let mut diag = Diagnostics::new(0);
        diag.report(Event::ShortRom { len: 3 });
        assert_eq!(diag.total(), 1);
        assert!(diag.take_events().is_empty());
    }
}
