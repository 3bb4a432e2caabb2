use std::fmt;

/// 8-bit registers of the register file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg8 {
    A,
    F,
    B,
    C,
    D,
    E,
    H,
    L,
}

/// 16-bit register pairs plus SP and PC.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reg16 {
    AF,
    BC,
    DE,
    HL,
    SP,
    PC,
}

pub const FLAG_Z: u8 = 0x80;
pub const FLAG_N: u8 = 0x40;
pub const FLAG_H: u8 = 0x20;
pub const FLAG_C: u8 = 0x10;

/// Per-flag outcome of an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagEffect {
    Set,
    Reset,
    Unaffected,
}

impl From<bool> for FlagEffect {
    fn from(flag: bool) -> Self {
        if flag {
            FlagEffect::Set
        } else {
            FlagEffect::Reset
        }
    }
}

pub fn combine(high: u8, low: u8) -> u16 {
    (high as u16) << 8 | low as u16
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registers {
    a: u8,
    f: u8,
    b: u8,
    c: u8,
    d: u8,
    e: u8,
    h: u8,
    l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    /// Register state left behind by the monochrome boot ROM.
    pub fn post_boot() -> Self {
        let mut regs = Registers::default();
        regs.set16(Reg16::AF, 0x01b0);
        regs.set16(Reg16::BC, 0x0013);
        regs.set16(Reg16::DE, 0x00d8);
        regs.set16(Reg16::HL, 0x014d);
        regs.sp = 0xfffe;
        regs.pc = 0x0100;
        regs
    }

    /// Register state left behind by the color boot ROM.
    pub fn post_boot_color() -> Self {
        let mut regs = Registers::default();
        regs.set16(Reg16::AF, 0x1180);
        regs.set16(Reg16::BC, 0x0000);
        regs.set16(Reg16::DE, 0xff56);
        regs.set16(Reg16::HL, 0x000d);
        regs.sp = 0xfffe;
        regs.pc = 0x0100;
        regs
    }

    pub fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::F => self.f,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
        }
    }

    pub fn set8(&mut self, reg: Reg8, value: u8) {
        match reg {
            Reg8::A => self.a = value,
            // The low nibble of F does not exist in hardware.
            Reg8::F => self.f = value & 0xf0,
            Reg8::B => self.b = value,
            Reg8::C => self.c = value,
            Reg8::D => self.d = value,
            Reg8::E => self.e = value,
            Reg8::H => self.h = value,
            Reg8::L => self.l = value,
        }
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => combine(self.a, self.f),
            Reg16::BC => combine(self.b, self.c),
            Reg16::DE => combine(self.d, self.e),
            Reg16::HL => combine(self.h, self.l),
            Reg16::SP => self.sp,
            Reg16::PC => self.pc,
        }
    }

    pub fn set16(&mut self, reg: Reg16, value: u16) {
        let high = (value >> 8) as u8;
        let low = value as u8;
        match reg {
            Reg16::AF => {
                self.a = high;
                self.f = low & 0xf0;
            }
            Reg16::BC => {
                self.b = high;
                self.c = low;
            }
            Reg16::DE => {
                self.d = high;
                self.e = low;
            }
            Reg16::HL => {
                self.h = high;
                self.l = low;
            }
            Reg16::SP => self.sp = value,
            Reg16::PC => self.pc = value,
        }
    }

    pub fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    /// Writes Z, N, H and C in one go, leaving `Unaffected` bits as they were.
    pub fn update_flags<Z, N, H, C>(&mut self, z: Z, n: N, h: H, c: C)
    where
        Z: Into<FlagEffect>,
        N: Into<FlagEffect>,
        H: Into<FlagEffect>,
        C: Into<FlagEffect>,
    {
        let mut flags = self.f;
        for (mask, effect) in [
            (FLAG_Z, z.into()),
            (FLAG_N, n.into()),
            (FLAG_H, h.into()),
            (FLAG_C, c.into()),
        ]
        .iter()
        {
            match effect {
                FlagEffect::Set => flags |= mask,
                FlagEffect::Reset => flags &= !mask,
                FlagEffect::Unaffected => {}
            }
        }
        self.f = flags;
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "AF: {:04x}  BC: {:04x}  DE: {:04x}  HL: {:04x}  SP: {:04x}  PC: {:04x}  [{}{}{}{}]",
            self.get16(Reg16::AF),
            self.get16(Reg16::BC),
            self.get16(Reg16::DE),
            self.get16(Reg16::HL),
            self.sp,
            self.pc,
            if self.flag(FLAG_Z) { 'Z' } else { '-' },
            if self.flag(FLAG_N) { 'N' } else { '-' },
            if self.flag(FLAG_H) { 'H' } else { '-' },
            if self.flag(FLAG_C) { 'C' } else { '-' },
        )
    }
}
