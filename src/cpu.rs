use log::{debug, trace};

use crate::diagnostics::Event;
use crate::instructions::{self, Cond, Instr, R16, R8};
use crate::mmu::Mmu;
use crate::register::{FlagEffect, Reg16, Reg8, Registers, FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

/// Cycles taken to dispatch an interrupt.
pub const INTERRUPT_CYCLES: u32 = 20;
/// Cycles charged per step while HALT or STOP suspends execution.
pub const IDLE_CYCLES: u32 = 4;

const U: FlagEffect = FlagEffect::Unaffected;

pub struct Cpu {
    pub regs: Registers,
    pub mmu: Mmu,
    ime: bool,
    ime_delay: u8,
    halted: bool,
    stopped: bool,
    clock: u64,
    base: Box<[Instr; 256]>,
    prefixed: Box<[Instr; 256]>,
}

impl Cpu {
    pub fn new(mmu: Mmu, regs: Registers) -> Self {
        Cpu {
            regs,
            mmu,
            ime: false,
            ime_delay: 0,
            halted: false,
            stopped: false,
            clock: 0,
            base: instructions::base_table(),
            prefixed: instructions::prefixed_table(),
        }
    }

    pub fn ime(&self) -> bool {
        self.ime
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Total cycles consumed since power-on.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Executes one instruction, or idles while suspended, and returns the
    /// cycles it took.
    pub fn step(&mut self) -> u32 {
        self.mmu.observe_pc(self.regs.pc);

        let cycles = if self.halted || self.stopped {
            IDLE_CYCLES
        } else {
            self.execute()
        };

        if self.ime_delay > 0 {
            self.ime_delay -= 1;
            if self.ime_delay == 0 {
                self.ime = true;
            }
        }

        self.clock += cycles as u64;
        cycles
    }

    fn execute(&mut self) -> u32 {
        let pc = self.regs.pc;
        let opcode = self.fetch8();
        let instr = self.base[opcode as usize];
        trace!("0x{:04x}: {}", pc, instr.mnemonic);
        (instr.exec)(self, instr.operands)
    }

    pub(crate) fn prefixed_instr(&self, opcode: u8) -> Instr {
        self.prefixed[opcode as usize]
    }

    /// Dispatches the highest-priority pending interrupt and returns the
    /// cycles spent, or 0 when nothing was serviced.
    pub fn handle_interrupts(&mut self) -> u32 {
        let pending = self.mmu.pending_interrupts();
        if pending == 0 {
            return 0;
        }

        if !self.ime {
            // Wake up without servicing.
            self.halted = false;
            self.stopped = false;
            return 0;
        }

        let bit = pending.trailing_zeros() as u16;
        let vector = 0x40 + bit * 8;
        debug!("Interrupt {} -> 0x{:04x}", bit, vector);

        self.ime = false;
        self.ime_delay = 0;
        self.halted = false;
        self.stopped = false;
        self.mmu.clear_interrupt(1 << bit);
        self.push16(self.regs.pc);
        self.regs.pc = vector;
        self.clock += INTERRUPT_CYCLES as u64;
        INTERRUPT_CYCLES
    }

    /// Renders the instruction at PC without executing it.
    pub fn next_instruction(&self) -> String {
        let pc = self.regs.pc;
        let opcode = self.mmu.read_byte(pc);
        if opcode == 0xcb {
            let opcode = self.mmu.read_byte(pc.wrapping_add(1));
            return format!("0x{:04x}: {}", pc, self.prefixed[opcode as usize].text());
        }

        let mnemonic = self.base[opcode as usize].mnemonic;
        let d8 = self.mmu.read_byte(pc.wrapping_add(1));
        let d16 = self.mmu.read_word(pc.wrapping_add(1));
        let text = if mnemonic.contains("16") {
            let word = format!("${:04x}", d16);
            mnemonic.replace("d16", &word).replace("a16", &word)
        } else if mnemonic.contains("r8") {
            mnemonic.replace("r8", &(d8 as i8).to_string())
        } else {
            let byte = format!("${:02x}", d8);
            mnemonic.replace("d8", &byte).replace("a8", &byte)
        };
        format!("0x{:04x}: {}", pc, text)
    }

    pub(crate) fn report_unknown(&mut self, opcode: u8) {
        let pc = self.regs.pc.wrapping_sub(1);
        self.mmu.report(Event::UnknownOpcode { pc, opcode });
    }

    pub(crate) fn halt(&mut self) {
        self.halted = true;
    }

    pub(crate) fn stop(&mut self) {
        self.stopped = true;
    }

    pub(crate) fn enable_interrupts(&mut self, delayed: bool) {
        if delayed {
            // Takes effect after the following instruction.
            if !self.ime && self.ime_delay == 0 {
                self.ime_delay = 2;
            }
        } else {
            self.ime = true;
            self.ime_delay = 0;
        }
    }

    pub(crate) fn disable_interrupts(&mut self) {
        self.ime = false;
        self.ime_delay = 0;
    }

    pub(crate) fn fetch8(&mut self) -> u8 {
        let value = self.mmu.read_byte(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    pub(crate) fn fetch16(&mut self) -> u16 {
        let value = self.mmu.read_word(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(2);
        value
    }

    pub(crate) fn push16(&mut self, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(2);
        self.mmu.write_word(self.regs.sp, value);
    }

    pub(crate) fn pop16(&mut self) -> u16 {
        let value = self.mmu.read_word(self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(2);
        value
    }

    pub(crate) fn read_r8(&self, reg: R8) -> u8 {
        match reg {
            R8::B => self.regs.get8(Reg8::B),
            R8::C => self.regs.get8(Reg8::C),
            R8::D => self.regs.get8(Reg8::D),
            R8::E => self.regs.get8(Reg8::E),
            R8::H => self.regs.get8(Reg8::H),
            R8::L => self.regs.get8(Reg8::L),
            R8::HlInd => self.mmu.read_byte(self.regs.get16(Reg16::HL)),
            R8::A => self.regs.get8(Reg8::A),
        }
    }

    pub(crate) fn write_r8(&mut self, reg: R8, value: u8) {
        match reg {
            R8::B => self.regs.set8(Reg8::B, value),
            R8::C => self.regs.set8(Reg8::C, value),
            R8::D => self.regs.set8(Reg8::D, value),
            R8::E => self.regs.set8(Reg8::E, value),
            R8::H => self.regs.set8(Reg8::H, value),
            R8::L => self.regs.set8(Reg8::L, value),
            R8::HlInd => {
                let addr = self.regs.get16(Reg16::HL);
                self.mmu.write_byte(addr, value)
            }
            R8::A => self.regs.set8(Reg8::A, value),
        }
    }

    pub(crate) fn read_r16(&self, reg: R16) -> u16 {
        self.regs.get16(reg.into())
    }

    pub(crate) fn write_r16(&mut self, reg: R16, value: u16) {
        self.regs.set16(reg.into(), value)
    }

    pub(crate) fn a(&self) -> u8 {
        self.regs.get8(Reg8::A)
    }

    pub(crate) fn set_a(&mut self, value: u8) {
        self.regs.set8(Reg8::A, value)
    }

    pub(crate) fn condition(&self, cond: Cond) -> bool {
        match cond {
            Cond::Always => true,
            Cond::NZ => !self.regs.flag(FLAG_Z),
            Cond::Z => self.regs.flag(FLAG_Z),
            Cond::NC => !self.regs.flag(FLAG_C),
            Cond::C => self.regs.flag(FLAG_C),
        }
    }

    fn carry_bit(&self) -> u8 {
        self.regs.flag(FLAG_C) as u8
    }

    /// ADD and ADC.
    pub(crate) fn alu_add(&mut self, value: u8, use_carry: bool) {
        let a = self.a();
        let carry = if use_carry { self.carry_bit() } else { 0 };
        let result = a.wrapping_add(value).wrapping_add(carry);
        let half = (a & 0xf) + (value & 0xf) + carry > 0xf;
        let full = a as u16 + value as u16 + carry as u16 > 0xff;
        self.set_a(result);
        self.regs.update_flags(result == 0, false, half, full);
    }

    /// Shared by SUB, SBC and CP; returns the difference.
    fn subtract(&mut self, value: u8, use_carry: bool) -> u8 {
        let a = self.a();
        let carry = if use_carry { self.carry_bit() } else { 0 };
        let result = a.wrapping_sub(value).wrapping_sub(carry);
        let half = (a & 0xf) < (value & 0xf) + carry;
        let full = (a as u16) < value as u16 + carry as u16;
        self.regs.update_flags(result == 0, true, half, full);
        result
    }

    pub(crate) fn alu_sub(&mut self, value: u8, use_carry: bool) {
        let result = self.subtract(value, use_carry);
        self.set_a(result);
    }

    pub(crate) fn alu_cp(&mut self, value: u8) {
        self.subtract(value, false);
    }

    pub(crate) fn alu_and(&mut self, value: u8) {
        let result = self.a() & value;
        self.set_a(result);
        self.regs.update_flags(result == 0, false, true, false);
    }

    pub(crate) fn alu_xor(&mut self, value: u8) {
        let result = self.a() ^ value;
        self.set_a(result);
        self.regs.update_flags(result == 0, false, false, false);
    }

    pub(crate) fn alu_or(&mut self, value: u8) {
        let result = self.a() | value;
        self.set_a(result);
        self.regs.update_flags(result == 0, false, false, false);
    }

    pub(crate) fn alu_inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.regs
            .update_flags(result == 0, false, value & 0xf == 0xf, U);
        result
    }

    pub(crate) fn alu_dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.regs.update_flags(result == 0, true, value & 0xf == 0, U);
        result
    }

    pub(crate) fn alu_add_hl(&mut self, value: u16) {
        let hl = self.regs.get16(Reg16::HL);
        let (result, carry) = hl.overflowing_add(value);
        let half = (hl & 0x0fff) + (value & 0x0fff) > 0x0fff;
        self.regs.set16(Reg16::HL, result);
        self.regs.update_flags(U, false, half, carry);
    }

    /// SP plus a signed offset, with flags taken from the low byte.
    pub(crate) fn alu_sp_offset(&mut self, offset: u8) -> u16 {
        let sp = self.regs.sp;
        let value = offset as i8 as i16 as u16;
        let half = (sp & 0xf) + (value & 0xf) > 0xf;
        let carry = (sp & 0xff) + (value & 0xff) > 0xff;
        self.regs.update_flags(false, false, half, carry);
        sp.wrapping_add(value)
    }

    pub(crate) fn alu_daa(&mut self) {
        let mut a = self.a();
        let mut carry = self.regs.flag(FLAG_C);
        let half = self.regs.flag(FLAG_H);

        if !self.regs.flag(FLAG_N) {
            let mut adjust = 0;
            if half || a & 0x0f > 0x09 {
                adjust |= 0x06;
            }
            if carry || a > 0x99 {
                adjust |= 0x60;
                carry = true;
            }
            a = a.wrapping_add(adjust);
        } else {
            let mut adjust = 0;
            if half {
                adjust |= 0x06;
            }
            if carry {
                adjust |= 0x60;
            }
            a = a.wrapping_sub(adjust);
        }

        self.set_a(a);
        self.regs.update_flags(a == 0, U, false, carry);
    }

    pub(crate) fn alu_cpl(&mut self) {
        let a = !self.a();
        self.set_a(a);
        self.regs.update_flags(U, true, true, U);
    }

    pub(crate) fn alu_scf(&mut self) {
        self.regs.update_flags(U, false, false, true);
    }

    pub(crate) fn alu_ccf(&mut self) {
        let carry = self.regs.flag(FLAG_C);
        self.regs.update_flags(U, false, false, !carry);
    }

    pub(crate) fn alu_rlc(&mut self, value: u8) -> u8 {
        let result = value.rotate_left(1);
        self.regs
            .update_flags(result == 0, false, false, value & 0x80 != 0);
        result
    }

    pub(crate) fn alu_rrc(&mut self, value: u8) -> u8 {
        let result = value.rotate_right(1);
        self.regs
            .update_flags(result == 0, false, false, value & 0x01 != 0);
        result
    }

    pub(crate) fn alu_rl(&mut self, value: u8) -> u8 {
        let result = value << 1 | self.carry_bit();
        self.regs
            .update_flags(result == 0, false, false, value & 0x80 != 0);
        result
    }

    pub(crate) fn alu_rr(&mut self, value: u8) -> u8 {
        let result = value >> 1 | self.carry_bit() << 7;
        self.regs
            .update_flags(result == 0, false, false, value & 0x01 != 0);
        result
    }

    pub(crate) fn alu_sla(&mut self, value: u8) -> u8 {
        let result = value << 1;
        self.regs
            .update_flags(result == 0, false, false, value & 0x80 != 0);
        result
    }

    pub(crate) fn alu_sra(&mut self, value: u8) -> u8 {
        let result = value >> 1 | value & 0x80;
        self.regs
            .update_flags(result == 0, false, false, value & 0x01 != 0);
        result
    }

    pub(crate) fn alu_swap(&mut self, value: u8) -> u8 {
        let result = value.rotate_left(4);
        self.regs.update_flags(result == 0, false, false, false);
        result
    }

    pub(crate) fn alu_srl(&mut self, value: u8) -> u8 {
        let result = value >> 1;
        self.regs
            .update_flags(result == 0, false, false, value & 0x01 != 0);
        result
    }

    pub(crate) fn alu_bit(&mut self, bit: u8, value: u8) {
        self.regs
            .update_flags(value & (1 << bit) == 0, false, true, U);
    }

    /// Accumulator rotates clear Z unlike their prefixed forms.
    pub(crate) fn clear_zero(&mut self) {
        self.regs.update_flags(false, U, U, U);
    }
}
