use std::fmt;

use log::debug;

use crate::cpu::Cpu;
use crate::register::Reg16;

/// 8-bit operand, in opcode encoding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum R8 {
    B,
    C,
    D,
    E,
    H,
    L,
    HlInd,
    A,
}

impl R8 {
    fn decode(index: u8) -> Self {
        match index & 7 {
            0 => R8::B,
            1 => R8::C,
            2 => R8::D,
            3 => R8::E,
            4 => R8::H,
            5 => R8::L,
            6 => R8::HlInd,
            _ => R8::A,
        }
    }
}

impl fmt::Display for R8 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            R8::B => "B",
            R8::C => "C",
            R8::D => "D",
            R8::E => "E",
            R8::H => "H",
            R8::L => "L",
            R8::HlInd => "(HL)",
            R8::A => "A",
        };
        write!(f, "{}", name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum R16 {
    BC,
    DE,
    HL,
    SP,
    AF,
}

impl R16 {
    /// Pair encoding used by loads and 16-bit arithmetic.
    fn decode(index: u8) -> Self {
        match index & 3 {
            0 => R16::BC,
            1 => R16::DE,
            2 => R16::HL,
            _ => R16::SP,
        }
    }

    /// Pair encoding used by PUSH and POP.
    fn decode_stack(index: u8) -> Self {
        match index & 3 {
            3 => R16::AF,
            n => R16::decode(n),
        }
    }
}

impl From<R16> for Reg16 {
    fn from(reg: R16) -> Self {
        match reg {
            R16::BC => Reg16::BC,
            R16::DE => Reg16::DE,
            R16::HL => Reg16::HL,
            R16::SP => Reg16::SP,
            R16::AF => Reg16::AF,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cond {
    Always,
    NZ,
    Z,
    NC,
    C,
}

impl Cond {
    fn decode(index: u8) -> Self {
        match index & 3 {
            0 => Cond::NZ,
            1 => Cond::Z,
            2 => Cond::NC,
            _ => Cond::C,
        }
    }
}

/// Operands resolved when the tables are built.
#[derive(Clone, Copy, Debug)]
pub struct Operands {
    pub opcode: u8,
    pub dst: R8,
    pub src: R8,
    pub pair: R16,
    pub cond: Cond,
    pub bit: u8,
}

impl Operands {
    fn decode(opcode: u8) -> Self {
        let y = (opcode >> 3) & 7;
        Operands {
            opcode,
            dst: R8::decode(y),
            src: R8::decode(opcode),
            pair: R16::decode(y >> 1),
            cond: Cond::Always,
            bit: y,
        }
    }

    fn with_cond(mut self) -> Self {
        self.cond = Cond::decode(self.bit);
        self
    }

    fn with_stack_pair(mut self) -> Self {
        self.pair = R16::decode_stack(self.bit >> 1);
        self
    }
}

pub type Handler = fn(&mut Cpu, Operands) -> u32;

#[derive(Clone, Copy)]
pub struct Instr {
    pub mnemonic: &'static str,
    pub exec: Handler,
    pub operands: Operands,
    prefixed: bool,
}

impl Instr {
    fn new(mnemonic: &'static str, exec: Handler, operands: Operands) -> Self {
        Instr {
            mnemonic,
            exec,
            operands,
            prefixed: false,
        }
    }

    /// Assembly text; immediates are left as `d8`/`d16`/`a8`/`a16`/`r8`.
    pub fn text(&self) -> String {
        if !self.prefixed {
            return self.mnemonic.to_string();
        }
        match self.operands.opcode >> 6 {
            0 => format!("{} {}", self.mnemonic, self.operands.src),
            _ => format!(
                "{} {},{}",
                self.mnemonic, self.operands.bit, self.operands.src
            ),
        }
    }
}

#[rustfmt::skip]
const MNEMONICS: [&str; 256] = [
    // 0x00
    "NOP", "LD BC,d16", "LD (BC),A", "INC BC", "INC B", "DEC B", "LD B,d8", "RLCA",
    "LD (a16),SP", "ADD HL,BC", "LD A,(BC)", "DEC BC", "INC C", "DEC C", "LD C,d8", "RRCA",
    // 0x10
    "STOP", "LD DE,d16", "LD (DE),A", "INC DE", "INC D", "DEC D", "LD D,d8", "RLA",
    "JR r8", "ADD HL,DE", "LD A,(DE)", "DEC DE", "INC E", "DEC E", "LD E,d8", "RRA",
    // 0x20
    "JR NZ,r8", "LD HL,d16", "LD (HL+),A", "INC HL", "INC H", "DEC H", "LD H,d8", "DAA",
    "JR Z,r8", "ADD HL,HL", "LD A,(HL+)", "DEC HL", "INC L", "DEC L", "LD L,d8", "CPL",
    // 0x30
    "JR NC,r8", "LD SP,d16", "LD (HL-),A", "INC SP", "INC (HL)", "DEC (HL)", "LD (HL),d8", "SCF",
    "JR C,r8", "ADD HL,SP", "LD A,(HL-)", "DEC SP", "INC A", "DEC A", "LD A,d8", "CCF",
    // 0x40
    "LD B,B", "LD B,C", "LD B,D", "LD B,E", "LD B,H", "LD B,L", "LD B,(HL)", "LD B,A",
    "LD C,B", "LD C,C", "LD C,D", "LD C,E", "LD C,H", "LD C,L", "LD C,(HL)", "LD C,A",
    // 0x50
    "LD D,B", "LD D,C", "LD D,D", "LD D,E", "LD D,H", "LD D,L", "LD D,(HL)", "LD D,A",
    "LD E,B", "LD E,C", "LD E,D", "LD E,E", "LD E,H", "LD E,L", "LD E,(HL)", "LD E,A",
    // 0x60
    "LD H,B", "LD H,C", "LD H,D", "LD H,E", "LD H,H", "LD H,L", "LD H,(HL)", "LD H,A",
    "LD L,B", "LD L,C", "LD L,D", "LD L,E", "LD L,H", "LD L,L", "LD L,(HL)", "LD L,A",
    // 0x70
    "LD (HL),B", "LD (HL),C", "LD (HL),D", "LD (HL),E", "LD (HL),H", "LD (HL),L", "HALT", "LD (HL),A",
    "LD A,B", "LD A,C", "LD A,D", "LD A,E", "LD A,H", "LD A,L", "LD A,(HL)", "LD A,A",
    // 0x80
    "ADD A,B", "ADD A,C", "ADD A,D", "ADD A,E", "ADD A,H", "ADD A,L", "ADD A,(HL)", "ADD A,A",
    "ADC A,B", "ADC A,C", "ADC A,D", "ADC A,E", "ADC A,H", "ADC A,L", "ADC A,(HL)", "ADC A,A",
    // 0x90
    "SUB B", "SUB C", "SUB D", "SUB E", "SUB H", "SUB L", "SUB (HL)", "SUB A",
    "SBC A,B", "SBC A,C", "SBC A,D", "SBC A,E", "SBC A,H", "SBC A,L", "SBC A,(HL)", "SBC A,A",
    // 0xA0
    "AND B", "AND C", "AND D", "AND E", "AND H", "AND L", "AND (HL)", "AND A",
    "XOR B", "XOR C", "XOR D", "XOR E", "XOR H", "XOR L", "XOR (HL)", "XOR A",
    // 0xB0
    "OR B", "OR C", "OR D", "OR E", "OR H", "OR L", "OR (HL)", "OR A",
    "CP B", "CP C", "CP D", "CP E", "CP H", "CP L", "CP (HL)", "CP A",
    // 0xC0
    "RET NZ", "POP BC", "JP NZ,a16", "JP a16", "CALL NZ,a16", "PUSH BC", "ADD A,d8", "RST 00H",
    "RET Z", "RET", "JP Z,a16", "PREFIX CB", "CALL Z,a16", "CALL a16", "ADC A,d8", "RST 08H",
    // 0xD0
    "RET NC", "POP DE", "JP NC,a16", "ILLEGAL_D3", "CALL NC,a16", "PUSH DE", "SUB d8", "RST 10H",
    "RET C", "RETI", "JP C,a16", "ILLEGAL_DB", "CALL C,a16", "ILLEGAL_DD", "SBC A,d8", "RST 18H",
    // 0xE0
    "LDH (a8),A", "POP HL", "LD (C),A", "ILLEGAL_E3", "ILLEGAL_E4", "PUSH HL", "AND d8", "RST 20H",
    "ADD SP,r8", "JP HL", "LD (a16),A", "ILLEGAL_EB", "ILLEGAL_EC", "ILLEGAL_ED", "XOR d8", "RST 28H",
    // 0xF0
    "LDH A,(a8)", "POP AF", "LD A,(C)", "DI", "ILLEGAL_F4", "PUSH AF", "OR d8", "RST 30H",
    "LD HL,SP+r8", "LD SP,HL", "LD A,(a16)", "EI", "ILLEGAL_FC", "ILLEGAL_FD", "CP d8", "RST 38H",
];

const PREFIXED_GROUPS: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SWAP", "SRL"];

/// Builds the dispatch table for unprefixed opcodes.
pub fn base_table() -> Box<[Instr; 256]> {
    let nop_entry = Instr::new(MNEMONICS[0], nop, Operands::decode(0));
    let mut table = Box::new([nop_entry; 256]);
    for (opcode, entry) in table.iter_mut().enumerate() {
        *entry = decode_base(opcode as u8);
    }
    table
}

/// Builds the dispatch table for 0xCB-prefixed opcodes.
pub fn prefixed_table() -> Box<[Instr; 256]> {
    let nop_entry = Instr::new(MNEMONICS[0], nop, Operands::decode(0));
    let mut table = Box::new([nop_entry; 256]);
    for (opcode, entry) in table.iter_mut().enumerate() {
        *entry = decode_prefixed(opcode as u8);
    }
    table
}

fn decode_base(opcode: u8) -> Instr {
    let ops = Operands::decode(opcode);
    let (exec, ops): (Handler, Operands) = match opcode {
        0x00 => (nop, ops),
        0x08 => (ld_a16_sp, ops),
        0x10 => (stop, ops),
        0x18 => (jr, ops),
        0x20 | 0x28 | 0x30 | 0x38 => (jr, ops.with_cond()),
        0x01 | 0x11 | 0x21 | 0x31 => (ld_rr_d16, ops),
        0x09 | 0x19 | 0x29 | 0x39 => (add_hl_rr, ops),
        0x02 | 0x12 => (ld_ind_a, ops),
        0x0a | 0x1a => (ld_a_ind, ops),
        0x22 => (ld_hli_a, ops),
        0x2a => (ld_a_hli, ops),
        0x32 => (ld_hld_a, ops),
        0x3a => (ld_a_hld, ops),
        0x03 | 0x13 | 0x23 | 0x33 => (inc_rr, ops),
        0x0b | 0x1b | 0x2b | 0x3b => (dec_rr, ops),
        0x04 | 0x0c | 0x14 | 0x1c | 0x24 | 0x2c | 0x34 | 0x3c => (inc_r, ops),
        0x05 | 0x0d | 0x15 | 0x1d | 0x25 | 0x2d | 0x35 | 0x3d => (dec_r, ops),
        0x06 | 0x0e | 0x16 | 0x1e | 0x26 | 0x2e | 0x36 | 0x3e => (ld_r_d8, ops),
        0x07 => (rlca, ops),
        0x0f => (rrca, ops),
        0x17 => (rla, ops),
        0x1f => (rra, ops),
        0x27 => (daa, ops),
        0x2f => (cpl, ops),
        0x37 => (scf, ops),
        0x3f => (ccf, ops),
        0x76 => (halt, ops),
        0x40..=0x7f => (ld_r_r, ops),
        0x80..=0xbf => (alu, ops),
        0xc6 | 0xce | 0xd6 | 0xde | 0xe6 | 0xee | 0xf6 | 0xfe => (alu, ops),
        0xc0 | 0xc8 | 0xd0 | 0xd8 => (ret_cc, ops.with_cond()),
        0xc9 => (ret, ops),
        0xd9 => (reti, ops),
        0xc1 | 0xd1 | 0xe1 | 0xf1 => (pop, ops.with_stack_pair()),
        0xc5 | 0xd5 | 0xe5 | 0xf5 => (push, ops.with_stack_pair()),
        0xc2 | 0xca | 0xd2 | 0xda => (jp, ops.with_cond()),
        0xc3 => (jp, ops),
        0xe9 => (jp_hl, ops),
        0xc4 | 0xcc | 0xd4 | 0xdc => (call, ops.with_cond()),
        0xcd => (call, ops),
        0xc7 | 0xcf | 0xd7 | 0xdf | 0xe7 | 0xef | 0xf7 | 0xff => (rst, ops),
        0xcb => (prefix, ops),
        0xe0 => (ldh_a8_a, ops),
        0xf0 => (ldh_a_a8, ops),
        0xe2 => (ld_c_a, ops),
        0xf2 => (ld_a_c, ops),
        0xea => (ld_a16_a, ops),
        0xfa => (ld_a_a16, ops),
        0xe8 => (add_sp_r8, ops),
        0xf8 => (ld_hl_sp_r8, ops),
        0xf9 => (ld_sp_hl, ops),
        0xf3 => (di, ops),
        0xfb => (ei, ops),
        // 0xd3, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd
        _ => (unknown, ops),
    };
    Instr::new(MNEMONICS[opcode as usize], exec, ops)
}

fn decode_prefixed(opcode: u8) -> Instr {
    let ops = Operands::decode(opcode);
    let (mnemonic, exec): (&'static str, Handler) = match opcode >> 6 {
        0 => (PREFIXED_GROUPS[ops.bit as usize], rotate),
        1 => ("BIT", bit),
        2 => ("RES", res),
        _ => ("SET", set),
    };
    Instr {
        mnemonic,
        exec,
        operands: ops,
        prefixed: true,
    }
}

/// Extra cost of going through (HL).
fn indirect(reg: R8, cycles: u32) -> u32 {
    if reg == R8::HlInd {
        cycles
    } else {
        0
    }
}

fn nop(_cpu: &mut Cpu, _ops: Operands) -> u32 {
    4
}

fn unknown(cpu: &mut Cpu, ops: Operands) -> u32 {
    cpu.report_unknown(ops.opcode);
    4
}

fn prefix(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let opcode = cpu.fetch8();
    let instr = cpu.prefixed_instr(opcode);
    debug!("Instruction {}", instr.text());
    (instr.exec)(cpu, instr.operands)
}

/// Opcode for 10. The byte after STOP is skipped.
fn stop(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.fetch8();
    cpu.stop();
    4
}

fn halt(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.halt();
    4
}

fn di(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.disable_interrupts();
    4
}

fn ei(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.enable_interrupts(true);
    4
}

/// Put value r2 into r1.
///
/// Opcode for 40-7F except 76
fn ld_r_r(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r8(ops.src);
    cpu.write_r8(ops.dst, value);
    4 + indirect(ops.src, 4) + indirect(ops.dst, 4)
}

/// Put immediate value into r.
///
/// Opcode for 06, 0E, 16, 1E, 26, 2E, 36, 3E
fn ld_r_d8(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.fetch8();
    cpu.write_r8(ops.dst, value);
    8 + indirect(ops.dst, 4)
}

fn ld_rr_d16(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.fetch16();
    cpu.write_r16(ops.pair, value);
    12
}

fn ld_a16_sp(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = cpu.fetch16();
    let sp = cpu.regs.sp;
    cpu.mmu.write_word(addr, sp);
    20
}

/// Put A into (BC) or (DE).
fn ld_ind_a(cpu: &mut Cpu, ops: Operands) -> u32 {
    let addr = cpu.read_r16(ops.pair);
    let value = cpu.a();
    cpu.mmu.write_byte(addr, value);
    8
}

/// Put (BC) or (DE) into A.
fn ld_a_ind(cpu: &mut Cpu, ops: Operands) -> u32 {
    let addr = cpu.read_r16(ops.pair);
    let value = cpu.mmu.read_byte(addr);
    cpu.set_a(value);
    8
}

/// Moves HL by `delta` after a (HL) access.
fn step_hl(cpu: &mut Cpu, delta: i16) -> u16 {
    let hl = cpu.read_r16(R16::HL);
    cpu.write_r16(R16::HL, hl.wrapping_add(delta as u16));
    hl
}

fn ld_hli_a(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = step_hl(cpu, 1);
    let value = cpu.a();
    cpu.mmu.write_byte(addr, value);
    8
}

fn ld_hld_a(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = step_hl(cpu, -1);
    let value = cpu.a();
    cpu.mmu.write_byte(addr, value);
    8
}

fn ld_a_hli(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = step_hl(cpu, 1);
    let value = cpu.mmu.read_byte(addr);
    cpu.set_a(value);
    8
}

fn ld_a_hld(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = step_hl(cpu, -1);
    let value = cpu.mmu.read_byte(addr);
    cpu.set_a(value);
    8
}

/// Put A into 0xFF00 + immediate.
///
/// Opcode for E0
fn ldh_a8_a(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = 0xff00 | cpu.fetch8() as u16;
    let value = cpu.a();
    cpu.mmu.write_byte(addr, value);
    12
}

/// Opcode for F0
fn ldh_a_a8(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = 0xff00 | cpu.fetch8() as u16;
    let value = cpu.mmu.read_byte(addr);
    cpu.set_a(value);
    12
}

/// Put A into address 0xFF00 + register C
/// Opcode for E2
fn ld_c_a(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = 0xff00 | cpu.read_r8(R8::C) as u16;
    let value = cpu.a();
    cpu.mmu.write_byte(addr, value);
    8
}

/// Put value at address 0xFF00 + register C into A
/// Opcode for F2
fn ld_a_c(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = 0xff00 | cpu.read_r8(R8::C) as u16;
    let value = cpu.mmu.read_byte(addr);
    cpu.set_a(value);
    8
}

fn ld_a16_a(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = cpu.fetch16();
    let value = cpu.a();
    cpu.mmu.write_byte(addr, value);
    16
}

fn ld_a_a16(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let addr = cpu.fetch16();
    let value = cpu.mmu.read_byte(addr);
    cpu.set_a(value);
    16
}

fn ld_sp_hl(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.regs.sp = cpu.read_r16(R16::HL);
    8
}

fn ld_hl_sp_r8(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let offset = cpu.fetch8();
    let value = cpu.alu_sp_offset(offset);
    cpu.write_r16(R16::HL, value);
    12
}

fn add_sp_r8(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let offset = cpu.fetch8();
    cpu.regs.sp = cpu.alu_sp_offset(offset);
    16
}

fn inc_r(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r8(ops.dst);
    let result = cpu.alu_inc(value);
    cpu.write_r8(ops.dst, result);
    4 + indirect(ops.dst, 8)
}

fn dec_r(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r8(ops.dst);
    let result = cpu.alu_dec(value);
    cpu.write_r8(ops.dst, result);
    4 + indirect(ops.dst, 8)
}

fn inc_rr(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r16(ops.pair).wrapping_add(1);
    cpu.write_r16(ops.pair, value);
    8
}

fn dec_rr(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r16(ops.pair).wrapping_sub(1);
    cpu.write_r16(ops.pair, value);
    8
}

fn add_hl_rr(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r16(ops.pair);
    cpu.alu_add_hl(value);
    8
}

/// The eight accumulator operations, with a register or an immediate.
///
/// Opcode for 80-BF, C6, CE, D6, DE, E6, EE, F6, FE
fn alu(cpu: &mut Cpu, ops: Operands) -> u32 {
    let (value, cycles) = if ops.opcode >= 0xc0 {
        (cpu.fetch8(), 8)
    } else {
        (cpu.read_r8(ops.src), 4 + indirect(ops.src, 4))
    };

    match ops.bit {
        0 => cpu.alu_add(value, false),
        1 => cpu.alu_add(value, true),
        2 => cpu.alu_sub(value, false),
        3 => cpu.alu_sub(value, true),
        4 => cpu.alu_and(value),
        5 => cpu.alu_xor(value),
        6 => cpu.alu_or(value),
        _ => cpu.alu_cp(value),
    }
    cycles
}

fn rlca(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let value = cpu.a();
    let result = cpu.alu_rlc(value);
    cpu.set_a(result);
    cpu.clear_zero();
    4
}

fn rrca(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let value = cpu.a();
    let result = cpu.alu_rrc(value);
    cpu.set_a(result);
    cpu.clear_zero();
    4
}

fn rla(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let value = cpu.a();
    let result = cpu.alu_rl(value);
    cpu.set_a(result);
    cpu.clear_zero();
    4
}

fn rra(cpu: &mut Cpu, _ops: Operands) -> u32 {
    let value = cpu.a();
    let result = cpu.alu_rr(value);
    cpu.set_a(result);
    cpu.clear_zero();
    4
}

fn daa(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.alu_daa();
    4
}

fn cpl(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.alu_cpl();
    4
}

fn scf(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.alu_scf();
    4
}

fn ccf(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.alu_ccf();
    4
}

/// Relative jump, optionally conditional.
fn jr(cpu: &mut Cpu, ops: Operands) -> u32 {
    let offset = cpu.fetch8() as i8;
    if !cpu.condition(ops.cond) {
        return 8;
    }
    cpu.regs.pc = cpu.regs.pc.wrapping_add(offset as i16 as u16);
    12
}

fn jp(cpu: &mut Cpu, ops: Operands) -> u32 {
    let addr = cpu.fetch16();
    if !cpu.condition(ops.cond) {
        return 12;
    }
    cpu.regs.pc = addr;
    16
}

fn jp_hl(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.regs.pc = cpu.read_r16(R16::HL);
    4
}

fn call(cpu: &mut Cpu, ops: Operands) -> u32 {
    let addr = cpu.fetch16();
    if !cpu.condition(ops.cond) {
        return 12;
    }
    let pc = cpu.regs.pc;
    cpu.push16(pc);
    cpu.regs.pc = addr;
    24
}

fn ret(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.regs.pc = cpu.pop16();
    16
}

fn ret_cc(cpu: &mut Cpu, ops: Operands) -> u32 {
    if !cpu.condition(ops.cond) {
        return 8;
    }
    cpu.regs.pc = cpu.pop16();
    20
}

fn reti(cpu: &mut Cpu, _ops: Operands) -> u32 {
    cpu.regs.pc = cpu.pop16();
    cpu.enable_interrupts(false);
    16
}

/// Call to one of the eight fixed vectors 0x00-0x38.
fn rst(cpu: &mut Cpu, ops: Operands) -> u32 {
    let pc = cpu.regs.pc;
    cpu.push16(pc);
    cpu.regs.pc = (ops.opcode & 0x38) as u16;
    16
}

fn push(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r16(ops.pair);
    cpu.push16(value);
    16
}

fn pop(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.pop16();
    cpu.write_r16(ops.pair, value);
    12
}

/// Rotates, shifts and SWAP; the group is selected by bits 3-5.
fn rotate(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r8(ops.src);
    let result = match ops.bit {
        0 => cpu.alu_rlc(value),
        1 => cpu.alu_rrc(value),
        2 => cpu.alu_rl(value),
        3 => cpu.alu_rr(value),
        4 => cpu.alu_sla(value),
        5 => cpu.alu_sra(value),
        6 => cpu.alu_swap(value),
        _ => cpu.alu_srl(value),
    };
    cpu.write_r8(ops.src, result);
    8 + indirect(ops.src, 8)
}

fn bit(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r8(ops.src);
    cpu.alu_bit(ops.bit, value);
    8 + indirect(ops.src, 4)
}

fn res(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r8(ops.src) & !(1 << ops.bit);
    cpu.write_r8(ops.src, value);
    8 + indirect(ops.src, 8)
}

fn set(cpu: &mut Cpu, ops: Operands) -> u32 {
    let value = cpu.read_r8(ops.src) | 1 << ops.bit;
    cpu.write_r8(ops.src, value);
    8 + indirect(ops.src, 8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNDEFINED: [u8; 11] = [
        0xd3, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd,
    ];

    #[test]
    fn only_undefined_opcodes_are_unknown() {
        let table = base_table();
        for opcode in 0..=255u8 {
            let is_unknown = table[opcode as usize].exec as usize == unknown as usize;
            assert_eq!(
                is_unknown,
                UNDEFINED.contains(&opcode),
                "opcode 0x{:02x}",
                opcode
            );
        }
    }

    #[test]
    fn mnemonics_match_decoded_registers() {
        let table = base_table();
        for opcode in 0x40..=0x7fu8 {
            if opcode == 0x76 {
                continue;
            }
            let ops = table[opcode as usize].operands;
            assert_eq!(
                table[opcode as usize].mnemonic,
                format!("LD {},{}", ops.dst, ops.src)
            );
        }
    }

    #[test]
    fn prefixed_decode_uses_nibble_arithmetic() {
        let table = prefixed_table();
        assert_eq!(table[0x00].text(), "RLC B");
        assert_eq!(table[0x3e].text(), "SRL (HL)");
        assert_eq!(table[0x47].text(), "BIT 0,A");
        assert_eq!(table[0x7c].text(), "BIT 7,H");
        assert_eq!(table[0x8e].text(), "RES 1,(HL)");
        assert_eq!(table[0xf9].text(), "SET 7,C");
    }

    #[test]
    fn conditions_and_stack_pairs() {
        let table = base_table();
        assert_eq!(table[0x20].operands.cond, Cond::NZ);
        assert_eq!(table[0x38].operands.cond, Cond::C);
        assert_eq!(table[0xc8].operands.cond, Cond::Z);
        assert_eq!(table[0xc3].operands.cond, Cond::Always);
        assert_eq!(table[0xf5].operands.pair, R16::AF);
        assert_eq!(table[0x31].operands.pair, R16::SP);
    }
}
