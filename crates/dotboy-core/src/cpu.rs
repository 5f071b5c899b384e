use thiserror::Error;

use crate::{hardware::Model, interrupts, mmu::Mmu};

// CPU flag bits as documented in gbdev.io/pandocs/The_CPU_Flags.html
const FLAG_Z: u8 = 0x80; // Zero
const FLAG_N: u8 = 0x40; // Subtract
const FLAG_H: u8 = 0x20; // Half Carry
const FLAG_C: u8 = 0x10; // Carry

// Post-boot CPU state from gbdev.io/pandocs/Power_Up_State.html
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

const DMG_BOOT_AF: u16 = 0x01B0;
const DMG_BOOT_BC: u16 = 0x0013;
const DMG_BOOT_DE: u16 = 0x00D8;
const DMG_BOOT_HL: u16 = 0x014D;

const CGB_BOOT_AF: u16 = 0x1180;
const CGB_BOOT_BC: u16 = 0x0000;
const CGB_BOOT_DE: u16 = 0xFF56;
const CGB_BOOT_HL: u16 = 0x000D;

/// Cost of pushing PC and jumping to an interrupt vector.
const INTERRUPT_DISPATCH_CYCLES: u32 = 20;

// Extra cycles spent when a conditional branch is taken.
const JR_TAKEN_CYCLES: u32 = 4;
const JP_TAKEN_CYCLES: u32 = 4;
const CALL_TAKEN_CYCLES: u32 = 12;
const RET_TAKEN_CYCLES: u32 = 12;

/// T-cycles of every unprefixed opcode. Conditional branches list their
/// not-taken cost; undefined opcodes are 0.
#[rustfmt::skip]
const CYCLES: [u8; 256] = [
//  x0  x1  x2  x3  x4  x5  x6  x7  x8  x9  xA  xB  xC  xD  xE  xF
     4, 12,  8,  8,  4,  4,  8,  4, 20,  8,  8,  8,  4,  4,  8,  4, // 0x
     4, 12,  8,  8,  4,  4,  8,  4, 12,  8,  8,  8,  4,  4,  8,  4, // 1x
     8, 12,  8,  8,  4,  4,  8,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 2x
     8, 12,  8,  8, 12, 12, 12,  4,  8,  8,  8,  8,  4,  4,  8,  4, // 3x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 4x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 5x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 6x
     8,  8,  8,  8,  8,  8,  4,  8,  4,  4,  4,  4,  4,  4,  8,  4, // 7x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 8x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // 9x
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Ax
     4,  4,  4,  4,  4,  4,  8,  4,  4,  4,  4,  4,  4,  4,  8,  4, // Bx
     8, 12, 12, 16, 12, 16,  8, 16,  8, 16, 12,  4, 12, 24,  8, 16, // Cx
     8, 12, 12,  0, 12, 16,  8, 16,  8, 16, 12,  0, 12,  0,  8, 16, // Dx
    12, 12,  8,  0,  0, 16,  8, 16, 16,  4, 16,  0,  0,  0,  8, 16, // Ex
    12, 12,  8,  4,  0, 16,  8, 16, 12,  8, 16,  4,  0,  0,  8, 16, // Fx
];

/// T-cycles of every CB-prefixed opcode, prefix included.
const CB_CYCLES: [u8; 256] = cb_cycles();

const fn cb_cycles() -> [u8; 256] {
    let mut table = [8u8; 256];
    let mut op = 0;
    while op < 256 {
        if op & 0x07 == 6 {
            // BIT n,(HL) only reads memory
            table[op] = if op >= 0x40 && op < 0x80 { 12 } else { 16 };
        }
        op += 1;
    }
    table
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("unknown opcode {opcode:#04X} at {pc:#06X}")]
    UnknownOpcode { opcode: u8, pc: u16 },
}

pub struct Cpu {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
    pub cycles: u64,
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    halt_bug: bool,
    /// EI executed; IME turns on after the next instruction.
    ime_pending: bool,
}

impl Cpu {
    /// Create a CPU initialized to the post-boot register state for the
    /// selected hardware model.
    pub fn new_with_mode(model: Model) -> Self {
        let mut cpu = Self::new_power_on();
        cpu.apply_boot_state(model);
        cpu
    }

    /// Create a CPU in the power-on state a boot ROM starts from.
    pub fn new_power_on() -> Self {
        Self {
            a: 0,
            f: 0,
            b: 0,
            c: 0,
            d: 0,
            e: 0,
            h: 0,
            l: 0,
            pc: 0x0000,
            sp: 0x0000,
            cycles: 0,
            ime: false,
            halted: false,
            stopped: false,
            halt_bug: false,
            ime_pending: false,
        }
    }

    /// Load the registers the boot ROM hands over with, jumping to the
    /// cartridge entry point.
    pub fn apply_boot_state(&mut self, model: Model) {
        let (af, bc, de, hl) = match model {
            Model::Dmg => (DMG_BOOT_AF, DMG_BOOT_BC, DMG_BOOT_DE, DMG_BOOT_HL),
            Model::Cgb => (CGB_BOOT_AF, CGB_BOOT_BC, CGB_BOOT_DE, CGB_BOOT_HL),
        };
        self.set_af(af);
        self.set_bc(bc);
        self.set_de(de);
        self.set_hl(hl);
        self.pc = BOOT_PC;
        self.sp = BOOT_SP;
        self.ime = false;
        self.ime_pending = false;
        self.halted = false;
        self.stopped = false;
        self.halt_bug = false;
    }

    pub fn get_af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = val as u8 & 0xF0;
    }

    pub fn get_bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn get_de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn get_hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    pub fn debug_state(&self) -> String {
        format!(
            "A:{:02X} F:{:02X} B:{:02X} C:{:02X} D:{:02X} E:{:02X} H:{:02X} L:{:02X} SP:{:04X} PC:{:04X} IME:{}",
            self.a,
            self.f,
            self.b,
            self.c,
            self.d,
            self.e,
            self.h,
            self.l,
            self.sp,
            self.pc,
            self.ime as u8
        )
    }

    /// Register pair by the 2-bit index used in opcodes: BC, DE, HL, SP.
    fn get_rp(&self, index: u8) -> u16 {
        match index & 0x03 {
            0 => self.get_bc(),
            1 => self.get_de(),
            2 => self.get_hl(),
            _ => self.sp,
        }
    }

    fn set_rp(&mut self, index: u8, val: u16) {
        match index & 0x03 {
            0 => self.set_bc(val),
            1 => self.set_de(val),
            2 => self.set_hl(val),
            _ => self.sp = val,
        }
    }

    fn fetch8(&mut self, mmu: &mut Mmu) -> u8 {
        let val = mmu.read_byte(self.pc);
        self.pc = self.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = self.fetch8(mmu) as u16;
        let hi = self.fetch8(mmu) as u16;
        (hi << 8) | lo
    }

    fn push_stack(&mut self, mmu: &mut Mmu, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        mmu.write_byte(self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        mmu.write_byte(self.sp, val as u8);
    }

    fn pop_stack(&mut self, mmu: &mut Mmu) -> u16 {
        let lo = mmu.read_byte(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        let hi = mmu.read_byte(self.sp) as u16;
        self.sp = self.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    fn read_reg(&mut self, mmu: &mut Mmu, index: u8) -> u8 {
        match index {
            0 => self.b,
            1 => self.c,
            2 => self.d,
            3 => self.e,
            4 => self.h,
            5 => self.l,
            6 => mmu.read_byte(self.get_hl()),
            _ => self.a,
        }
    }

    fn write_reg(&mut self, mmu: &mut Mmu, index: u8, val: u8) {
        match index {
            0 => self.b = val,
            1 => self.c = val,
            2 => self.d = val,
            3 => self.e = val,
            4 => self.h = val,
            5 => self.l = val,
            6 => mmu.write_byte(self.get_hl(), val),
            _ => self.a = val,
        }
    }

    /// Branch condition by the 2-bit index used in opcodes: NZ, Z, NC, C.
    fn condition(&self, index: u8) -> bool {
        match index & 0x03 {
            0 => self.f & FLAG_Z == 0,
            1 => self.f & FLAG_Z != 0,
            2 => self.f & FLAG_C == 0,
            _ => self.f & FLAG_C != 0,
        }
    }

    fn inc8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.f = (self.f & FLAG_C)
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0x0F { FLAG_H } else { 0 };
        res
    }

    fn dec8(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.f = (self.f & FLAG_C)
            | FLAG_N
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0 { FLAG_H } else { 0 };
        res
    }

    fn add_hl(&mut self, val: u16) {
        let hl = self.get_hl();
        let res = hl.wrapping_add(val);
        self.f = (self.f & FLAG_Z)
            | if (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF { FLAG_H } else { 0 }
            | if hl as u32 + val as u32 > 0xFFFF { FLAG_C } else { 0 };
        self.set_hl(res);
    }

    /// SP plus a signed immediate, with flags from the low-byte addition
    /// (ADD SP,e and LD HL,SP+e).
    fn sp_plus_offset(&mut self, mmu: &mut Mmu) -> u16 {
        let offset = self.fetch8(mmu) as i8 as i16 as u16;
        let sp = self.sp;
        self.f = if (sp & 0x000F) + (offset & 0x000F) > 0x000F { FLAG_H } else { 0 }
            | if (sp & 0x00FF) + (offset & 0x00FF) > 0x00FF { FLAG_C } else { 0 };
        sp.wrapping_add(offset)
    }

    /// 8-bit ALU operation on A selected by opcode bits 3-5:
    /// ADD, ADC, SUB, SBC, AND, XOR, OR, CP.
    fn alu(&mut self, op: u8, val: u8) {
        let carry = if self.f & FLAG_C != 0 { 1u8 } else { 0 };
        match op & 0x07 {
            0 | 1 => {
                let c = if op == 1 { carry } else { 0 };
                let sum = self.a as u16 + val as u16 + c as u16;
                let res = sum as u8;
                self.f = if res == 0 { FLAG_Z } else { 0 }
                    | if (self.a & 0x0F) + (val & 0x0F) + c > 0x0F { FLAG_H } else { 0 }
                    | if sum > 0xFF { FLAG_C } else { 0 };
                self.a = res;
            }
            2 | 3 | 7 => {
                let c = if op == 3 { carry } else { 0 };
                let res = self.a.wrapping_sub(val).wrapping_sub(c);
                self.f = FLAG_N
                    | if res == 0 { FLAG_Z } else { 0 }
                    | if (self.a & 0x0F) < (val & 0x0F) + c { FLAG_H } else { 0 }
                    | if (self.a as u16) < val as u16 + c as u16 { FLAG_C } else { 0 };
                if op != 7 {
                    self.a = res;
                }
            }
            4 => {
                self.a &= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 } | FLAG_H;
            }
            5 => {
                self.a ^= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
            _ => {
                self.a |= val;
                self.f = if self.a == 0 { FLAG_Z } else { 0 };
            }
        }
    }

    fn daa(&mut self) {
        let mut a = self.a;
        let mut carry = self.f & FLAG_C != 0;
        if self.f & FLAG_N == 0 {
            if carry || a > 0x99 {
                a = a.wrapping_add(0x60);
                carry = true;
            }
            if self.f & FLAG_H != 0 || a & 0x0F > 0x09 {
                a = a.wrapping_add(0x06);
            }
        } else {
            if carry {
                a = a.wrapping_sub(0x60);
            }
            if self.f & FLAG_H != 0 {
                a = a.wrapping_sub(0x06);
            }
        }
        self.f = (self.f & FLAG_N)
            | if a == 0 { FLAG_Z } else { 0 }
            | if carry { FLAG_C } else { 0 };
        self.a = a;
    }

    fn handle_cb(&mut self, opcode: u8, mmu: &mut Mmu) {
        let r = opcode & 0x07;
        let val = self.read_reg(mmu, r);
        let carry_in = (self.f & FLAG_C != 0) as u8;
        let (res, carry_out) = match opcode {
            // RLC, RRC, RL, RR, SLA, SRA, SWAP, SRL
            0x00..=0x07 => (val.rotate_left(1), val & 0x80 != 0),
            0x08..=0x0F => (val.rotate_right(1), val & 0x01 != 0),
            0x10..=0x17 => ((val << 1) | carry_in, val & 0x80 != 0),
            0x18..=0x1F => ((val >> 1) | (carry_in << 7), val & 0x01 != 0),
            0x20..=0x27 => (val << 1, val & 0x80 != 0),
            0x28..=0x2F => ((val >> 1) | (val & 0x80), val & 0x01 != 0),
            0x30..=0x37 => (val.rotate_left(4), false),
            0x38..=0x3F => (val >> 1, val & 0x01 != 0),
            0x40..=0x7F => {
                let bit = (opcode - 0x40) >> 3;
                self.f =
                    (self.f & FLAG_C) | FLAG_H | if val & (1 << bit) == 0 { FLAG_Z } else { 0 };
                return;
            }
            0x80..=0xBF => {
                let bit = (opcode - 0x80) >> 3;
                self.write_reg(mmu, r, val & !(1 << bit));
                return;
            }
            0xC0..=0xFF => {
                let bit = (opcode - 0xC0) >> 3;
                self.write_reg(mmu, r, val | (1 << bit));
                return;
            }
        };
        self.write_reg(mmu, r, res);
        self.f = if res == 0 { FLAG_Z } else { 0 } | if carry_out { FLAG_C } else { 0 };
    }

    fn dispatch_interrupt(&mut self, mmu: &mut Mmu) -> bool {
        let Some(interrupt) = interrupts::highest_pending(mmu.if_reg, mmu.ie_reg) else {
            return false;
        };
        mmu.if_reg &= !interrupt.bit();
        self.ime = false;
        self.ime_pending = false;
        let pc = self.pc;
        self.push_stack(mmu, pc);
        self.pc = interrupt.vector();
        true
    }

    /// Execute one instruction, or idle one machine cycle while halted or
    /// stopped, then service interrupts. Returns the T-cycles consumed.
    pub fn step(&mut self, mmu: &mut Mmu) -> Result<u32, CpuError> {
        let mut cycles = if self.stopped {
            if mmu.take_speed_switch() {
                self.stopped = false;
            }
            4
        } else if self.halted {
            4
        } else {
            let enable_ime = self.ime_pending;
            let opcode = mmu.read_byte(self.pc);
            #[cfg(feature = "cpu-trace")]
            log::trace!("{:04X}: {:02X} {}", self.pc, opcode, self.debug_state());
            if self.halt_bug {
                // The byte after HALT is read twice.
                self.halt_bug = false;
            } else {
                self.pc = self.pc.wrapping_add(1);
            }
            let cycles = self.execute(opcode, mmu)?;
            if enable_ime && self.ime_pending {
                self.ime = true;
                self.ime_pending = false;
            }
            cycles
        };

        if self.halted && mmu.pending_interrupts() != 0 {
            self.halted = false;
        }
        if self.ime && !self.halted && !self.stopped && self.dispatch_interrupt(mmu) {
            cycles += INTERRUPT_DISPATCH_CYCLES;
        }

        self.cycles += cycles as u64;
        Ok(cycles)
    }

    fn execute(&mut self, opcode: u8, mmu: &mut Mmu) -> Result<u32, CpuError> {
        let mut cycles = CYCLES[opcode as usize] as u32;
        match opcode {
            0x00 => {}
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.fetch16(mmu);
                self.set_rp(opcode >> 4, val);
            }
            0x02 => mmu.write_byte(self.get_bc(), self.a),
            0x12 => mmu.write_byte(self.get_de(), self.a),
            0x22 => {
                let hl = self.get_hl();
                mmu.write_byte(hl, self.a);
                self.set_hl(hl.wrapping_add(1));
            }
            0x32 => {
                let hl = self.get_hl();
                mmu.write_byte(hl, self.a);
                self.set_hl(hl.wrapping_sub(1));
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let val = self.get_rp(opcode >> 4).wrapping_add(1);
                self.set_rp(opcode >> 4, val);
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let val = self.get_rp(opcode >> 4).wrapping_sub(1);
                self.set_rp(opcode >> 4, val);
            }
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                let r = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, r);
                let res = self.inc8(val);
                self.write_reg(mmu, r, res);
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                let r = (opcode >> 3) & 0x07;
                let val = self.read_reg(mmu, r);
                let res = self.dec8(val);
                self.write_reg(mmu, r, res);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                let val = self.fetch8(mmu);
                self.write_reg(mmu, (opcode >> 3) & 0x07, val);
            }
            0x07 => {
                let carry = self.a & 0x80 != 0;
                self.a = self.a.rotate_left(1);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x0F => {
                let carry = self.a & 0x01 != 0;
                self.a = self.a.rotate_right(1);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x17 => {
                let carry = self.a & 0x80 != 0;
                self.a = (self.a << 1) | (self.f & FLAG_C != 0) as u8;
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x1F => {
                let carry = self.a & 0x01 != 0;
                self.a = (self.a >> 1) | (((self.f & FLAG_C != 0) as u8) << 7);
                self.f = if carry { FLAG_C } else { 0 };
            }
            0x08 => {
                let addr = self.fetch16(mmu);
                mmu.write_word(addr, self.sp);
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                let val = self.get_rp(opcode >> 4);
                self.add_hl(val);
            }
            0x0A => self.a = mmu.read_byte(self.get_bc()),
            0x1A => self.a = mmu.read_byte(self.get_de()),
            0x2A => {
                let hl = self.get_hl();
                self.a = mmu.read_byte(hl);
                self.set_hl(hl.wrapping_add(1));
            }
            0x3A => {
                let hl = self.get_hl();
                self.a = mmu.read_byte(hl);
                self.set_hl(hl.wrapping_sub(1));
            }
            0x10 => {
                // STOP is two bytes long; the second is ignored.
                self.fetch8(mmu);
                mmu.timer.reset_div();
                self.stopped = true;
            }
            0x18 => {
                let offset = self.fetch8(mmu) as i8;
                self.pc = self.pc.wrapping_add_signed(offset as i16);
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8(mmu) as i8;
                if self.condition(opcode >> 3) {
                    self.pc = self.pc.wrapping_add_signed(offset as i16);
                    cycles += JR_TAKEN_CYCLES;
                }
            }
            0x27 => self.daa(),
            0x2F => {
                self.a = !self.a;
                self.f = (self.f & (FLAG_Z | FLAG_C)) | FLAG_N | FLAG_H;
            }
            0x37 => self.f = (self.f & FLAG_Z) | FLAG_C,
            0x3F => self.f = (self.f & FLAG_Z) | ((self.f & FLAG_C) ^ FLAG_C),
            0x76 => {
                if !self.ime && mmu.pending_interrupts() != 0 {
                    self.halt_bug = true;
                } else {
                    self.halted = true;
                }
            }
            0x40..=0x7F => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.write_reg(mmu, (opcode >> 3) & 0x07, val);
            }
            0x80..=0xBF => {
                let val = self.read_reg(mmu, opcode & 0x07);
                self.alu((opcode >> 3) & 0x07, val);
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.fetch8(mmu);
                self.alu((opcode >> 3) & 0x07, val);
            }
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                if self.condition(opcode >> 3) {
                    self.pc = self.pop_stack(mmu);
                    cycles += RET_TAKEN_CYCLES;
                }
            }
            0xC9 => self.pc = self.pop_stack(mmu),
            0xD9 => {
                self.pc = self.pop_stack(mmu);
                self.ime = true;
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let val = self.pop_stack(mmu);
                match (opcode >> 4) & 0x03 {
                    3 => self.set_af(val),
                    index => self.set_rp(index, val),
                }
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let val = match (opcode >> 4) & 0x03 {
                    3 => self.get_af(),
                    index => self.get_rp(index),
                };
                self.push_stack(mmu, val);
            }
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16(mmu);
                if self.condition(opcode >> 3) {
                    self.pc = addr;
                    cycles += JP_TAKEN_CYCLES;
                }
            }
            0xC3 => self.pc = self.fetch16(mmu),
            0xE9 => self.pc = self.get_hl(),
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16(mmu);
                if self.condition(opcode >> 3) {
                    let ret = self.pc;
                    self.push_stack(mmu, ret);
                    self.pc = addr;
                    cycles += CALL_TAKEN_CYCLES;
                }
            }
            0xCD => {
                let addr = self.fetch16(mmu);
                let ret = self.pc;
                self.push_stack(mmu, ret);
                self.pc = addr;
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let ret = self.pc;
                self.push_stack(mmu, ret);
                self.pc = (opcode & 0x38) as u16;
            }
            0xCB => {
                let cb = self.fetch8(mmu);
                self.handle_cb(cb, mmu);
                cycles = CB_CYCLES[cb as usize] as u32;
            }
            0xE0 => {
                let addr = 0xFF00 | self.fetch8(mmu) as u16;
                mmu.write_byte(addr, self.a);
            }
            0xF0 => {
                let addr = 0xFF00 | self.fetch8(mmu) as u16;
                self.a = mmu.read_byte(addr);
            }
            0xE2 => mmu.write_byte(0xFF00 | self.c as u16, self.a),
            0xF2 => self.a = mmu.read_byte(0xFF00 | self.c as u16),
            0xEA => {
                let addr = self.fetch16(mmu);
                mmu.write_byte(addr, self.a);
            }
            0xFA => {
                let addr = self.fetch16(mmu);
                self.a = mmu.read_byte(addr);
            }
            0xE8 => self.sp = self.sp_plus_offset(mmu),
            0xF8 => {
                let val = self.sp_plus_offset(mmu);
                self.set_hl(val);
            }
            0xF9 => self.sp = self.get_hl(),
            0xF3 => {
                self.ime = false;
                self.ime_pending = false;
            }
            0xFB => self.ime_pending = true,
            _ => {
                return Err(CpuError::UnknownOpcode {
                    opcode,
                    pc: self.pc.wrapping_sub(1),
                });
            }
        }
        Ok(cycles)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new_with_mode(Model::Dmg)
    }
}
