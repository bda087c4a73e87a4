//! CPU execution engine for the DCPU-16.
//!
//! Implements the fetch-decode-execute cycle and all opcode behaviors.

use crate::cpu::{arith, Memory, Registers};
use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::Register;
use crate::cpu::value::{self, Cursor, Location};
use log::{debug, trace};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// What an opcode does once both operands are read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    /// Store into a's location, optionally reporting overflow first.
    Store { value: u16, overflow: Option<bool> },
    /// Conditional opcodes: skip the next word when `skip` is set.
    Branch { skip: bool },
}

/// The DCPU-16 CPU.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    pub(crate) regs: Registers,
    pub(crate) mem: Memory,
    /// Instruction count.
    pub(crate) cycles: u64,
}

impl Cpu {
    /// Create a new CPU with zeroed state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            cycles: 0,
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.cycles = 0;
    }

    /// Copy a block of words into memory starting at `address`.
    pub fn load(&mut self, address: u16, words: &[u16]) -> Result<(), MemoryError> {
        self.mem.load(address, words)?;
        debug!("loaded {} words at {:#06x}", words.len(), address);
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. On a decode fault nothing
    /// is modified and PC still points at the faulting word.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        let word = self.mem.read(self.regs.pc);
        let (op, a, b) = decode::split(word);
        trace!("{:04x}: {:04x}", self.regs.pc, word);
        self.issue(op, a, b)
    }

    /// Decode and execute an already-split field triple as if it had been
    /// fetched from the current PC.
    pub fn issue(&mut self, op: u16, a: u16, b: u16) -> Result<Instruction, CpuError> {
        let instr = decode::decode_fields(op, a, b)
            .map_err(|source| CpuError::Decode { pc: self.regs.pc, source })?;
        self.execute(instr);
        Ok(instr)
    }

    /// Run at most `max_cycles` instructions, stopping at the first fault.
    ///
    /// Returns the number of instructions executed.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    pub fn execute(&mut self, instr: Instruction) {
        match instr {
            Instruction::Nop => {
                self.regs.advance_pc();
            }

            Instruction::Basic { opcode, a, b } => {
                // a is resolved and read before b's side effects happen
                let start = self.regs.cursor();
                let (loc_a, cursor) = value::resolve(a, start, &self.regs, &self.mem);
                let a = self.read(loc_a, cursor);
                let (loc_b, cursor) = value::resolve(b, cursor, &self.regs, &self.mem);
                let b = self.read(loc_b, cursor);
                debug_assert_eq!(cursor.pc.wrapping_sub(start.pc), instr.size() - 1);
                self.regs.commit(cursor);

                match apply(opcode, a, b) {
                    Effect::Store { value, overflow } => {
                        if let Some(overflow) = overflow {
                            self.regs.overflow = overflow;
                        }
                        self.write(loc_a, value);
                        self.regs.advance_pc();
                    }
                    Effect::Branch { skip } => {
                        self.regs.advance_pc();
                        if skip {
                            self.regs.advance_pc();
                        }
                    }
                }
            }
        }

        self.cycles += 1;
    }

    /// Read a location as it stands at `cursor`, mid-resolution.
    fn read(&self, loc: Location, cursor: Cursor) -> u16 {
        match loc {
            Location::Register(r) => self.regs.get(r),
            Location::Memory(addr) => self.mem.read(addr),
            Location::StackPointer => cursor.sp,
            Location::ProgramCounter => cursor.pc,
            Location::Overflow => self.regs.overflow_word(),
            Location::Literal(value) => value,
        }
    }

    fn write(&mut self, loc: Location, value: u16) {
        match loc {
            Location::Register(r) => self.regs.set(r, value),
            Location::Memory(addr) => self.mem.write(addr, value),
            Location::StackPointer => self.regs.sp = value,
            Location::ProgramCounter => self.regs.pc = value,
            Location::Overflow => self.regs.overflow = value != 0,
            Location::Literal(_) => {}
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn register(&self, reg: Register) -> u16 {
        self.regs.get(reg)
    }

    pub fn pc(&self) -> u16 {
        self.regs.pc
    }

    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    pub fn overflow(&self) -> bool {
        self.regs.overflow
    }

    /// Instructions executed since creation or the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

/// Opcode semantics over the two operand values.
fn apply(opcode: Opcode, a: u16, b: u16) -> Effect {
    let arithmetic = |(value, overflow): (u16, bool)| Effect::Store {
        value,
        overflow: Some(overflow),
    };
    let logic = |value: u16| Effect::Store { value, overflow: None };

    let effect = match opcode {
        Opcode::Set => logic(b),
        Opcode::Add => arithmetic(arith::add(a, b)),
        Opcode::Sub => arithmetic(arith::sub(a, b)),
        Opcode::Mul => arithmetic(arith::mul(a, b)),
        Opcode::Div => arithmetic(arith::div(a, b)),
        Opcode::Mod => arithmetic(arith::modulo(a, b)),
        Opcode::Shl => arithmetic(arith::shl(a, b)),
        Opcode::Shr => arithmetic(arith::shr(a, b)),
        Opcode::And => logic(a & b),
        Opcode::Bor => logic(a | b),
        Opcode::Xor => logic(a ^ b),
        Opcode::Ife => Effect::Branch { skip: a != b },
        Opcode::Ifn => Effect::Branch { skip: a == b },
        Opcode::Ifg => Effect::Branch { skip: a <= b },
        Opcode::Ifb => Effect::Branch { skip: (a & b) == 0 },
    };

    debug_assert_eq!(matches!(effect, Effect::Branch { .. }), opcode.is_conditional());
    debug_assert_eq!(
        matches!(effect, Effect::Store { overflow: Some(_), .. }),
        opcode.sets_overflow()
    );
    effect
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("mem", &self.mem)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("decode error at PC={pc:#06x}: {source}")]
    Decode {
        pc: u16,
        #[source]
        source: DecodeError,
    },
}

impl CpuError {
    pub fn is_unknown_opcode(&self) -> bool {
        matches!(self, CpuError::Decode { source: DecodeError::UnknownOpcode(_), .. })
    }

    pub fn is_unknown_value_code(&self) -> bool {
        matches!(self, CpuError::Decode { source: DecodeError::UnknownValueCode(_), .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::value::Value;
    use crate::cpu::registers::Register::*;

    fn reg(r: Register) -> Value {
        Value::Register(r)
    }

    fn lit(n: u8) -> Value {
        Value::Literal(n)
    }

    fn cpu_with(program: &[u16]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load(0, program).unwrap();
        cpu
    }

    #[test]
    fn test_new_is_zeroed() {
        let cpu = Cpu::new();
        assert_eq!(cpu.pc(), 0);
        assert_eq!(cpu.sp(), 0);
        assert!(!cpu.overflow());
        assert_eq!(cpu.registers().gp, [0; 8]);
        assert!(cpu.memory().as_slice().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_set_literal() {
        let mut cpu = cpu_with(&[encode(Opcode::Set, reg(A), lit(5))]);
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 5);
        assert_eq!(cpu.pc(), 1);
        assert_eq!(cpu.cycles(), 1);
    }

    #[test]
    fn test_set_next_word_literal() {
        let mut cpu = cpu_with(&[encode(Opcode::Set, reg(A), Value::NextWordLiteral), 0x0030]);
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 0x30);
        assert_eq!(cpu.pc(), 2);
    }

    #[test]
    fn test_add_overflow() {
        let mut cpu = cpu_with(&[encode(Opcode::Add, reg(A), lit(1))]);
        cpu.regs.set(A, 0xFFFF);
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 0);
        assert!(cpu.overflow());
    }

    #[test]
    fn test_add_clears_overflow() {
        let mut cpu = cpu_with(&[encode(Opcode::Add, reg(A), lit(1))]);
        cpu.regs.overflow = true;
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 1);
        assert!(!cpu.overflow());
    }

    #[test]
    fn test_sub_underflow() {
        let mut cpu = cpu_with(&[encode(Opcode::Sub, reg(B), lit(1))]);
        cpu.step().unwrap();

        assert_eq!(cpu.register(B), 0xFFFF);
        assert!(cpu.overflow());
    }

    #[test]
    fn test_div_by_zero_does_not_fault() {
        let mut cpu = cpu_with(&[encode(Opcode::Div, reg(A), lit(0))]);
        cpu.regs.set(A, 1234);
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 0);
        assert!(cpu.overflow());
    }

    #[test]
    fn test_div_truncates() {
        let mut cpu = cpu_with(&[encode(Opcode::Div, reg(A), lit(4))]);
        cpu.regs.set(A, 15);
        cpu.regs.overflow = true;
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 3);
        assert!(!cpu.overflow());
    }

    #[test]
    fn test_mod_by_zero() {
        let mut cpu = cpu_with(&[encode(Opcode::Mod, reg(A), lit(0))]);
        cpu.regs.set(A, 77);
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 0);
    }

    #[test]
    fn test_logic_leaves_overflow() {
        let mut cpu = cpu_with(&[
            encode(Opcode::And, reg(A), lit(0x0F)),
            encode(Opcode::Bor, reg(A), lit(0x10)),
            encode(Opcode::Xor, reg(A), lit(0x01)),
            encode(Opcode::Set, reg(B), lit(3)),
        ]);
        cpu.regs.set(A, 0xFF);
        cpu.regs.overflow = true;
        cpu.run_limited(4).unwrap();

        assert_eq!(cpu.register(A), 0x1E);
        assert_eq!(cpu.register(B), 3);
        assert!(cpu.overflow());
    }

    #[test]
    fn test_shifts() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Shl, reg(A), lit(4)),
            encode(Opcode::Shr, reg(B), lit(1)),
        ]);
        cpu.regs.set(A, 0x1234);
        cpu.regs.set(B, 0x0003);

        cpu.step().unwrap();
        assert_eq!(cpu.register(A), 0x2340);
        assert!(cpu.overflow());

        cpu.step().unwrap();
        assert_eq!(cpu.register(B), 0x0001);
        assert!(cpu.overflow());
    }

    #[test]
    fn test_ife_false_skips_one_instruction() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Ife, reg(A), lit(1)),
            encode(Opcode::Set, reg(B), lit(7)),
            encode(Opcode::Set, reg(C), lit(9)),
        ]);
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 2);
        cpu.step().unwrap();

        assert_eq!(cpu.register(B), 0);
        assert_eq!(cpu.register(C), 9);
        assert_eq!(cpu.pc(), 3);
    }

    #[test]
    fn test_ife_true_runs_next() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Ife, reg(A), lit(0)),
            encode(Opcode::Set, reg(B), lit(7)),
        ]);
        cpu.run_limited(2).unwrap();
        assert_eq!(cpu.register(B), 7);
    }

    #[test]
    fn test_conditional_polarity() {
        // (opcode, a, b, skipped)
        let cases = [
            (Opcode::Ife, 3, 3, false),
            (Opcode::Ife, 3, 4, true),
            (Opcode::Ifn, 3, 3, true),
            (Opcode::Ifn, 3, 4, false),
            (Opcode::Ifg, 4, 3, false),
            (Opcode::Ifg, 3, 3, true),
            (Opcode::Ifg, 2, 3, true),
            (Opcode::Ifb, 0b0110, 0b0100, false),
            (Opcode::Ifb, 0b0110, 0b1001, true),
        ];

        for (opcode, a, b, skipped) in cases {
            for overflow in [true, false] {
                let mut cpu = cpu_with(&[encode(opcode, reg(A), lit(b))]);
                cpu.regs.set(A, a);
                cpu.regs.overflow = overflow;
                cpu.step().unwrap();
                let expected_pc = if skipped { 2 } else { 1 };
                assert_eq!(cpu.pc(), expected_pc, "{:?} {} {}", opcode, a, b);
                assert_eq!(cpu.register(A), a);
                assert_eq!(cpu.overflow(), overflow, "{:?} touched O", opcode);
            }
        }
    }

    #[test]
    fn test_push_then_pop() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Set, Value::Push, Value::NextWordLiteral),
            0xCAFE,
            encode(Opcode::Set, reg(X), Value::Pop),
        ]);

        cpu.step().unwrap();
        assert_eq!(cpu.sp(), 0xFFFF);
        assert_eq!(cpu.memory().read(0xFFFF), 0xCAFE);

        cpu.step().unwrap();
        assert_eq!(cpu.register(X), 0xCAFE);
        assert_eq!(cpu.sp(), 0);
    }

    #[test]
    fn test_push_destination_moves_sp_once() {
        let mut cpu = cpu_with(&[encode(Opcode::Add, Value::Push, lit(1))]);
        cpu.regs.sp = 0x100;
        cpu.mem.write(0xFF, 41);
        cpu.step().unwrap();

        assert_eq!(cpu.sp(), 0xFF);
        assert_eq!(cpu.memory().read(0xFF), 42);
    }

    #[test]
    fn test_peek() {
        let mut cpu = cpu_with(&[encode(Opcode::Set, reg(A), Value::Peek)]);
        cpu.regs.sp = 0x200;
        cpu.mem.write(0x200, 9);
        cpu.step().unwrap();

        assert_eq!(cpu.register(A), 9);
        assert_eq!(cpu.sp(), 0x200);
    }

    #[test]
    fn test_indirect_modes() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Set, Value::RegisterIndirect(I), lit(3)),
            encode(Opcode::Set, Value::NextWordPlusRegister(I), lit(4)),
            0x0010,
            encode(Opcode::Set, Value::NextWordIndirect, lit(5)),
            0x3000,
        ]);
        cpu.regs.set(I, 0x1000);
        cpu.run_limited(3).unwrap();

        assert_eq!(cpu.memory().read(0x1000), 3);
        assert_eq!(cpu.memory().read(0x1010), 4);
        assert_eq!(cpu.memory().read(0x3000), 5);
        assert_eq!(cpu.pc(), 5);
    }

    #[test]
    fn test_both_operands_consume_words_in_order() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Set, Value::NextWordIndirect, Value::NextWordLiteral),
            0x2000,
            0xABCD,
        ]);
        cpu.step().unwrap();

        assert_eq!(cpu.memory().read(0x2000), 0xABCD);
        assert_eq!(cpu.pc(), 3);
    }

    #[test]
    fn test_write_to_literal_is_discarded() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Set, Value::NextWordLiteral, lit(7)),
            0x1234,
            encode(Opcode::Add, lit(3), lit(7)),
        ]);
        cpu.regs.overflow = true;
        cpu.run_limited(2).unwrap();

        assert_eq!(cpu.memory().read(1), 0x1234);
        assert_eq!(cpu.memory().read(2), encode(Opcode::Add, lit(3), lit(7)));
        assert_eq!(cpu.registers().gp, [0; 8]);
        assert_eq!(cpu.pc(), 3);
        // ADD still rewrites O even though its result went nowhere
        assert!(!cpu.overflow());
    }

    #[test]
    fn test_overflow_location() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Set, Value::Overflow, lit(5)),
            encode(Opcode::Set, reg(A), Value::Overflow),
            encode(Opcode::Add, Value::Overflow, lit(0)),
        ]);

        cpu.step().unwrap();
        assert!(cpu.overflow());
        cpu.step().unwrap();
        assert_eq!(cpu.register(A), 1);
        // ADD reports no overflow, then stores 1 + 0 into O
        cpu.step().unwrap();
        assert!(cpu.overflow());
    }

    #[test]
    fn test_set_pc_then_advance() {
        let mut cpu = cpu_with(&[encode(Opcode::Set, Value::ProgramCounter, lit(10))]);
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 11);
    }

    #[test]
    fn test_read_pc_and_sp() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Set, reg(A), Value::ProgramCounter),
            encode(Opcode::Set, Value::StackPointer, lit(20)),
            encode(Opcode::Set, reg(B), Value::StackPointer),
        ]);
        cpu.run_limited(3).unwrap();

        assert_eq!(cpu.register(A), 0);
        assert_eq!(cpu.register(B), 20);
        assert_eq!(cpu.sp(), 20);
    }

    #[test]
    fn test_pc_operand_read_before_next_word() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Add, Value::ProgramCounter, Value::NextWordLiteral),
            0x0010,
        ]);
        cpu.step().unwrap();

        // a reads PC = 0, b then consumes word 1
        assert_eq!(cpu.pc(), 0x11);
    }

    #[test]
    fn test_sp_operand_read_before_pop() {
        let mut cpu = cpu_with(&[encode(Opcode::Add, Value::StackPointer, Value::Pop)]);
        cpu.regs.sp = 0x100;
        cpu.mem.write(0x100, 5);
        cpu.step().unwrap();

        assert_eq!(cpu.sp(), 0x105);
    }

    #[test]
    fn test_b_sees_a_side_effects() {
        let mut cpu = cpu_with(&[
            encode(Opcode::Set, Value::NextWordIndirect, Value::ProgramCounter),
            0x3000,
        ]);
        cpu.step().unwrap();

        assert_eq!(cpu.memory().read(0x3000), 1);
        assert_eq!(cpu.pc(), 2);
    }

    #[test]
    fn test_reserved_is_nop() {
        let mut cpu = cpu_with(&[0xFFF0]);
        cpu.regs.set(A, 3);
        let before = cpu.clone();

        assert_eq!(cpu.step().unwrap(), Instruction::Nop);
        assert_eq!(cpu.pc(), 1);
        assert_eq!(cpu.registers().gp, before.registers().gp);
        assert_eq!(cpu.sp(), before.sp());
        assert_eq!(cpu.overflow(), before.overflow());
        assert_eq!(cpu.memory(), before.memory());
    }

    #[test]
    fn test_unknown_opcode_leaves_state() {
        let mut cpu = cpu_with(&[encode(Opcode::Set, reg(A), lit(1))]);
        let before = cpu.clone();

        let err = cpu.issue(0x10, 0x1f, 0x1a).unwrap_err();
        assert!(err.is_unknown_opcode());
        assert_eq!(err, CpuError::Decode { pc: 0, source: DecodeError::UnknownOpcode(0x10) });
        assert_eq!(cpu, before);
    }

    #[test]
    fn test_unknown_value_code_leaves_state() {
        let mut cpu = Cpu::new();
        let before = cpu.clone();

        // a is valid and would consume a word; b is not
        let err = cpu.issue(Opcode::Set.code(), 0x1f, 0x40).unwrap_err();
        assert!(err.is_unknown_value_code());
        assert_eq!(cpu, before);
    }

    #[test]
    fn test_run_limited_counts() {
        let mut cpu = Cpu::new();
        assert_eq!(cpu.run_limited(25).unwrap(), 25);
        assert_eq!(cpu.pc(), 25);
        assert_eq!(cpu.cycles(), 25);
    }

    #[test]
    fn test_pc_wraps() {
        let mut cpu = Cpu::new();
        cpu.regs.pc = 0xFFFF;
        cpu.step().unwrap();
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn test_reset() {
        let mut cpu = cpu_with(&[encode(Opcode::Set, reg(A), lit(5))]);
        cpu.step().unwrap();
        cpu.reset();
        assert_eq!(cpu, Cpu::new());
    }
}
