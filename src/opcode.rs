use std::{fmt, ops::Deref};

use crate::{
    error::AsmError,
    flags::{join_word, split_word},
    symbol::{AluOp, Condition, Loc, RegPair},
};

/// A decoded 8080 instruction, including its immediate operands.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Instr {
    Nop,
    Hlt,
    // Data move
    Mov { dest: Loc, src: Loc },
    Mvi { dest: Loc, value: u8 },
    Lxi { pair: RegPair, value: u16 },
    Lda(u16),
    Sta(u16),
    Lhld(u16),
    Shld(u16),
    Ldax(RegPair),
    Stax(RegPair),
    Xchg,
    // Arithmetic and logic
    Alu { op: AluOp, src: Loc },
    AluImm { op: AluOp, value: u8 },
    Inr(Loc),
    Dcr(Loc),
    Inx(RegPair),
    Dcx(RegPair),
    Dad(RegPair),
    Daa,
    Cma,
    Cmc,
    Stc,
    // Rotate
    Rlc,
    Rrc,
    Ral,
    Rar,
    // Control transfer
    Jmp(u16),
    Jcond { cond: Condition, addr: u16 },
    Call(u16),
    Ccond { cond: Condition, addr: u16 },
    Ret,
    Rcond(Condition),
    Rst(u8),
    Pchl,
    // Stack
    Push(RegPair),
    Pop(RegPair),
    Xthl,
    Sphl,
}

/// Byte encoding of one instruction: the opcode followed by up to two operand bytes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Encoding {
    bytes: [u8; 3],
    len: usize,
}

impl Encoding {
    fn op(op: u8) -> Self {
        Encoding {
            bytes: [op, 0, 0],
            len: 1,
        }
    }

    fn byte(op: u8, value: u8) -> Self {
        Encoding {
            bytes: [op, value, 0],
            len: 2,
        }
    }

    fn word(op: u8, value: u16) -> Self {
        let [low, high] = split_word(value);
        Encoding {
            bytes: [op, low, high],
            len: 3,
        }
    }
}

impl Deref for Encoding {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Instr {
    /// Decode the instruction starting with opcode `op`. `low` and `high` are the two bytes
    /// following it in memory; they are only read by instructions that take operands.
    ///
    /// Unused opcodes and the I/O and interrupt group do not decode.
    pub fn decode(op: u8, low: u8, high: u8) -> Option<Instr> {
        let word = join_word(low, high);
        let dest = Loc::from_bits(op >> 3);
        let pair = (op >> 4) & 0b11;
        let instr = match op {
            0x00 => Instr::Nop,
            0x76 => Instr::Hlt,
            0x40..=0x7F => Instr::Mov {
                dest,
                src: Loc::from_bits(op),
            },
            0x80..=0xBF => Instr::Alu {
                op: AluOp::from_bits(op >> 3),
                src: Loc::from_bits(op),
            },

            0x02 | 0x12 => Instr::Stax(RegPair::from_bits_sp(pair)),
            0x0A | 0x1A => Instr::Ldax(RegPair::from_bits_sp(pair)),
            0x22 => Instr::Shld(word),
            0x2A => Instr::Lhld(word),
            0x32 => Instr::Sta(word),
            0x3A => Instr::Lda(word),
            0x07 => Instr::Rlc,
            0x0F => Instr::Rrc,
            0x17 => Instr::Ral,
            0x1F => Instr::Rar,
            0x27 => Instr::Daa,
            0x2F => Instr::Cma,
            0x37 => Instr::Stc,
            0x3F => Instr::Cmc,
            0x00..=0x3F if op & 0x0F == 0x01 => Instr::Lxi {
                pair: RegPair::from_bits_sp(pair),
                value: word,
            },
            0x00..=0x3F if op & 0x0F == 0x03 => Instr::Inx(RegPair::from_bits_sp(pair)),
            0x00..=0x3F if op & 0x0F == 0x09 => Instr::Dad(RegPair::from_bits_sp(pair)),
            0x00..=0x3F if op & 0x0F == 0x0B => Instr::Dcx(RegPair::from_bits_sp(pair)),
            0x00..=0x3F if op & 0x07 == 0x04 => Instr::Inr(dest),
            0x00..=0x3F if op & 0x07 == 0x05 => Instr::Dcr(dest),
            0x00..=0x3F if op & 0x07 == 0x06 => Instr::Mvi { dest, value: low },

            0xC3 => Instr::Jmp(word),
            0xC9 => Instr::Ret,
            0xCD => Instr::Call(word),
            0xE3 => Instr::Xthl,
            0xE9 => Instr::Pchl,
            0xEB => Instr::Xchg,
            0xF9 => Instr::Sphl,
            0xC0..=0xFF if op & 0x07 == 0x00 => Instr::Rcond(Condition::from_bits(op >> 3)),
            0xC0..=0xFF if op & 0x07 == 0x02 => Instr::Jcond {
                cond: Condition::from_bits(op >> 3),
                addr: word,
            },
            0xC0..=0xFF if op & 0x07 == 0x04 => Instr::Ccond {
                cond: Condition::from_bits(op >> 3),
                addr: word,
            },
            0xC0..=0xFF if op & 0x07 == 0x06 => Instr::AluImm {
                op: AluOp::from_bits(op >> 3),
                value: low,
            },
            0xC0..=0xFF if op & 0x07 == 0x07 => Instr::Rst((op >> 3) & 0b111),
            0xC0..=0xFF if op & 0x0F == 0x01 => Instr::Pop(RegPair::from_bits_psw(pair)),
            0xC0..=0xFF if op & 0x0F == 0x05 => Instr::Push(RegPair::from_bits_psw(pair)),
            _ => return None,
        };
        Some(instr)
    }

    pub fn encode(&self) -> Encoding {
        match *self {
            Instr::Nop => Encoding::op(0x00),
            Instr::Hlt => Encoding::op(0x76),
            Instr::Mov { dest, src } => Encoding::op(0x40 | dest.bits() << 3 | src.bits()),
            Instr::Mvi { dest, value } => Encoding::byte(0x06 | dest.bits() << 3, value),
            Instr::Lxi { pair, value } => Encoding::word(0x01 | pair.bits() << 4, value),
            Instr::Lda(addr) => Encoding::word(0x3A, addr),
            Instr::Sta(addr) => Encoding::word(0x32, addr),
            Instr::Lhld(addr) => Encoding::word(0x2A, addr),
            Instr::Shld(addr) => Encoding::word(0x22, addr),
            Instr::Ldax(pair) => Encoding::op(0x0A | pair.bits() << 4),
            Instr::Stax(pair) => Encoding::op(0x02 | pair.bits() << 4),
            Instr::Xchg => Encoding::op(0xEB),
            Instr::Alu { op, src } => Encoding::op(0x80 | (op as u8) << 3 | src.bits()),
            Instr::AluImm { op, value } => Encoding::byte(0xC6 | (op as u8) << 3, value),
            Instr::Inr(loc) => Encoding::op(0x04 | loc.bits() << 3),
            Instr::Dcr(loc) => Encoding::op(0x05 | loc.bits() << 3),
            Instr::Inx(pair) => Encoding::op(0x03 | pair.bits() << 4),
            Instr::Dcx(pair) => Encoding::op(0x0B | pair.bits() << 4),
            Instr::Dad(pair) => Encoding::op(0x09 | pair.bits() << 4),
            Instr::Daa => Encoding::op(0x27),
            Instr::Cma => Encoding::op(0x2F),
            Instr::Cmc => Encoding::op(0x3F),
            Instr::Stc => Encoding::op(0x37),
            Instr::Rlc => Encoding::op(0x07),
            Instr::Rrc => Encoding::op(0x0F),
            Instr::Ral => Encoding::op(0x17),
            Instr::Rar => Encoding::op(0x1F),
            Instr::Jmp(addr) => Encoding::word(0xC3, addr),
            Instr::Jcond { cond, addr } => Encoding::word(0xC2 | (cond as u8) << 3, addr),
            Instr::Call(addr) => Encoding::word(0xCD, addr),
            Instr::Ccond { cond, addr } => Encoding::word(0xC4 | (cond as u8) << 3, addr),
            Instr::Ret => Encoding::op(0xC9),
            Instr::Rcond(cond) => Encoding::op(0xC0 | (cond as u8) << 3),
            Instr::Rst(vector) => Encoding::op(0xC7 | (vector & 0b111) << 3),
            Instr::Pchl => Encoding::op(0xE9),
            Instr::Push(pair) => Encoding::op(0xC5 | pair.bits() << 4),
            Instr::Pop(pair) => Encoding::op(0xC1 | pair.bits() << 4),
            Instr::Xthl => Encoding::op(0xE3),
            Instr::Sphl => Encoding::op(0xF9),
        }
    }

    /// Size in bytes, opcode included.
    pub fn len(&self) -> usize {
        match self {
            Instr::Mvi { .. } | Instr::AluImm { .. } => 2,
            Instr::Lxi { .. }
            | Instr::Lda(_)
            | Instr::Sta(_)
            | Instr::Lhld(_)
            | Instr::Shld(_)
            | Instr::Jmp(_)
            | Instr::Jcond { .. }
            | Instr::Call(_)
            | Instr::Ccond { .. } => 3,
            _ => 1,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instr::Nop => f.write_str("nop"),
            Instr::Hlt => f.write_str("hlt"),
            Instr::Mov { dest, src } => write!(f, "mov {dest}, {src}"),
            Instr::Mvi { dest, value } => write!(f, "mvi {dest}, {value:#04x}"),
            Instr::Lxi { pair, value } => write!(f, "lxi {pair}, {value:#06x}"),
            Instr::Lda(addr) => write!(f, "lda {addr:#06x}"),
            Instr::Sta(addr) => write!(f, "sta {addr:#06x}"),
            Instr::Lhld(addr) => write!(f, "lhld {addr:#06x}"),
            Instr::Shld(addr) => write!(f, "shld {addr:#06x}"),
            Instr::Ldax(pair) => write!(f, "ldax {pair}"),
            Instr::Stax(pair) => write!(f, "stax {pair}"),
            Instr::Xchg => f.write_str("xchg"),
            Instr::Alu { op, src } => write!(f, "{} {src}", op.register_name()),
            Instr::AluImm { op, value } => write!(f, "{} {value:#04x}", op.immediate_name()),
            Instr::Inr(loc) => write!(f, "inr {loc}"),
            Instr::Dcr(loc) => write!(f, "dcr {loc}"),
            Instr::Inx(pair) => write!(f, "inx {pair}"),
            Instr::Dcx(pair) => write!(f, "dcx {pair}"),
            Instr::Dad(pair) => write!(f, "dad {pair}"),
            Instr::Daa => f.write_str("daa"),
            Instr::Cma => f.write_str("cma"),
            Instr::Cmc => f.write_str("cmc"),
            Instr::Stc => f.write_str("stc"),
            Instr::Rlc => f.write_str("rlc"),
            Instr::Rrc => f.write_str("rrc"),
            Instr::Ral => f.write_str("ral"),
            Instr::Rar => f.write_str("rar"),
            Instr::Jmp(addr) => write!(f, "jmp {addr:#06x}"),
            Instr::Jcond { cond, addr } => write!(f, "j{} {addr:#06x}", cond.suffix()),
            Instr::Call(addr) => write!(f, "call {addr:#06x}"),
            Instr::Ccond { cond, addr } => write!(f, "c{} {addr:#06x}", cond.suffix()),
            Instr::Ret => f.write_str("ret"),
            Instr::Rcond(cond) => write!(f, "r{}", cond.suffix()),
            Instr::Rst(vector) => write!(f, "rst {vector}"),
            Instr::Pchl => f.write_str("pchl"),
            Instr::Push(pair) => write!(f, "push {pair}"),
            Instr::Pop(pair) => write!(f, "pop {pair}"),
            Instr::Xthl => f.write_str("xthl"),
            Instr::Sphl => f.write_str("sphl"),
        }
    }
}

/// Shape of a single operand in assembly source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperandKind {
    /// `b c d e h l m a`
    Reg,
    /// `b d h sp`
    Pair,
    /// `b d h psw`
    StackPair,
    /// `b d`
    IndexPair,
    Imm8,
    Imm16,
    /// 16-bit address, literal or label
    Addr,
    /// Restart vector `0..=7`
    Vector,
}

impl OperandKind {
    pub fn describe(self) -> &'static str {
        match self {
            OperandKind::Reg => "register",
            OperandKind::Pair => "register pair",
            OperandKind::StackPair => "stack register pair",
            OperandKind::IndexPair => "index register pair",
            OperandKind::Imm8 => "8-bit value",
            OperandKind::Imm16 => "16-bit value",
            OperandKind::Addr => "address",
            OperandKind::Vector => "restart vector",
        }
    }

    /// Whether the operand is stored as a 2-byte word following the opcode, and so may
    /// name a label.
    pub fn is_word(self) -> bool {
        matches!(self, OperandKind::Imm16 | OperandKind::Addr)
    }
}

/// How a mnemonic turns its operands into an [`Instr`].
#[derive(Clone, Copy, Debug)]
enum Form {
    Fixed(Instr),
    Mov,
    Mvi,
    Lxi,
    Lda,
    Sta,
    Lhld,
    Shld,
    Ldax,
    Stax,
    Alu(AluOp),
    AluImm(AluOp),
    Inr,
    Dcr,
    Inx,
    Dcx,
    Dad,
    Jmp,
    Jcond(Condition),
    Call,
    Ccond(Condition),
    Rcond(Condition),
    Rst,
    Push,
    Pop,
}

/// Entry of the opcode table: a mnemonic and the operands it takes.
#[derive(Debug)]
pub struct Descriptor {
    pub name: &'static str,
    pub operands: &'static [OperandKind],
    form: Form,
}

/// Operand as written in source, before it is checked against a [`Descriptor`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Operand<'a> {
    Name(&'a str),
    Value(i64),
}

/// Operand after checking.
#[derive(Clone, Copy)]
enum Arg {
    Loc(Loc),
    Pair(RegPair),
    Byte(u8),
    Word(u16),
}

impl Descriptor {
    pub fn arity(&self) -> usize {
        self.operands.len()
    }

    /// Build the instruction from its operands. On failure, also returns the index of the
    /// offending operand.
    pub fn instr(&self, operands: &[Operand]) -> Result<Instr, (usize, AsmError)> {
        if operands.len() != self.arity() {
            return Err((
                0,
                AsmError::WrongArity {
                    mnemonic: self.name,
                    expected: self.arity(),
                    found: operands.len(),
                },
            ));
        }

        let mut args = [Arg::Byte(0); 2];
        for (i, (kind, operand)) in self.operands.iter().zip(operands).enumerate() {
            args[i] = self.check(*kind, *operand).map_err(|err| (i, err))?;
        }

        let instr = match (self.form, args[0], args[1]) {
            (Form::Fixed(instr), _, _) => instr,
            (Form::Mov, Arg::Loc(Loc::Mem), Arg::Loc(Loc::Mem)) => {
                return Err((
                    1,
                    AsmError::InvalidOperand {
                        mnemonic: self.name,
                        expected: "a register, as both operands cannot be m",
                    },
                ))
            }
            (Form::Mov, Arg::Loc(dest), Arg::Loc(src)) => Instr::Mov { dest, src },
            (Form::Mvi, Arg::Loc(dest), Arg::Byte(value)) => Instr::Mvi { dest, value },
            (Form::Lxi, Arg::Pair(pair), Arg::Word(value)) => Instr::Lxi { pair, value },
            (Form::Lda, Arg::Word(addr), _) => Instr::Lda(addr),
            (Form::Sta, Arg::Word(addr), _) => Instr::Sta(addr),
            (Form::Lhld, Arg::Word(addr), _) => Instr::Lhld(addr),
            (Form::Shld, Arg::Word(addr), _) => Instr::Shld(addr),
            (Form::Ldax, Arg::Pair(pair), _) => Instr::Ldax(pair),
            (Form::Stax, Arg::Pair(pair), _) => Instr::Stax(pair),
            (Form::Alu(op), Arg::Loc(src), _) => Instr::Alu { op, src },
            (Form::AluImm(op), Arg::Byte(value), _) => Instr::AluImm { op, value },
            (Form::Inr, Arg::Loc(loc), _) => Instr::Inr(loc),
            (Form::Dcr, Arg::Loc(loc), _) => Instr::Dcr(loc),
            (Form::Inx, Arg::Pair(pair), _) => Instr::Inx(pair),
            (Form::Dcx, Arg::Pair(pair), _) => Instr::Dcx(pair),
            (Form::Dad, Arg::Pair(pair), _) => Instr::Dad(pair),
            (Form::Jmp, Arg::Word(addr), _) => Instr::Jmp(addr),
            (Form::Jcond(cond), Arg::Word(addr), _) => Instr::Jcond { cond, addr },
            (Form::Call, Arg::Word(addr), _) => Instr::Call(addr),
            (Form::Ccond(cond), Arg::Word(addr), _) => Instr::Ccond { cond, addr },
            (Form::Rcond(cond), _, _) => Instr::Rcond(cond),
            (Form::Rst, Arg::Byte(vector), _) => Instr::Rst(vector),
            (Form::Push, Arg::Pair(pair), _) => Instr::Push(pair),
            (Form::Pop, Arg::Pair(pair), _) => Instr::Pop(pair),
            _ => {
                return Err((
                    0,
                    AsmError::InvalidOperand {
                        mnemonic: self.name,
                        expected: "operands of another kind",
                    },
                ))
            }
        };
        Ok(instr)
    }

    fn check(&self, kind: OperandKind, operand: Operand) -> Result<Arg, AsmError> {
        let unknown_register = |name: &str| AsmError::UnknownRegister {
            mnemonic: self.name,
            name: name.to_string(),
            expected: kind.describe(),
        };
        let invalid = |expected| AsmError::InvalidOperand {
            mnemonic: self.name,
            expected,
        };

        match (kind, operand) {
            (OperandKind::Reg, Operand::Name(name)) => name
                .parse::<Loc>()
                .map(Arg::Loc)
                .map_err(|_| unknown_register(name)),
            (OperandKind::Pair | OperandKind::StackPair | OperandKind::IndexPair, Operand::Name(name)) => {
                let pair = name.parse::<RegPair>().map_err(|_| unknown_register(name))?;
                let allowed = match kind {
                    OperandKind::Pair => pair != RegPair::Psw,
                    OperandKind::StackPair => pair != RegPair::Sp,
                    _ => matches!(pair, RegPair::B | RegPair::D),
                };
                if !allowed {
                    return Err(unknown_register(name));
                }
                Ok(Arg::Pair(pair))
            }
            (OperandKind::Reg, Operand::Value(_)) => Err(invalid("a register")),
            (OperandKind::Pair | OperandKind::StackPair | OperandKind::IndexPair, Operand::Value(_)) => {
                Err(invalid("a register pair"))
            }
            (OperandKind::Imm8, Operand::Value(value)) => {
                if !(-128..=255).contains(&value) {
                    return Err(AsmError::LiteralOutOfRange { value, bits: 8 });
                }
                Ok(Arg::Byte(value as u8))
            }
            (OperandKind::Imm16 | OperandKind::Addr, Operand::Value(value)) => {
                if !(-32768..=65535).contains(&value) {
                    return Err(AsmError::LiteralOutOfRange { value, bits: 16 });
                }
                Ok(Arg::Word(value as u16))
            }
            (OperandKind::Vector, Operand::Value(value)) => {
                if !(0..=7).contains(&value) {
                    return Err(AsmError::LiteralOutOfRange { value, bits: 3 });
                }
                Ok(Arg::Byte(value as u8))
            }
            (OperandKind::Imm8 | OperandKind::Vector, Operand::Name(_)) => {
                Err(invalid("a numeric literal"))
            }
            (OperandKind::Imm16 | OperandKind::Addr, Operand::Name(_)) => {
                Err(invalid("a numeric literal or label"))
            }
        }
    }
}

use OperandKind::{Addr, Imm16, Imm8, IndexPair, Pair, Reg, StackPair, Vector};

const NONE: &[OperandKind] = &[];
const REG: &[OperandKind] = &[Reg];
const REG_REG: &[OperandKind] = &[Reg, Reg];
const REG_IMM: &[OperandKind] = &[Reg, Imm8];
const PAIR: &[OperandKind] = &[Pair];
const PAIR_IMM: &[OperandKind] = &[Pair, Imm16];
const STACK_PAIR: &[OperandKind] = &[StackPair];
const INDEX_PAIR: &[OperandKind] = &[IndexPair];
const IMM: &[OperandKind] = &[Imm8];
const ADDR: &[OperandKind] = &[Addr];
const VECTOR: &[OperandKind] = &[Vector];

const fn desc(name: &'static str, operands: &'static [OperandKind], form: Form) -> Descriptor {
    Descriptor {
        name,
        operands,
        form,
    }
}

/// Every supported mnemonic.
pub static DESCRIPTORS: &[Descriptor] = &[
    desc("nop", NONE, Form::Fixed(Instr::Nop)),
    desc("hlt", NONE, Form::Fixed(Instr::Hlt)),
    // Data move
    desc("mov", REG_REG, Form::Mov),
    desc("mvi", REG_IMM, Form::Mvi),
    desc("lxi", PAIR_IMM, Form::Lxi),
    desc("lda", ADDR, Form::Lda),
    desc("sta", ADDR, Form::Sta),
    desc("lhld", ADDR, Form::Lhld),
    desc("shld", ADDR, Form::Shld),
    desc("ldax", INDEX_PAIR, Form::Ldax),
    desc("stax", INDEX_PAIR, Form::Stax),
    desc("xchg", NONE, Form::Fixed(Instr::Xchg)),
    // Arithmetic
    desc("add", REG, Form::Alu(AluOp::Add)),
    desc("adc", REG, Form::Alu(AluOp::Adc)),
    desc("sub", REG, Form::Alu(AluOp::Sub)),
    desc("sbb", REG, Form::Alu(AluOp::Sbb)),
    desc("adi", IMM, Form::AluImm(AluOp::Add)),
    desc("aci", IMM, Form::AluImm(AluOp::Adc)),
    desc("sui", IMM, Form::AluImm(AluOp::Sub)),
    desc("sbi", IMM, Form::AluImm(AluOp::Sbb)),
    desc("inr", REG, Form::Inr),
    desc("dcr", REG, Form::Dcr),
    desc("inx", PAIR, Form::Inx),
    desc("dcx", PAIR, Form::Dcx),
    desc("dad", PAIR, Form::Dad),
    desc("daa", NONE, Form::Fixed(Instr::Daa)),
    // Logic
    desc("ana", REG, Form::Alu(AluOp::Ana)),
    desc("xra", REG, Form::Alu(AluOp::Xra)),
    desc("ora", REG, Form::Alu(AluOp::Ora)),
    desc("cmp", REG, Form::Alu(AluOp::Cmp)),
    desc("ani", IMM, Form::AluImm(AluOp::Ana)),
    desc("xri", IMM, Form::AluImm(AluOp::Xra)),
    desc("ori", IMM, Form::AluImm(AluOp::Ora)),
    desc("cpi", IMM, Form::AluImm(AluOp::Cmp)),
    desc("cma", NONE, Form::Fixed(Instr::Cma)),
    desc("cmc", NONE, Form::Fixed(Instr::Cmc)),
    desc("stc", NONE, Form::Fixed(Instr::Stc)),
    // Rotate
    desc("rlc", NONE, Form::Fixed(Instr::Rlc)),
    desc("rrc", NONE, Form::Fixed(Instr::Rrc)),
    desc("ral", NONE, Form::Fixed(Instr::Ral)),
    desc("rar", NONE, Form::Fixed(Instr::Rar)),
    // Jump
    desc("jmp", ADDR, Form::Jmp),
    desc("jnz", ADDR, Form::Jcond(Condition::Nz)),
    desc("jz", ADDR, Form::Jcond(Condition::Z)),
    desc("jnc", ADDR, Form::Jcond(Condition::Nc)),
    desc("jc", ADDR, Form::Jcond(Condition::C)),
    desc("jpo", ADDR, Form::Jcond(Condition::Po)),
    desc("jpe", ADDR, Form::Jcond(Condition::Pe)),
    desc("jp", ADDR, Form::Jcond(Condition::P)),
    desc("jm", ADDR, Form::Jcond(Condition::M)),
    desc("pchl", NONE, Form::Fixed(Instr::Pchl)),
    // Call
    desc("call", ADDR, Form::Call),
    desc("cnz", ADDR, Form::Ccond(Condition::Nz)),
    desc("cz", ADDR, Form::Ccond(Condition::Z)),
    desc("cnc", ADDR, Form::Ccond(Condition::Nc)),
    desc("cc", ADDR, Form::Ccond(Condition::C)),
    desc("cpo", ADDR, Form::Ccond(Condition::Po)),
    desc("cpe", ADDR, Form::Ccond(Condition::Pe)),
    desc("cp", ADDR, Form::Ccond(Condition::P)),
    desc("cm", ADDR, Form::Ccond(Condition::M)),
    desc("rst", VECTOR, Form::Rst),
    // Return
    desc("ret", NONE, Form::Fixed(Instr::Ret)),
    desc("rnz", NONE, Form::Rcond(Condition::Nz)),
    desc("rz", NONE, Form::Rcond(Condition::Z)),
    desc("rnc", NONE, Form::Rcond(Condition::Nc)),
    desc("rc", NONE, Form::Rcond(Condition::C)),
    desc("rpo", NONE, Form::Rcond(Condition::Po)),
    desc("rpe", NONE, Form::Rcond(Condition::Pe)),
    desc("rp", NONE, Form::Rcond(Condition::P)),
    desc("rm", NONE, Form::Rcond(Condition::M)),
    // Stack
    desc("push", STACK_PAIR, Form::Push),
    desc("pop", STACK_PAIR, Form::Pop),
    desc("xthl", NONE, Form::Fixed(Instr::Xthl)),
    desc("sphl", NONE, Form::Fixed(Instr::Sphl)),
];

/// Find the table entry for a mnemonic, ignoring case.
pub fn lookup(mnemonic: &str) -> Option<&'static Descriptor> {
    DESCRIPTORS
        .iter()
        .find(|desc| desc.name.eq_ignore_ascii_case(mnemonic))
}

pub fn arity(mnemonic: &str) -> Result<usize, AsmError> {
    lookup(mnemonic)
        .map(Descriptor::arity)
        .ok_or_else(|| AsmError::UnknownMnemonic {
            name: mnemonic.to_string(),
        })
}

pub fn encode(mnemonic: &str, operands: &[Operand]) -> Result<Encoding, AsmError> {
    let desc = lookup(mnemonic).ok_or_else(|| AsmError::UnknownMnemonic {
        name: mnemonic.to_string(),
    })?;
    desc.instr(operands)
        .map(|instr| instr.encode())
        .map_err(|(_, err)| err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Register;

    use Operand::{Name, Value};

    #[test]
    fn arity_of_known_and_unknown() {
        assert_eq!(arity("mov"), Ok(2));
        assert_eq!(arity("MVI"), Ok(2));
        assert_eq!(arity("ana"), Ok(1));
        assert_eq!(arity("hlt"), Ok(0));
        assert_eq!(
            arity("foo"),
            Err(AsmError::UnknownMnemonic { name: "foo".into() })
        );
    }

    #[test]
    fn encodes_register_forms() {
        assert_eq!(&*encode("mov", &[Name("b"), Name("a")]).unwrap(), &[0x47]);
        assert_eq!(&*encode("mov", &[Name("m"), Name("c")]).unwrap(), &[0x71]);
        assert_eq!(&*encode("add", &[Name("m")]).unwrap(), &[0x86]);
        assert_eq!(&*encode("cmp", &[Name("e")]).unwrap(), &[0xBB]);
        assert_eq!(&*encode("inr", &[Name("a")]).unwrap(), &[0x3C]);
        assert_eq!(&*encode("dcr", &[Name("m")]).unwrap(), &[0x35]);
    }

    #[test]
    fn encodes_immediates_little_endian() {
        assert_eq!(&*encode("mvi", &[Name("a"), Value(3)]).unwrap(), &[0x3E, 0x03]);
        assert_eq!(&*encode("ani", &[Value(0xF0)]).unwrap(), &[0xE6, 0xF0]);
        assert_eq!(&*encode("mvi", &[Name("b"), Value(-1)]).unwrap(), &[0x06, 0xFF]);
        assert_eq!(
            &*encode("lxi", &[Name("h"), Value(0x0900)]).unwrap(),
            &[0x21, 0x00, 0x09]
        );
        assert_eq!(&*encode("jmp", &[Value(0x0803)]).unwrap(), &[0xC3, 0x03, 0x08]);
        assert_eq!(&*encode("cnz", &[Value(0x0810)]).unwrap(), &[0xC4, 0x10, 0x08]);
    }

    #[test]
    fn push_and_pop_encodings_are_distinct() {
        let pairs = ["b", "d", "h", "psw"];
        let pushes: Vec<u8> = pairs
            .iter()
            .map(|pair| encode("push", &[Name(pair)]).unwrap()[0])
            .collect();
        let pops: Vec<u8> = pairs
            .iter()
            .map(|pair| encode("pop", &[Name(pair)]).unwrap()[0])
            .collect();
        assert_eq!(pushes, vec![0xC5, 0xD5, 0xE5, 0xF5]);
        assert_eq!(pops, vec![0xC1, 0xD1, 0xE1, 0xF1]);
    }

    #[test]
    fn rejects_invalid_operands() {
        assert_eq!(
            encode("mov", &[Name("x"), Name("a")]),
            Err(AsmError::UnknownRegister {
                mnemonic: "mov",
                name: "x".into(),
                expected: "register",
            })
        );
        assert!(matches!(
            encode("push", &[Name("sp")]),
            Err(AsmError::UnknownRegister { .. })
        ));
        assert!(matches!(
            encode("lxi", &[Name("psw"), Value(0)]),
            Err(AsmError::UnknownRegister { .. })
        ));
        assert!(matches!(
            encode("ldax", &[Name("h")]),
            Err(AsmError::UnknownRegister { .. })
        ));
        assert!(matches!(
            encode("mvi", &[Name("a"), Value(256)]),
            Err(AsmError::LiteralOutOfRange { bits: 8, .. })
        ));
        assert!(matches!(
            encode("mvi", &[Value(1), Value(2)]),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            encode("mov", &[Name("m"), Name("m")]),
            Err(AsmError::InvalidOperand { .. })
        ));
        assert!(matches!(
            encode("rst", &[Value(8)]),
            Err(AsmError::LiteralOutOfRange { bits: 3, .. })
        ));
        assert_eq!(
            encode("hlt", &[Name("a")]),
            Err(AsmError::WrongArity {
                mnemonic: "hlt",
                expected: 0,
                found: 1,
            })
        );
    }

    #[test]
    fn every_decodable_opcode_re_encodes_to_itself() {
        let mut decoded = 0;
        for op in 0..=0xFFu8 {
            if let Some(instr) = Instr::decode(op, 0x34, 0x12) {
                decoded += 1;
                let bytes = instr.encode();
                assert_eq!(bytes[0], op, "{instr} re-encoded as {:#04x}", bytes[0]);
                assert_eq!(bytes.len(), instr.len());
                match bytes.len() {
                    2 => assert_eq!(bytes[1], 0x34),
                    3 => assert_eq!(&bytes[1..], &[0x34, 0x12]),
                    _ => {}
                }
            }
        }
        // 256 minus 12 unused opcodes and the 4 I/O and interrupt opcodes
        assert_eq!(decoded, 240);
    }

    #[test]
    fn unsupported_opcodes_do_not_decode() {
        for op in [0x08, 0x10, 0x38, 0xCB, 0xD9, 0xDD, 0xED, 0xFD, 0xD3, 0xDB, 0xF3, 0xFB] {
            assert_eq!(Instr::decode(op, 0, 0), None, "{op:#04x}");
        }
    }

    #[test]
    fn every_mnemonic_is_in_the_table_once() {
        for (i, desc) in DESCRIPTORS.iter().enumerate() {
            assert!(
                DESCRIPTORS[i + 1..].iter().all(|other| other.name != desc.name),
                "duplicate mnemonic {}",
                desc.name
            );
        }
        assert_eq!(DESCRIPTORS.len(), 74);
    }

    #[test]
    fn every_descriptor_builds_from_its_operand_kinds() {
        let sample = |kind: &OperandKind| match kind {
            Reg | Pair | StackPair | IndexPair => Operand::Name("b"),
            Imm8 | Vector => Operand::Value(1),
            Imm16 | Addr => Operand::Value(0x0800),
        };
        for desc in DESCRIPTORS {
            let operands: Vec<Operand> = desc.operands.iter().map(sample).collect();
            let instr = desc
                .instr(&operands)
                .unwrap_or_else(|(_, err)| panic!("{}: {err}", desc.name));
            assert_eq!(instr.to_string().split(' ').next(), Some(desc.name));
        }
    }

    #[test]
    fn disassembles() {
        let instr = Instr::decode(0x78, 0, 0).unwrap();
        assert_eq!(
            instr,
            Instr::Mov {
                dest: Loc::Reg(Register::A),
                src: Loc::Reg(Register::B)
            }
        );
        assert_eq!(instr.to_string(), "mov a, b");
        assert_eq!(Instr::decode(0xC2, 0x03, 0x08).unwrap().to_string(), "jnz 0x0803");
        assert_eq!(Instr::decode(0xFE, 0x2A, 0).unwrap().to_string(), "cpi 0x2a");
        assert_eq!(Instr::decode(0xF5, 0, 0).unwrap().to_string(), "push psw");
        assert_eq!(Instr::decode(0xDF, 0, 0).unwrap().to_string(), "rst 3");
    }
}
