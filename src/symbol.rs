use std::{fmt, ops::Range, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Location within source
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Span {
    offs: SrcOffset,
    len: usize,
}

impl Span {
    pub fn new(offs: SrcOffset, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn offs(&self) -> usize {
        self.offs.0
    }

    pub fn end(&self) -> usize {
        self.offs.0 + self.len
    }

    /// Smallest span covering both `self` and `other`.
    pub fn join(self, other: Span) -> Span {
        let start = self.offs().min(other.offs());
        let end = self.end().max(other.end());
        Span::new(SrcOffset(start), end - start)
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Span> for Range<usize> {
    fn from(value: Span) -> Self {
        value.offs()..value.end()
    }
}

/// Used to refer to offsets from the start of a source file.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct SrcOffset(pub usize);

/// 8-bit registers. Discriminants are the 3-bit register field used in opcodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Register {
    B = 0,
    C = 1,
    D = 2,
    E = 3,
    H = 4,
    L = 5,
    /// Accumulator.
    A = 7,
}

impl Register {
    pub const ALL: [Register; 7] = [
        Register::A,
        Register::B,
        Register::C,
        Register::D,
        Register::E,
        Register::H,
        Register::L,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Register::B => "b",
            Register::C => "c",
            Register::D => "d",
            Register::E => "e",
            Register::H => "h",
            Register::L => "l",
            Register::A => "a",
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Loc::from_str(s)? {
            Loc::Reg(reg) => Ok(reg),
            Loc::Mem => Err(()),
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 8-bit operand location: a register or `m`, the memory cell addressed by `HL`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Loc {
    Reg(Register),
    Mem,
}

impl Loc {
    /// Decode the 3-bit register field of an opcode.
    pub fn from_bits(bits: u8) -> Loc {
        match bits & 0b111 {
            0 => Loc::Reg(Register::B),
            1 => Loc::Reg(Register::C),
            2 => Loc::Reg(Register::D),
            3 => Loc::Reg(Register::E),
            4 => Loc::Reg(Register::H),
            5 => Loc::Reg(Register::L),
            6 => Loc::Mem,
            _ => Loc::Reg(Register::A),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            Loc::Reg(reg) => reg as u8,
            Loc::Mem => 6,
        }
    }
}

impl FromStr for Loc {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a" => Ok(Loc::Reg(Register::A)),
            "b" => Ok(Loc::Reg(Register::B)),
            "c" => Ok(Loc::Reg(Register::C)),
            "d" => Ok(Loc::Reg(Register::D)),
            "e" => Ok(Loc::Reg(Register::E)),
            "h" => Ok(Loc::Reg(Register::H)),
            "l" => Ok(Loc::Reg(Register::L)),
            "m" => Ok(Loc::Mem),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loc::Reg(reg) => fmt::Display::fmt(reg, f),
            Loc::Mem => f.write_str("m"),
        }
    }
}

/// 16-bit register pairs, named by their high register.
///
/// `Sp` and `Psw` share the pair field value `3`; which one an opcode means depends
/// on the instruction group.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum RegPair {
    /// `B,C`
    B,
    /// `D,E`
    D,
    /// `H,L`
    H,
    /// Stack pointer
    Sp,
    /// Accumulator and flag byte
    Psw,
}

impl RegPair {
    /// Pair field of an opcode, bits 4-5.
    pub fn bits(self) -> u8 {
        match self {
            RegPair::B => 0,
            RegPair::D => 1,
            RegPair::H => 2,
            RegPair::Sp | RegPair::Psw => 3,
        }
    }

    /// Decode pair field where `3` means the stack pointer (`lxi`, `inx`, `dcx`, `dad`).
    pub fn from_bits_sp(bits: u8) -> RegPair {
        match bits & 0b11 {
            0 => RegPair::B,
            1 => RegPair::D,
            2 => RegPair::H,
            _ => RegPair::Sp,
        }
    }

    /// Decode pair field where `3` means the program status word (`push`, `pop`).
    pub fn from_bits_psw(bits: u8) -> RegPair {
        match RegPair::from_bits_sp(bits) {
            RegPair::Sp => RegPair::Psw,
            pair => pair,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RegPair::B => "b",
            RegPair::D => "d",
            RegPair::H => "h",
            RegPair::Sp => "sp",
            RegPair::Psw => "psw",
        }
    }
}

impl FromStr for RegPair {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "b" => Ok(RegPair::B),
            "d" => Ok(RegPair::D),
            "h" => Ok(RegPair::H),
            "sp" => Ok(RegPair::Sp),
            "psw" => Ok(RegPair::Psw),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RegPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Branch condition of `j*`, `c*` and `r*` instructions, tested against one flag.
/// Discriminants are the 3-bit condition field used in opcodes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Condition {
    /// Zero flag clear
    Nz = 0,
    /// Zero flag set
    Z = 1,
    /// Carry flag clear
    Nc = 2,
    /// Carry flag set
    C = 3,
    /// Parity odd
    Po = 4,
    /// Parity even
    Pe = 5,
    /// Sign flag clear
    P = 6,
    /// Sign flag set
    M = 7,
}

impl Condition {
    pub fn from_bits(bits: u8) -> Condition {
        match bits & 0b111 {
            0 => Condition::Nz,
            1 => Condition::Z,
            2 => Condition::Nc,
            3 => Condition::C,
            4 => Condition::Po,
            5 => Condition::Pe,
            6 => Condition::P,
            _ => Condition::M,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Nz => "nz",
            Condition::Z => "z",
            Condition::Nc => "nc",
            Condition::C => "c",
            Condition::Po => "po",
            Condition::Pe => "pe",
            Condition::P => "p",
            Condition::M => "m",
        }
    }
}

/// Accumulator operation shared by the register (`add b`) and immediate (`adi 4`) forms.
/// Discriminants are bits 3-5 of the opcode.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum AluOp {
    Add = 0,
    Adc = 1,
    Sub = 2,
    Sbb = 3,
    Ana = 4,
    Xra = 5,
    Ora = 6,
    Cmp = 7,
}

impl AluOp {
    pub fn from_bits(bits: u8) -> AluOp {
        match bits & 0b111 {
            0 => AluOp::Add,
            1 => AluOp::Adc,
            2 => AluOp::Sub,
            3 => AluOp::Sbb,
            4 => AluOp::Ana,
            5 => AluOp::Xra,
            6 => AluOp::Ora,
            _ => AluOp::Cmp,
        }
    }

    /// Mnemonic of the register form.
    pub fn register_name(self) -> &'static str {
        match self {
            AluOp::Add => "add",
            AluOp::Adc => "adc",
            AluOp::Sub => "sub",
            AluOp::Sbb => "sbb",
            AluOp::Ana => "ana",
            AluOp::Xra => "xra",
            AluOp::Ora => "ora",
            AluOp::Cmp => "cmp",
        }
    }

    /// Mnemonic of the immediate form.
    pub fn immediate_name(self) -> &'static str {
        match self {
            AluOp::Add => "adi",
            AluOp::Adc => "aci",
            AluOp::Sub => "sui",
            AluOp::Sbb => "sbi",
            AluOp::Ana => "ani",
            AluOp::Xra => "xri",
            AluOp::Ora => "ori",
            AluOp::Cmp => "cpi",
        }
    }
}

/// Label name -> absolute address.
///
/// Built by one assembler run and handed out with its `Assembly`.
#[derive(Debug, Default)]
pub struct LabelTable {
    table: FxMap<String, u16>,
}

impl LabelTable {
    pub fn new() -> Self {
        LabelTable {
            table: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Bind `name` to `addr`. Returns `false` and keeps the first binding if the label
    /// already exists.
    pub fn insert(&mut self, name: &str, addr: u16) -> bool {
        if self.table.contains_key(name) {
            return false;
        }
        self.table.insert(name.to_string(), addr);
        true
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.table.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Labels in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.table.iter().map(|(name, addr)| (name.as_str(), *addr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_fields_round_trip() {
        for bits in 0..8 {
            assert_eq!(Loc::from_bits(bits).bits(), bits);
        }
        assert_eq!(Loc::from_bits(6), Loc::Mem);
        assert_eq!(Loc::from_bits(7), Loc::Reg(Register::A));
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!("A".parse(), Ok(Loc::Reg(Register::A)));
        assert_eq!("M".parse(), Ok(Loc::Mem));
        assert_eq!("PSW".parse(), Ok(RegPair::Psw));
        assert!("m".parse::<Register>().is_err());
        assert!("x".parse::<Loc>().is_err());
    }

    #[test]
    fn pair_field_depends_on_group() {
        assert_eq!(RegPair::from_bits_sp(3), RegPair::Sp);
        assert_eq!(RegPair::from_bits_psw(3), RegPair::Psw);
        assert_eq!(RegPair::from_bits_psw(1), RegPair::D);
    }

    #[test]
    fn label_table_keeps_first_definition() {
        let mut labels = LabelTable::new();
        assert!(labels.insert("start", 0x0800));
        assert!(!labels.insert("start", 0x0810));
        assert_eq!(labels.get("start"), Some(0x0800));
        assert_eq!(labels.get("missing"), None);
        assert_eq!(labels.len(), 1);
    }
}
