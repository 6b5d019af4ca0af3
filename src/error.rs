use std::{error::Error, fmt};

use miette::{miette, LabeledSpan, NamedSource, Report, Severity};

use crate::symbol::Span;

/// Reason a single source line failed to assemble.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmError {
    UnknownMnemonic {
        name: String,
    },
    WrongArity {
        mnemonic: &'static str,
        expected: usize,
        found: usize,
    },
    /// Operand is not a register name accepted by this instruction.
    UnknownRegister {
        mnemonic: &'static str,
        name: String,
        expected: &'static str,
    },
    /// Operand has the wrong shape, e.g. a register where a number is required.
    InvalidOperand {
        mnemonic: &'static str,
        expected: &'static str,
    },
    MalformedLiteral {
        text: String,
    },
    LiteralOutOfRange {
        value: i64,
        bits: u8,
    },
    UnexpectedToken {
        text: String,
    },
    DuplicateLabel {
        name: String,
    },
    UnresolvedLabel {
        name: String,
    },
    ProgramTooLarge {
        offset: usize,
    },
}

impl Error for AsmError {}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMnemonic { name } => write!(f, "unknown instruction '{name}'"),
            Self::WrongArity {
                mnemonic,
                expected,
                found,
            } => write!(
                f,
                "'{mnemonic}' takes {expected} operand{}, found {found}",
                if *expected == 1 { "" } else { "s" }
            ),
            Self::UnknownRegister {
                mnemonic,
                name,
                expected,
            } => write!(f, "'{name}' is not a valid {expected} for '{mnemonic}'"),
            Self::InvalidOperand { mnemonic, expected } => {
                write!(f, "'{mnemonic}' expects {expected} here")
            }
            Self::MalformedLiteral { text } => write!(f, "malformed numeric literal '{text}'"),
            Self::LiteralOutOfRange { value, bits } => {
                write!(f, "literal {value} does not fit in {bits} bits")
            }
            Self::UnexpectedToken { text } => write!(f, "unexpected token '{text}'"),
            Self::DuplicateLabel { name } => write!(f, "label '{name}' is already defined"),
            Self::UnresolvedLabel { name } => write!(f, "label '{name}' is never defined"),
            Self::ProgramTooLarge { offset } => {
                write!(f, "instruction at offset {offset:#06x} does not fit in memory")
            }
        }
    }
}

impl AsmError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic { .. } => "asm::unknown_mnemonic",
            Self::WrongArity { .. } => "asm::arity",
            Self::UnknownRegister { .. } => "asm::register",
            Self::InvalidOperand { .. } => "asm::operand",
            Self::MalformedLiteral { .. } => "asm::bad_lit",
            Self::LiteralOutOfRange { .. } => "asm::lit_range",
            Self::UnexpectedToken { .. } => "asm::unexpected_token",
            Self::DuplicateLabel { .. } => "asm::duplicate_label",
            Self::UnresolvedLabel { .. } => "asm::unresolved_label",
            Self::ProgramTooLarge { .. } => "asm::too_large",
        }
    }

    fn help(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic { .. } => "check the list of supported 8080 instructions",
            Self::WrongArity { .. } => "check the number of operands for this instruction",
            Self::UnknownRegister { .. } => "registers are a, b, c, d, e, h, l and m; pairs are b, d, h, sp and psw",
            Self::InvalidOperand { .. } => "check the type of operands allowed for this instruction",
            Self::MalformedLiteral { .. } => "literals are decimal (12), hex (0x0c or 0ch) or binary (0b1100)",
            Self::LiteralOutOfRange { .. } => "8-bit operands range from -128 to 255, 16-bit operands from -32768 to 65535",
            Self::UnexpectedToken { .. } => "lines hold an optional `label:` followed by an instruction and its operands",
            Self::DuplicateLabel { .. } => "labels may only be defined once per file",
            Self::UnresolvedLabel { .. } => "define the label somewhere in the file with `name:`",
            Self::ProgramTooLarge { .. } => "the program must fit in the 0x0800-0x0baf memory window",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::UnknownMnemonic { .. } => "unknown instruction",
            Self::WrongArity { .. } => "wrong operand count",
            Self::UnknownRegister { .. } => "invalid register",
            Self::InvalidOperand { .. } => "invalid operand",
            Self::MalformedLiteral { .. } => "malformed literal",
            Self::LiteralOutOfRange { .. } => "out-of-range literal",
            Self::UnexpectedToken { .. } => "unexpected token",
            Self::DuplicateLabel { .. } => "duplicate label",
            Self::UnresolvedLabel { .. } => "undefined label",
            Self::ProgramTooLarge { .. } => "past end of memory",
        }
    }
}

/// Assembly failure tied to its source location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based line number
    pub line: usize,
    pub span: Span,
    pub error: AsmError,
}

impl Diagnostic {
    pub fn new(line: usize, span: Span, error: AsmError) -> Self {
        Diagnostic { line, span, error }
    }

    pub fn message(&self) -> String {
        self.error.to_string()
    }

    /// Render as a labelled report over the named source.
    pub fn to_report(&self, name: &str, src: &str) -> Report {
        miette!(
            severity = Severity::Error,
            code = self.error.code(),
            help = self.error.help(),
            labels = vec![LabeledSpan::at(self.span, self.error.label())],
            "line {}: {}",
            self.line,
            self.error,
        )
        .with_source_code(NamedSource::new(name, src.to_string()))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Failure of a single execution step. The state is left as it was before the step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepError {
    /// Byte at `pc` is not a supported opcode.
    UnknownOpcode { opcode: u8, pc: u16 },
    /// Instruction at `pc` referenced an address outside the memory window.
    AddressOutOfRange { address: u16, pc: u16 },
}

impl Error for StepError {}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode { opcode, pc } => {
                write!(f, "unrecognized opcode {opcode:#04x} at offset {pc:#06x}")
            }
            Self::AddressOutOfRange { address, pc } => write!(
                f,
                "address {address:#06x} is outside memory (instruction at offset {pc:#06x})"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SrcOffset;

    #[test]
    fn arity_message_pluralizes() {
        let one = AsmError::WrongArity {
            mnemonic: "inr",
            expected: 1,
            found: 2,
        };
        assert_eq!(one.to_string(), "'inr' takes 1 operand, found 2");
        let two = AsmError::WrongArity {
            mnemonic: "mov",
            expected: 2,
            found: 0,
        };
        assert_eq!(two.to_string(), "'mov' takes 2 operands, found 0");
    }

    #[test]
    fn diagnostic_report_mentions_line() {
        let diag = Diagnostic::new(
            3,
            Span::new(SrcOffset(4), 3),
            AsmError::UnknownMnemonic { name: "foo".into() },
        );
        assert_eq!(diag.to_string(), "line 3: unknown instruction 'foo'");
        let report = diag.to_report("test.asm", "hlt\nfoo\n");
        assert!(report.to_string().contains("unknown instruction 'foo'"));
    }

    #[test]
    fn step_error_message() {
        let err = StepError::UnknownOpcode {
            opcode: 0xdd,
            pc: 0x10,
        };
        assert_eq!(err.to_string(), "unrecognized opcode 0xdd at offset 0x0010");
    }
}
