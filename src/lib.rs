// Parsing
mod lexer;
mod parser;
pub use parser::{assemble, parse_literal, AsmParser};
mod program;
pub use program::{AsmLine, Assembly, Program};

// Instruction set
pub mod flags;
pub use flags::Flags;
pub mod opcode;
pub use opcode::Instr;
mod symbol;
pub use symbol::{AluOp, Condition, LabelTable, Loc, RegPair, Register, Span, SrcOffset};

// Running
mod state;
pub use state::{CpuState, BASE_ADDRESS, MEMORY_SIZE};
mod runtime;
pub use runtime::{fetch, next_state, step, Step};
pub mod output;

mod error;
pub use error::{AsmError, Diagnostic, StepError};

pub mod env;

/// Amount of lines to show as context, each side of focus line (line containing span).
pub const DIAGNOSTIC_CONTEXT_LINES: usize = 8;
