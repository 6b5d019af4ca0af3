use crate::{
    error::Diagnostic,
    opcode::Instr,
    state::{CpuState, MEMORY_SIZE},
    symbol::{LabelTable, Span},
};

/// Memory image produced by the assembler, always the size of the full window.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Program {
    memory: Box<[u8; MEMORY_SIZE]>,
}

impl Default for Program {
    fn default() -> Self {
        Program::new()
    }
}

impl Program {
    pub fn new() -> Self {
        Program {
            memory: Box::new([0; MEMORY_SIZE]),
        }
    }

    /// Image from raw bytes, zero-padded to the window. `None` if the bytes do not fit.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MEMORY_SIZE {
            return None;
        }
        let mut program = Program::new();
        program.memory[..bytes.len()].copy_from_slice(bytes);
        Some(program)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.memory[..]
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.memory[..]
    }

    pub(crate) fn into_memory(self) -> Box<[u8; MEMORY_SIZE]> {
        self.memory
    }
}

/// A single emitted instruction and where it came from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AsmLine {
    /// 1-based source line
    pub line: usize,
    pub span: Span,
    /// Offset in the memory window
    pub offset: u16,
    pub len: usize,
}

/// Output of one assembler run.
#[derive(Debug)]
pub struct Assembly {
    pub program: Program,
    /// Ordered by line
    pub errors: Vec<Diagnostic>,
    /// Emitted instructions, in address order
    pub listing: Vec<AsmLine>,
    pub labels: LabelTable,
}

impl Assembly {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of bytes emitted from the start of memory.
    pub fn size(&self) -> usize {
        self.listing
            .last()
            .map_or(0, |line| line.offset as usize + line.len)
    }

    /// Decode the emitted instructions, in address order.
    pub fn disassemble(&self) -> impl Iterator<Item = (&AsmLine, Option<Instr>)> + '_ {
        let bytes = self.program.bytes();
        self.listing.iter().map(move |line| {
            let at = |i: usize| bytes.get(line.offset as usize + i).copied().unwrap_or(0);
            (line, Instr::decode(at(0), at(1), at(2)))
        })
    }

    /// Fresh processor state running this program.
    pub fn into_state(self) -> CpuState {
        CpuState::with_program(self.program)
    }
}
