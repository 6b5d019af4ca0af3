use crate::{
    error::{AsmError, Diagnostic},
    flags::split_word,
    lexer::{self, SourceLine, Token, TokenKind},
    opcode::{self, Operand},
    program::{AsmLine, Assembly, Program},
    state::{CpuState, MEMORY_SIZE},
    symbol::{LabelTable, Span},
};

/// Assemble `src` into a memory image. Never fails as a whole; per-line failures are
/// collected in [`Assembly::errors`].
pub fn assemble(src: &str) -> Assembly {
    AsmParser::new(src).parse()
}

/// Address operand waiting for its label to be defined.
#[derive(Debug)]
struct Fixup {
    label: String,
    /// Line and span of the referencing operand
    line: usize,
    span: Span,
    /// Offset of the low address byte in memory
    at: usize,
}

/// Two-pass translator from source text to a memory image.
///
/// The first pass emits every line and records labels. Address operands naming a label
/// that is not yet defined get zeroed placeholder bytes and a fixup, which the second pass
/// ([`AsmParser::backpatch`]) fills from the complete label table.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
    program: Program,
    labels: LabelTable,
    fixups: Vec<Fixup>,
    errors: Vec<Diagnostic>,
    listing: Vec<AsmLine>,
    /// Offset the next instruction is emitted at
    offset: usize,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        AsmParser {
            src,
            program: Program::new(),
            labels: LabelTable::new(),
            fixups: Vec::new(),
            errors: Vec::new(),
            listing: Vec::new(),
            offset: 0,
        }
    }

    pub fn parse(mut self) -> Assembly {
        for line in lexer::lines(self.src) {
            // A failing line emits nothing, the rest of the file is still assembled
            if let Err(diag) = self.parse_line(&line) {
                self.errors.push(diag);
            }
        }
        self.backpatch();
        // Stable, so errors on one line stay in discovery order
        self.errors.sort_by_key(|diag| diag.line);
        Assembly {
            program: self.program,
            errors: self.errors,
            listing: self.listing,
            labels: self.labels,
        }
    }

    fn text(&self, tok: &Token) -> &'a str {
        tok.text(self.src)
    }

    fn parse_line(&mut self, line: &SourceLine) -> Result<(), Diagnostic> {
        let error = |span: Span, error: AsmError| Diagnostic::new(line.number, span, error);
        let mut toks = &line.tokens[..];

        // Optional prefix label
        if let [name, colon, rest @ ..] = toks {
            if name.kind == TokenKind::Ident && colon.kind == TokenKind::Colon {
                let label = self.text(name);
                let addr = CpuState::address_of(self.offset as u16);
                if !self.labels.insert(label, addr) {
                    return Err(error(
                        name.span,
                        AsmError::DuplicateLabel {
                            name: label.to_string(),
                        },
                    ));
                }
                toks = rest;
            }
        }

        let Some((mnemonic, operand_toks)) = toks.split_first() else {
            return Ok(());
        };
        if mnemonic.kind != TokenKind::Ident {
            return Err(error(
                mnemonic.span,
                AsmError::UnexpectedToken {
                    text: self.text(mnemonic).to_string(),
                },
            ));
        }
        if let Some(tok) = operand_toks
            .iter()
            .find(|tok| !matches!(tok.kind, TokenKind::Ident | TokenKind::Number))
        {
            return Err(error(
                tok.span,
                AsmError::UnexpectedToken {
                    text: self.text(tok).to_string(),
                },
            ));
        }

        let name = self.text(mnemonic);
        let Some(desc) = opcode::lookup(name) else {
            return Err(error(
                mnemonic.span,
                AsmError::UnknownMnemonic {
                    name: name.to_string(),
                },
            ));
        };
        let line_span = toks
            .iter()
            .fold(mnemonic.span, |span, tok| span.join(tok.span));
        if operand_toks.len() != desc.arity() {
            return Err(error(
                line_span,
                AsmError::WrongArity {
                    mnemonic: desc.name,
                    expected: desc.arity(),
                    found: operand_toks.len(),
                },
            ));
        }

        let mut operands = Vec::with_capacity(operand_toks.len());
        let mut pending = None;
        for (kind, tok) in desc.operands.iter().zip(operand_toks) {
            let text = self.text(tok);
            let operand = match tok.kind {
                TokenKind::Number => {
                    Operand::Value(parse_literal(text).map_err(|err| error(tok.span, err))?)
                }
                // Names in address position are labels
                _ if kind.is_word() => match self.labels.get(text) {
                    Some(addr) => Operand::Value(addr as i64),
                    None => {
                        pending = Some((text.to_string(), tok.span));
                        Operand::Value(0)
                    }
                },
                _ => Operand::Name(text),
            };
            operands.push(operand);
        }

        let instr = desc
            .instr(&operands)
            .map_err(|(i, err)| error(operand_toks[i].span, err))?;
        let bytes = instr.encode();
        if self.offset + bytes.len() > MEMORY_SIZE {
            return Err(error(
                line_span,
                AsmError::ProgramTooLarge {
                    offset: self.offset,
                },
            ));
        }

        self.program.bytes_mut()[self.offset..self.offset + bytes.len()].copy_from_slice(&bytes);
        if let Some((label, span)) = pending {
            self.fixups.push(Fixup {
                label,
                line: line.number,
                span,
                // Word operands always directly follow the opcode
                at: self.offset + 1,
            });
        }
        self.listing.push(AsmLine {
            line: line.number,
            span: line_span,
            offset: self.offset as u16,
            len: bytes.len(),
        });
        self.offset += bytes.len();
        Ok(())
    }

    /// Resolve every forward reference from the complete label table. Labels that were never
    /// defined are reported on the referencing line and keep their zeroed placeholder.
    fn backpatch(&mut self) {
        for fixup in std::mem::take(&mut self.fixups) {
            match self.labels.get(&fixup.label) {
                Some(addr) => {
                    let [low, high] = split_word(addr);
                    let bytes = self.program.bytes_mut();
                    bytes[fixup.at] = low;
                    bytes[fixup.at + 1] = high;
                }
                None => self.errors.push(Diagnostic::new(
                    fixup.line,
                    fixup.span,
                    AsmError::UnresolvedLabel { name: fixup.label },
                )),
            }
        }
    }
}

/// Parse a numeric literal: decimal, `0x` or `h`-suffixed hexadecimal, or `0b` binary.
pub fn parse_literal(text: &str) -> Result<i64, AsmError> {
    let malformed = || AsmError::MalformedLiteral {
        text: text.to_string(),
    };
    let (negative, body) = match text.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, text),
    };
    let body = body.to_ascii_lowercase();
    let digits_ok = |digits: &str, radix: u32| {
        !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix))
    };

    let (digits, radix) = if let Some(hex) = body.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(hex) = body.strip_suffix('h') {
        (hex, 16)
    } else if let Some(bin) = body.strip_prefix("0b") {
        (bin, 2)
    } else {
        (body.as_str(), 10)
    };
    if !digits_ok(digits, radix) {
        return Err(malformed());
    }
    let value = i64::from_str_radix(digits, radix).map_err(|_| malformed())?;
    Ok(if negative { -value } else { value })
}
