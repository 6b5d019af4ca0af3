use std::ops::Range;

use crate::lexer::cursor::Cursor;
use crate::symbol::{Span, SrcOffset};

pub mod cursor;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }

    /// Source text of the token.
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[Range::from(self.span)]
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    /// Mnemonic, register or label name
    Ident,
    /// Numeric literal, validated by the parser
    Number,
    /// Terminates a label definition
    Colon,
    /// Also includes commas
    Whitespace,
    Newline,
    Comment,
    Unknown,
    Eof,
}

/// Test if a character is considered to be whitespace.
pub(crate) fn is_whitespace(c: char) -> bool {
    // Commas only separate operands
    matches!(c, ' ' | '\t' | '\r' | ',')
}

pub(crate) fn is_id_start(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '_' | '.')
}

pub(crate) fn is_id(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '.')
}

impl Cursor<'_> {
    pub fn advance_token(&mut self) -> Token {
        let first_char = match self.bump() {
            Some(c) => c,
            None => {
                return Token::new(
                    TokenKind::Eof,
                    Span::new(SrcOffset(self.token_start()), 0),
                )
            }
        };
        let kind = match first_char {
            ';' => {
                self.take_while(|c| c != '\n');
                TokenKind::Comment
            }
            '\n' => TokenKind::Newline,
            c if is_whitespace(c) => {
                self.take_while(is_whitespace);
                TokenKind::Whitespace
            }
            ':' => TokenKind::Colon,
            // Suffixes such as `0ffh` and prefixes such as `0x` are checked by the parser
            '0'..='9' => {
                self.take_while(|c| c.is_ascii_alphanumeric());
                TokenKind::Number
            }
            '-' if self.first().is_ascii_digit() => {
                self.take_while(|c| c.is_ascii_alphanumeric());
                TokenKind::Number
            }
            c if is_id_start(c) => {
                self.take_while(is_id);
                TokenKind::Ident
            }
            _ => TokenKind::Unknown,
        };
        let token = Token::new(
            kind,
            Span::new(SrcOffset(self.token_start()), self.pos_in_token()),
        );
        self.reset_pos();
        token
    }
}

/// Iterate over all tokens of `input`, ending before [`TokenKind::Eof`].
pub fn tokenize(input: &str) -> impl Iterator<Item = Token> + '_ {
    let mut cursor = Cursor::new(input);
    std::iter::from_fn(move || {
        let token = cursor.advance_token();
        if token.kind != TokenKind::Eof {
            Some(token)
        } else {
            None
        }
    })
}

/// Tokens of one source line, without whitespace, commas or comments.
#[derive(Debug)]
pub struct SourceLine {
    /// 1-based line number
    pub number: usize,
    pub tokens: Vec<Token>,
}

/// Split source into lines of meaningful tokens. Blank and comment-only lines are dropped,
/// but line numbers always refer to the original text.
pub fn lines(input: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut current = SourceLine {
        number: 1,
        tokens: Vec::new(),
    };
    for token in tokenize(input) {
        match token.kind {
            TokenKind::Whitespace | TokenKind::Comment => continue,
            TokenKind::Newline => {
                let number = current.number + 1;
                let finished = std::mem::replace(
                    &mut current,
                    SourceLine {
                        number,
                        tokens: Vec::new(),
                    },
                );
                if !finished.tokens.is_empty() {
                    lines.push(finished);
                }
            }
            _ => current.tokens.push(token),
        }
    }
    if !current.tokens.is_empty() {
        lines.push(current);
    }
    lines
}
