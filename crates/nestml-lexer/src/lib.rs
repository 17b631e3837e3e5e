//! # nestml-lexer
//!
//! C1: bytes to tokens.
//!
//! NESTML is block-structured and indentation-*insensitive*: blocks open
//! with a keyword and close with an explicit `end`. Newlines still matter —
//! they separate declarations and statements within a block — so the lexer
//! emits them as tokens rather than treating them as insignificant
//! whitespace (unlike the `WHITESPACE`/`NEWLINE`-silent grammars the legacy
//! SLI/HOC parsers in this workspace use, where every statement is
//! brace-delimited and newlines truly don't matter).

use nestml_core::{Diagnostic, SourcePosition, SourceRange};
use serde::{Deserialize, Serialize};

/// Reserved words. `shape` and `convolve` are contextual in real NESTML
/// grammars (usable as identifiers outside `equations`), but we reserve them
/// unconditionally here for simplicity — CoCo C6's "reserved names may not
/// be redeclared" rule already has to special-case unit symbols and
/// built-ins, so folding keywords into the same bucket costs nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Neuron,
    Synapse,
    State,
    InitialValues,
    Parameters,
    Internals,
    Equations,
    Input,
    Output,
    Update,
    Function,
    Shape,
    If,
    Elif,
    Else,
    For,
    While,
    In,
    Return,
    And,
    Or,
    Not,
    End,
    Recordable,
    Inhibitory,
    Excitatory,
    Spike,
    Current,
    Integer,
    Real,
    Boolean,
    String,
    Void,
    True,
    False,
}

impl Keyword {
    fn from_str(s: &str) -> Option<Keyword> {
        use Keyword::*;
        Some(match s {
            "neuron" => Neuron,
            "synapse" => Synapse,
            "state" => State,
            "initial_values" => InitialValues,
            "parameters" => Parameters,
            "internals" => Internals,
            "equations" => Equations,
            "input" => Input,
            "output" => Output,
            "update" => Update,
            "function" => Function,
            "shape" => Shape,
            "if" => If,
            "elif" => Elif,
            "else" => Else,
            "for" => For,
            "while" => While,
            "in" => In,
            "return" => Return,
            "and" => And,
            "or" => Or,
            "not" => Not,
            "end" => End,
            "recordable" => Recordable,
            "inhibitory" => Inhibitory,
            "excitatory" => Excitatory,
            "spike" => Spike,
            "current" => Current,
            "integer" => Integer,
            "real" => Real,
            "boolean" => Boolean,
            "string" => String,
            "void" => Void,
            "true" => True,
            "false" => False,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TokenKind {
    Keyword(Keyword),
    Identifier(std::string::String),
    Integer(i64),
    Float(f64),
    StringLiteral(std::string::String),
    Docstring(std::string::String),

    Plus,
    Minus,
    Star,
    Slash,
    Power,
    Percent,

    Assign,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    LeftArrow,

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Colon,

    Newline,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub range: SourceRange,
}

/// Tokenize `source`. Recognition failures (an unterminated string, an
/// unrecognized character) are reported as diagnostics and the offending
/// character(s) are skipped so lexing can continue at a best effort.
pub fn lex(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 0,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn here(&self) -> SourcePosition {
        SourcePosition::new(self.line, self.column)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(b)
    }

    fn emit(&mut self, kind: TokenKind, start: SourcePosition) {
        let end = self.here();
        self.tokens.push(Token {
            kind,
            range: SourceRange::new(start, end),
        });
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        loop {
            let start = self.here();
            let Some(b) = self.peek() else {
                self.emit(TokenKind::Eof, start);
                break;
            };

            match b {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                b'\n' => {
                    self.advance();
                    self.emit(TokenKind::Newline, start);
                }
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                b'"' if self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') => {
                    self.lex_docstring(start);
                }
                b'"' => self.lex_string(start),
                b'0'..=b'9' => self.lex_number(start),
                b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_identifier(start),
                b'*' if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();
                    self.emit(TokenKind::Power, start);
                }
                b'*' => {
                    self.advance();
                    self.emit(TokenKind::Star, start);
                }
                b'+' => {
                    self.advance();
                    self.emit(TokenKind::Plus, start);
                }
                b'-' => {
                    self.advance();
                    self.emit(TokenKind::Minus, start);
                }
                b'/' => {
                    self.advance();
                    self.emit(TokenKind::Slash, start);
                }
                b'%' => {
                    self.advance();
                    self.emit(TokenKind::Percent, start);
                }
                b'=' if self.peek_at(1) == Some(b'=') => {
                    self.advance();
                    self.advance();
                    self.emit(TokenKind::Eq, start);
                }
                b'=' => {
                    self.advance();
                    self.emit(TokenKind::Assign, start);
                }
                b'!' if self.peek_at(1) == Some(b'=') => {
                    self.advance();
                    self.advance();
                    self.emit(TokenKind::Ne, start);
                }
                b'<' if self.peek_at(1) == Some(b'-') => {
                    self.advance();
                    self.advance();
                    self.emit(TokenKind::LeftArrow, start);
                }
                b'<' if self.peek_at(1) == Some(b'=') => {
                    self.advance();
                    self.advance();
                    self.emit(TokenKind::Le, start);
                }
                b'<' => {
                    self.advance();
                    self.emit(TokenKind::Lt, start);
                }
                b'>' if self.peek_at(1) == Some(b'=') => {
                    self.advance();
                    self.advance();
                    self.emit(TokenKind::Ge, start);
                }
                b'>' => {
                    self.advance();
                    self.emit(TokenKind::Gt, start);
                }
                b'(' => {
                    self.advance();
                    self.emit(TokenKind::LParen, start);
                }
                b')' => {
                    self.advance();
                    self.emit(TokenKind::RParen, start);
                }
                b'[' => {
                    self.advance();
                    self.emit(TokenKind::LBracket, start);
                }
                b']' => {
                    self.advance();
                    self.emit(TokenKind::RBracket, start);
                }
                b',' => {
                    self.advance();
                    self.emit(TokenKind::Comma, start);
                }
                b':' => {
                    self.advance();
                    self.emit(TokenKind::Colon, start);
                }
                other => {
                    self.advance();
                    self.diagnostics.push(Diagnostic::error(
                        "LexUnexpectedChar",
                        SourceRange::point(start),
                        format!("unexpected character {:?}", other as char),
                    ));
                }
            }
        }

        (self.tokens, self.diagnostics)
    }

    fn lex_identifier(&mut self, start: SourcePosition) {
        let begin = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.advance();
            } else {
                break;
            }
        }
        // Trailing primes denote a time-derivative LHS, e.g. `V_m'`, `V_m''`.
        while self.peek() == Some(b'\'') {
            self.advance();
        }
        let text = &self.source[begin..self.pos];
        let kind = match Keyword::from_str(text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(text.to_string()),
        };
        self.emit(kind, start);
    }

    fn lex_number(&mut self, start: SourcePosition) {
        let begin = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            is_float = true;
            self.advance();
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let save = self.pos;
            let save_line = self.line;
            let save_col = self.column;
            self.advance();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.advance();
            }
            if matches!(self.peek(), Some(b'0'..=b'9')) {
                is_float = true;
                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.advance();
                }
            } else {
                self.pos = save;
                self.line = save_line;
                self.column = save_col;
            }
        }
        let text = &self.source[begin..self.pos];
        if is_float {
            let value: f64 = text.parse().unwrap_or(0.0);
            self.emit(TokenKind::Float(value), start);
        } else {
            match text.parse::<i64>() {
                Ok(value) => self.emit(TokenKind::Integer(value), start),
                Err(_) => {
                    let value: f64 = text.parse().unwrap_or(0.0);
                    self.emit(TokenKind::Float(value), start);
                }
            }
        }
    }

    fn lex_string(&mut self, start: SourcePosition) {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        "LexUnterminatedString",
                        SourceRange::new(start, self.here()),
                        "unterminated string literal",
                    ));
                    break;
                }
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(_) => {
                    if let Some(c) = self.advance() {
                        value.push(c as char);
                    }
                }
            }
        }
        self.emit(TokenKind::StringLiteral(value), start);
    }

    fn lex_docstring(&mut self, start: SourcePosition) {
        self.advance();
        self.advance();
        self.advance();
        let begin = self.pos;
        loop {
            if self.peek().is_none() {
                self.diagnostics.push(Diagnostic::error(
                    "LexUnterminatedDocstring",
                    SourceRange::new(start, self.here()),
                    "unterminated docstring",
                ));
                break;
            }
            if self.peek() == Some(b'"') && self.peek_at(1) == Some(b'"') && self.peek_at(2) == Some(b'"') {
                let text = self.source[begin..self.pos].trim().to_string();
                self.advance();
                self.advance();
                self.advance();
                self.emit(TokenKind::Docstring(text), start);
                return;
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = lex(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_keywords_and_identifiers() {
        let k = kinds("neuron N:\nend\n");
        assert_eq!(
            k,
            vec![
                TokenKind::Keyword(Keyword::Neuron),
                TokenKind::Identifier("N".into()),
                TokenKind::Colon,
                TokenKind::Newline,
                TokenKind::Keyword(Keyword::End),
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_derivative_identifier_with_primes() {
        let k = kinds("V_m''");
        assert_eq!(k, vec![TokenKind::Identifier("V_m''".into()), TokenKind::Eof]);
    }

    #[test]
    fn lexes_numbers() {
        let k = kinds("1 1.5 1e3 1.5e-2 -3");
        assert_eq!(
            k,
            vec![
                TokenKind::Integer(1),
                TokenKind::Float(1.5),
                TokenKind::Float(1000.0),
                TokenKind::Float(0.015),
                TokenKind::Minus,
                TokenKind::Integer(3),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_operators() {
        let k = kinds("<- ** == != <= >=");
        assert_eq!(
            k,
            vec![
                TokenKind::LeftArrow,
                TokenKind::Power,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn skips_comments() {
        let k = kinds("# a comment\nreal");
        assert_eq!(
            k,
            vec![TokenKind::Newline, TokenKind::Keyword(Keyword::Real), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_docstring() {
        let k = kinds("\"\"\"hello\"\"\"");
        assert_eq!(k, vec![TokenKind::Docstring("hello".into()), TokenKind::Eof]);
    }

    #[test]
    fn reports_unterminated_string() {
        let (_, diags) = lex("\"abc");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "LexUnterminatedString");
    }

    #[test]
    fn reports_unexpected_character_and_recovers() {
        let (tokens, diags) = lex("real @ integer");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, "LexUnexpectedChar");
        assert_eq!(
            tokens.iter().map(|t| &t.kind).collect::<Vec<_>>(),
            vec![
                &TokenKind::Keyword(Keyword::Real),
                &TokenKind::Keyword(Keyword::Integer),
                &TokenKind::Eof,
            ]
        );
    }
}
