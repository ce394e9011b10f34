//! Tokenizer for FlexibleSearch-style query text.
//!
//! Only what placeholder extraction needs is distinguished; everything else
//! collapses into [`TokenKind::Other`]. String literals and comments are
//! consumed whole so markers inside them never become placeholders.

use crate::error::ParseError;
use crate::types::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    /// Marker plus identifier path; the range covers the marker
    Placeholder,
    Number,
    StringLit,
    BraceOpen,
    BraceClose,
    ParenOpen,
    ParenClose,
    BracketOpen,
    BracketClose,
    Comma,
    Dot,
    Colon,
    Bang,
    Star,
    Compare(CompareOp),
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: TextRange,
}

impl Token {
    #[must_use]
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range.start..self.range.end]
    }

    /// Case-insensitive keyword test for identifiers
    #[must_use]
    pub fn is_keyword(&self, source: &str, keyword: &str) -> bool {
        self.kind == TokenKind::Ident && self.text(source).eq_ignore_ascii_case(keyword)
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    next: usize,
    marker: char,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub const fn new(source: &'a str, marker: char) -> Self {
        Self {
            source,
            next: 0,
            marker,
        }
    }

    /// Tokenize the whole source, skipping whitespace and comments.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn peek(&self, n: usize) -> Option<char> {
        self.source[self.next..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.next += ch.len_utf8();
        Some(ch)
    }

    fn consume_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(ch) = self.peek(0) {
            if !pred(ch) {
                break;
            }
            self.next += ch.len_utf8();
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(0), self.peek(1)) {
                (Some(ch), _) if ch.is_whitespace() => self.consume_while(char::is_whitespace),
                (Some('-'), Some('-')) => self.consume_while(|ch| ch != '\n'),
                (Some('/'), Some('*')) => {
                    let start = self.next;
                    match self.source[self.next + 2..].find("*/") {
                        Some(end) => self.next += 2 + end + 2,
                        None => return Err(ParseError::new(start, "unterminated block comment")),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, ParseError> {
        self.skip_trivia()?;
        let start = self.next;
        let Some(ch) = self.bump() else {
            return Ok(None);
        };

        let kind = match ch {
            c if c == self.marker => self.lex_placeholder(),
            c if is_ident_start(c) => {
                self.consume_while(is_ident_continue);
                TokenKind::Ident
            }
            c if c.is_ascii_digit() => {
                self.consume_while(|c| c.is_ascii_digit() || c == '.');
                TokenKind::Number
            }
            '\'' => self.lex_string(start)?,
            '{' => TokenKind::BraceOpen,
            '}' => TokenKind::BraceClose,
            '(' => TokenKind::ParenOpen,
            ')' => TokenKind::ParenClose,
            '[' => TokenKind::BracketOpen,
            ']' => TokenKind::BracketClose,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            ':' => TokenKind::Colon,
            '*' => TokenKind::Star,
            '=' => TokenKind::Compare(CompareOp::Eq),
            '!' if self.peek(0) == Some('=') => {
                self.bump();
                TokenKind::Compare(CompareOp::NotEq)
            }
            '!' => TokenKind::Bang,
            '<' => match self.peek(0) {
                Some('>') => {
                    self.bump();
                    TokenKind::Compare(CompareOp::NotEq)
                }
                Some('=') => {
                    self.bump();
                    TokenKind::Compare(CompareOp::LtEq)
                }
                _ => TokenKind::Compare(CompareOp::Lt),
            },
            '>' if self.peek(0) == Some('=') => {
                self.bump();
                TokenKind::Compare(CompareOp::GtEq)
            }
            '>' => TokenKind::Compare(CompareOp::Gt),
            _ => TokenKind::Other,
        };

        Ok(Some(Token {
            kind,
            range: TextRange::new(start, self.next),
        }))
    }

    // `?name`, `?session.user`, `?1`; a bare marker is not a placeholder.
    fn lex_placeholder(&mut self) -> TokenKind {
        match self.peek(0) {
            Some(c) if is_ident_start(c) => {
                self.consume_while(is_ident_continue);
                while self.peek(0) == Some('.') && self.peek(1).is_some_and(is_ident_start) {
                    self.bump();
                    self.consume_while(is_ident_continue);
                }
                TokenKind::Placeholder
            }
            Some(c) if c.is_ascii_digit() => {
                self.consume_while(|c| c.is_ascii_digit());
                TokenKind::Placeholder
            }
            _ => TokenKind::Other,
        }
    }

    fn lex_string(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        loop {
            match self.bump() {
                Some('\'') if self.peek(0) == Some('\'') => {
                    self.bump();
                }
                Some('\'') => return Ok(TokenKind::StringLit),
                Some(_) => {}
                None => return Err(ParseError::new(start, "unterminated string literal")),
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
