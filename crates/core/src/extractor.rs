//! Placeholder extraction.
//!
//! A parse walks the token stream once, tracking brace nesting to tell
//! FROM-clause type references (`{Product AS p}`) from attribute references
//! (`{p.code}`). A second walk links every placeholder to the attribute it is
//! compared with and asks the schema for that attribute's declared type.

use crate::error::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::schema::SchemaOracle;
use crate::types::PlaceholderOccurrence;
use log::{debug, warn};

/// Source of placeholder occurrences for a query text.
pub trait PlaceholderParser: Send + Sync {
    /// Placeholders in source order. May fail on malformed text.
    fn parse_placeholders(
        &self,
        text: &str,
        schema: &dyn SchemaOracle,
    ) -> Result<Vec<PlaceholderOccurrence>, ParseError>;
}

/// Run one extraction.
///
/// `None` when the text does not parse; callers keep whatever they held
/// from the last successful extraction.
pub fn extract(
    parser: &dyn PlaceholderParser,
    text: &str,
    schema: &dyn SchemaOracle,
) -> Option<Vec<PlaceholderOccurrence>> {
    match parser.parse_placeholders(text, schema) {
        Ok(occurrences) => {
            debug!("Extracted {} placeholder occurrences", occurrences.len());
            Some(occurrences)
        }
        Err(err) => {
            warn!("Query does not parse, keeping previous parameters: {err}");
            None
        }
    }
}

/// Parser for FlexibleSearch-style queries
#[derive(Debug, Clone, Copy)]
pub struct FlexibleSearchParser {
    marker: char,
}

impl Default for FlexibleSearchParser {
    fn default() -> Self {
        Self::new('?')
    }
}

impl FlexibleSearchParser {
    #[must_use]
    pub const fn new(marker: char) -> Self {
        Self { marker }
    }
}

impl PlaceholderParser for FlexibleSearchParser {
    fn parse_placeholders(
        &self,
        text: &str,
        schema: &dyn SchemaOracle,
    ) -> Result<Vec<PlaceholderOccurrence>, ParseError> {
        let tokens = Lexer::new(text, self.marker).tokenize()?;
        let parsed = Structure::scan(text, &tokens, self.marker)?;
        Ok(parsed.resolve(schema))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    In,
    Not,
    Like,
    Between,
    And,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element<'a> {
    Column {
        alias: Option<&'a str>,
        attribute: &'a str,
        scope: usize,
    },
    /// Index into the occurrence list
    Placeholder(usize),
    Compare,
    Keyword(Keyword),
    ParenOpen,
    ParenClose,
    Comma,
    Value,
}

#[derive(Debug)]
enum Brace {
    From {
        expect_type: bool,
        expect_alias: bool,
        last_type: Option<String>,
    },
    Subquery,
    Other,
}

struct Structure<'a> {
    elements: Vec<Element<'a>>,
    occurrences: Vec<PlaceholderOccurrence>,
    // (alias, type code); a bare type is registered under its own name
    aliases: Vec<(String, String)>,
    // first type of each query level; unqualified columns resolve against it
    scope_types: Vec<Option<String>>,
}

impl<'a> Structure<'a> {
    fn scan(source: &'a str, tokens: &[Token], marker: char) -> Result<Self, ParseError> {
        let mut out = Self {
            elements: Vec::new(),
            occurrences: Vec::new(),
            aliases: Vec::new(),
            scope_types: vec![None],
        };
        let mut stack: Vec<Brace> = Vec::new();
        let mut scopes: Vec<usize> = vec![0];
        let mut after_from = false;
        let mut i = 0;

        while i < tokens.len() {
            let token = tokens[i];
            let was_after_from = std::mem::take(&mut after_from);

            match token.kind {
                TokenKind::BraceOpen => {
                    if adjacent(tokens, i, TokenKind::BraceOpen) {
                        stack.push(Brace::Subquery);
                        scopes.push(out.scope_types.len());
                        out.scope_types.push(None);
                        i += 2;
                        continue;
                    }
                    if was_after_from {
                        stack.push(Brace::From {
                            expect_type: true,
                            expect_alias: false,
                            last_type: None,
                        });
                    } else if let Some((column, consumed)) =
                        column_ref(source, &tokens[i..], current_scope(&scopes))
                    {
                        out.elements.push(column);
                        i += consumed;
                        continue;
                    } else {
                        stack.push(Brace::Other);
                    }
                }
                TokenKind::BraceClose => match stack.pop() {
                    Some(Brace::Subquery) => {
                        if !adjacent(tokens, i, TokenKind::BraceClose) {
                            return Err(ParseError::new(
                                token.range.start,
                                "sub-query must be closed with '}}'",
                            ));
                        }
                        scopes.pop();
                        i += 2;
                        continue;
                    }
                    Some(_) => {}
                    None => return Err(ParseError::new(token.range.start, "unmatched '}'")),
                },
                TokenKind::Placeholder => {
                    let name = &token.text(source)[marker.len_utf8()..];
                    out.elements.push(Element::Placeholder(out.occurrences.len()));
                    out.occurrences
                        .push(PlaceholderOccurrence::new(name, token.range, None));
                }
                TokenKind::Ident => {
                    if let Some(Brace::From {
                        expect_type,
                        expect_alias,
                        last_type,
                    }) = stack.last_mut()
                    {
                        let word = token.text(source);
                        if *expect_alias {
                            *expect_alias = false;
                            if let Some(type_code) = last_type.clone() {
                                out.aliases.push((word.to_string(), type_code));
                            }
                        } else if *expect_type {
                            *expect_type = false;
                            *last_type = Some(word.to_string());
                            out.aliases.push((word.to_string(), word.to_string()));
                            out.scope_types[current_scope(&scopes)]
                                .get_or_insert_with(|| word.to_string());
                        } else if word.eq_ignore_ascii_case("as") {
                            *expect_alias = true;
                        } else if word.eq_ignore_ascii_case("join") {
                            *expect_type = true;
                        }
                    }
                    if token.is_keyword(source, "from") {
                        after_from = true;
                    }
                    out.elements
                        .push(keyword(source, &token).map_or(Element::Value, Element::Keyword));
                }
                TokenKind::Compare(_) => out.elements.push(Element::Compare),
                TokenKind::ParenOpen => out.elements.push(Element::ParenOpen),
                TokenKind::ParenClose => out.elements.push(Element::ParenClose),
                TokenKind::Comma => out.elements.push(Element::Comma),
                TokenKind::Bang | TokenKind::Star
                    if matches!(stack.last(), Some(Brace::From { .. })) => {}
                _ => out.elements.push(Element::Value),
            }
            i += 1;
        }

        if let Some(open) = stack.last() {
            let end = source.len();
            let what = match open {
                Brace::Subquery => "unclosed sub-query",
                _ => "unclosed '{'",
            };
            return Err(ParseError::new(end, what));
        }
        Ok(out)
    }

    fn resolve(mut self, schema: &dyn SchemaOracle) -> Vec<PlaceholderOccurrence> {
        for (position, element) in self.elements.iter().enumerate() {
            let Element::Placeholder(idx) = *element else {
                continue;
            };
            let operand = operand_before(&self.elements, position)
                .or_else(|| operand_after(&self.elements, position));
            let Some(Element::Column {
                alias,
                attribute,
                scope,
            }) = operand.map(|at| self.elements[at])
            else {
                continue;
            };
            let declared = self
                .type_for(alias, scope)
                .and_then(|type_code| schema.attribute_type(type_code, attribute));
            self.occurrences[idx].declared_kind = declared;
        }
        self.occurrences
    }

    fn type_for<'s>(&'s self, alias: Option<&'s str>, scope: usize) -> Option<&'s str> {
        match alias {
            Some(alias) => Some(
                self.aliases
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(alias))
                    .map_or(alias, |(_, type_code)| type_code.as_str()),
            ),
            None => self.scope_types[scope]
                .as_deref()
                .or_else(|| self.aliases.first().map(|(_, type_code)| type_code.as_str())),
        }
    }
}

fn current_scope(scopes: &[usize]) -> usize {
    scopes.last().copied().unwrap_or(0)
}

fn adjacent(tokens: &[Token], i: usize, kind: TokenKind) -> bool {
    tokens
        .get(i + 1)
        .is_some_and(|next| next.kind == kind && next.range.start == tokens[i].range.end)
}

fn keyword(source: &str, token: &Token) -> Option<Keyword> {
    [
        ("in", Keyword::In),
        ("not", Keyword::Not),
        ("like", Keyword::Like),
        ("between", Keyword::Between),
        ("and", Keyword::And),
    ]
    .into_iter()
    .find(|(word, _)| token.is_keyword(source, word))
    .map(|(_, kw)| kw)
}

/// `{attr}`, `{alias.attr}`, `{alias:attr}`, optionally `[lang]` before `}`.
/// Returns the element and how many tokens it spans.
fn column_ref<'a>(
    source: &'a str,
    tokens: &[Token],
    scope: usize,
) -> Option<(Element<'a>, usize)> {
    let kind_at = |n: usize| tokens.get(n).map(|t| t.kind);
    if kind_at(1)? != TokenKind::Ident {
        return None;
    }
    let mut n = 2;
    let (alias, attribute) = match kind_at(n) {
        Some(TokenKind::Dot | TokenKind::Colon) if kind_at(n + 1) == Some(TokenKind::Ident) => {
            n += 2;
            (Some(tokens[1].text(source)), tokens[3].text(source))
        }
        _ => (None, tokens[1].text(source)),
    };
    if kind_at(n) == Some(TokenKind::BracketOpen) {
        while kind_at(n)? != TokenKind::BracketClose {
            n += 1;
        }
        n += 1;
    }
    let column = Element::Column {
        alias,
        attribute,
        scope,
    };
    (kind_at(n)? == TokenKind::BraceClose).then_some((column, n + 1))
}

fn is_column(elements: &[Element<'_>], at: usize) -> Option<usize> {
    matches!(elements.get(at), Some(Element::Column { .. })).then_some(at)
}

fn skip_not(elements: &[Element<'_>], at: usize) -> Option<usize> {
    if elements.get(at) == Some(&Element::Keyword(Keyword::Not)) {
        at.checked_sub(1)
    } else {
        Some(at)
    }
}

fn operand_before(elements: &[Element<'_>], position: usize) -> Option<usize> {
    let prev = position.checked_sub(1)?;
    match elements[prev] {
        Element::Compare => is_column(elements, prev.checked_sub(1)?),
        Element::Keyword(Keyword::Like | Keyword::Between) => {
            is_column(elements, skip_not(elements, prev.checked_sub(1)?)?)
        }
        // BETWEEN <low> AND ?high
        Element::Keyword(Keyword::And) => {
            let low = prev.checked_sub(1)?;
            if !matches!(elements[low], Element::Value | Element::Placeholder(_)) {
                return None;
            }
            let between = low.checked_sub(1)?;
            if elements[between] != Element::Keyword(Keyword::Between) {
                return None;
            }
            is_column(elements, skip_not(elements, between.checked_sub(1)?)?)
        }
        // IN (?a, ?b)
        Element::ParenOpen | Element::Comma => {
            let mut at = prev;
            while elements[at] != Element::ParenOpen {
                if !matches!(
                    elements[at],
                    Element::Comma | Element::Value | Element::Placeholder(_)
                ) {
                    return None;
                }
                at = at.checked_sub(1)?;
            }
            let in_kw = at.checked_sub(1)?;
            if elements[in_kw] != Element::Keyword(Keyword::In) {
                return None;
            }
            is_column(elements, skip_not(elements, in_kw.checked_sub(1)?)?)
        }
        _ => None,
    }
}

fn operand_after(elements: &[Element<'_>], position: usize) -> Option<usize> {
    match elements.get(position + 1)? {
        Element::Compare => is_column(elements, position + 2),
        _ => None,
    }
}
