//! # SQL Span Scanner
//!
//! Single left-to-right scan that classifies a SQL string into a sequence
//! of typed spans with zero string allocation: all span content is sliced
//! out of the input. The scanner tracks exactly the structure a client
//! driver needs before anything touches the wire:
//!
//! - statement boundaries (top-level semicolons)
//! - parenthesis balance
//! - `?` parameter placeholders vs. the JSON operators `??`, `?|`, `?&`
//! - quoting regions in which none of the above applies
//!
//! ## Span Kinds
//!
//! - **Text**: default state; the only state in which semicolons split,
//!   parens count, and placeholders are recognized
//! - **LineComment** (`-- ...`), **BlockComment** (`/* ... */`, nesting
//!   arbitrarily deep)
//! - **SingleQuoteString** (`'...'`, `''` escapes a quote)
//! - **QuotedIdentifier** (`"..."`, `""` escapes a quote)
//! - **DollarQuoteString** (`$tag$...$tag$`): ends only at the exact
//!   matching tag, including the empty tag (`$$...$$`); quote characters
//!   inside have no special meaning
//! - **Escape** (`{...}`): one span covering the outermost clause,
//!   including nested braces; string and comment rules still apply inside
//!
//! Spans are contiguous, non-overlapping, and cover the whole input.
//!
//! ## Errors
//!
//! Reaching end-of-input in any non-default state is a lexical error
//! (unterminated construct), as is a nonzero or negative final paren
//! depth. An unclosed or stray brace is an escape-syntax error. All are
//! surfaced before any statement unit executes.

use crate::error::DriverError;
use eyre::Result;
use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind<'a> {
    Text,
    LineComment,
    BlockComment,
    SingleQuoteString,
    QuotedIdentifier,
    DollarQuoteString(&'a str),
    Escape,
}

/// Half-open byte range `[start, end)` over the original input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span<'a> {
    pub kind: SpanKind<'a>,
    pub start: usize,
    pub end: usize,
}

impl<'a> Span<'a> {
    pub fn is_comment(&self) -> bool {
        matches!(self.kind, SpanKind::LineComment | SpanKind::BlockComment)
    }
}

/// Scanner behavior gated by server capabilities.
#[derive(Debug, Clone, Copy)]
pub struct SqlOptions {
    /// `??`, `?|`, `?&` are operators (server >= 9.4); when false they are
    /// rejected rather than misread as placeholders.
    pub accept_json_operators: bool,
}

impl From<&crate::session::SessionInfo> for SqlOptions {
    fn from(info: &crate::session::SessionInfo) -> Self {
        SqlOptions {
            accept_json_operators: info.accepts_json_operators(),
        }
    }
}

/// Result of one scan pass.
#[derive(Debug)]
pub struct ScanOutput<'a> {
    pub spans: SmallVec<[Span<'a>; 8]>,
    /// Positions of top-level statement-splitting semicolons.
    pub boundaries: SmallVec<[usize; 4]>,
    /// Positions of `?` parameter placeholders.
    pub placeholders: SmallVec<[usize; 4]>,
}

/// Scan `input` into covering spans. Fails on any unterminated construct
/// or unbalanced parentheses.
pub fn scan<'a>(input: &'a str, options: &SqlOptions) -> Result<ScanOutput<'a>> {
    Scanner::new(input, options).scan_all()
}

/// Count `?` placeholders in already-translated statement text.
pub(crate) fn count_placeholders(text: &str, options: &SqlOptions) -> Result<usize> {
    Ok(scan(text, options)?.placeholders.len())
}

struct Scanner<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    paren_depth: i32,
    paren_underflow: bool,
    accept_json_operators: bool,
    spans: SmallVec<[Span<'a>; 8]>,
    boundaries: SmallVec<[usize; 4]>,
    placeholders: SmallVec<[usize; 4]>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str, options: &SqlOptions) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            paren_depth: 0,
            paren_underflow: false,
            accept_json_operators: options.accept_json_operators,
            spans: SmallVec::new(),
            boundaries: SmallVec::new(),
            placeholders: SmallVec::new(),
        }
    }

    fn scan_all(mut self) -> Result<ScanOutput<'a>> {
        let mut text_start = 0usize;

        while !self.is_eof() {
            let ch = self.current();
            let at = self.pos;

            match ch {
                b'\'' => {
                    self.flush_text(&mut text_start, at);
                    let span = self.scan_single_quote()?;
                    self.push_span(span, &mut text_start);
                }
                b'"' => {
                    self.flush_text(&mut text_start, at);
                    let span = self.scan_quoted_identifier()?;
                    self.push_span(span, &mut text_start);
                }
                b'-' if self.peek_char() == Some(b'-') => {
                    self.flush_text(&mut text_start, at);
                    let span = self.scan_line_comment();
                    self.push_span(span, &mut text_start);
                }
                b'/' if self.peek_char() == Some(b'*') => {
                    self.flush_text(&mut text_start, at);
                    let span = self.scan_block_comment()?;
                    self.push_span(span, &mut text_start);
                }
                b'$' => {
                    if let Some(tag) = self.peek_dollar_tag() {
                        self.flush_text(&mut text_start, at);
                        let span = self.scan_dollar_quote(tag)?;
                        self.push_span(span, &mut text_start);
                    } else {
                        self.advance();
                    }
                }
                b'{' => {
                    self.flush_text(&mut text_start, at);
                    let span = self.scan_escape_region()?;
                    self.push_span(span, &mut text_start);
                }
                b'}' => {
                    return Err(DriverError::escape_syntax("unmatched '}'", at).into());
                }
                b'(' => {
                    self.paren_depth += 1;
                    self.advance();
                }
                b')' => {
                    self.paren_depth -= 1;
                    if self.paren_depth < 0 {
                        self.paren_underflow = true;
                    }
                    self.advance();
                }
                b';' if self.paren_depth == 0 => {
                    self.boundaries.push(at);
                    self.advance();
                }
                b'?' => self.scan_question()?,
                _ => self.advance(),
            }
        }

        if self.paren_depth != 0 || self.paren_underflow {
            return Err(
                DriverError::lexical("unbalanced parentheses", self.input.len()).into(),
            );
        }

        self.flush_text(&mut text_start, self.pos);
        Ok(ScanOutput {
            spans: self.spans,
            boundaries: self.boundaries,
            placeholders: self.placeholders,
        })
    }

    fn flush_text(&mut self, text_start: &mut usize, upto: usize) {
        if *text_start < upto {
            self.spans.push(Span {
                kind: SpanKind::Text,
                start: *text_start,
                end: upto,
            });
        }
        *text_start = upto;
    }

    fn push_span(&mut self, span: Span<'a>, text_start: &mut usize) {
        *text_start = span.end;
        self.spans.push(span);
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            self.pos += 1;
        }
    }

    fn scan_single_quote(&mut self) -> Result<Span<'a>> {
        let start = self.pos;
        self.advance();

        loop {
            if self.is_eof() {
                return Err(DriverError::lexical("unterminated string literal", start).into());
            }
            if self.current() == b'\'' {
                if self.peek_char() == Some(b'\'') {
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(Span {
                        kind: SpanKind::SingleQuoteString,
                        start,
                        end: self.pos,
                    });
                }
            } else {
                self.advance();
            }
        }
    }

    fn scan_quoted_identifier(&mut self) -> Result<Span<'a>> {
        let start = self.pos;
        self.advance();

        loop {
            if self.is_eof() {
                return Err(
                    DriverError::lexical("unterminated quoted identifier", start).into(),
                );
            }
            if self.current() == b'"' {
                if self.peek_char() == Some(b'"') {
                    self.advance();
                    self.advance();
                } else {
                    self.advance();
                    return Ok(Span {
                        kind: SpanKind::QuotedIdentifier,
                        start,
                        end: self.pos,
                    });
                }
            } else {
                self.advance();
            }
        }
    }

    fn scan_line_comment(&mut self) -> Span<'a> {
        let start = self.pos;
        while !self.is_eof() && self.current() != b'\n' {
            self.advance();
        }
        if !self.is_eof() {
            self.advance();
        }
        Span {
            kind: SpanKind::LineComment,
            start,
            end: self.pos,
        }
    }

    fn scan_block_comment(&mut self) -> Result<Span<'a>> {
        let start = self.pos;
        self.advance();
        self.advance();
        let mut depth = 1u32;

        while !self.is_eof() && depth > 0 {
            if self.current() == b'/' && self.peek_char() == Some(b'*') {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.current() == b'*' && self.peek_char() == Some(b'/') {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }

        if depth > 0 {
            return Err(DriverError::lexical("unterminated block comment", start).into());
        }
        Ok(Span {
            kind: SpanKind::BlockComment,
            start,
            end: self.pos,
        })
    }

    /// At a `$`, return the dollar-quote tag (possibly empty) iff this
    /// position opens a dollar quote. `$1` positional syntax and a lone
    /// `$` are ordinary text.
    fn peek_dollar_tag(&self) -> Option<&'a str> {
        let mut i = self.pos + 1;
        match self.bytes.get(i) {
            Some(b'$') => return Some(""),
            Some(c) if c.is_ascii_alphabetic() || *c == b'_' => {}
            _ => return None,
        }
        i += 1;
        while let Some(c) = self.bytes.get(i) {
            if c.is_ascii_alphanumeric() || *c == b'_' {
                i += 1;
            } else if *c == b'$' {
                return Some(&self.input[self.pos + 1..i]);
            } else {
                return None;
            }
        }
        None
    }

    fn scan_dollar_quote(&mut self, tag: &'a str) -> Result<Span<'a>> {
        let start = self.pos;
        let close = format!("${}$", tag);
        // skip opening delimiter
        for _ in 0..close.len() {
            self.advance();
        }

        loop {
            if self.is_eof() {
                return Err(
                    DriverError::lexical("unterminated dollar-quoted string", start).into(),
                );
            }
            if self.current() == b'$' && self.input[self.pos..].starts_with(&close) {
                for _ in 0..close.len() {
                    self.advance();
                }
                return Ok(Span {
                    kind: SpanKind::DollarQuoteString(tag),
                    start,
                    end: self.pos,
                });
            }
            self.advance();
        }
    }

    /// One span for the outermost `{...}` clause. String, identifier,
    /// comment, and dollar-quote rules still apply inside; nested braces
    /// track depth; placeholders inside the clause are counted.
    fn scan_escape_region(&mut self) -> Result<Span<'a>> {
        let start = self.pos;
        self.advance();
        let mut depth = 1u32;

        while depth > 0 {
            if self.is_eof() {
                return Err(
                    DriverError::escape_syntax("unterminated escape clause", start).into(),
                );
            }
            match self.current() {
                b'\'' => {
                    self.scan_single_quote()?;
                }
                b'"' => {
                    self.scan_quoted_identifier()?;
                }
                b'-' if self.peek_char() == Some(b'-') => {
                    self.scan_line_comment();
                }
                b'/' if self.peek_char() == Some(b'*') => {
                    self.scan_block_comment()?;
                }
                b'$' => {
                    if let Some(tag) = self.peek_dollar_tag() {
                        self.scan_dollar_quote(tag)?;
                    } else {
                        self.advance();
                    }
                }
                b'{' => {
                    depth += 1;
                    self.advance();
                }
                b'}' => {
                    depth -= 1;
                    self.advance();
                }
                b'?' => self.scan_question()?,
                _ => self.advance(),
            }
        }

        Ok(Span {
            kind: SpanKind::Escape,
            start,
            end: self.pos,
        })
    }

    /// A bare `?` is a parameter placeholder. `??` (escaped `?`), `?|`,
    /// and `?&` are JSON operators, accepted only when the server is new
    /// enough to understand them.
    fn scan_question(&mut self) -> Result<()> {
        let at = self.pos;
        let operator = match self.peek_char() {
            Some(b'?') => Some("??"),
            Some(b'|') => Some("?|"),
            Some(b'&') => Some("?&"),
            _ => None,
        };

        match operator {
            Some(op) => {
                if !self.accept_json_operators {
                    return Err(DriverError::lexical(
                        format!("operator '{}' requires server version 9.4", op),
                        at,
                    )
                    .into());
                }
                self.advance();
                self.advance();
            }
            None => {
                self.placeholders.push(at);
                self.advance();
            }
        }
        Ok(())
    }
}
