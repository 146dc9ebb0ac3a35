//! Byte-scanning lexer producing a parallel-array token stream

use crate::intern::{InternPool, Istr};
use crate::token::{TokenIdx, TokenKind};
use rill_alloc::HeapAlloc;
use rill_common::{Diagnostics, RillError, RillResult, SourceBuffer, Span};

/// The lexer's output: four parallel sequences of equal length plus the
/// intern pool and a borrow of the source.
///
/// Invariants: payload offset 0 never refers to a real string, source offsets
/// are nondecreasing, and the final token is always [`TokenKind::Eof`].
pub struct TokenStream<'a> {
    source: &'a SourceBuffer,
    kinds: Vec<TokenKind>,
    payloads: Vec<Istr>,
    offsets: Vec<u32>,
    pool: InternPool<'a>,
}

impl<'a> TokenStream<'a> {
    pub fn source(&self) -> &'a SourceBuffer {
        self.source
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, index: TokenIdx) -> TokenKind {
        self.kinds[index as usize]
    }

    pub fn payload(&self, index: TokenIdx) -> Istr {
        self.payloads[index as usize]
    }

    pub fn offset(&self, index: TokenIdx) -> u32 {
        self.offsets[index as usize]
    }

    pub fn pool(&self) -> &InternPool<'a> {
        &self.pool
    }

    /// The pool is append-only, so handing out interning access after the
    /// lex is safe; later stages use it to intern well-known names.
    pub fn pool_mut(&mut self) -> &mut InternPool<'a> {
        &mut self.pool
    }

    /// The token's text: interned payload for literals and identifiers,
    /// fixed representation otherwise.
    pub fn text(&self, index: TokenIdx) -> &str {
        let kind = self.kind(index);
        if kind.has_payload() {
            self.pool.get(self.payload(index))
        } else {
            kind.repr()
        }
    }

    /// Byte span of the token in the source buffer.
    pub fn span(&self, index: TokenIdx) -> Span {
        let start = self.offset(index);
        let kind = self.kind(index);
        let len = if kind.has_payload() {
            let payload_len = self.pool.get(self.payload(index)).len() as u32;
            // String payloads exclude the surrounding quotes.
            if kind == TokenKind::Str {
                payload_len + 2
            } else {
                payload_len
            }
        } else if kind == TokenKind::Eof {
            1
        } else {
            kind.repr().len() as u32
        };
        Span::new(start, start + len.max(1))
    }

    /// Byte span covering the token range `[first, last]`.
    pub fn span_of_range(&self, first: TokenIdx, last: TokenIdx) -> Span {
        self.span(first).combine(self.span(last.max(first)))
    }
}

/// Width in bytes of the UTF-8 sequence introduced by `byte`, for error
/// highlighting only; the lexer does not otherwise validate UTF-8.
fn multi_byte_count(byte: u8) -> usize {
    match byte {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    }
}

fn is_identifier_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_identifier_continue(byte: u8) -> bool {
    is_identifier_start(byte) || byte.is_ascii_digit()
}

struct Lexer<'a> {
    source: &'a SourceBuffer,
    bytes: &'a [u8],
    pos: usize,
    kinds: Vec<TokenKind>,
    payloads: Vec<Istr>,
    offsets: Vec<u32>,
    pool: InternPool<'a>,
    diagnostics: Diagnostics,
}

/// Scan `source` into a token stream, interning every literal and identifier
/// payload. On the first lexical error a diagnostic is emitted and the whole
/// stream is discarded.
pub fn lex<'a>(source: &'a SourceBuffer, heap: &'a HeapAlloc) -> RillResult<TokenStream<'a>> {
    let mut lexer = Lexer {
        source,
        bytes: source.bytes(),
        pos: 0,
        kinds: Vec::new(),
        payloads: Vec::new(),
        offsets: Vec::new(),
        pool: InternPool::new(heap),
        diagnostics: Diagnostics::new(),
    };
    match lexer.run() {
        Ok(()) => {
            log::debug!(
                target: "lexer",
                "lexed {} tokens, {} interned strings",
                lexer.kinds.len(),
                lexer.pool.entry_count()
            );
            Ok(TokenStream {
                source,
                kinds: lexer.kinds,
                payloads: lexer.payloads,
                offsets: lexer.offsets,
                pool: lexer.pool,
            })
        }
        Err(error) => {
            lexer.diagnostics.emit(source, "lexer");
            Err(error)
        }
    }
}

impl<'a> Lexer<'a> {
    fn run(&mut self) -> RillResult<()> {
        loop {
            let Some(&byte) = self.bytes.get(self.pos) else {
                self.push(TokenKind::Eof, self.bytes.len());
                return Ok(());
            };
            let start = self.pos;
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.pos += 1,
                b'+' => self.single(TokenKind::Plus),
                b'-' => self.single(TokenKind::Minus),
                b'*' => self.single(TokenKind::Star),
                b'%' => self.single(TokenKind::Percent),
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b',' => self.single(TokenKind::Comma),
                b'.' => self.single(TokenKind::Dot),
                b'/' => match self.peek(1) {
                    Some(b'/') => self.skip_line_comment(),
                    Some(b'*') => self.skip_block_comment()?,
                    _ => self.single(TokenKind::Slash),
                },
                b'>' => self.one_or_two(TokenKind::Gt, b'=', TokenKind::Ge),
                b'<' => self.one_or_two(TokenKind::Lt, b'=', TokenKind::Le),
                b'=' => self.one_or_two(TokenKind::Assign, b'=', TokenKind::EqEq),
                b'!' => self.one_or_two(TokenKind::Bang, b'=', TokenKind::BangEq),
                b':' => self.one_or_two(TokenKind::Colon, b'=', TokenKind::ColonAssign),
                b'"' => self.scan_string()?,
                b'0'..=b'9' => self.scan_number(),
                byte if is_identifier_start(byte) => self.scan_identifier_or_keyword(),
                byte => {
                    let width = multi_byte_count(byte);
                    let span = Span::new(start as u32, (start + width) as u32);
                    let shown = String::from_utf8_lossy(
                        &self.bytes[start..(start + width).min(self.bytes.len())],
                    )
                    .into_owned();
                    self.diagnostics.error(format!("Unknown character: '{shown}'"), span);
                    return Err(RillError::lex_error(format!("unknown character '{shown}'")));
                }
            }
        }
    }

    fn peek(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn push(&mut self, kind: TokenKind, offset: usize) {
        self.kinds.push(kind);
        self.payloads.push(Istr::ABSENT);
        self.offsets.push(offset as u32);
    }

    fn push_with_payload(&mut self, kind: TokenKind, offset: usize, text: &str) {
        let istr = self.pool.intern(text);
        self.kinds.push(kind);
        self.payloads.push(istr);
        self.offsets.push(offset as u32);
    }

    fn single(&mut self, kind: TokenKind) {
        self.push(kind, self.pos);
        self.pos += 1;
    }

    fn one_or_two(&mut self, single: TokenKind, second: u8, double: TokenKind) {
        if self.peek(1) == Some(second) {
            self.push(double, self.pos);
            self.pos += 2;
        } else {
            self.push(single, self.pos);
            self.pos += 1;
        }
    }

    fn skip_line_comment(&mut self) {
        match memchr::memchr(b'\n', &self.bytes[self.pos..]) {
            Some(newline) => self.pos += newline + 1,
            None => self.pos = self.bytes.len(),
        }
    }

    /// Block comments nest; an unbalanced comment is reported at the
    /// outermost opener.
    fn skip_block_comment(&mut self) -> RillResult<()> {
        let outermost = self.pos;
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 {
            match (self.peek(0), self.peek(1)) {
                (Some(b'/'), Some(b'*')) => {
                    depth += 1;
                    self.pos += 2;
                }
                (Some(b'*'), Some(b'/')) => {
                    depth -= 1;
                    self.pos += 2;
                }
                (Some(_), _) => self.pos += 1,
                (None, _) => {
                    let span = Span::new(outermost as u32, outermost as u32 + 2);
                    self.diagnostics.error("Unterminated block comment", span);
                    return Err(RillError::lex_error("unterminated block comment"));
                }
            }
        }
        Ok(())
    }

    /// Strings keep their escape sequences verbatim; only `\"` affects
    /// scanning. The payload excludes the surrounding quotes.
    fn scan_string(&mut self) -> RillResult<()> {
        let opener = self.pos;
        let mut cursor = self.pos + 1;
        loop {
            match self.bytes.get(cursor) {
                Some(b'"') => break,
                Some(b'\\') => cursor += 2,
                Some(_) => cursor += 1,
                None => {
                    let span = Span::new(opener as u32, opener as u32 + 1);
                    self.diagnostics.error("Unterminated string literal", span);
                    return Err(RillError::lex_error("unterminated string literal"));
                }
            }
        }
        let text = std::str::from_utf8(&self.bytes[opener + 1..cursor])
            .map_err(|_| RillError::lex_error("string literal is not valid UTF-8"))?
            .to_owned();
        self.push_with_payload(TokenKind::Str, opener, &text);
        self.pos = cursor + 1;
        Ok(())
    }

    /// Integer: one or more digits. Real: digits, `.`, digits. A dot not
    /// followed by a digit is left for the next token.
    fn scan_number(&mut self) {
        let start = self.pos;
        while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
        }
        let mut kind = TokenKind::Int;
        if self.peek(0) == Some(b'.') && self.peek(1).is_some_and(|b| b.is_ascii_digit()) {
            self.pos += 1;
            while self.peek(0).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
            kind = TokenKind::Real;
        }
        let text =
            std::str::from_utf8(&self.bytes[start..self.pos]).expect("digits are ASCII").to_owned();
        self.push_with_payload(kind, start, &text);
    }

    fn scan_identifier_or_keyword(&mut self) {
        let start = self.pos;
        while self.peek(0).is_some_and(is_identifier_continue) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos])
            .expect("identifier bytes are ASCII")
            .to_owned();
        match TokenKind::from_keyword(&text) {
            Some(keyword) => self.push(keyword, start),
            None => self.push_with_payload(TokenKind::Ident, start, &text),
        }
    }
}
