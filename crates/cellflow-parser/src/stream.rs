//! Token stream wrapper for the hand-written parser.

use std::ops::Range;

use cellflow_ast::Span;
use cellflow_lexer::Token;

use crate::error::ParseError;

/// Token stream with lookahead and span tracking.
///
/// Each token is paired with its byte range into the cell source, so error
/// messages and statement spans point at real offsets.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream.
    pub fn new(tokens: &'src [(Token, Range<usize>)]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance past the current token and return it.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Whether the current token matches the expected token's discriminant.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches; report whether it did.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance past it.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(ParseError::expected_token(
                &expected,
                self.peek(),
                self.current_span(),
            ))
        }
    }

    /// Skip any run of newline/semicolon separators.
    ///
    /// Used inside bracketed contexts and blocks, where line breaks are not
    /// significant.
    pub fn skip_separators(&mut self) {
        while matches!(self.peek(), Some(Token::Newline) | Some(Token::Semi)) {
            self.advance();
        }
    }

    /// Skip newlines only (inside parentheses/brackets).
    pub fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline)) {
            self.advance();
        }
    }

    /// Rewind to an earlier stream position (from [`Self::current_pos`]).
    pub fn rewind(&mut self, pos: usize) {
        debug_assert!(pos <= self.pos);
        self.pos = pos;
    }

    /// Whether the stream is exhausted.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Span covering tokens from `start` (a stream position) to the last
    /// consumed token.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = self
            .tokens
            .get(start)
            .map(|(_, r)| r.start)
            .unwrap_or_else(|| self.tokens.last().map(|(_, r)| r.end).unwrap_or(0));
        let end_byte = if self.pos > 0 {
            self.tokens
                .get(self.pos - 1)
                .map(|(_, r)| r.end)
                .unwrap_or(start_byte)
        } else {
            start_byte
        };
        Span::new(start_byte as u32, end_byte as u32)
    }

    /// Span of the current token (or a zero-width span at EOF).
    pub fn current_span(&self) -> Span {
        if let Some((_, r)) = self.tokens.get(self.pos) {
            Span::new(r.start as u32, r.end as u32)
        } else if let Some((_, r)) = self.tokens.last() {
            Span::new(r.end as u32, r.end as u32)
        } else {
            Span::new(0, 0)
        }
    }
}
