//! Token stream cursor
//!
//! The grammar is almost LL(1); the single extra token of lookahead
//! (`peek_next`) disambiguates `$r := ...` from a statement boundary.

use crate::ast::Span;
use crate::lexer::{SpannedToken, Token};

use super::error::{ParseError, ParseResult};

pub struct TokenCursor {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl TokenCursor {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// The current token, without consuming it.
    pub fn peek(&self) -> &Token {
        self.token_at(self.pos)
    }

    /// The token after the current one.
    pub fn peek_next(&self) -> &Token {
        self.token_at(self.pos + 1)
    }

    fn token_at(&self, pos: usize) -> &Token {
        self.tokens.get(pos).map(|t| &t.token).unwrap_or(&Token::Eof)
    }

    /// The span of the current token.
    pub fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.clone())
            .unwrap_or_default()
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// Consume the current token and hand it back.
    pub fn advance(&mut self) -> &SpannedToken {
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[self.pos - 1]
    }

    /// Consume the current token if it equals `token`.
    pub fn match_token(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the expected token or fail.
    pub fn consume(&mut self, expected: Token) -> ParseResult<&SpannedToken> {
        if self.peek() == &expected {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("{:?}", expected)))
        }
    }

    /// An error describing what was expected at the current position.
    pub fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::unexpected(expected, self.peek().clone(), self.span())
    }
}
