//! Lexical analyzer (tokenizer) for the Jack language, plus the token
//! cursor the compilation engine drives.
//!
//! The scanner works directly on the character stream: comments are skipped
//! in place and string constants are read inline (consume `"`, scan to the
//! closing `"`), so no pre-processing pass over the source is required.

use crate::error::CompileError;
use crate::token::{Keyword, Span, SpannedToken, Token, is_symbol};

/// Jack language tokenizer.
pub struct JackTokenizer<'a> {
    #[allow(dead_code)]
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
    byte_offset: usize,
    line: usize,
    column: usize,
}

impl<'a> JackTokenizer<'a> {
    /// Create a new tokenizer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
            byte_offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenize the input.
    ///
    /// Returns the full token list, or the first lexical error encountered.
    /// Input that contains no tokens at all is an error.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>, CompileError> {
        let mut tokens = Vec::new();

        while !self.is_at_end() {
            self.skip_whitespace_and_comments()?;
            if self.is_at_end() {
                break;
            }
            tokens.push(self.next_token()?);
        }

        if tokens.is_empty() {
            return Err(CompileError::lexical(
                Span::new(0, 0, 1, 1),
                "input contains no tokens",
            ));
        }

        Ok(tokens)
    }

    /// Check if we've reached the end of input.
    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Peek at the current character.
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Peek at the next character.
    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    /// Advance to the next character, updating byte offset incrementally.
    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        self.byte_offset += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn span_here(&self) -> Span {
        Span::new(self.byte_offset, self.byte_offset, self.line, self.column)
    }

    /// Skip whitespace and `//`, `/* */`, `/** */` comments.
    ///
    /// Block comments nest. Hitting end of input inside a block comment is
    /// a lexical error.
    fn skip_whitespace_and_comments(&mut self) -> Result<(), CompileError> {
        loop {
            while let Some(c) = self.peek() {
                if c.is_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }

            if self.peek() == Some('/') {
                if self.peek_next() == Some('/') {
                    self.advance(); // /
                    self.advance(); // /
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                    continue;
                } else if self.peek_next() == Some('*') {
                    let open_span = self.span_here();
                    self.advance(); // /
                    self.advance(); // *
                    let mut depth = 1;
                    while depth > 0 && !self.is_at_end() {
                        if self.peek() == Some('*') && self.peek_next() == Some('/') {
                            self.advance();
                            self.advance();
                            depth -= 1;
                        } else if self.peek() == Some('/') && self.peek_next() == Some('*') {
                            self.advance();
                            self.advance();
                            depth += 1;
                        } else {
                            self.advance();
                        }
                    }
                    if depth > 0 {
                        return Err(CompileError::lexical(
                            open_span,
                            "unterminated block comment",
                        ));
                    }
                    continue;
                }
            }

            return Ok(());
        }
    }

    /// Scan the next token.
    fn next_token(&mut self) -> Result<SpannedToken, CompileError> {
        let start_pos = self.byte_offset;
        let start_line = self.line;
        let start_column = self.column;

        let c = self.peek().ok_or_else(|| {
            CompileError::lexical(self.span_here(), "unexpected end of input")
        })?;

        // Symbol
        if is_symbol(c) {
            self.advance();
            let span = Span::new(start_pos, self.byte_offset, start_line, start_column);
            return Ok(SpannedToken::new(Token::Symbol(c), span));
        }

        // Integer constant
        if c.is_ascii_digit() {
            return self.read_integer(start_pos, start_line, start_column);
        }

        // String constant
        if c == '"' {
            return self.read_string(start_pos, start_line, start_column);
        }

        // Keyword or identifier
        if c.is_alphabetic() || c == '_' {
            return Ok(self.read_identifier(start_pos, start_line, start_column));
        }

        self.advance();
        let span = Span::new(start_pos, self.byte_offset, start_line, start_column);
        Err(CompileError::lexical(
            span,
            format!("unexpected character '{}'", c),
        ))
    }

    /// Read an integer constant in [0, 32767].
    ///
    /// A lexeme that starts with a digit must be a pure integer: a trailing
    /// identifier character (`123abc`) is rejected rather than split.
    fn read_integer(
        &mut self,
        start_pos: usize,
        start_line: usize,
        start_column: usize,
    ) -> Result<SpannedToken, CompileError> {
        let mut value: u32 = 0;
        let mut overflow = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
                let digit = c.to_digit(10).unwrap();
                value = value.saturating_mul(10).saturating_add(digit);
                if value > 32767 {
                    overflow = true;
                }
            } else {
                break;
            }
        }

        if let Some(c) = self.peek()
            && (c.is_alphanumeric() || c == '_')
        {
            let span = Span::new(start_pos, self.byte_offset, start_line, start_column);
            return Err(CompileError::lexical(
                span,
                format!("invalid integer literal: unexpected '{}' after digits", c),
            ));
        }

        let span = Span::new(start_pos, self.byte_offset, start_line, start_column);

        if overflow {
            return Err(CompileError::lexical(
                span,
                format!("integer constant {} exceeds maximum value 32767", value),
            ));
        }

        Ok(SpannedToken::new(Token::IntegerConstant(value as u16), span))
    }

    /// Read a string constant.
    ///
    /// Jack strings contain no escapes and may not span lines.
    fn read_string(
        &mut self,
        start_pos: usize,
        start_line: usize,
        start_column: usize,
    ) -> Result<SpannedToken, CompileError> {
        self.advance(); // Opening quote

        let mut value = String::new();

        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\n') | None => {
                    let span = Span::new(start_pos, self.byte_offset, start_line, start_column);
                    return Err(CompileError::lexical(span, "unterminated string constant"));
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }

        let span = Span::new(start_pos, self.byte_offset, start_line, start_column);
        Ok(SpannedToken::new(Token::StringConstant(value), span))
    }

    /// Read a keyword or identifier.
    fn read_identifier(
        &mut self,
        start_pos: usize,
        start_line: usize,
        start_column: usize,
    ) -> SpannedToken {
        let mut value = String::new();

        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let span = Span::new(start_pos, self.byte_offset, start_line, start_column);

        let token = if let Some(keyword) = Keyword::parse_keyword(&value) {
            Token::Keyword(keyword)
        } else {
            Token::Identifier(value)
        };

        SpannedToken::new(token, span)
    }
}

/// Forward-only cursor over a finished token list.
///
/// The cursor starts before the first token; [`TokenStream::advance`]
/// consumes and returns the next token, and exactly one token of lookahead
/// is available beyond [`TokenStream::peek`]. Advancing past the end is an
/// error, not a panic.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl TokenStream {
    pub fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Tokenize `source` and wrap the result in a stream.
    pub fn from_source(source: &str) -> Result<Self, CompileError> {
        Ok(Self::new(JackTokenizer::new(source).tokenize()?))
    }

    /// The next unconsumed token, without moving the cursor.
    pub fn peek(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    /// One token past [`TokenStream::peek`], without moving the cursor.
    pub fn lookahead(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos + 1)
    }

    /// Consume and return the next token.
    pub fn advance(&mut self) -> Result<SpannedToken, CompileError> {
        match self.tokens.get(self.pos) {
            Some(token) => {
                self.pos += 1;
                Ok(token.clone())
            }
            None => Err(CompileError::syntax(
                self.eof_span(),
                format!("unexpected end of input after token {}", self.pos),
            )),
        }
    }

    /// Stable index of the cursor, for error messages.
    pub fn index(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Span to report errors against when no token remains.
    pub fn eof_span(&self) -> Span {
        self.tokens
            .last()
            .map(|t| t.span.clone())
            .unwrap_or_else(|| Span::new(0, 0, 1, 1))
    }

    /// All tokens, for diagnostic output.
    pub fn tokens(&self) -> &[SpannedToken] {
        &self.tokens
    }
}
