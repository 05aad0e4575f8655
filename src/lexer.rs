//! Tokenizer.
//!
//! Produces the token stream for the reader, tracking line and column for
//! error positions. Comments are not discarded: each `;` line is recorded
//! with its line number so the parser can attach documentation runs to the
//! forms they precede (or trail).

use crate::error::{Error, ReaderErrorKind};
use crate::symbol::Symbol;

// ============================================================================
// Tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LParen,
    RParen,
    LBracket,
    RBracket,
    Quote,
    Dot,
    Symbol(String),
    Keyword(Symbol),
    Int(i64),
    Str(String),
    Eof,
}

// ============================================================================
// Lexer
// ============================================================================

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    col: usize,
    /// Comment lines seen so far, as (line, text). The parser drains these
    /// when deciding what documentation attaches to a form.
    comments: Vec<(usize, String)>,
    /// Line on which the most recently returned token ended.
    pub(crate) last_token_end_line: usize,
    /// Line and column on which the most recently returned token started.
    pub(crate) token_line: usize,
    pub(crate) token_col: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            col: 1,
            comments: Vec::new(),
            last_token_end_line: 1,
            token_line: 1,
            token_col: 1,
        }
    }

    fn current_char(&self) -> char {
        if self.position < self.input.len() {
            self.input[self.position]
        } else {
            '\0'
        }
    }

    fn advance(&mut self) {
        if self.position < self.input.len() {
            if self.input[self.position] == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.position += 1;
        }
    }

    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn err(&self, kind: ReaderErrorKind) -> Error {
        Error::reader(kind, self.line, self.col)
    }

    fn skip_whitespace(&mut self) {
        loop {
            while !self.is_eof() && self.current_char().is_whitespace() {
                self.advance();
            }
            if self.current_char() == ';' {
                self.record_comment();
            } else {
                break;
            }
        }
    }

    /// Consume a `;` comment to end of line, recording its text.
    fn record_comment(&mut self) {
        let line = self.line;
        while self.current_char() == ';' {
            self.advance();
        }
        let mut text = String::new();
        while !self.is_eof() && self.current_char() != '\n' {
            text.push(self.current_char());
            self.advance();
        }
        let text = text.strip_prefix(' ').unwrap_or(&text).to_string();
        self.comments.push((line, text));
    }

    // ========================================================================
    // Comment bookkeeping
    // ========================================================================

    /// A comment sitting on `line` itself trails the form that ends there.
    pub(crate) fn trailing_comment(&mut self, line: usize) -> Option<String> {
        let idx = self.comments.iter().position(|(l, _)| *l == line)?;
        Some(self.comments.remove(idx).1)
    }

    /// The contiguous run of comment lines ending directly above
    /// `form_line`. A gap in line numbers means a blank source line, which
    /// breaks the run; anything older than the form is stale and dropped.
    pub(crate) fn leading_block(&mut self, form_line: usize) -> Option<String> {
        let end = match self.comments.iter().rposition(|(l, _)| l + 1 == form_line) {
            Some(idx) => idx,
            None => {
                self.comments.retain(|(l, _)| *l >= form_line);
                return None;
            }
        };
        let mut start = end;
        while start > 0 && self.comments[start - 1].0 + 1 == self.comments[start].0 {
            start -= 1;
        }
        let block: Vec<String> = self.comments.drain(start..=end).map(|(_, t)| t).collect();
        self.comments.retain(|(l, _)| *l >= form_line);
        let text = format_paragraphs(&block);
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    // ========================================================================
    // Token scanners
    // ========================================================================

    fn is_symbol_char(c: char) -> bool {
        c.is_alphanumeric()
            || matches!(
                c,
                '-' | '_' | '+' | '*' | '/' | '!' | '?' | '<' | '>' | '=' | '&' | '%' | '^' | '~'
            )
    }

    fn read_string(&mut self) -> Result<Token, Error> {
        self.advance(); // consume opening quote
        let mut content = String::new();

        loop {
            if self.is_eof() {
                return Err(self.err(ReaderErrorKind::UnexpectedEof));
            }
            match self.current_char() {
                '"' => {
                    self.advance();
                    return Ok(Token::Str(content));
                }
                '\\' => {
                    self.advance();
                    content.push(self.read_escape()?);
                }
                c => {
                    content.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_escape(&mut self) -> Result<char, Error> {
        if self.is_eof() {
            return Err(self.err(ReaderErrorKind::UnexpectedEof));
        }
        let c = self.current_char();
        let escaped = match c {
            '"' => '"',
            '\\' => '\\',
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'v' => '\u{000B}',
            'a' => '\u{0007}',
            _ => return Err(self.err(ReaderErrorKind::BadEscape)),
        };
        self.advance();
        Ok(escaped)
    }

    fn read_keyword(&mut self) -> Result<Token, Error> {
        self.advance(); // consume ':'
        let mut name = String::new();
        while Self::is_symbol_char(self.current_char()) {
            name.push(self.current_char());
            self.advance();
        }
        if name.is_empty() {
            return Err(self.err(ReaderErrorKind::UnbalancedDelimiter));
        }
        Ok(Token::Keyword(Symbol::new(&name)))
    }

    /// Read a word and decide whether it is an integer or a symbol. Words
    /// that look numeric but are not valid i64 literals are errors rather
    /// than symbols.
    fn read_word(&mut self) -> Result<Token, Error> {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();
        while Self::is_symbol_char(self.current_char()) {
            text.push(self.current_char());
            self.advance();
        }

        let digits = text
            .strip_prefix(['+', '-'])
            .unwrap_or(&text);
        if !digits.is_empty() && digits.chars().next().unwrap().is_ascii_digit() {
            return text
                .parse::<i64>()
                .map(Token::Int)
                .map_err(|_| Error::reader(ReaderErrorKind::InvalidNumber, line, col));
        }
        Ok(Token::Symbol(text))
    }

    // ========================================================================
    // Main tokenization
    // ========================================================================

    pub fn next_token(&mut self) -> Result<Token, Error> {
        self.skip_whitespace();
        self.token_line = self.line;
        self.token_col = self.col;

        if self.is_eof() {
            self.last_token_end_line = self.line;
            return Ok(Token::Eof);
        }

        let token = match self.current_char() {
            '(' => {
                self.advance();
                Ok(Token::LParen)
            }
            ')' => {
                self.advance();
                Ok(Token::RParen)
            }
            '[' => {
                self.advance();
                Ok(Token::LBracket)
            }
            ']' => {
                self.advance();
                Ok(Token::RBracket)
            }
            '\'' => {
                self.advance();
                Ok(Token::Quote)
            }
            '.' => {
                self.advance();
                Ok(Token::Dot)
            }
            '"' => self.read_string(),
            ':' => self.read_keyword(),
            c if Self::is_symbol_char(c) => self.read_word(),
            _ => Err(self.err(ReaderErrorKind::UnbalancedDelimiter)),
        };

        self.last_token_end_line = self.line;
        token
    }
}

/// Join comment lines into paragraphs: an empty comment line separates
/// paragraphs, lines within a paragraph join with single spaces.
fn format_paragraphs(lines: &[String]) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in lines {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    paragraphs.join("\n\n")
}
