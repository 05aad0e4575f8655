//! Reader: recursive-descent parser over the token stream.
//!
//! Produces one top-level value at a time. `(...)` builds Pair lists,
//! `[...]` builds InertPair lists, `.` introduces a dotted tail, and `'x`
//! expands to `(quote x)`. Comment runs recorded by the lexer attach to the
//! top-level form they precede (or trail on the same line) as an
//! [`Annotated`](crate::language::Value::Annotated) wrapper.

use std::sync::Arc;

use crate::error::{Error, ReaderErrorKind};
use crate::language::{cons, inert_cons, AnnotatedCell, Value};
use crate::lexer::{Lexer, Token};
use crate::symbol::Symbol;

pub struct Parser {
    lexer: Lexer,
    current_token: Token,
    prev_token_end_line: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, Error> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
            prev_token_end_line: 1,
        })
    }

    fn advance(&mut self) -> Result<(), Error> {
        self.prev_token_end_line = self.lexer.last_token_end_line;
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    fn err_here(&self, kind: ReaderErrorKind) -> Error {
        Error::reader(kind, self.lexer.token_line, self.lexer.token_col)
    }

    /// Read the next top-level form, with documentation attached. Returns
    /// `None` at end of input.
    pub fn next_form(&mut self) -> Result<Option<Value>, Error> {
        if self.current_token == Token::Eof {
            return Ok(None);
        }

        let start_line = self.lexer.token_line;
        let form = self.parse_expression()?;
        let end_line = self.prev_token_end_line;

        let trailing = self.lexer.trailing_comment(end_line);
        let leading = self.lexer.leading_block(start_line);
        let comment = match (leading, trailing) {
            (Some(lead), Some(trail)) => Some(format!("{lead}\n\n{trail}")),
            (Some(lead), None) => Some(lead),
            (None, Some(trail)) => Some(trail),
            (None, None) => None,
        };

        Ok(Some(match comment {
            Some(comment) => Value::Annotated(Arc::new(AnnotatedCell { comment, form })),
            None => form,
        }))
    }

    pub fn parse_expression(&mut self) -> Result<Value, Error> {
        match self.current_token.clone() {
            Token::Int(n) => {
                self.advance()?;
                Ok(Value::Int(n))
            }
            Token::Str(s) => {
                self.advance()?;
                Ok(Value::String(s))
            }
            Token::Keyword(sym) => {
                self.advance()?;
                Ok(Value::Keyword(sym))
            }
            Token::Symbol(name) => {
                let value = match name.as_str() {
                    "null" => Value::Null,
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "_" => Value::Ignore,
                    _ => Value::Symbol(Symbol::new(&name)),
                };
                self.advance()?;
                Ok(value)
            }
            Token::Quote => {
                self.advance()?;
                let quoted = self.parse_expression()?;
                Ok(cons(
                    Value::symbol("quote"),
                    cons(quoted, Value::Empty),
                ))
            }
            Token::LParen => self.parse_chain(Token::RParen, false),
            Token::LBracket => self.parse_chain(Token::RBracket, true),
            Token::RParen | Token::RBracket | Token::Dot => {
                Err(self.err_here(ReaderErrorKind::UnbalancedDelimiter))
            }
            Token::Eof => Err(self.err_here(ReaderErrorKind::UnexpectedEof)),
        }
    }

    /// Parse a `(...)` or `[...]` chain, including dotted tails.
    fn parse_chain(&mut self, close: Token, inert: bool) -> Result<Value, Error> {
        self.advance()?; // consume the opening delimiter
        let mut elements = Vec::new();
        let mut tail = Value::Empty;

        loop {
            if self.current_token == close {
                self.advance()?;
                break;
            }
            match self.current_token {
                Token::Eof => return Err(self.err_here(ReaderErrorKind::UnexpectedEof)),
                Token::Dot => {
                    if elements.is_empty() {
                        return Err(self.err_here(ReaderErrorKind::UnbalancedDelimiter));
                    }
                    self.advance()?;
                    tail = self.parse_expression()?;
                    if self.current_token != close {
                        return Err(self.err_here(ReaderErrorKind::UnbalancedDelimiter));
                    }
                    self.advance()?;
                    break;
                }
                _ => elements.push(self.parse_expression()?),
            }
        }

        let join = if inert { inert_cons } else { cons };
        Ok(elements.into_iter().rev().fold(tail, |tail, head| join(head, tail)))
    }
}

/// Parse a single expression (documentation comments ignored).
pub fn parse(input: &str) -> Result<Value, Error> {
    Parser::new(input)?.parse_expression()
}

/// Parse every top-level form, with documentation attached.
pub fn parse_all(input: &str) -> Result<Vec<Value>, Error> {
    let mut parser = Parser::new(input)?;
    let mut forms = Vec::new();
    while let Some(form) = parser.next_form()? {
        forms.push(form);
    }
    Ok(forms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{inert_list_from, list_from};

    #[test]
    fn atoms() {
        assert_eq!(parse("null").unwrap(), Value::Null);
        assert_eq!(parse("true").unwrap(), Value::Bool(true));
        assert_eq!(parse("false").unwrap(), Value::Bool(false));
        assert_eq!(parse("_").unwrap(), Value::Ignore);
        assert_eq!(parse("42").unwrap(), Value::Int(42));
        assert_eq!(parse("hello").unwrap(), Value::symbol("hello"));
        assert_eq!(parse(":key").unwrap(), Value::keyword("key"));
        assert_eq!(parse("\"hi\"").unwrap(), Value::string("hi"));
    }

    #[test]
    fn lists_and_inert_lists() {
        assert_eq!(parse("()").unwrap(), Value::Empty);
        assert_eq!(parse("[]").unwrap(), Value::Empty);
        assert_eq!(
            parse("(1 2 3)").unwrap(),
            list_from(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
        assert_eq!(
            parse("[1 2]").unwrap(),
            inert_list_from(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn dotted_pairs() {
        assert_eq!(
            parse("(1 . 2)").unwrap(),
            cons(Value::Int(1), Value::Int(2))
        );
        assert_eq!(
            parse("[a . b]").unwrap(),
            inert_cons(Value::symbol("a"), Value::symbol("b"))
        );
        assert_eq!(
            parse("(1 2 . 3)").unwrap(),
            cons(Value::Int(1), cons(Value::Int(2), Value::Int(3)))
        );
    }

    #[test]
    fn quote_expands() {
        assert_eq!(
            parse("'x").unwrap(),
            list_from(vec![Value::symbol("quote"), Value::symbol("x")])
        );
    }

    #[test]
    fn nested_mixed_literals() {
        assert_eq!(
            parse("(def (a . bs) [1 [2 3]])").unwrap(),
            list_from(vec![
                Value::symbol("def"),
                cons(Value::symbol("a"), Value::symbol("bs")),
                inert_list_from(vec![
                    Value::Int(1),
                    inert_list_from(vec![Value::Int(2), Value::Int(3)]),
                ]),
            ])
        );
    }

    #[test]
    fn delimiter_errors() {
        assert!(matches!(
            parse(")").unwrap_err(),
            Error::Reader {
                kind: ReaderErrorKind::UnbalancedDelimiter,
                ..
            }
        ));
        assert!(matches!(
            parse("(1 . 2 3)").unwrap_err(),
            Error::Reader {
                kind: ReaderErrorKind::UnbalancedDelimiter,
                ..
            }
        ));
        assert!(matches!(
            parse("(1 2").unwrap_err(),
            Error::Reader {
                kind: ReaderErrorKind::UnexpectedEof,
                ..
            }
        ));
    }

    #[test]
    fn leading_comment_annotates_the_form() {
        let forms = parse_all("; adds one\n(def inc 1)").unwrap();
        assert_eq!(forms.len(), 1);
        match &forms[0] {
            Value::Annotated(cell) => {
                assert_eq!(cell.comment, "adds one");
                assert_eq!(
                    cell.form,
                    list_from(vec![
                        Value::symbol("def"),
                        Value::symbol("inc"),
                        Value::Int(1),
                    ])
                );
            }
            other => panic!("expected annotated form, got {other}"),
        }
    }

    #[test]
    fn trailing_comment_annotates_the_form() {
        let forms = parse_all("(def x 1) ; docs for x\n(def y 2)").unwrap();
        assert_eq!(forms.len(), 2);
        assert!(matches!(&forms[0], Value::Annotated(cell) if cell.comment == "docs for x"));
        assert!(!matches!(&forms[1], Value::Annotated(_)));
    }

    #[test]
    fn blank_line_detaches_comments() {
        let forms = parse_all("; floating\n\n(def x 1)").unwrap();
        assert_eq!(forms.len(), 1);
        assert!(!matches!(&forms[0], Value::Annotated(_)));
    }

    #[test]
    fn comment_paragraphs_join() {
        let forms = parse_all("; one\n; two\n;\n; three\n_").unwrap();
        match &forms[0] {
            Value::Annotated(cell) => {
                assert_eq!(cell.comment, "one two\n\nthree");
                assert_eq!(cell.form, Value::Ignore);
            }
            other => panic!("expected annotated form, got {other}"),
        }
    }
}
