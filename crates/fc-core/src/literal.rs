//! Safe literal parser for variation values.
//!
//! Variation tables hold their values as free text (`"[0.5, 0.6]"`, `"10"`,
//! `"1, 2, 3"`). The parser accepts plain data literals only:
//!
//! - integers and floats (`-3`, `2.5e-3`, `.5`, `1_000`)
//! - quoted strings (`'a'`, `"b"`, with backslash escapes)
//! - `True`, `False`, `None`
//! - lists `[...]` and tuples `(...)`, nested to any depth
//! - a bare comma sequence at the top level (`1, 2, 3`), read as a tuple
//!
//! Tuples become lists. Nothing is ever evaluated.

use thiserror::Error;

use crate::Value;

/// Malformed literal text.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid literal `{input}` at position {position}: {message}")]
pub struct ParseError {
    pub input: String,
    pub position: usize,
    pub message: String,
}

/// Parse a literal string into a [`Value`].
pub fn parse_literal(input: &str) -> Result<Value, ParseError> {
    let mut parser = Parser {
        input,
        chars: input.char_indices().collect(),
        pos: 0,
    };
    parser.skip_ws();
    if parser.at_end() {
        return Err(parser.error("empty literal"));
    }
    let value = parser.parse_sequence(None)?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> ParseError {
        let position = self
            .chars
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.input.len());
        ParseError {
            input: self.input.to_string(),
            position,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Comma separated items up to `close` (or end of input when `None`).
    ///
    /// Returns a single item unchanged unless a comma was seen, which makes
    /// the sequence a tuple. Brackets always produce a list.
    fn parse_sequence(&mut self, close: Option<char>) -> Result<Value, ParseError> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == close || (close.is_none() && self.at_end()) {
                break;
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.bump();
                    saw_comma = true;
                }
                c if c == close => break,
                None if close.is_none() => break,
                None => return Err(self.error("unterminated sequence")),
                Some(c) => return Err(self.error(format!("expected ',' but found '{}'", c))),
            }
        }

        let is_list = close == Some(']');
        if is_list || saw_comma {
            return Ok(Value::List(items));
        }
        match items.pop() {
            Some(single) => Ok(single),
            // `()` is an empty tuple
            None if close == Some(')') => Ok(Value::List(Vec::new())),
            None => Err(self.error("empty literal")),
        }
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('[') => {
                self.bump();
                let list = self.parse_sequence(Some(']'))?;
                self.expect(']')?;
                Ok(list)
            }
            Some('(') => {
                self.bump();
                let inner = self.parse_sequence(Some(')'))?;
                self.expect(')')?;
                Ok(inner)
            }
            Some('\'') | Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.') => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_keyword(),
            Some('{') => Err(self.error("mappings are not supported in variation values")),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            _ => Err(self.error(format!("expected '{}'", want))),
        }
    }

    fn parse_keyword(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().map(|(_, c)| *c).collect();
        match word.as_str() {
            "True" => Ok(Value::Bool(true)),
            "False" => Ok(Value::Bool(false)),
            "None" => Ok(Value::Null),
            _ => {
                self.pos = start;
                Err(self.error(format!("unknown name '{}'", word)))
            }
        }
    }

    fn parse_string(&mut self) -> Result<Value, ParseError> {
        let quote = self.bump().unwrap_or('\'');
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => break,
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        Some(c) => return Err(self.error(format!("unknown escape '\\{}'", c))),
                        None => return Err(self.error("unterminated string")),
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
        Ok(Value::Text(out))
    }

    fn parse_number(&mut self) -> Result<Value, ParseError> {
        let start = self.pos;
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            self.bump();
            text.push(sign);
            self.skip_ws();
        }

        let mut is_float = false;
        let mut digits = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {
                    digits += 1;
                    text.push(c);
                }
                '_' if digits > 0 => {}
                '.' if !is_float => {
                    is_float = true;
                    text.push(c);
                }
                'e' | 'E' if digits > 0 => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if let Some(sign @ ('-' | '+')) = self.peek() {
                        text.push(sign);
                        self.bump();
                    }
                    if !matches!(self.peek(), Some('0'..='9')) {
                        return Err(self.error("malformed exponent"));
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        if digits == 0 {
            self.pos = start;
            return Err(self.error("expected a number"));
        }
        if matches!(self.peek(), Some(c) if c.is_alphabetic()) {
            return Err(self.error("invalid character in number"));
        }

        if is_float {
            text.parse::<f64>()
                .map(Value::Float)
                .map_err(|e| self.error(format!("invalid float: {}", e)))
        } else {
            text.parse::<i64>()
                .map(Value::Int)
                .map_err(|e| self.error(format!("invalid integer: {}", e)))
        }
    }
}
