//! Recursive descent parser for trigger expressions.
//!
//! Grammar, whitespace allowed between tokens:
//!
//! ```text
//! expression := unary (binary-op unary)*
//! unary      := ('-' | 'not')* primary
//! primary    := '(' expression ')' | function-macro | number
//!             | user-macro | lld-macro | '{TRIGGER.VALUE}'
//! ```
//!
//! All delimiters are ASCII, so byte offsets at which the parser slices the
//! text always fall on character boundaries.

use crate::error::{ExpressionError, ExpressionResult};
use crate::expression::{FunctionMacro, ParseOptions};

/// Maximum parenthesis nesting.
pub(crate) const MAX_DEPTH: usize = 64;

const BUILTIN_MACROS: &[&str] = &["{TRIGGER.VALUE}"];

fn is_host_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'.' | b'_' | b' ' | b'-')
}

fn is_key_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'.' | b'_' | b'-')
}

fn is_macro_char(c: u8) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, b'.' | b'_')
}

fn is_suffix(c: u8) -> bool {
    matches!(c, b'K' | b'M' | b'G' | b'T' | b's' | b'm' | b'h' | b'd' | b'w')
}

pub(crate) struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    options: ParseOptions,
    macros: Vec<FunctionMacro>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(text: &'a str, options: ParseOptions) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
            options,
            macros: Vec::new(),
        }
    }

    /// Parses the whole text and returns its function macros in order.
    pub(crate) fn parse(mut self) -> ExpressionResult<Vec<FunctionMacro>> {
        self.skip_whitespace();
        if self.pos == self.bytes.len() {
            return Err(ExpressionError::Empty);
        }
        self.expression()?;
        self.skip_whitespace();
        if self.pos != self.bytes.len() {
            return Err(self.error_here());
        }
        if self.macros.is_empty() {
            return Err(ExpressionError::NoFunctionMacro);
        }
        Ok(self.macros)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error_here(&self) -> ExpressionError {
        ExpressionError::at(self.text, self.pos)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn expression(&mut self) -> ExpressionResult<()> {
        self.unary()?;
        loop {
            self.skip_whitespace();
            if !self.binary_operator() {
                return Ok(());
            }
            self.unary()?;
        }
    }

    fn unary(&mut self) -> ExpressionResult<()> {
        loop {
            self.skip_whitespace();
            if self.peek() == Some(b'-') {
                self.pos += 1;
            } else if !self.keyword("not") {
                break;
            }
        }
        self.primary()
    }

    fn primary(&mut self) -> ExpressionResult<()> {
        match self.peek() {
            Some(b'(') => {
                if self.depth == MAX_DEPTH {
                    return Err(ExpressionError::TooDeep { max: MAX_DEPTH });
                }
                self.depth += 1;
                self.pos += 1;
                self.expression()?;
                self.skip_whitespace();
                if self.peek() != Some(b')') {
                    return Err(self.error_here());
                }
                self.pos += 1;
                self.depth -= 1;
                Ok(())
            }
            Some(b'{') => self.macro_operand(),
            Some(c) if c.is_ascii_digit() => {
                self.number();
                Ok(())
            }
            _ => Err(self.error_here()),
        }
    }

    fn binary_operator(&mut self) -> bool {
        match self.peek() {
            Some(b'+' | b'-' | b'*' | b'/' | b'=' | b'#' | b'&' | b'|') => {
                self.pos += 1;
                true
            }
            Some(b'<') => {
                self.pos += 1;
                if matches!(self.peek(), Some(b'=' | b'>')) {
                    self.pos += 1;
                }
                true
            }
            Some(b'>') => {
                self.pos += 1;
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                }
                true
            }
            _ => self.keyword("and") || self.keyword("or"),
        }
    }

    /// Consumes `word` if it appears here as a whole word.
    fn keyword(&mut self, word: &str) -> bool {
        let end = self.pos + word.len();
        let matches = self.bytes.get(self.pos..end) == Some(word.as_bytes())
            && !self
                .bytes
                .get(end)
                .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_');
        if matches {
            self.pos = end;
        }
        matches
    }

    fn number(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if self.peek().is_some_and(is_suffix) {
            self.pos += 1;
        }
    }

    fn macro_operand(&mut self) -> ExpressionResult<()> {
        match self.peek_at(1) {
            Some(b'$') => self.user_macro(),
            Some(b'#') if self.options.allow_lld_macros => self.lld_macro(),
            Some(b'#') => Err(self.error_here()),
            _ => {
                let rest = &self.text[self.pos..];
                if let Some(builtin) = BUILTIN_MACROS.iter().find(|m| rest.starts_with(*m)) {
                    self.pos += builtin.len();
                    return Ok(());
                }
                self.function_macro()
            }
        }
    }

    /// `{$NAME}` or `{$NAME:context}`.
    fn user_macro(&mut self) -> ExpressionResult<()> {
        let start = self.pos;
        self.pos += 2;
        let name_start = self.pos;
        while self.peek().is_some_and(is_macro_char) {
            self.pos += 1;
        }
        if self.pos == name_start {
            return Err(ExpressionError::at(self.text, start));
        }
        if self.peek() == Some(b':') {
            while !matches!(self.peek(), Some(b'}') | None) {
                self.pos += 1;
            }
        }
        if self.peek() != Some(b'}') {
            return Err(ExpressionError::at(self.text, start));
        }
        self.pos += 1;
        Ok(())
    }

    /// `{#NAME}`.
    fn lld_macro(&mut self) -> ExpressionResult<()> {
        let start = self.pos;
        self.pos += 2;
        let name_start = self.pos;
        while self.peek().is_some_and(is_macro_char) {
            self.pos += 1;
        }
        if self.pos == name_start || self.peek() != Some(b'}') {
            return Err(ExpressionError::at(self.text, start));
        }
        self.pos += 1;
        Ok(())
    }

    /// `{host:key.function(parameters)}`.
    fn function_macro(&mut self) -> ExpressionResult<()> {
        let text = self.text;
        let start = self.pos;
        let fail = |_: ()| ExpressionError::at(text, start);

        self.pos += 1;
        let host_start = self.pos;
        while self.peek().is_some_and(is_host_char) {
            self.pos += 1;
        }
        let host_end = self.pos;
        if host_start == host_end || self.peek() != Some(b':') {
            return Err(fail(()));
        }
        self.pos += 1;

        let key_start = self.pos;
        while self.peek().is_some_and(is_key_char) {
            self.pos += 1;
        }
        let (key, function) = if self.peek() == Some(b'[') {
            if self.pos == key_start {
                return Err(fail(()));
            }
            self.key_parameters().map_err(fail)?;
            let key = &text[key_start..self.pos];
            if self.peek() != Some(b'.') {
                return Err(fail(()));
            }
            self.pos += 1;
            let function_start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_lowercase()) {
                self.pos += 1;
            }
            (key, &text[function_start..self.pos])
        } else {
            // Key names may contain dots, so the function is what follows
            // the last one.
            let scanned = &text[key_start..self.pos];
            let dot = scanned.rfind('.').ok_or(()).map_err(fail)?;
            (&scanned[..dot], &scanned[dot + 1..])
        };
        if key.is_empty()
            || function.is_empty()
            || !function.bytes().all(|c| c.is_ascii_lowercase())
            || self.peek() != Some(b'(')
        {
            return Err(fail(()));
        }
        self.pos += 1;

        let parameters = self.function_parameters().map_err(fail)?;
        if self.peek() != Some(b'}') {
            return Err(fail(()));
        }
        self.pos += 1;

        self.macros.push(FunctionMacro {
            host: text[host_start..host_end].to_string(),
            key: key.to_string(),
            function: function.to_string(),
            parameters,
            span: start..self.pos,
            host_span: host_start..host_end,
        });
        Ok(())
    }

    /// Bracketed item key parameters, nested arrays allowed.
    fn key_parameters(&mut self) -> Result<(), ()> {
        self.pos += 1;
        loop {
            while self.peek() == Some(b' ') {
                self.pos += 1;
            }
            match self.peek() {
                Some(b'"') => {
                    self.quoted()?;
                    while self.peek() == Some(b' ') {
                        self.pos += 1;
                    }
                }
                Some(b'[') => self.key_parameters()?,
                _ => {
                    while !matches!(self.peek(), Some(b',' | b']') | None) {
                        self.pos += 1;
                    }
                }
            }
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(());
                }
                _ => return Err(()),
            }
        }
    }

    /// Function parameters up to and including the closing parenthesis.
    fn function_parameters(&mut self) -> Result<Vec<String>, ()> {
        let mut parameters = Vec::new();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(parameters);
        }
        loop {
            while self.peek() == Some(b' ') {
                self.pos += 1;
            }
            let value = if self.peek() == Some(b'"') {
                let raw = self.quoted()?;
                while self.peek() == Some(b' ') {
                    self.pos += 1;
                }
                raw
            } else {
                let start = self.pos;
                while !matches!(self.peek(), Some(b',' | b')') | None) {
                    self.pos += 1;
                }
                self.text[start..self.pos].trim_end().to_string()
            };
            parameters.push(value);
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(parameters);
                }
                _ => return Err(()),
            }
        }
    }

    /// A double quoted string with `\"` escapes; returns the unescaped value.
    fn quoted(&mut self) -> Result<String, ()> {
        self.pos += 1;
        let mut value = Vec::new();
        loop {
            match self.peek() {
                None => return Err(()),
                Some(b'\\') if self.peek_at(1) == Some(b'"') => {
                    value.push(b'"');
                    self.pos += 2;
                }
                Some(b'"') => {
                    self.pos += 1;
                    return String::from_utf8(value).map_err(|_| ());
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}
