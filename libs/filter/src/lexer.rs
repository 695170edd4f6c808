//! Filter lexer - tokenizes input strings
//!
//! Converts a filter string into a stream of tokens. The first unrecognised
//! character aborts tokenization with a syntax error.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::Result;
use crate::listener;
use crate::token::{Token, TokenType};

/// The filter lexer
pub struct Lexer {
    chars: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position + 1).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.current(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    /// Tokenize the whole input, terminated by an `Eof` token
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.token_type == TokenType::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Read the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();
        let (line, column) = (self.line, self.column);

        let Some(c) = self.current() else {
            return Ok(Token::eof(line, column));
        };

        match c {
            '(' => Ok(self.single(TokenType::OpenParen, "(")),
            ')' => Ok(self.single(TokenType::CloseParen, ")")),
            ',' => Ok(self.single(TokenType::Comma, ",")),
            '=' => self.two_char('=', TokenType::Equal, "=="),
            '!' => self.two_char('=', TokenType::NotEqual, "!="),
            '<' => Ok(self.optional_eq(TokenType::LessThan, TokenType::LessThanOrEqual)),
            '>' => Ok(self.optional_eq(TokenType::GreaterThan, TokenType::GreaterThanOrEqual)),
            '-' => match self.peek() {
                Some('>') => {
                    self.advance();
                    self.advance();
                    Ok(Token::new(TokenType::Arrow, "->".into(), line, column))
                }
                Some(d) if d.is_ascii_digit() => self.read_numeric(),
                _ => Err(listener::token_recognition_error(line, column, "-")),
            },
            '"' => self.read_str(),
            '\'' => self.read_in_str(),
            '`' => self.read_uri(),
            '@' => self.read_ref(),
            d if d.is_ascii_digit() => self.read_numeric(),
            a if a.is_ascii_alphabetic() || a == '_' => Ok(self.read_name()),
            other => Err(listener::token_recognition_error(
                line,
                column,
                &other.to_string(),
            )),
        }
    }

    fn single(&mut self, token_type: TokenType, text: &str) -> Token {
        let token = Token::new(token_type, text.to_string(), self.line, self.column);
        self.advance();
        token
    }

    fn two_char(&mut self, second: char, token_type: TokenType, text: &str) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        if self.peek() != Some(second) {
            let first = self.current().map(String::from).unwrap_or_default();
            return Err(listener::token_recognition_error(line, column, &first));
        }
        self.advance();
        self.advance();
        Ok(Token::new(token_type, text.to_string(), line, column))
    }

    fn optional_eq(&mut self, bare: TokenType, with_eq: TokenType) -> Token {
        let (line, column) = (self.line, self.column);
        let first = self.current().unwrap_or_default();
        self.advance();
        if self.current() == Some('=') {
            self.advance();
            Token::new(with_eq, format!("{first}="), line, column)
        } else {
            Token::new(bare, first.to_string(), line, column)
        }
    }

    fn read_name(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.current() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }

        let token_type = match text.to_ascii_lowercase().as_str() {
            "and" => TokenType::And,
            "or" => TokenType::Or,
            "not" => TokenType::Not,
            "in" => TokenType::In,
            _ if text == "true" || text == "false" => TokenType::Bool,
            _ => TokenType::Name,
        };
        Token::new(token_type, text, line, column)
    }

    /// Double-quoted string with backslash escapes
    fn read_str(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.current() {
                None => return Err(listener::token_recognition_error(line, column, "\"")),
                Some('"') => {
                    self.advance();
                    return Ok(Token::new(TokenType::Str, value, line, column));
                }
                Some('\\') => {
                    self.advance();
                    value.push(self.read_escape(line, column)?);
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_escape(&mut self, line: usize, column: usize) -> Result<char> {
        let escaped = match self.current() {
            Some('"') => '"',
            Some('\\') => '\\',
            Some('/') => '/',
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('u') => {
                self.advance();
                let mut hex = String::new();
                for _ in 0..4 {
                    match self.current() {
                        Some(h) if h.is_ascii_hexdigit() => {
                            hex.push(h);
                            self.advance();
                        }
                        _ => return Err(listener::invalid_literal(line, column, "string", &hex)),
                    }
                }
                return u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| listener::invalid_literal(line, column, "string", &hex));
            }
            Some(other) => {
                return Err(listener::invalid_literal(
                    line,
                    column,
                    "string",
                    &format!("\\{other}"),
                ))
            }
            None => return Err(listener::token_recognition_error(line, column, "\"")),
        };
        self.advance();
        Ok(escaped)
    }

    /// Single-quoted string, `''` escapes a quote
    fn read_in_str(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut value = String::new();
        loop {
            match self.current() {
                None => return Err(listener::token_recognition_error(line, column, "'")),
                Some('\'') if self.peek() == Some('\'') => {
                    value.push('\'');
                    self.advance();
                    self.advance();
                }
                Some('\'') => {
                    self.advance();
                    return Ok(Token::new(TokenType::InStr, value, line, column));
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_uri(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut value = String::new();
        loop {
            match self.current() {
                None => return Err(listener::token_recognition_error(line, column, "`")),
                Some('`') => {
                    self.advance();
                    return Ok(Token::new(TokenType::Uri, value, line, column));
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
    }

    /// `@<entity id>`
    fn read_ref(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        self.advance();
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() || digits.parse::<i64>().is_err() {
            let tail = self.take_while(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_');
            return Err(listener::invalid_literal(
                line,
                column,
                "reference",
                &format!("@{digits}{tail}"),
            ));
        }
        Ok(Token::new(TokenType::Ref, digits, line, column))
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(c) = self.current() {
            if !pred(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn count_digits_ahead(&self) -> usize {
        let mut n = 0;
        while matches!(self.peek_at(n), Some(c) if c.is_ascii_digit()) {
            n += 1;
        }
        n
    }

    /// Number, date, date-time or time, decided by the shape of the leading digits
    fn read_numeric(&mut self) -> Result<Token> {
        let leading = self.count_digits_ahead();
        let after = self.peek_at(leading);
        let after_next = self.peek_at(leading + 1);

        if leading == 4 && after == Some('-') && matches!(after_next, Some(c) if c.is_ascii_digit())
        {
            return self.read_date();
        }
        if leading == 2 && after == Some(':') {
            return self.read_time();
        }
        self.read_number()
    }

    fn read_number(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        if self.current() == Some('-') {
            text.push('-');
            self.advance();
        }
        text.push_str(&self.take_while(|c| c.is_ascii_digit()));

        if self.current() == Some('.') && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push('.');
            self.advance();
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }

        if matches!(self.current(), Some('e' | 'E')) {
            let sign = matches!(self.peek(), Some('+' | '-'));
            let digit_offset = if sign { 2 } else { 1 };
            if matches!(self.peek_at(digit_offset), Some(c) if c.is_ascii_digit()) {
                text.push('e');
                self.advance();
                if sign {
                    text.extend(self.current());
                    self.advance();
                }
                text.push_str(&self.take_while(|c| c.is_ascii_digit()));
            }
        }

        Ok(Token::new(TokenType::Number, text, line, column))
    }

    fn read_date(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        let mut text = self.take_while(|c| c.is_ascii_digit() || c == '-');

        if self.current() == Some('T') && matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push('T');
            self.advance();
            text.push_str(&self.take_while(|c| {
                c.is_ascii_digit() || matches!(c, ':' | '.' | '+' | '-' | 'Z')
            }));
            if !is_valid_date_time(&text) {
                return Err(listener::invalid_literal(line, column, "dateTime", &text));
            }
            return Ok(Token::new(TokenType::DateTime, text, line, column));
        }

        if NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_err() {
            return Err(listener::invalid_literal(line, column, "date", &text));
        }
        Ok(Token::new(TokenType::Date, text, line, column))
    }

    fn read_time(&mut self) -> Result<Token> {
        let (line, column) = (self.line, self.column);
        let text = self.take_while(|c| c.is_ascii_digit() || c == ':' || c == '.');
        if parse_time(&text).is_none() {
            return Err(listener::invalid_literal(line, column, "time", &text));
        }
        Ok(Token::new(TokenType::Time, text, line, column))
    }
}

pub(crate) fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn is_valid_date_time(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn types(input: &str) -> Vec<TokenType> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.token_type)
            .collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            types("a AND b Or NOT c"),
            vec![
                TokenType::Name,
                TokenType::And,
                TokenType::Name,
                TokenType::Or,
                TokenType::Not,
                TokenType::Name,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn arrow_and_negative_number_share_a_prefix() {
        assert_eq!(
            types("a->b == -3"),
            vec![
                TokenType::Name,
                TokenType::Arrow,
                TokenType::Name,
                TokenType::Equal,
                TokenType::Number,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn columns_are_one_based() {
        let tokens = Lexer::new("site and\n  equip").tokenize().unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 6));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
    }

    #[test]
    fn lone_equals_is_rejected() {
        let err = Lexer::new("a = 1").tokenize().unwrap_err();
        assert_eq!(err.to_string(), "1:3 token recognition error at: '='");
    }
}
