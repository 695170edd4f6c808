//! Token types for the filter lexer

use std::fmt;

/// Token types for the filter lexer
#[derive(Debug, PartialEq, Clone, Copy, Eq)]
pub enum TokenType {
    // Literals
    Bool,
    Ref,
    Str,   // "double quoted"
    InStr, // 'single quoted', list elements
    Uri,   // `backtick quoted`
    Number,
    Date,
    DateTime,
    Time,

    Name,

    // Keywords (case-insensitive)
    And,
    Or,
    Not,
    In,

    // Operators
    Equal,              // ==
    NotEqual,           // !=
    LessThan,           // <
    LessThanOrEqual,    // <=
    GreaterThan,        // >
    GreaterThanOrEqual, // >=
    Arrow,              // ->

    // Delimiters
    OpenParen,
    CloseParen,
    Comma,

    Eof,
}

impl TokenType {
    /// Display name used in syntax error messages
    pub fn describe(self) -> &'static str {
        match self {
            TokenType::Bool => "BOOL",
            TokenType::Ref => "REF",
            TokenType::Str => "STR",
            TokenType::InStr => "INSTR",
            TokenType::Uri => "URI",
            TokenType::Number => "NUMBER",
            TokenType::Date => "DATE",
            TokenType::DateTime => "DATETIME",
            TokenType::Time => "TIME",
            TokenType::Name => "NAME",
            TokenType::And => "AND",
            TokenType::Or => "OR",
            TokenType::Not => "NOT",
            TokenType::In => "IN",
            TokenType::Equal => "'=='",
            TokenType::NotEqual => "'!='",
            TokenType::LessThan => "'<'",
            TokenType::LessThanOrEqual => "'<='",
            TokenType::GreaterThan => "'>'",
            TokenType::GreaterThanOrEqual => "'>='",
            TokenType::Arrow => "'->'",
            TokenType::OpenParen => "'('",
            TokenType::CloseParen => "')'",
            TokenType::Comma => "','",
            TokenType::Eof => "<EOF>",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            TokenType::Equal
                | TokenType::NotEqual
                | TokenType::LessThan
                | TokenType::LessThanOrEqual
                | TokenType::GreaterThan
                | TokenType::GreaterThanOrEqual
        )
    }

    pub fn is_scalar_literal(self) -> bool {
        matches!(
            self,
            TokenType::Bool
                | TokenType::Ref
                | TokenType::Str
                | TokenType::Uri
                | TokenType::Number
                | TokenType::Date
                | TokenType::DateTime
                | TokenType::Time
        )
    }
}

/// A token in the filter expression
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    /// Decoded value: unescaped text for quoted literals, the lexeme otherwise
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(token_type: TokenType, value: String, line: usize, column: usize) -> Self {
        Self {
            token_type,
            value,
            line,
            column,
        }
    }

    pub fn eof(line: usize, column: usize) -> Self {
        Self::new(TokenType::Eof, String::new(), line, column)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.token_type {
            TokenType::Eof => f.write_str("<EOF>"),
            TokenType::Str => write!(f, "\"{}\"", self.value),
            TokenType::InStr => write!(f, "'{}'", self.value),
            TokenType::Uri => write!(f, "`{}`", self.value),
            TokenType::Ref => write!(f, "@{}", self.value),
            _ => f.write_str(&self.value),
        }
    }
}
