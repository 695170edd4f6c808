//! Syntax error reporting
//!
//! The lexer and parser never recover from a problem: every failure is
//! funnelled through these constructors into one [`Error::Syntax`] carrying
//! the position of the offending character or token. Callers therefore get
//! either a complete tree or exactly one error.

use crate::error::Error;
use crate::token::{Token, TokenType};

fn syntax(line: usize, column: usize, message: String) -> Error {
    tracing::debug!(line, column, %message, "Filter syntax error");
    Error::Syntax {
        line,
        column,
        message,
    }
}

/// The lexer hit a character (or sequence) that starts no token.
pub(crate) fn token_recognition_error(line: usize, column: usize, text: &str) -> Error {
    syntax(line, column, format!("token recognition error at: '{text}'"))
}

/// A literal was recognised but its contents are invalid (bad date, bad escape, ...).
pub(crate) fn invalid_literal(line: usize, column: usize, kind: &str, text: &str) -> Error {
    syntax(line, column, format!("invalid {kind} literal '{text}'"))
}

/// The parser found `token` where one of `expected` was required.
pub(crate) fn mismatched_input(token: &Token, expected: &[TokenType]) -> Error {
    syntax(
        token.line,
        token.column,
        format!(
            "mismatched input '{token}' expecting {}",
            describe_expected(expected)
        ),
    )
}

/// A complete expression was parsed but input remains, or a token repeats
/// where it cannot (e.g. `a and and b`).
pub(crate) fn extraneous_input(token: &Token, expected: &[TokenType]) -> Error {
    syntax(
        token.line,
        token.column,
        format!(
            "extraneous input '{token}' expecting {}",
            describe_expected(expected)
        ),
    )
}

/// Structural problem that is not a single missing token.
pub(crate) fn invalid_construct(token: &Token, message: impl Into<String>) -> Error {
    syntax(token.line, token.column, message.into())
}

fn describe_expected(expected: &[TokenType]) -> String {
    match expected {
        [single] => single.describe().to_string(),
        many => {
            let names: Vec<&str> = many.iter().map(|t| t.describe()).collect();
            format!("{{{}}}", names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_set_is_braced_when_plural() {
        let token = Token::new(TokenType::And, "and".into(), 1, 10);
        let err = extraneous_input(&token, &[TokenType::Name, TokenType::Not]);
        assert_eq!(
            err.to_string(),
            "1:10 extraneous input 'and' expecting {NAME, NOT}"
        );
    }

    #[test]
    fn single_expected_token_is_bare() {
        let token = Token::eof(1, 6);
        let err = mismatched_input(&token, &[TokenType::CloseParen]);
        assert_eq!(err.to_string(), "1:6 mismatched input '<EOF>' expecting ')'");
    }
}
