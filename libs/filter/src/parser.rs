//! Filter parser - converts filter strings to an AST
//!
//! Recursive descent parser over the grammar
//!
//! ```text
//! expr    := cond EOF
//! cond    := condOr
//! condOr  := condAnd (OR condAnd)*
//! condAnd := term (AND term)*
//! term    := '(' cond ')' | NOT path | path cmpOp val | path IN list | path
//! path    := NAME ('->' NAME)*
//! list    := '(' elem (',' elem)* ')'
//! ```
//!
//! AND binds tighter than OR because `condAnd` sits below `condOr`. Parsing
//! stops at the first error; no partial tree is ever returned.

use chrono::NaiveDate;

use crate::ast::{CmpOp, Expr, Literal, Path};
use crate::error::Result;
use crate::lexer::{self, Lexer};
use crate::listener;
use crate::token::{Token, TokenType};

const MAX_RECURSION_DEPTH: usize = 200;

const TERM_START: &[TokenType] = &[TokenType::OpenParen, TokenType::Not, TokenType::Name];

const SCALAR_LITERALS: &[TokenType] = &[
    TokenType::Bool,
    TokenType::Ref,
    TokenType::Str,
    TokenType::Uri,
    TokenType::Number,
    TokenType::Date,
    TokenType::DateTime,
    TokenType::Time,
];

const LIST_ELEMENTS: &[TokenType] = &[
    TokenType::InStr,
    TokenType::Str,
    TokenType::Uri,
    TokenType::Number,
    TokenType::Ref,
];

/// Parse a filter string into an expression tree
pub fn parse(input: &str) -> Result<Expr> {
    Parser::new(input)?.parse_expr()
}

/// Parser for filter expressions
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    recursion_depth: usize,
}

impl Parser {
    /// Tokenize `input` and prepare to parse it
    pub fn new(input: &str) -> Result<Self> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            position: 0,
            recursion_depth: 0,
        })
    }

    fn current(&self) -> &Token {
        // tokenize() always ends with Eof and we never advance past it
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn check(&self, token_type: TokenType) -> bool {
        self.current().token_type == token_type
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.token_type != TokenType::Eof {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, token_type: TokenType) -> Result<Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(listener::mismatched_input(self.current(), &[token_type]))
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.recursion_depth += 1;
        if self.recursion_depth > MAX_RECURSION_DEPTH {
            return Err(listener::invalid_construct(
                self.current(),
                format!("expression too deeply nested (max depth: {MAX_RECURSION_DEPTH})"),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.recursion_depth -= 1;
    }

    /// expr := cond EOF
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let expr = self.parse_cond()?;
        if !self.check(TokenType::Eof) {
            return Err(listener::extraneous_input(
                self.current(),
                &[TokenType::And, TokenType::Or, TokenType::Eof],
            ));
        }
        Ok(expr)
    }

    fn parse_cond(&mut self) -> Result<Expr> {
        self.enter()?;
        let result = self.parse_cond_or();
        self.leave();
        result
    }

    fn parse_cond_or(&mut self) -> Result<Expr> {
        let mut operands = vec![self.parse_cond_and()?];
        while self.check(TokenType::Or) {
            self.advance();
            operands.push(self.parse_cond_and()?);
        }
        Ok(collapse(operands, |operands| Expr::Or { operands }))
    }

    fn parse_cond_and(&mut self) -> Result<Expr> {
        let mut operands = vec![self.parse_term()?];
        while self.check(TokenType::And) {
            self.advance();
            operands.push(self.parse_term()?);
        }
        Ok(collapse(operands, |operands| Expr::And { operands }))
    }

    fn parse_term(&mut self) -> Result<Expr> {
        match self.current().token_type {
            TokenType::OpenParen => {
                self.advance();
                let inner = self.parse_cond()?;
                self.expect(TokenType::CloseParen)?;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                })
            }
            TokenType::Not => {
                self.advance();
                let path = self.parse_path()?;
                Ok(Expr::Missing { path })
            }
            TokenType::Name => {
                let path = self.parse_path()?;
                let next = self.current().token_type;
                if next.is_comparison() {
                    let op = cmp_op(self.advance().token_type);
                    let value = self.parse_value()?;
                    Ok(Expr::Cmp { path, op, value })
                } else if next == TokenType::In {
                    self.advance();
                    let values = self.parse_list()?;
                    Ok(Expr::InCmp { path, values })
                } else {
                    Ok(Expr::Has { path })
                }
            }
            // A repeated operator ("a and and b") is extraneous, anything else is a mismatch
            TokenType::And | TokenType::Or => {
                Err(listener::extraneous_input(self.current(), TERM_START))
            }
            _ => Err(listener::mismatched_input(self.current(), TERM_START)),
        }
    }

    /// path := NAME ('->' NAME)*
    fn parse_path(&mut self) -> Result<Path> {
        let mut segments = vec![self.expect(TokenType::Name)?.value];
        while self.check(TokenType::Arrow) {
            self.advance();
            segments.push(self.expect(TokenType::Name)?.value);
        }
        Ok(Path::new(segments))
    }

    fn parse_value(&mut self) -> Result<Literal> {
        if !self.current().token_type.is_scalar_literal() {
            return Err(listener::mismatched_input(self.current(), SCALAR_LITERALS));
        }
        let token = self.advance();
        literal(&token)
    }

    /// list := '(' elem (',' elem)* ')'
    fn parse_list(&mut self) -> Result<Vec<Literal>> {
        self.expect(TokenType::OpenParen)?;
        let mut values = vec![self.parse_list_element()?];
        while self.check(TokenType::Comma) {
            self.advance();
            let element_token = self.current().clone();
            let value = self.parse_list_element()?;
            if value.is_numeric() != values[0].is_numeric() {
                return Err(listener::invalid_construct(
                    &element_token,
                    format!("list element '{element_token}' does not match the type of the first element"),
                ));
            }
            values.push(value);
        }
        self.expect(TokenType::CloseParen)?;
        Ok(values)
    }

    fn parse_list_element(&mut self) -> Result<Literal> {
        if !LIST_ELEMENTS.contains(&self.current().token_type) {
            return Err(listener::mismatched_input(self.current(), LIST_ELEMENTS));
        }
        let token = self.advance();
        literal(&token)
    }
}

fn collapse(mut operands: Vec<Expr>, wrap: impl FnOnce(Vec<Expr>) -> Expr) -> Expr {
    if operands.len() == 1 {
        operands.remove(0)
    } else {
        wrap(operands)
    }
}

fn cmp_op(token_type: TokenType) -> CmpOp {
    match token_type {
        TokenType::NotEqual => CmpOp::Ne,
        TokenType::LessThan => CmpOp::Lt,
        TokenType::LessThanOrEqual => CmpOp::Le,
        TokenType::GreaterThan => CmpOp::Gt,
        TokenType::GreaterThanOrEqual => CmpOp::Ge,
        _ => CmpOp::Eq,
    }
}

fn literal(token: &Token) -> Result<Literal> {
    let invalid = |kind: &str| listener::invalid_literal(token.line, token.column, kind, &token.value);
    match token.token_type {
        TokenType::Number => Ok(Literal::Number(token.value.clone())),
        TokenType::Ref => token
            .value
            .parse::<i64>()
            .map(Literal::Ref)
            .map_err(|_| invalid("reference")),
        TokenType::Str | TokenType::InStr => Ok(Literal::Str(token.value.clone())),
        TokenType::Uri => Ok(Literal::Uri(token.value.clone())),
        TokenType::Bool => Ok(Literal::Bool(token.value == "true")),
        TokenType::Date => NaiveDate::parse_from_str(&token.value, "%Y-%m-%d")
            .map(Literal::Date)
            .map_err(|_| invalid("date")),
        TokenType::Time => lexer::parse_time(&token.value)
            .map(Literal::Time)
            .ok_or_else(|| invalid("time")),
        TokenType::DateTime => Ok(Literal::DateTime(token.value.clone())),
        _ => Err(listener::mismatched_input(token, SCALAR_LITERALS)),
    }
}
