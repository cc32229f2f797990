use std::fmt;

use super::lexer::{tokenize, Token, TokenKind};
use super::PredicateError;
use crate::engine::domain::{Scalar, VariableContext};

/// Deepest parenthesis nesting a formula may use.
pub const MAX_NESTING: usize = 64;

/// Comparison operators understood by condition formulas.
///
/// Only equality has been observed in authored rules. New operators get a variant here and
/// a lexeme in the lexer; until then the lexer rejects them as configuration errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
}

impl CompareOp {
    fn apply(self, left: &Scalar, right: &Scalar) -> bool {
        match self {
            CompareOp::Eq => left.matches(right),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => f.write_str("=="),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Variable(String),
    Literal(Scalar),
}

impl Operand {
    fn resolve<'a>(&'a self, context: &'a VariableContext) -> Option<&'a Scalar> {
        match self {
            Operand::Variable(name) => context.get(name),
            Operand::Literal(value) => Some(value),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Variable(name) => write!(f, "[{name}]"),
            Operand::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// Parsed condition formula.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    And(Vec<Expr>),
    Or(Vec<Expr>),
}

impl Expr {
    /// Parses `[var] == literal` comparisons joined by `AND`/`OR` with parentheses.
    /// `AND` binds tighter than `OR`; both associate left to right.
    pub fn parse(source: &str) -> Result<Self, PredicateError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            position: 0,
            depth: 0,
        };
        let expr = parser.parse_or()?;
        parser.expect_end()?;
        Ok(expr)
    }

    /// A comparison touching an unassigned variable is false rather than an error.
    pub fn evaluate(&self, context: &VariableContext) -> bool {
        match self {
            Expr::Compare { left, op, right } => {
                match (left.resolve(context), right.resolve(context)) {
                    (Some(left), Some(right)) => op.apply(left, right),
                    _ => false,
                }
            }
            Expr::And(terms) => terms.iter().all(|term| term.evaluate(context)),
            Expr::Or(terms) => terms.iter().any(|term| term.evaluate(context)),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Compare { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::And(terms) => write_joined(f, terms, " AND "),
            Expr::Or(terms) => write_joined(f, terms, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, terms: &[Expr], separator: &str) -> fmt::Result {
    for (index, term) in terms.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        match term {
            Expr::Compare { .. } => write!(f, "{term}")?,
            _ => write!(f, "({term})")?,
        }
    }
    Ok(())
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.position.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn unexpected(&self, expected: &'static str) -> PredicateError {
        let token = self.peek();
        PredicateError::Unexpected {
            expected,
            found: token.kind.to_string(),
            span: token.span,
        }
    }

    fn parse_or(&mut self) -> Result<Expr, PredicateError> {
        let mut terms = vec![self.parse_and()?];
        while self.peek().kind == TokenKind::Or {
            self.advance();
            terms.push(self.parse_and()?);
        }
        Ok(collapse(terms, Expr::Or))
    }

    fn parse_and(&mut self) -> Result<Expr, PredicateError> {
        let mut terms = vec![self.parse_primary()?];
        while self.peek().kind == TokenKind::And {
            self.advance();
            terms.push(self.parse_primary()?);
        }
        Ok(collapse(terms, Expr::And))
    }

    fn parse_primary(&mut self) -> Result<Expr, PredicateError> {
        if self.peek().kind == TokenKind::LParen {
            let open = self.advance();
            if self.depth == MAX_NESTING {
                return Err(PredicateError::NestingTooDeep {
                    limit: MAX_NESTING,
                    span: open.span,
                });
            }
            self.depth += 1;
            let inner = self.parse_or()?;
            self.depth -= 1;
            if self.peek().kind != TokenKind::RParen {
                return Err(self.unexpected("closing parenthesis"));
            }
            self.advance();
            return Ok(inner);
        }

        let left = self.parse_operand()?;
        let op = match self.peek().kind {
            TokenKind::Eq => CompareOp::Eq,
            _ => return Err(self.unexpected("comparison operator")),
        };
        self.advance();
        let right = self.parse_operand()?;

        Ok(Expr::Compare { left, op, right })
    }

    fn parse_operand(&mut self) -> Result<Operand, PredicateError> {
        let operand = match &self.peek().kind {
            TokenKind::Variable(name) => Operand::Variable(name.clone()),
            TokenKind::Text(text) => Operand::Literal(Scalar::Text(text.clone())),
            TokenKind::Number(number) => Operand::Literal(Scalar::Number(*number)),
            TokenKind::Bool(flag) => Operand::Literal(Scalar::Bool(*flag)),
            _ => return Err(self.unexpected("variable or literal")),
        };
        self.advance();
        Ok(operand)
    }

    fn expect_end(&self) -> Result<(), PredicateError> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.unexpected("AND, OR, or end of formula"))
        }
    }
}

fn collapse(mut terms: Vec<Expr>, wrap: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.remove(0)
    } else {
        wrap(terms)
    }
}
