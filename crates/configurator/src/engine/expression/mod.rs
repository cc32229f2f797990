//! Predicate interpreter shared by visibility conditions, attribute filters, and labor
//! condition formulas.

mod filter;
mod lexer;
mod parser;

pub use filter::AttributeFilter;
pub use lexer::Span;
pub use parser::{CompareOp, Expr, Operand, MAX_NESTING};

use super::domain::VariableContext;

/// Structural problem found while compiling a predicate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredicateError {
    #[error("attribute filter must be a JSON object, found {found}")]
    FilterNotObject { found: &'static str },
    #[error("allowed values for '{key}' must be a scalar or a list of scalars")]
    FilterValue { key: String },
    #[error("unexpected character '{found}' at {span}")]
    UnexpectedChar { found: char, span: Span },
    #[error("unsupported operator '{operator}' at {span}")]
    UnsupportedOperator { operator: String, span: Span },
    #[error("unknown word '{word}' at {span}; variables must be written as [name]")]
    UnknownWord { word: String, span: Span },
    #[error("unterminated {what} starting at {span}")]
    Unterminated { what: &'static str, span: Span },
    #[error("empty variable reference at {span}")]
    EmptyVariable { span: Span },
    #[error("invalid number '{raw}' at {span}")]
    InvalidNumber { raw: String, span: Span },
    #[error("parentheses nested deeper than {limit} at {span}")]
    NestingTooDeep { limit: usize, span: Span },
    #[error("expected {expected}, found {found} at {span}")]
    Unexpected {
        expected: &'static str,
        found: String,
        span: Span,
    },
}

/// Compiled gate deciding whether a rule or assignment applies to a context.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Always,
    AttributeFilter(AttributeFilter),
    Expression(Expr),
}

impl Predicate {
    /// Compiles a JSON attribute filter; absent or empty filters always hold.
    pub fn attribute_filter(value: Option<&serde_json::Value>) -> Result<Self, PredicateError> {
        match value {
            None => Ok(Predicate::Always),
            Some(value) => {
                let filter = AttributeFilter::from_json(value)?;
                if filter.is_empty() {
                    Ok(Predicate::Always)
                } else {
                    Ok(Predicate::AttributeFilter(filter))
                }
            }
        }
    }

    /// Compiles a condition formula; a blank formula always holds.
    pub fn formula(source: Option<&str>) -> Result<Self, PredicateError> {
        match source.map(str::trim) {
            None | Some("") => Ok(Predicate::Always),
            Some(source) => Expr::parse(source).map(Predicate::Expression),
        }
    }

    pub fn evaluate(&self, context: &VariableContext) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::AttributeFilter(filter) => filter.matches(context),
            Predicate::Expression(expr) => expr.evaluate(context),
        }
    }
}

pub fn evaluate(predicate: &Predicate, context: &VariableContext) -> bool {
    predicate.evaluate(context)
}
