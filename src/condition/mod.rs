//! Condition Evaluator
//!
//! A small sandboxed expression language used for edge conditions, declared
//! results and question validity checks. Expressions are compiled once into an
//! AST and evaluated against a read-only view of the answers; nothing an
//! expression does can reach outside that view.
//!
//! Evaluation fails closed: a malformed expression or a runtime error counts
//! as `false` for the guard it belongs to.

mod eval;
mod lexer;
mod parser;
mod value;

pub use parser::{BinaryOp, Expr, LogicalOp, UnaryOp, MAX_DEPTH, MAX_NODES};
pub use value::Value;

use crate::diagram::Answers;
use thiserror::Error;

/// Errors raised while compiling or evaluating a condition
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("Unterminated string literal starting at offset {0}")]
    UnterminatedString(usize),

    #[error("Invalid number literal '{0}'")]
    InvalidNumber(String),

    #[error("Unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("Expression has more than {0} operations")]
    TooLarge(usize),

    #[error("{0} is not defined")]
    NotDefined(String),

    #[error("Cannot read property '{property}' of {target}")]
    NullProperty {
        property: String,
        target: &'static str,
    },

    #[error("{method} is not a function on {target}")]
    NotAFunction {
        method: String,
        target: &'static str,
    },
}

/// A parsed condition expression
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    pub fn parse(source: &str) -> Result<Self, ConditionError> {
        Ok(Self {
            source: source.to_string(),
            expr: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate to a value
    pub fn evaluate(&self, answers: &Answers) -> Result<Value, ConditionError> {
        eval::eval(&self.expr, answers)
    }

    /// Evaluate and apply truthiness
    pub fn test(&self, answers: &Answers) -> Result<bool, ConditionError> {
        Ok(self.evaluate(answers)?.is_truthy())
    }
}

/// A condition compiled ahead of time, keeping its compile error if it has one.
///
/// Diagrams are compiled when they are loaded; a broken expression must not stop
/// the diagram from loading, it just never holds.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    compiled: Result<Condition, ConditionError>,
}

impl Predicate {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            compiled: Condition::parse(source),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compile error, if the expression did not parse
    pub fn compile_error(&self) -> Option<&ConditionError> {
        self.compiled.as_ref().err()
    }

    pub fn check(&self, answers: &Answers) -> Result<bool, ConditionError> {
        match &self.compiled {
            Ok(condition) => condition.test(answers),
            Err(error) => Err(error.clone()),
        }
    }

    /// Fail-closed evaluation: any error is logged and reads as `false`
    pub fn holds(&self, answers: &Answers) -> bool {
        self.check(answers).unwrap_or_else(|e| {
            tracing::warn!("⚠️ Condition `{}` treated as false: {}", self.source, e);
            false
        })
    }
}

/// Evaluate `expression` against `answers`, failing closed
pub fn evaluate(expression: &str, answers: &Answers) -> bool {
    Predicate::new(expression).holds(answers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answers(value: serde_json::Value) -> Answers {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn evaluates_answer_comparisons() {
        let answers = answers(json!({ "A": "yes", "score": 7 }));
        assert!(evaluate("answers['A'] === 'yes'", &answers));
        assert!(!evaluate("answers['A'] === 'no'", &answers));
        assert!(evaluate("answers.score > 5 && answers.A != 'no'", &answers));
        assert!(evaluate("score == '7'", &answers));
        assert!(!evaluate("score === '7'", &answers));
    }

    #[test]
    fn fails_closed_on_malformed_or_throwing_expressions() {
        let answers = answers(json!({}));
        assert!(!evaluate("answers['A'] ===", &answers));
        assert!(!evaluate("answers.A.B", &answers));
        assert!(!evaluate("process.exit(1)", &answers));
        assert!(!evaluate("", &answers));
    }

    #[test]
    fn predicate_keeps_compile_error_and_source() {
        let predicate = Predicate::new("answers[");
        assert_eq!(predicate.source(), "answers[");
        assert_eq!(predicate.compile_error(), Some(&ConditionError::UnexpectedEnd));
        assert!(!predicate.holds(&Answers::new()));
    }

    #[test]
    fn evaluation_is_repeatable() {
        let condition = Condition::parse("answers.n % 2 === 0").unwrap();
        let answers = answers(json!({ "n": 4 }));
        assert_eq!(condition.test(&answers), condition.test(&answers));
        assert_eq!(condition.evaluate(&answers).unwrap(), Value::Bool(true));
    }
}
