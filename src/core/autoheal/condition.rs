// src/core/autoheal/condition.rs

//! A minimal hand-written tokenizer/evaluator for playbook conditions of
//! the form `<identifier> <op> <number>`. Unknown
//! identifiers and malformed or unknown operators evaluate to `false`
//! rather than raising — this is deliberately not a general expression
//! parser.

use crate::core::types::{Context, ContextValue};

/// Evaluates `condition` against `context`. Never panics or errors: any
/// malformed input simply evaluates to `false`.
pub fn evaluate(condition: &str, context: &Context) -> bool {
    let tokens: Vec<&str> = condition.split_whitespace().collect();
    let [identifier, op, literal] = tokens.as_slice() else {
        return false;
    };

    let Some(value) = context.get(*identifier) else {
        return false;
    };
    let ContextValue::Number(lhs) = value else {
        return false;
    };

    let Ok(rhs) = literal.parse::<f64>() else {
        return false;
    };

    match *op {
        ">" => lhs > &rhs,
        "<" => lhs < &rhs,
        ">=" => lhs >= &rhs,
        "<=" => lhs <= &rhs,
        "==" => (lhs - rhs).abs() < f64::EPSILON,
        _ => false,
    }
}
