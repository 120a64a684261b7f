//! Guard condition parsing and evaluation.
//!
//! Guards come in two surface forms that parse to the same [`Condition`]:
//!
//! - JSON: `{"field": "status", "operator": "eq", "value": "active"}`, or a
//!   compound `{"logic": "or", "conditions": [...]}`, or a bare `true`/`false`
//! - Infix: `status == 'active'`, `total >= 100`, `tags contains vip`
//!
//! Comparisons use loose equality (`"5"` equals `5`) and numeric coercion.
//! A guard that cannot be parsed or evaluated is false; see [`evaluate_guard`].

use crate::context::ExecutionContext;
use crate::error::ConditionError;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::debug;

/// Comparison operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    Regex,
    /// An operator name nobody understands. Always evaluates false.
    Unknown(String),
}

impl Operator {
    /// Parses an operator from its word or symbol form.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "==" | "===" | "equals" => Self::Eq,
            "ne" | "neq" | "!=" | "!==" | "not_equals" => Self::Ne,
            "gt" | ">" => Self::Gt,
            "gte" | ">=" => Self::Gte,
            "lt" | "<" => Self::Lt,
            "lte" | "<=" => Self::Lte,
            "contains" => Self::Contains,
            "regex" | "matches" => Self::Regex,
            _ => Self::Unknown(s.to_string()),
        }
    }

    /// Applies the operator to a resolved field value and the expected value.
    #[must_use]
    pub fn apply(&self, actual: &JsonValue, expected: &JsonValue) -> bool {
        match self {
            Self::Eq => loose_eq(actual, expected),
            Self::Ne => !loose_eq(actual, expected),
            Self::Gt => compare(actual, expected, |a, b| a > b),
            Self::Gte => compare(actual, expected, |a, b| a >= b),
            Self::Lt => compare(actual, expected, |a, b| a < b),
            Self::Lte => compare(actual, expected, |a, b| a <= b),
            Self::Contains => match actual {
                JsonValue::Array(items) => items.iter().any(|item| loose_eq(item, expected)),
                other => coerce_string(other).contains(&coerce_string(expected)),
            },
            Self::Regex => Regex::new(&coerce_string(expected))
                .is_ok_and(|re| re.is_match(&coerce_string(actual))),
            Self::Unknown(_) => false,
        }
    }
}

/// How a compound condition combines its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    #[default]
    And,
    Or,
}

/// A parsed guard.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Literal(bool),
    Comparison {
        field: String,
        operator: Operator,
        value: JsonValue,
    },
    Compound {
        logic: Logic,
        conditions: Vec<Condition>,
    },
}

impl Condition {
    /// Parses a guard from its JSON or infix form.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input and for text that is neither JSON
    /// nor a `<field> <op> <value>` comparison.
    pub fn parse(expression: &str) -> Result<Self, ConditionError> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(ConditionError::Empty);
        }

        if let Ok(json) = serde_json::from_str::<JsonValue>(trimmed) {
            return Ok(Self::from_json(&json));
        }

        parse_infix(trimmed).ok_or_else(|| ConditionError::Unrecognised {
            expression: trimmed.to_string(),
        })
    }

    /// Builds a condition from an already-parsed JSON value.
    ///
    /// JSON that is not a comparison, a compound or a boolean is false.
    #[must_use]
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Bool(b) => Self::Literal(*b),
            JsonValue::Object(map) => {
                if let Some(JsonValue::String(field)) = map.get("field") {
                    let operator = match map.get("operator") {
                        Some(JsonValue::String(op)) => Operator::parse(op),
                        Some(other) => Operator::Unknown(other.to_string()),
                        None => Operator::Eq,
                    };
                    return Self::Comparison {
                        field: field.clone(),
                        operator,
                        value: map.get("value").cloned().unwrap_or(JsonValue::Null),
                    };
                }

                if let Some(JsonValue::Array(members)) = map.get("conditions") {
                    let logic = match map.get("logic").and_then(JsonValue::as_str) {
                        Some(l) if l.eq_ignore_ascii_case("or") => Logic::Or,
                        _ => Logic::And,
                    };
                    let conditions = members
                        .iter()
                        .map(|member| match member {
                            JsonValue::String(s) => {
                                Self::parse(s).unwrap_or(Self::Literal(false))
                            }
                            other => Self::from_json(other),
                        })
                        .collect();
                    return Self::Compound { logic, conditions };
                }

                Self::Literal(false)
            }
            _ => Self::Literal(false),
        }
    }

    /// Evaluates the condition against the context.
    ///
    /// A field that does not resolve is undefined: every operator is false
    /// for it except `!=`, which is true.
    #[must_use]
    pub fn evaluate(&self, context: &ExecutionContext) -> bool {
        match self {
            Self::Literal(b) => *b,
            Self::Comparison {
                field,
                operator,
                value,
            } => match context.lookup(field) {
                Some(actual) => operator.apply(actual, value),
                None => *operator == Operator::Ne,
            },
            Self::Compound { logic, conditions } => match logic {
                Logic::And => conditions.iter().all(|c| c.evaluate(context)),
                Logic::Or => conditions.iter().any(|c| c.evaluate(context)),
            },
        }
    }
}

/// Evaluates a connection guard, treating any parse failure as false.
#[must_use]
pub fn evaluate_guard(expression: &str, context: &ExecutionContext) -> bool {
    match Condition::parse(expression) {
        Ok(condition) => condition.evaluate(context),
        Err(e) => {
            debug!(error = %e, expression, "guard evaluated as false");
            false
        }
    }
}

const INFIX_OPERATORS: [&str; 9] = ["===", "!==", "==", "!=", ">=", "<=", ">", "<", "contains"];

fn is_field_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-' | '.')
}

fn parse_infix(expression: &str) -> Option<Condition> {
    let field_len = expression
        .find(|c: char| !is_field_char(c))
        .unwrap_or(expression.len());
    let field = &expression[..field_len];
    if field.is_empty() || field.starts_with('.') || field.ends_with('.') {
        return None;
    }

    let rest = expression[field_len..].trim_start();
    let symbol = INFIX_OPERATORS
        .iter()
        .find(|op| rest.starts_with(**op))?;
    let after = &rest[symbol.len()..];
    if *symbol == "contains" && !after.starts_with(char::is_whitespace) {
        return None;
    }

    let raw = after.trim();
    if raw.is_empty() {
        return None;
    }

    Some(Condition::Comparison {
        field: field.to_string(),
        operator: Operator::parse(symbol),
        value: infix_value(raw),
    })
}

fn infix_value(raw: &str) -> JsonValue {
    for quote in ['\'', '"'] {
        if raw.len() >= 2 && raw.starts_with(quote) && raw.ends_with(quote) {
            return JsonValue::String(raw[1..raw.len() - 1].to_string());
        }
    }

    match serde_json::from_str::<JsonValue>(raw) {
        Ok(scalar @ (JsonValue::Number(_) | JsonValue::Bool(_) | JsonValue::Null)) => scalar,
        _ => JsonValue::String(raw.to_string()),
    }
}

fn bool_number(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn coerce_number(value: &JsonValue) -> Option<f64> {
    let n = match value {
        JsonValue::Number(n) => n.as_f64()?,
        JsonValue::String(s) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse().ok()? }
        }
        JsonValue::Bool(b) => bool_number(*b),
        JsonValue::Null => 0.0,
        JsonValue::Array(_) | JsonValue::Object(_) => return None,
    };
    (!n.is_nan()).then_some(n)
}

fn compare(actual: &JsonValue, expected: &JsonValue, op: impl Fn(f64, f64) -> bool) -> bool {
    match (coerce_number(actual), coerce_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

fn coerce_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        JsonValue::Array(items) => items
            .iter()
            .map(coerce_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn loose_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Null, JsonValue::Null) => true,
        (JsonValue::Null, _) | (_, JsonValue::Null) => false,
        (JsonValue::Bool(x), JsonValue::Bool(y)) => x == y,
        (JsonValue::String(x), JsonValue::String(y)) => x == y,
        (JsonValue::Number(_), JsonValue::Number(_))
        | (JsonValue::Number(_), JsonValue::String(_))
        | (JsonValue::String(_), JsonValue::Number(_))
        | (JsonValue::Bool(_), JsonValue::Number(_) | JsonValue::String(_))
        | (JsonValue::Number(_) | JsonValue::String(_), JsonValue::Bool(_)) => {
            match (coerce_number(a), coerce_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        _ => a == b,
    }
}
