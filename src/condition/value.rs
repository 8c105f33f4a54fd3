use serde_json::Value as Json;
use std::cmp::Ordering;
use std::fmt;

/// Runtime value produced while evaluating a condition.
///
/// Mirrors JSON plus `Undefined`, which is what a lookup of a missing answer
/// or property yields.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Json>),
    Object(serde_json::Map<String, Json>),
}

impl Value {
    pub fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s.clone()),
            Json::Array(items) => Value::Array(items.clone()),
            Json::Object(map) => Value::Object(map.clone()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Numeric coercion; anything without a numeric reading becomes NaN
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined | Value::Object(_) => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Value::Array(items) => match items.as_slice() {
                [] => 0.0,
                [single] => Value::from_json(single).to_number(),
                _ => f64::NAN,
            },
        }
    }

    /// `===`: same type and same value; composites compare structurally
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }

    /// `==`: null and undefined only equal each other, primitives coerce to numbers
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() || b.is_nullish() => a.is_nullish() && b.is_nullish(),
            (Value::Bool(_), _)
            | (_, Value::Bool(_))
            | (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_)) => self.to_number() == other.to_number(),
            (Value::Array(_) | Value::Object(_), Value::String(_))
            | (Value::String(_), Value::Array(_) | Value::Object(_)) => {
                self.to_string() == other.to_string()
            }
            _ => self.strict_eq(other),
        }
    }

    /// Relational ordering: strings compare lexically, everything else numerically
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => self.to_number().partial_cmp(&other.to_number()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => fmt_number(*n, f),
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let rendered: Vec<String> = items
                    .iter()
                    .map(|item| match item {
                        Json::Null => String::new(),
                        other => Value::from_json(other).to_string(),
                    })
                    .collect();
                write!(f, "{}", rendered.join(","))
            }
            Value::Object(_) => write!(f, "[object Object]"),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        write!(f, "NaN")
    } else if n.is_infinite() {
        write!(f, "{}Infinity", if n < 0.0 { "-" } else { "" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{}", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness_follows_script_rules() {
        assert!(!Value::String(String::new()).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::Undefined.is_truthy());
        assert!(Value::String("0".into()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn loose_equality_coerces_numbers() {
        assert!(Value::String("5".into()).loose_eq(&Value::Number(5.0)));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
        assert!(!Value::String("5".into()).strict_eq(&Value::Number(5.0)));
    }

    #[test]
    fn displays_like_string_coercion() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::from_json(&json!([1, "a", null])).to_string(), "1,a,");
        assert_eq!(Value::from_json(&json!({ "a": 1 })).to_string(), "[object Object]");
    }
}
