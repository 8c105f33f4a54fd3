use super::parser::{BinaryOp, Expr, LogicalOp, UnaryOp};
use super::value::Value;
use super::ConditionError;
use crate::diagram::Answers;
use std::cmp::Ordering;

/// Evaluate an expression against a read-only view of the answers
pub fn eval(expr: &Expr, answers: &Answers) -> Result<Value, ConditionError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Answers => Ok(Value::Object(answers.clone())),
        Expr::Identifier(name) => answers
            .get(name)
            .map(Value::from_json)
            .ok_or_else(|| ConditionError::NotDefined(name.clone())),
        Expr::Member { object, property } => {
            let key = eval(property, answers)?;
            // Direct lookup keeps `answers['id']` from copying the whole map
            if matches!(**object, Expr::Answers) {
                return Ok(answers
                    .get(&key.to_string())
                    .map(Value::from_json)
                    .unwrap_or(Value::Undefined));
            }
            member(&eval(object, answers)?, &key)
        }
        Expr::Call {
            object,
            method,
            args,
        } => {
            let target = eval(object, answers)?;
            let args = args
                .iter()
                .map(|arg| eval(arg, answers))
                .collect::<Result<Vec<_>, _>>()?;
            call(&target, method, &args)
        }
        Expr::Unary { op, operand } => {
            let value = eval(operand, answers)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!value.is_truthy()),
                UnaryOp::Negate => Value::Number(-value.to_number()),
            })
        }
        Expr::Binary { op, left, right } => {
            let left = eval(left, answers)?;
            let right = eval(right, answers)?;
            Ok(binary(*op, &left, &right))
        }
        Expr::Logical { op, left, right } => {
            let left = eval(left, answers)?;
            match (op, left.is_truthy()) {
                (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(left),
                _ => eval(right, answers),
            }
        }
    }
}

fn member(target: &Value, key: &Value) -> Result<Value, ConditionError> {
    let name = key.to_string();
    match target {
        Value::Undefined | Value::Null => Err(ConditionError::NullProperty {
            property: name,
            target: target.type_name(),
        }),
        Value::Object(map) => Ok(map.get(&name).map(Value::from_json).unwrap_or(Value::Undefined)),
        Value::Array(items) if name == "length" => Ok(Value::Number(items.len() as f64)),
        Value::Array(items) => Ok(index(key)
            .and_then(|i| items.get(i))
            .map(Value::from_json)
            .unwrap_or(Value::Undefined)),
        Value::String(s) if name == "length" => Ok(Value::Number(s.chars().count() as f64)),
        Value::String(s) => Ok(index(key)
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or(Value::Undefined)),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Undefined),
    }
}

fn index(key: &Value) -> Option<usize> {
    let n = key.to_number();
    (n >= 0.0 && n.fract() == 0.0).then_some(n as usize)
}

fn call(target: &Value, method: &str, args: &[Value]) -> Result<Value, ConditionError> {
    let first = args.first().cloned().unwrap_or(Value::Undefined);
    match (target, method) {
        (Value::Undefined | Value::Null, _) => Err(ConditionError::NullProperty {
            property: method.to_string(),
            target: target.type_name(),
        }),
        (Value::String(s), "includes") => Ok(Value::Bool(s.contains(&first.to_string()))),
        (Value::String(s), "startsWith") => Ok(Value::Bool(s.starts_with(&first.to_string()))),
        (Value::String(s), "endsWith") => Ok(Value::Bool(s.ends_with(&first.to_string()))),
        (Value::String(s), "toLowerCase") => Ok(Value::String(s.to_lowercase())),
        (Value::String(s), "toUpperCase") => Ok(Value::String(s.to_uppercase())),
        (Value::String(s), "trim") => Ok(Value::String(s.trim().to_string())),
        (Value::Array(items), "includes") => Ok(Value::Bool(
            items
                .iter()
                .any(|item| Value::from_json(item).strict_eq(&first)),
        )),
        _ => Err(ConditionError::NotAFunction {
            method: method.to_string(),
            target: target.type_name(),
        }),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Subtract => Value::Number(left.to_number() - right.to_number()),
        BinaryOp::Multiply => Value::Number(left.to_number() * right.to_number()),
        BinaryOp::Divide => Value::Number(left.to_number() / right.to_number()),
        BinaryOp::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOp::Less => Value::Bool(left.compare(right) == Some(Ordering::Less)),
        BinaryOp::LessOrEqual => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Less | Ordering::Equal)
        )),
        BinaryOp::Greater => Value::Bool(left.compare(right) == Some(Ordering::Greater)),
        BinaryOp::GreaterOrEqual => Value::Bool(matches!(
            left.compare(right),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        BinaryOp::Equal => Value::Bool(left.loose_eq(right)),
        BinaryOp::NotEqual => Value::Bool(!left.loose_eq(right)),
        BinaryOp::StrictEqual => Value::Bool(left.strict_eq(right)),
        BinaryOp::StrictNotEqual => Value::Bool(!left.strict_eq(right)),
    }
}

/// `+` concatenates as soon as either side is not a number-like primitive
fn add(left: &Value, right: &Value) -> Value {
    let concatenates = |v: &Value| matches!(v, Value::String(_) | Value::Array(_) | Value::Object(_));
    if concatenates(left) || concatenates(right) {
        Value::String(format!("{}{}", left, right))
    } else {
        Value::Number(left.to_number() + right.to_number())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::parser::parse;
    use serde_json::json;

    fn run(source: &str, answers: serde_json::Value) -> Result<Value, ConditionError> {
        let answers = answers.as_object().cloned().unwrap_or_default();
        eval(&parse(source).unwrap(), &answers)
    }

    #[test]
    fn reads_nested_answers() {
        let answers = json!({ "api": { "items": [{ "name": "first" }], "count": 3 } });
        assert_eq!(
            run("answers.api.items[0].name", answers.clone()).unwrap(),
            Value::String("first".into())
        );
        assert_eq!(run("api.count * 2", answers.clone()).unwrap(), Value::Number(6.0));
        assert_eq!(run("answers['api'].items.length", answers).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn missing_answers_are_undefined_but_bare_names_must_exist() {
        assert_eq!(run("answers['nope']", json!({})).unwrap(), Value::Undefined);
        assert_eq!(
            run("answers.nope === undefined", json!({})).unwrap(),
            Value::Bool(true)
        );
        assert!(matches!(
            run("nope == 1", json!({})),
            Err(ConditionError::NotDefined(name)) if name == "nope"
        ));
    }

    #[test]
    fn property_of_missing_answer_is_an_error() {
        assert!(matches!(
            run("answers.q1.length > 2", json!({})),
            Err(ConditionError::NullProperty { target: "undefined", .. })
        ));
        assert!(matches!(
            run("answers.q1.includes('x')", json!({ "q1": null })),
            Err(ConditionError::NullProperty { target: "null", .. })
        ));
    }

    #[test]
    fn logical_operators_short_circuit() {
        // The right-hand side would fail if it were evaluated
        assert_eq!(
            run("answers.q1 && answers.q1.missing.deeper", json!({})).unwrap(),
            Value::Undefined
        );
        assert_eq!(
            run("answers.q1 || 'fallback'", json!({})).unwrap(),
            Value::String("fallback".into())
        );
    }

    #[test]
    fn string_helpers_and_arithmetic() {
        let answers = json!({ "q1": "  Yes please ", "age": "42", "tags": ["a", "b"] });
        assert_eq!(
            run("answers.q1.trim().toLowerCase().startsWith('yes')", answers.clone()).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(run("answers.age >= 18", answers.clone()).unwrap(), Value::Bool(true));
        assert_eq!(run("answers.age + 1", answers.clone()).unwrap(), Value::String("421".into()));
        assert_eq!(run("answers.age - 1", answers.clone()).unwrap(), Value::Number(41.0));
        assert_eq!(run("answers.tags.includes('b')", answers.clone()).unwrap(), Value::Bool(true));
        assert!(matches!(
            run("answers.age.push(1)", answers),
            Err(ConditionError::NotAFunction { .. })
        ));
    }
}
