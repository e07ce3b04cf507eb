//! Condition evaluation over JSON documents
//!
//! Supports plain equality, dotted paths, `$and`/`$or`/`$nor` and the
//! comparison operators `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex`.
//! Equality against an array field matches when any element is equal.

use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::{Map, Value};

use crate::store::error::{StoreError, StoreOperation};
use crate::store::query::{Filter, ID_CONDITION};
use crate::store::traits::StoreResult;

/// Field that holds document identity
pub(super) const ID_FIELD: &str = "id";

/// Value at a dotted `path`; `_id` reads the identity field
pub(super) fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let path = if path == ID_CONDITION { ID_FIELD } else { path };
    path.split('.').try_fold(doc, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Whether `doc` satisfies every condition and, when present, one pattern
pub(super) fn matches(doc: &Value, filter: &Filter) -> StoreResult<bool> {
    if !matches_conditions(doc, &filter.conditions)? {
        return Ok(false);
    }
    if filter.any_of.is_empty() {
        return Ok(true);
    }
    Ok(filter.any_of.iter().any(|field| {
        lookup(doc, &field.path)
            .and_then(Value::as_str)
            .is_some_and(|text| field.pattern.is_match(text))
    }))
}

fn matches_conditions(doc: &Value, conditions: &Map<String, Value>) -> StoreResult<bool> {
    for (key, condition) in conditions {
        let holds = match key.as_str() {
            "$and" => all_clauses(doc, condition)?.iter().all(|b| *b),
            "$or" => all_clauses(doc, condition)?.iter().any(|b| *b),
            "$nor" => !all_clauses(doc, condition)?.iter().any(|b| *b),
            op if op.starts_with('$') => {
                return Err(unknown_operator(op));
            }
            path => matches_condition(lookup(doc, path), condition)?,
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

fn all_clauses(doc: &Value, clauses: &Value) -> StoreResult<Vec<bool>> {
    let clauses = clauses.as_array().ok_or_else(|| {
        StoreError::invalid_path(StoreOperation::Find, "Logical operators take an array")
    })?;
    clauses
        .iter()
        .map(|clause| match clause {
            Value::Object(conditions) => matches_conditions(doc, conditions),
            other => Err(StoreError::invalid_path(
                StoreOperation::Find,
                format!("Invalid logical clause: {}", other),
            )),
        })
        .collect()
}

fn is_operator_object(condition: &Value) -> bool {
    match condition {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

fn matches_condition(value: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    let Some(operators) = condition.as_object().filter(|_| is_operator_object(condition)) else {
        return Ok(equals(value, condition));
    };

    for (op, arg) in operators {
        let holds = match op.as_str() {
            "$eq" => equals(value, arg),
            "$ne" => !equals(value, arg),
            "$gt" => ordered(value, arg, |o| o == Ordering::Greater),
            "$gte" => ordered(value, arg, |o| o != Ordering::Less),
            "$lt" => ordered(value, arg, |o| o == Ordering::Less),
            "$lte" => ordered(value, arg, |o| o != Ordering::Greater),
            "$in" => candidates(op, arg)?.iter().any(|c| equals(value, c)),
            "$nin" => !candidates(op, arg)?.iter().any(|c| equals(value, c)),
            "$exists" => truthy(arg) == value.is_some_and(|v| !v.is_null()),
            "$regex" => regex_matches(value, arg, operators.get("$options"))?,
            "$options" => true,
            other => return Err(unknown_operator(other)),
        };
        if !holds {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| scalar_eq(item, expected))
        }
        Some(actual) => scalar_eq(actual, expected),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn ordered(value: Option<&Value>, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| compare(item, bound).is_some_and(&accept)),
        Some(actual) => compare(actual, bound).is_some_and(accept),
        None => false,
    }
}

/// Ordering between two values of the same kind
pub(super) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn candidates<'a>(op: &str, arg: &'a Value) -> StoreResult<&'a Vec<Value>> {
    arg.as_array().ok_or_else(|| {
        StoreError::invalid_path(StoreOperation::Find, format!("{} takes an array", op))
    })
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => true,
    }
}

fn regex_matches(value: Option<&Value>, pattern: &Value, options: Option<&Value>) -> StoreResult<bool> {
    let pattern = pattern.as_str().ok_or_else(|| {
        StoreError::invalid_path(StoreOperation::Find, "$regex takes a string")
    })?;
    let flags = options.and_then(Value::as_str).unwrap_or_default();
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
        .map_err(|e| StoreError::invalid_path(StoreOperation::Find, e.to_string()))?;

    Ok(match value {
        Some(Value::String(text)) => regex.is_match(text),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .any(|text| regex.is_match(text)),
        _ => false,
    })
}

fn unknown_operator(op: &str) -> StoreError {
    StoreError::invalid_path(StoreOperation::Find, format!("Unknown operator {}", op))
}
