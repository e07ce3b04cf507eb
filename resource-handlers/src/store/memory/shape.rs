//! Ordering and projection of fetched documents

use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::matcher::{compare, lookup, ID_FIELD};
use crate::store::query::{OrderDirection, Projection, SortKey};

/// Rank of a value's kind when kinds differ; missing sorts first
fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => compare(x, y).unwrap_or_else(|| kind_rank(a).cmp(&kind_rank(b))),
        _ => kind_rank(a).cmp(&kind_rank(b)),
    }
}

/// Stable sort of `docs` by `keys` in priority order
pub(super) fn sort_documents(docs: &mut [Value], keys: &[SortKey]) {
    docs.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let ordering = compare_field(lookup(a, &key.field), lookup(b, &key.field));
                match key.direction {
                    OrderDirection::Ascending => ordering,
                    OrderDirection::Descending => ordering.reverse(),
                }
            })
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

/// Apply `projection` to a single document
///
/// Inclusion keeps the identity field and the top-level field of every listed
/// path, narrowed to the listed sub-path. Exclusion removes each listed path.
pub(super) fn project(doc: &mut Value, projection: &Projection) {
    let Value::Object(fields) = doc else {
        return;
    };
    match projection {
        Projection::Include(paths) => {
            let mut kept = Map::new();
            if let Some(id) = fields.get(ID_FIELD) {
                kept.insert(ID_FIELD.to_string(), id.clone());
            }
            for path in paths {
                copy_path(fields, &mut kept, path);
            }
            *fields = kept;
        }
        Projection::Exclude(paths) => {
            for path in paths {
                remove_path(fields, path);
            }
        }
    }
}

fn copy_path(from: &Map<String, Value>, into: &mut Map<String, Value>, path: &str) {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };
    let Some(value) = from.get(head) else {
        return;
    };
    match (rest, value) {
        (Some(rest), Value::Object(child)) => {
            let slot = into
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(slot) = slot {
                copy_path(child, slot, rest);
            }
        }
        _ => {
            into.insert(head.to_string(), value.clone());
        }
    }
}

fn remove_path(fields: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = fields.get_mut(head) {
                remove_path(child, rest);
            }
        }
        None => {
            fields.remove(path);
        }
    }
}
