//! Reference expansion
//!
//! A directive path is resolved to a target collection by walking the
//! declared references of the populating model's schema. When the path
//! declares no reference, the populating model itself is the target; this is
//! what lets a caller expand `user.role` by asking the `Role` model directly.
//!
//! Expansion replaces identity strings at the path with the referenced
//! documents. Intermediate segments must already hold expanded documents;
//! ids that resolve to nothing become `null` (single) or are dropped (lists).

use std::sync::Arc;

use serde_json::Value;

use super::shape::project;
use super::{Collection, MemoryStore};
use crate::store::error::StoreOperation;
use crate::store::query::{Populate, PopulateOptions};
use crate::store::traits::{Found, StoreResult};

pub(super) fn populate_found(
    store: &MemoryStore,
    owner: &Arc<Collection>,
    mut found: Found,
    populate: &Populate,
) -> StoreResult<Found> {
    for directive in populate.directives() {
        let target = target_collection(store, owner, &directive)?;
        let projection = directive
            .select
            .as_ref()
            .map(|select| select.projection())
            .transpose()
            .map_err(|e| e.with_operation(StoreOperation::Populate))?;

        let referenced = target.read(StoreOperation::Populate)?;
        let resolve = |id: &str| -> Option<Value> {
            let mut doc = referenced
                .iter()
                .find(|doc| super::document_id(doc) == Some(id))?
                .clone();
            if let Some(projection) = &projection {
                project(&mut doc, projection);
            }
            Some(doc)
        };

        let segments: Vec<&str> = directive.path.split('.').collect();
        for doc in found.documents_mut() {
            expand(doc, &segments, &resolve);
        }

        tracing::debug!(
            model = %owner.name,
            path = %directive.path,
            target = %target.name,
            "Populated path"
        );
    }
    Ok(found)
}

fn target_collection(
    store: &MemoryStore,
    owner: &Arc<Collection>,
    directive: &PopulateOptions,
) -> StoreResult<Arc<Collection>> {
    if let Some(model) = &directive.model {
        return store
            .collection(model)
            .map_err(|e| e.with_operation(StoreOperation::Populate));
    }

    let segments: Vec<&str> = directive.path.split('.').collect();
    let mut current = Arc::clone(owner);
    let mut start = 0;
    for end in 1..=segments.len() {
        let prefix = segments[start..end].join(".");
        let Some(model) = current.schema.reference(&prefix).map(str::to_string) else {
            continue;
        };
        current = store
            .collection(&model)
            .map_err(|e| e.with_operation(StoreOperation::Populate))?;
        if end == segments.len() {
            return Ok(current);
        }
        start = end;
    }
    Ok(Arc::clone(owner))
}

fn expand(doc: &mut Value, segments: &[&str], resolve: &impl Fn(&str) -> Option<Value>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(field) = doc.as_object_mut().and_then(|fields| fields.get_mut(*head)) else {
        return;
    };

    if !rest.is_empty() {
        match field {
            Value::Array(items) => items.iter_mut().for_each(|item| expand(item, rest, resolve)),
            Value::Object(_) => expand(field, rest, resolve),
            _ => {}
        }
        return;
    }

    match field {
        Value::String(id) => {
            let replacement = resolve(id).unwrap_or(Value::Null);
            *field = replacement;
        }
        Value::Array(items) => {
            let expanded = items
                .drain(..)
                .filter_map(|item| match item {
                    Value::String(id) => resolve(&id),
                    other => Some(other),
                })
                .collect();
            *items = expanded;
        }
        _ => {}
    }
}
