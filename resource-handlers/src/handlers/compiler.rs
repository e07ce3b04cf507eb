//! Request to store-query compilation
//!
//! [`compile`] turns a bound request into a [`Query`] plus the page size the
//! envelope needs for `totalPages`. The rules apply independently, in order:
//!
//! 1. an `id` targets one document; otherwise the collection, filtered by
//!    the request's base conditions
//! 2. `page` forces a limit (the configured default when none is given) and
//!    skips `page * limit - limit` documents
//! 3. `limit` caps the result
//! 4. `sort` orders it
//! 5. `where` merges raw conditions, only when the `where` policy is on
//! 6. `populate` and 7. `select` pass through
//! 8. `search` ORs a case-insensitive pattern over every text field

use regex::RegexBuilder;

use super::error::{ApiError, ApiOperation};
use super::request::ResourceRequest;
use crate::config::HandlerSettings;
use crate::store::{FieldPattern, Model, Query};

/// Store query plus the limit used for pagination math
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// Fully specified query
    pub query: Query,
    /// Effective page size, if any
    pub limit: Option<u64>,
}

/// Compile `request` against `model`
///
/// # Errors
///
/// `BadRequest` when the search term is not a valid pattern, or when the
/// model declares no text fields to search.
pub fn compile(
    model: &dyn Model,
    request: &ResourceRequest,
    settings: &HandlerSettings,
) -> Result<CompiledQuery, ApiError> {
    let params = &request.query;
    let operation = if request.id.is_some() {
        ApiOperation::Get
    } else {
        ApiOperation::List
    };

    let mut query = match &request.id {
        Some(id) => Query::find_by_id(id.clone()),
        None => Query::find(request.conditions.clone().unwrap_or_default()),
    };

    let mut limit = params.limit;
    if let Some(page) = params.page {
        let page_size = *limit.get_or_insert(settings.pagination.default_limit);
        query = query.skip(page.saturating_mul(page_size).saturating_sub(page_size));
    }
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    if let Some(sort) = &params.sort {
        query = query.sort(sort.clone());
    }

    if let Some(conditions) = &params.where_clause {
        if settings.allow_where {
            query = query.merge_where(conditions);
        } else {
            tracing::warn!(
                model = %model.name(),
                "Ignoring `where` parameter; raw filters are disabled"
            );
        }
    }

    if let Some(populate) = &params.populate {
        query = query.populate(populate.clone());
    }

    if let Some(select) = &params.select {
        query = query.select(select.clone());
    }

    if let Some(term) = &params.search {
        let pattern = RegexBuilder::new(term)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ApiError::bad_request(operation, format!("Invalid search pattern: {}", e))
            })?;
        let patterns: Vec<FieldPattern> = model
            .schema()
            .text_paths()
            .map(|path| FieldPattern {
                path: path.to_string(),
                pattern: pattern.clone(),
            })
            .collect();
        if patterns.is_empty() {
            return Err(ApiError::bad_request(
                operation,
                format!("Model {} has no text fields to search", model.name()),
            ));
        }
        query = query.or(patterns);
    }

    tracing::debug!(
        model = %model.name(),
        target = ?query.target,
        conditions = %serde_json::Value::Object(query.filter.conditions.clone()),
        search_fields = query.filter.any_of.len(),
        skip = ?query.skip,
        limit = ?query.limit,
        "Compiled query"
    );

    Ok(CompiledQuery { query, limit })
}
