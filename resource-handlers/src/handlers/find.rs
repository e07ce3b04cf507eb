//! Find handler: count/fetch coordination and deep expansion

use crate::config::HandlerSettings;
use crate::store::{Found, Model};

use super::compiler::compile;
use super::error::{ApiError, ApiOperation};
use super::query::DeepPopulate;
use super::request::ResourceRequest;
use super::response::{Envelope, PaginationMeta, Reply};

/// Find one document by id, or a page of the collection
///
/// The count and the fetch run concurrently over the same filter; either
/// failing fails the request. A by-id miss, or a store that returns nothing
/// at all for a collection, is `NotFound`; an empty page is a success.
///
/// # Errors
///
/// `NotFound`, `BadBinding`, `BadRequest` (unusable search term) or
/// `StoreFailure`.
#[tracing::instrument(
    name = "find",
    skip_all,
    fields(path = %request.path, id = ?request.id)
)]
pub async fn find(request: ResourceRequest, settings: &HandlerSettings) -> Result<Reply, ApiError> {
    let operation = if request.id.is_some() {
        ApiOperation::Get
    } else {
        ApiOperation::List
    };
    let binding = request.resolve(operation)?;
    let model = binding.model();
    let compiled = compile(model.as_ref(), &request, settings)?;

    let (count, result) = tokio::try_join!(
        model.count(&compiled.query.filter),
        model.exec(&compiled.query)
    )
    .map_err(|e| ApiError::from(e).with_operation(operation))?;

    let found = result.ok_or_else(|| {
        ApiError::not_found(
            operation,
            binding.name(),
            request.id.clone().unwrap_or_default(),
        )
    })?;

    let found = deep_populate(model.as_ref(), found, &request.query.deep_populate)
        .await
        .map_err(|e| e.with_operation(operation))?;

    tracing::debug!(
        model = %binding.name(),
        returned = found.len(),
        total = count,
        "Find completed"
    );

    let envelope = match found {
        Found::One(doc) => Envelope::single(binding.name(), doc),
        Found::Many(docs) => Envelope::list(
            binding.name(),
            docs,
            PaginationMeta::new(count, compiled.limit),
            &settings.pagination,
        ),
    };
    Ok(envelope.into())
}

/// Apply `steps` in order, each over the output of the previous one
///
/// Each step runs through the model it names, so a later step may expand
/// references that an earlier one brought in. No steps leaves `found`
/// untouched.
///
/// # Errors
///
/// The first failing step aborts the fold; an unknown model name is a
/// `StoreFailure`.
pub async fn deep_populate(
    model: &dyn Model,
    found: Found,
    steps: &[DeepPopulate],
) -> Result<Found, ApiError> {
    let mut acc = found;
    for step in steps {
        let target = model.model(&step.model_name)?;
        acc = target.populate(acc, &step.populate).await?;
        tracing::debug!(model = %step.model_name, "Deep populate step applied");
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use crate::handlers::ApiErrorKind;
    use crate::store::{
        Document, Filter, Populate, Query, Schema, StoreError, StoreErrorKind, StoreOperation,
        StoreResult,
    };

    /// Which store call misbehaves
    #[derive(Clone, Copy)]
    enum Fault {
        Count,
        Exec,
        NoResult,
        Healthy,
    }

    struct Outage {
        fault: Fault,
        schema: Schema,
    }

    impl Outage {
        fn bound(fault: Fault) -> ResourceRequest {
            let model = Arc::new(Self {
                fault,
                schema: Schema::new(),
            });
            ResourceRequest::new("/v1/things").with_model(model)
        }
    }

    #[async_trait]
    impl Model for Outage {
        fn name(&self) -> &str {
            "Thing"
        }

        fn schema(&self) -> &Schema {
            &self.schema
        }

        fn model(&self, name: &str) -> StoreResult<Arc<dyn Model>> {
            Err(StoreError::missing_model(name))
        }

        async fn count(&self, _filter: &Filter) -> StoreResult<u64> {
            match self.fault {
                Fault::Count => Err(StoreError::backend(StoreOperation::Count, "count down")),
                _ => Ok(3),
            }
        }

        async fn exec(&self, _query: &Query) -> StoreResult<Option<Found>> {
            match self.fault {
                Fault::Exec => Err(StoreError::backend(StoreOperation::Find, "fetch down")),
                Fault::NoResult => Ok(None),
                _ => Ok(Some(Found::Many(vec![serde_json::json!({"id": "t1"})]))),
            }
        }

        async fn populate(&self, found: Found, _populate: &Populate) -> StoreResult<Found> {
            Ok(found)
        }

        async fn find_by_id(&self, _id: &str) -> StoreResult<Option<Box<dyn Document>>> {
            Ok(None)
        }

        fn new_document(&self, _fields: Map<String, Value>) -> StoreResult<Box<dyn Document>> {
            Err(StoreError::backend(StoreOperation::Save, "read-only"))
        }
    }

    #[tokio::test]
    async fn test_failing_count_fails_request() {
        let err = find(Outage::bound(Fault::Count), &HandlerSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::StoreFailure);
        assert_eq!(err.operation, ApiOperation::List);
        assert_eq!(err.message, "count down");
    }

    #[tokio::test]
    async fn test_failing_fetch_fails_request() {
        let err = find(Outage::bound(Fault::Exec), &HandlerSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::StoreFailure);
        assert_eq!(err.store_kind, Some(StoreErrorKind::Backend));
        assert_eq!(err.message, "fetch down");
    }

    #[tokio::test]
    async fn test_missing_collection_result_is_not_found() {
        let err = find(Outage::bound(Fault::NoResult), &HandlerSettings::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ApiErrorKind::NotFound);
        assert_eq!(err.operation, ApiOperation::List);
    }

    #[tokio::test]
    async fn test_healthy_store_reports_count() {
        let reply = find(Outage::bound(Fault::Healthy), &HandlerSettings::default())
            .await
            .unwrap();
        let envelope = reply.envelope().unwrap();
        assert_eq!(envelope.get("Thing"), Some(&serde_json::json!([{"id": "t1"}])));
        assert_eq!(envelope.get("meta").unwrap()["totalDocs"], 3);
    }

    #[tokio::test]
    async fn test_deep_populate_unknown_model() {
        let steps = vec![DeepPopulate {
            model_name: "Ghost".to_string(),
            populate: Populate::Paths("owner".to_string()),
        }];
        let model = Outage {
            fault: Fault::Healthy,
            schema: Schema::new(),
        };
        let err = deep_populate(&model, Found::Many(vec![]), &steps)
            .await
            .unwrap_err();
        assert_eq!(err.store_kind, Some(StoreErrorKind::MissingModel));
    }
}
