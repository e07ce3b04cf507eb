//! Create, update and remove handlers

use crate::config::{HandlerSettings, ResponsePolicy};
use crate::store::Document;

use super::error::{ApiError, ApiOperation};
use super::request::{ResourceBinding, ResourceRequest};
use super::response::{Envelope, Reply};

fn respond(policy: ResponsePolicy, binding: &ResourceBinding, doc: &dyn Document) -> Reply {
    if policy.echoes() {
        Envelope::single(binding.name(), doc.to_value()).into()
    } else {
        Reply::NoContent
    }
}

fn touch(doc: &mut dyn Document, request: &ResourceRequest) {
    if let Some(hook) = doc.touch_hook() {
        hook.touch(request.credentials.as_ref());
    }
}

async fn load(
    operation: ApiOperation,
    binding: &ResourceBinding,
    request: &ResourceRequest,
) -> Result<Box<dyn Document>, ApiError> {
    let id = request
        .id
        .as_deref()
        .ok_or_else(|| ApiError::validation_failed(operation, "\"id\" is required"))?;
    binding
        .model()
        .find_by_id(id)
        .await
        .map_err(|e| ApiError::from(e).with_operation(operation))?
        .ok_or_else(|| ApiError::not_found(operation, binding.name(), id))
}

/// Build a document from the payload, touch it and save it
///
/// # Errors
///
/// `NotFound`, `BadBinding`, or `StoreFailure` from the save.
#[tracing::instrument(name = "create", skip_all, fields(path = %request.path))]
pub async fn create(request: ResourceRequest, settings: &HandlerSettings) -> Result<Reply, ApiError> {
    let operation = ApiOperation::Create;
    let binding = request.resolve(operation)?;
    let mut doc = binding
        .model()
        .new_document(request.payload_for(binding))
        .map_err(|e| ApiError::from(e).with_operation(operation))?;

    touch(doc.as_mut(), &request);
    doc.save()
        .await
        .map_err(|e| ApiError::from(e).with_operation(operation))?;

    tracing::info!(model = %binding.name(), id = %doc.id(), "Document created");
    Ok(respond(settings.on_create, binding, doc.as_ref()))
}

/// Merge the payload into an existing document and save it
///
/// Only the supplied fields change.
///
/// # Errors
///
/// `NotFound` when the id matches nothing; `StoreFailure` for a malformed id
/// or a failed save.
#[tracing::instrument(name = "update", skip_all, fields(path = %request.path, id = ?request.id))]
pub async fn update(request: ResourceRequest, settings: &HandlerSettings) -> Result<Reply, ApiError> {
    let operation = ApiOperation::Update;
    let binding = request.resolve(operation)?;
    let mut doc = load(operation, binding, &request).await?;

    doc.set(request.payload_for(binding));
    touch(doc.as_mut(), &request);
    doc.save()
        .await
        .map_err(|e| ApiError::from(e).with_operation(operation))?;

    tracing::info!(model = %binding.name(), id = %doc.id(), "Document updated");
    Ok(respond(settings.on_update, binding, doc.as_ref()))
}

/// Delete an existing document
///
/// # Errors
///
/// `NotFound` when the id matches nothing; `StoreFailure` otherwise.
#[tracing::instrument(name = "remove", skip_all, fields(path = %request.path, id = ?request.id))]
pub async fn remove(request: ResourceRequest, settings: &HandlerSettings) -> Result<Reply, ApiError> {
    let operation = ApiOperation::Remove;
    let binding = request.resolve(operation)?;
    let mut doc = load(operation, binding, &request).await?;

    doc.remove()
        .await
        .map_err(|e| ApiError::from(e).with_operation(operation))?;

    tracing::info!(model = %binding.name(), id = %doc.id(), "Document removed");
    Ok(respond(settings.on_remove, binding, doc.as_ref()))
}
