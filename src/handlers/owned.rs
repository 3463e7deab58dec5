// handlers/owned.rs - /api/<resource> handlers shared by notes and events
//
// Generic over the record type; each service instantiates them with its own
// record and payload types when building its router.

use serde::de::DeserializeOwned;
use uuid::Uuid;

use axum::extract::State;

use crate::api::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult, RequestIdentity};
use crate::ownership::OwnedRecord;
use crate::services::clients::DeletedCount;
use crate::services::{CreatePayload, OwnedResourceService, PatchPayload};

/// GET /api/<resource>
pub async fn list<R: OwnedRecord>(
    State(service): State<OwnedResourceService<R>>,
    identity: RequestIdentity,
) -> ApiResult<Vec<R>> {
    let records = service.list_all_for_owner(identity.user_id).await?;
    Ok(ApiResponse::success(records))
}

/// POST /api/<resource>
pub async fn create<R, P>(
    State(service): State<OwnedResourceService<R>>,
    identity: RequestIdentity,
    ApiJson(payload): ApiJson<P>,
) -> ApiResult<R>
where
    R: OwnedRecord,
    P: CreatePayload<R> + DeserializeOwned + 'static,
{
    let record = service.create(identity.user_id, payload).await?;
    Ok(ApiResponse::created(record))
}

/// DELETE /api/<resource> - remove everything the requester owns
pub async fn delete_all<R: OwnedRecord>(
    State(service): State<OwnedResourceService<R>>,
    identity: RequestIdentity,
) -> ApiResult<DeletedCount> {
    let deleted = service.delete_all_for_owner(identity.user_id).await?;
    Ok(ApiResponse::success(DeletedCount { deleted }))
}

/// GET /api/<resource>/:id
pub async fn show<R: OwnedRecord>(
    State(service): State<OwnedResourceService<R>>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<R> {
    let record = service.get_one(id, identity.user_id).await?;
    Ok(ApiResponse::success(record))
}

/// PUT /api/<resource>/:id
pub async fn update<R, P>(
    State(service): State<OwnedResourceService<R>>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<P>,
) -> ApiResult<R>
where
    R: OwnedRecord,
    P: PatchPayload<R> + DeserializeOwned + 'static,
{
    let record = service.update(id, identity.user_id, patch).await?;
    Ok(ApiResponse::success(record))
}

/// DELETE /api/<resource>/:id
pub async fn delete<R: OwnedRecord>(
    State(service): State<OwnedResourceService<R>>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    service.delete(id, identity.user_id).await?;
    Ok(ApiResponse::no_content())
}
