// handlers/users.rs - /api/users handlers

use axum::extract::State;
use uuid::Uuid;

use crate::api::{ApiJson, ApiPath};
use crate::database::models::{UserPreferences, UserProfile};
use crate::middleware::{ApiResponse, ApiResult, RequestIdentity};
use crate::services::users::{ChangePassword, UpdatePreferences, UpdateProfile};
use crate::services::{PurgeReport, UserService};

/// GET /api/users/me
pub async fn me(State(service): State<UserService>, identity: RequestIdentity) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(service.me(identity.user_id).await?))
}

/// PUT /api/users/me
pub async fn update_me(
    State(service): State<UserService>,
    identity: RequestIdentity,
    ApiJson(patch): ApiJson<UpdateProfile>,
) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(service.update_me(identity.user_id, patch).await?))
}

/// DELETE /api/users/me - purge owned data everywhere, then drop the account
pub async fn delete_me(State(service): State<UserService>, identity: RequestIdentity) -> ApiResult<PurgeReport> {
    Ok(ApiResponse::success(service.delete_account(identity.user_id).await?))
}

/// PUT /api/users/me/password
pub async fn change_password(
    State(service): State<UserService>,
    identity: RequestIdentity,
    ApiJson(payload): ApiJson<ChangePassword>,
) -> ApiResult<()> {
    service.change_password(identity.user_id, payload).await?;
    Ok(ApiResponse::no_content())
}

/// PUT /api/users/me/deactivate
pub async fn deactivate(State(service): State<UserService>, identity: RequestIdentity) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(service.deactivate(identity.user_id).await?))
}

/// GET /api/users/me/preferences
pub async fn preferences(
    State(service): State<UserService>,
    identity: RequestIdentity,
) -> ApiResult<UserPreferences> {
    Ok(ApiResponse::success(service.preferences(identity.user_id).await?))
}

/// PUT /api/users/me/preferences
pub async fn update_preferences(
    State(service): State<UserService>,
    identity: RequestIdentity,
    ApiJson(patch): ApiJson<UpdatePreferences>,
) -> ApiResult<UserPreferences> {
    let prefs = service.update_preferences(identity.user_id, patch).await?;
    Ok(ApiResponse::success(prefs))
}

/// GET /api/users/:id
pub async fn show(
    State(service): State<UserService>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<UserProfile> {
    Ok(ApiResponse::success(service.get_by_id(id, identity.user_id).await?))
}
