// handlers/auth.rs - public /api/auth handlers on the users service

use axum::extract::State;

use crate::api::ApiJson;
use crate::database::models::UserProfile;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::users::{LoginRequest, LoginResponse, RegisterUser};
use crate::services::UserService;

/// POST /api/auth/register
pub async fn register(
    State(service): State<UserService>,
    ApiJson(payload): ApiJson<RegisterUser>,
) -> ApiResult<UserProfile> {
    let profile = service.register(payload).await?;
    Ok(ApiResponse::created(profile))
}

/// POST /api/auth/login
pub async fn login(
    State(service): State<UserService>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<LoginResponse> {
    Ok(ApiResponse::success(service.login(payload).await?))
}
