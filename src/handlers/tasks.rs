// handlers/tasks.rs - /api/tasks handlers

use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::{ApiJson, ApiPath, ApiQuery};
use crate::database::models::{Task, TaskStatus};
use crate::middleware::{ApiResponse, ApiResult, RequestIdentity};
use crate::services::clients::DeletedCount;
use crate::services::tasks::{CreateTask, DueWindow, UpdateTask};
use crate::services::TaskService;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: TaskStatus,
}

/// GET /api/tasks[?status=]
pub async fn list(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Vec<Task>> {
    let tasks = service.list_all_for_owner(identity.user_id, query.status).await?;
    Ok(ApiResponse::success(tasks))
}

async fn due_in(service: &TaskService, identity: &RequestIdentity, window: DueWindow) -> ApiResult<Vec<Task>> {
    let tasks = service.due_in(identity.user_id, window, Utc::now()).await?;
    Ok(ApiResponse::success(tasks))
}

/// GET /api/tasks/today
pub async fn today(State(service): State<TaskService>, identity: RequestIdentity) -> ApiResult<Vec<Task>> {
    due_in(&service, &identity, DueWindow::Today).await
}

/// GET /api/tasks/overdue
pub async fn overdue(State(service): State<TaskService>, identity: RequestIdentity) -> ApiResult<Vec<Task>> {
    due_in(&service, &identity, DueWindow::Overdue).await
}

/// GET /api/tasks/week
pub async fn week(State(service): State<TaskService>, identity: RequestIdentity) -> ApiResult<Vec<Task>> {
    due_in(&service, &identity, DueWindow::Week).await
}

/// POST /api/tasks
pub async fn create(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiJson(payload): ApiJson<CreateTask>,
) -> ApiResult<Task> {
    let task = service.create(identity.user_id, payload).await?;
    Ok(ApiResponse::created(task))
}

/// DELETE /api/tasks
pub async fn delete_all(State(service): State<TaskService>, identity: RequestIdentity) -> ApiResult<DeletedCount> {
    let deleted = service.delete_all_for_owner(identity.user_id).await?;
    Ok(ApiResponse::success(DeletedCount { deleted }))
}

/// GET /api/tasks/:id
pub async fn show(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Task> {
    Ok(ApiResponse::success(service.get_one(id, identity.user_id).await?))
}

/// PUT /api/tasks/:id
pub async fn update(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<UpdateTask>,
) -> ApiResult<Task> {
    Ok(ApiResponse::success(service.update(id, identity.user_id, patch).await?))
}

/// DELETE /api/tasks/:id - also removes subtasks
pub async fn delete(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<()> {
    service.delete(id, identity.user_id).await?;
    Ok(ApiResponse::no_content())
}

/// PUT /api/tasks/:id/complete
pub async fn complete(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Task> {
    Ok(ApiResponse::success(service.complete(id, identity.user_id).await?))
}

/// PUT /api/tasks/:id/status?status=
pub async fn set_status(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> ApiResult<Task> {
    let task = service.update_status(id, identity.user_id, query.status).await?;
    Ok(ApiResponse::success(task))
}

/// GET /api/tasks/:id/subtasks
pub async fn subtasks(
    State(service): State<TaskService>,
    identity: RequestIdentity,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Vec<Task>> {
    Ok(ApiResponse::success(service.subtasks(id, identity.user_id).await?))
}
