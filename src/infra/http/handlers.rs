use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::domain::entities::TaskRecord;

use super::error::ApiError;
use super::models::{
    CreateTaskRequest, DeletedResponse, HealthResponse, MessageResponse, UpdateTaskRequest,
};
use super::state::HttpState;

pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to CQRS Task Management API",
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

pub async fn create_task(
    State(state): State<HttpState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskRecord>), ApiError> {
    let Json(request) = payload?;
    let task = state.commands.create_task(request.into()).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn list_tasks(State(state): State<HttpState>) -> Result<Json<Vec<TaskRecord>>, ApiError> {
    let tasks = state.queries.list_tasks().await?;
    Ok(Json(tasks))
}

pub async fn get_task(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<TaskRecord>, ApiError> {
    match state.queries.get_task(&id).await? {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::task_not_found()),
    }
}

pub async fn update_task(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<Json<TaskRecord>, ApiError> {
    let Json(request) = payload?;
    match state.commands.update_task(&id, request.into()).await? {
        Some(task) => Ok(Json(task)),
        None => Err(ApiError::task_not_found()),
    }
}

pub async fn delete_task(
    State(state): State<HttpState>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    if state.commands.delete_task(&id).await? {
        Ok(Json(DeletedResponse {
            status: "deleted",
            id,
        }))
    } else {
        Err(ApiError::task_not_found())
    }
}
