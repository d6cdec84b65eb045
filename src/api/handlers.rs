//! API request handlers.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::types::TaskId;
use crate::orchestrator::Orchestrator;
use crate::storage::Storage;
use crate::worker::WorkerHandle;

use super::errors::ApiError;
use super::responses::{
    HealthResponse, MessageResponse, SubmitRequest, SubmitResponse, TaskDetailResponse,
    TaskListResponse, WorkerStateResponse,
};

/// Shared application state for API handlers.
pub struct ApiState<S: Storage> {
    pub orchestrator: Orchestrator<S>,
    pub worker: WorkerHandle,
}

impl<S: Storage> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            orchestrator: self.orchestrator.clone(),
            worker: self.worker.clone(),
        }
    }
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::NotFound(format!("task not found: {}", raw)))
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Get worker state.
pub async fn get_worker_state<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Json<WorkerStateResponse> {
    Json(WorkerStateResponse::new(
        state.worker.state().await,
        state.worker.current_task().await,
        state.orchestrator.queue_depth().await,
        state.orchestrator.is_accepting().await,
    ))
}

/// Submit a new task.
pub async fn submit_task<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let task = state.orchestrator.create_task(&request.query).await?;
    Ok(Json(SubmitResponse::from(&task)))
}

/// List all tasks.
pub async fn list_tasks<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
) -> Result<Json<TaskListResponse>, ApiError> {
    let tasks = state.orchestrator.list_tasks().await?;
    Ok(Json(TaskListResponse::from(&tasks)))
}

/// Get a specific task.
pub async fn get_task<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskDetailResponse>, ApiError> {
    let id = parse_task_id(&task_id)?;
    let task = state.orchestrator.get_task(&id).await?;
    Ok(Json(TaskDetailResponse::from(task)))
}

/// Delete a task.
pub async fn delete_task<S: Storage + 'static>(
    State(state): State<ApiState<S>>,
    Path(task_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_task_id(&task_id)?;
    state.orchestrator.delete_task(&id).await?;
    Ok(Json(MessageResponse {
        message: "Task deleted successfully".to_string(),
    }))
}
