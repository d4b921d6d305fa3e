/// Task endpoints
///
/// All endpoints require JWT authentication. Timestamps are epoch
/// milliseconds.
///
/// # Endpoints
///
/// - `POST /v1/tasks` - Create a personal task, or a group task when `group_id` is set
/// - `GET /v1/tasks` - List the caller's personal tasks
/// - `GET /v1/tasks/assigned` - List group tasks assigned to the caller
/// - `GET /v1/tasks/:id` - Get task
/// - `PUT /v1/tasks/:id` - Update task (optionally reopening it)
/// - `DELETE /v1/tasks/:id` - Delete task
/// - `PUT /v1/tasks/:id/assignees` - Replace the assignees of a group task
/// - `POST /v1/tasks/:id/complete` - Mark a personal task done or not done
/// - `POST /v1/tasks/:id/confirm` - Confirm the caller's part of a group task
/// - `POST /v1/tasks/:id/finalize` - Close a fully confirmed group task
/// - `GET /v1/tasks/:id/completion` - Completion summary

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use teamtask_shared::auth::middleware::AuthContext;
use teamtask_shared::models::task::{CompletionState, Priority, Task};
use teamtask_shared::services::{CompletionSummary, TaskDraft, TaskUpdate};
use uuid::Uuid;
use validator::Validate;

/// Task with its derived display fields
#[derive(Debug, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: Task,

    /// Completion state derived from the confirmations
    pub completion_state: CompletionState,

    /// Priority level derived from the raw priority
    pub priority_level: Priority,

    /// Display color for the priority
    pub priority_color: &'static str,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let priority_level = task.priority_level();
        Self {
            completion_state: task.completion_state(),
            priority_level,
            priority_color: priority_level.color(),
            task,
        }
    }
}

/// Task list response
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskView>,
}

impl From<Vec<Task>> for TaskListResponse {
    fn from(tasks: Vec<Task>) -> Self {
        Self {
            tasks: tasks.into_iter().map(TaskView::from).collect(),
        }
    }
}

/// Create task request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    /// Due date (epoch milliseconds)
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub due_date: Option<DateTime<Utc>>,

    /// 1 = High, 2 = Medium, 3 = Low
    #[validate(range(min = 1, max = 3, message = "Priority must be 1, 2 or 3"))]
    pub priority: Option<i32>,

    pub labels: Option<BTreeSet<Uuid>>,

    /// Owning group; makes this a group task
    pub group_id: Option<Uuid>,

    /// Assignees (group tasks only)
    pub assigned_to: Option<BTreeSet<String>>,
}

/// Update task request; omitted fields are unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTaskRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    /// New due date (epoch milliseconds)
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub due_date: Option<DateTime<Utc>>,

    /// Removes the due date
    #[serde(default)]
    pub clear_due_date: bool,

    #[validate(range(min = 1, max = 3, message = "Priority must be 1, 2 or 3"))]
    pub priority: Option<i32>,

    pub labels: Option<BTreeSet<Uuid>>,

    /// Clears every confirmation and the completion flag
    #[serde(default)]
    pub reopen: bool,
}

/// Reassign request
#[derive(Debug, Deserialize)]
pub struct ReassignTaskRequest {
    pub assigned_to: BTreeSet<String>,
}

/// Personal completion request
#[derive(Debug, Deserialize)]
pub struct SetCompletionRequest {
    pub completed: bool,
}

/// Confirmation response
#[derive(Debug, Serialize)]
pub struct ConfirmationResponse {
    pub task: TaskView,
    pub state: CompletionState,
    pub newly_confirmed: bool,
    pub finalized: bool,
}

/// Create task
///
/// # Endpoint
///
/// ```text
/// POST /v1/tasks
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// {
///   "title": "Prepare demo",
///   "priority": 1,
///   "due_date": 1767225600000,
///   "group_id": "uuid",
///   "assigned_to": ["user-a", "user-b"]
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Assignees outside the group, or assignees on a personal task
/// - `403 Forbidden`: Caller cannot manage the group's tasks
/// - `404 Not Found`: Group or label doesn't exist
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskView>)> {
    req.validate()?;

    let draft = TaskDraft {
        title: req.title,
        description: req.description.unwrap_or_default(),
        due_date: req.due_date,
        priority: req.priority,
        labels: req.labels.unwrap_or_default(),
    };

    let task = match req.group_id {
        Some(group_id) => {
            state
                .tasks
                .create_group_task(
                    &auth.user_id,
                    group_id,
                    draft,
                    req.assigned_to.unwrap_or_default(),
                )
                .await?
        }
        None => {
            if req.assigned_to.is_some() {
                return Err(ApiError::BadRequest(
                    "Personal tasks cannot have assignees".to_string(),
                ));
            }
            state.tasks.create_personal_task(&auth.user_id, draft).await?
        }
    };

    Ok((StatusCode::CREATED, Json(task.into())))
}

/// List the caller's personal tasks
pub async fn list_personal_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskListResponse>> {
    let tasks = state.tasks.list_personal_tasks(&auth.user_id).await?;
    Ok(Json(tasks.into()))
}

/// List group tasks assigned to the caller
pub async fn list_assigned_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<TaskListResponse>> {
    let tasks = state.tasks.list_assigned_tasks(&auth.user_id).await?;
    Ok(Json(tasks.into()))
}

/// Get task
///
/// # Errors
///
/// - `403 Forbidden`: Not the owner (personal) or not a group member (group)
/// - `404 Not Found`: Task doesn't exist
pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let task = state.tasks.get_task(&auth.user_id, task_id).await?;
    Ok(Json(task.into()))
}

/// Update task
///
/// Owner for personal tasks, leader or deputy for group tasks.
/// `"reopen": true` resets every confirmation and the completion flag.
pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    req.validate()?;

    let update = TaskUpdate {
        title: req.title,
        description: req.description,
        due_date: req.due_date,
        clear_due_date: req.clear_due_date,
        priority: req.priority,
        labels: req.labels,
        reopen: req.reopen,
    };

    let task = state.tasks.update_task(&auth.user_id, task_id, update).await?;
    Ok(Json(task.into()))
}

/// Delete task
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.tasks.delete_task(&auth.user_id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the assignees of a group task
///
/// Confirmations already recorded are kept.
pub async fn reassign_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<ReassignTaskRequest>,
) -> ApiResult<Json<TaskView>> {
    let task = state
        .tasks
        .reassign_task(&auth.user_id, task_id, req.assigned_to)
        .await?;
    Ok(Json(task.into()))
}

/// Mark a personal task done or not done
///
/// # Errors
///
/// - `409 Conflict`: The task is a group task
pub async fn set_completion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
    Json(req): Json<SetCompletionRequest>,
) -> ApiResult<Json<TaskView>> {
    let task = state
        .tasks
        .set_personal_completion(&auth.user_id, task_id, req.completed)
        .await?;
    Ok(Json(task.into()))
}

/// Confirm the caller's part of a group task
///
/// # Response
///
/// ```json
/// {
///   "task": { "id": "uuid", "completion_confirmations": { "user-a": true }, ... },
///   "state": "open",
///   "newly_confirmed": true,
///   "finalized": false
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not an assignee
/// - `409 Conflict`: Task already completed, or not a group task
pub async fn confirm_completion(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<ConfirmationResponse>> {
    let outcome = state.tasks.confirm_completion(&auth.user_id, task_id).await?;

    Ok(Json(ConfirmationResponse {
        task: outcome.task.into(),
        state: outcome.state,
        newly_confirmed: outcome.newly_confirmed,
        finalized: outcome.finalized,
    }))
}

/// Close a fully confirmed group task
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a leader or deputy
/// - `409 Conflict`: Not every assignee has confirmed, or already completed
pub async fn finalize_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<TaskView>> {
    let task = state.tasks.finalize_task(&auth.user_id, task_id).await?;
    Ok(Json(task.into()))
}

/// Completion summary
pub async fn completion_summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(task_id): Path<Uuid>,
) -> ApiResult<Json<CompletionSummary>> {
    let summary = state.tasks.completion_summary(&auth.user_id, task_id).await?;
    Ok(Json(summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_request_validation() {
        let req: CreateTaskRequest = serde_json::from_value(json!({
            "title": "",
            "priority": 7
        }))
        .unwrap();

        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("priority"));
    }

    #[test]
    fn test_create_request_due_date_millis() {
        let req: CreateTaskRequest = serde_json::from_value(json!({
            "title": "Dentist",
            "due_date": 1_700_000_000_000i64
        }))
        .unwrap();

        assert_eq!(req.due_date.map(|d| d.timestamp_millis()), Some(1_700_000_000_000));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_task_view_flattens_task() {
        let task = Task::personal("u1", "Buy milk").with_priority(1);
        let json = serde_json::to_value(TaskView::from(task)).unwrap();

        assert_eq!(json["title"], "Buy milk");
        assert_eq!(json["priority"], 1);
        assert_eq!(json["priority_level"], "high");
        assert_eq!(json["completion_state"], "open");
        assert!(json["created_at"].is_i64());
    }
}
