/// Label endpoints
///
/// # Endpoints
///
/// - `POST /v1/labels` - Create label
/// - `GET /v1/labels` - List the caller's labels
/// - `DELETE /v1/labels/:id` - Delete label (owner)

use crate::{app::AppState, error::ApiResult};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use teamtask_shared::auth::middleware::AuthContext;
use teamtask_shared::models::label::Label;
use uuid::Uuid;
use validator::Validate;

/// Create label request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLabelRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    /// `#RRGGBB`; defaults to grey
    pub color: Option<String>,
}

/// List labels response
#[derive(Debug, Serialize)]
pub struct ListLabelsResponse {
    pub labels: Vec<Label>,
}

/// Create label
///
/// # Errors
///
/// - `400 Bad Request`: Color is not `#RRGGBB`
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_label(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateLabelRequest>,
) -> ApiResult<(StatusCode, Json<Label>)> {
    req.validate()?;

    let label = state
        .labels
        .create_label(&auth.user_id, &req.name, req.color)
        .await?;
    Ok((StatusCode::CREATED, Json(label)))
}

pub async fn list_labels(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<ListLabelsResponse>> {
    let labels = state.labels.list_labels(&auth.user_id).await?;
    Ok(Json(ListLabelsResponse { labels }))
}

pub async fn delete_label(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(label_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.labels.delete_label(&auth.user_id, label_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
