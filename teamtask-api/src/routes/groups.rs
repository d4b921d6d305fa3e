/// Group endpoints
///
/// All endpoints require JWT authentication.
///
/// # Endpoints
///
/// - `POST /v1/groups` - Create group (caller becomes leader)
/// - `GET /v1/groups` - List groups the caller belongs to or is invited to
/// - `GET /v1/groups/:id` - Get group
/// - `DELETE /v1/groups/:id` - Delete group and its tasks (leader)
/// - `GET /v1/groups/:id/permissions` - Caller's role and capabilities
/// - `POST /v1/groups/:id/invitations` - Invite a user (leader)
/// - `POST /v1/groups/:id/invitations/:user_id/accept` - Accept (invitee or leader)
/// - `POST /v1/groups/:id/invitations/:user_id/decline` - Decline (invitee or leader)
/// - `PUT /v1/groups/:id/members/:user_id/role` - Set role (leader)
/// - `DELETE /v1/groups/:id/members/:user_id` - Remove member (leader) or leave (self)
/// - `GET /v1/groups/:id/tasks` - List group tasks (members)

use crate::{error::ApiResult, app::AppState, routes::tasks::TaskListResponse};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use teamtask_shared::auth::middleware::AuthContext;
use teamtask_shared::models::group::{Group, GroupRole};
use teamtask_shared::services::{GroupListing, GroupPermissions};
use uuid::Uuid;
use validator::Validate;

/// Create group request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

/// Invite request
#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    /// Identity provider user ID of the invitee
    #[validate(length(min = 1, max = 128, message = "User ID must be 1-128 characters"))]
    pub user_id: String,
}

/// Set role request
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    /// `deputy` or `member`
    pub role: GroupRole,
}

/// Create group
///
/// # Endpoint
///
/// ```text
/// POST /v1/groups
/// Authorization: Bearer <jwt_token>
/// Content-Type: application/json
///
/// { "name": "Launch team", "description": "Release prep" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<Group>)> {
    req.validate()?;

    let group = state
        .groups
        .create_group(
            &auth.user_id,
            &req.name,
            req.description.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(group)))
}

/// List groups the caller belongs to, plus pending invitations
pub async fn list_groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<GroupListing>> {
    Ok(Json(state.groups.list_groups(&auth.user_id).await?))
}

/// Get group
///
/// Visible to members and to users with a pending invitation.
pub async fn get_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<Group>> {
    Ok(Json(state.groups.get_group(&auth.user_id, group_id).await?))
}

/// Delete group and all of its tasks
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not the leader
/// - `404 Not Found`: Group doesn't exist
pub async fn delete_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.groups.delete_group(&auth.user_id, group_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Caller's role and capabilities
///
/// # Response
///
/// ```json
/// {
///   "group_id": "uuid",
///   "user_id": "user-b",
///   "role": "deputy",
///   "is_leader": false,
///   "is_admin": true,
///   "can_manage_tasks": true,
///   "can_manage_members": false,
///   "can_manage_roles": false
/// }
/// ```
pub async fn get_permissions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<GroupPermissions>> {
    Ok(Json(state.groups.permissions(&auth.user_id, group_id).await?))
}

/// Invite a user
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not the leader
/// - `409 Conflict`: User is already a member or already invited
pub async fn invite_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Json<Group>> {
    req.validate()?;

    let group = state
        .groups
        .invite(&auth.user_id, group_id, req.user_id.trim())
        .await?;
    Ok(Json(group))
}

/// Accept an invitation
///
/// # Errors
///
/// - `403 Forbidden`: Caller is neither the invitee nor the leader
/// - `404 Not Found`: No pending invitation for the user
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((group_id, user_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Group>> {
    let group = state
        .groups
        .accept_invitation(&auth.user_id, group_id, &user_id)
        .await?;
    Ok(Json(group))
}

/// Decline an invitation
pub async fn decline_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((group_id, user_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Group>> {
    let group = state
        .groups
        .decline_invitation(&auth.user_id, group_id, &user_id)
        .await?;
    Ok(Json(group))
}

/// Set a member's role
///
/// # Errors
///
/// - `400 Bad Request`: Attempt to assign `leader`
/// - `403 Forbidden`: Caller is not the leader
/// - `404 Not Found`: Target is not a member
/// - `409 Conflict`: Target is the creator
pub async fn set_member_role(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((group_id, user_id)): Path<(Uuid, String)>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<Group>> {
    let group = state
        .groups
        .set_role(&auth.user_id, group_id, &user_id, req.role)
        .await?;
    Ok(Json(group))
}

/// Remove a member, or leave when `user_id` is the caller
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((group_id, user_id)): Path<(Uuid, String)>,
) -> ApiResult<Json<Group>> {
    let group = state
        .groups
        .remove_member(&auth.user_id, group_id, &user_id)
        .await?;
    Ok(Json(group))
}

/// List the group's tasks
pub async fn list_group_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<TaskListResponse>> {
    let tasks = state.tasks.list_group_tasks(&auth.user_id, group_id).await?;
    Ok(Json(tasks.into()))
}
