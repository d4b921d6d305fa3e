//! Integration tests for group endpoints
//!
//! Drives the full router (auth middleware included) over in-memory stores.

mod common;

use axum::http::StatusCode;
use common::TestContext;
use serde_json::json;
use teamtask_shared::notify::Notification;

#[tokio::test]
async fn test_health_is_public() {
    let ctx = TestContext::new();
    let (status, body) = ctx.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_v1_requires_token() {
    let ctx = TestContext::new();

    let (status, _) = ctx.send("GET", "/v1/groups", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = ctx.send("GET", "/v1/groups", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["groups"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_token_signed_with_other_secret_is_rejected() {
    use axum::body::Body;
    use axum::http::Request;
    use teamtask_shared::auth::jwt::{create_token, Claims};
    use tower::Service as _;

    let ctx = TestContext::new();
    let claims = Claims::new("mallory", ctx.config.jwt.issuer.clone());
    let token = create_token(&claims, "another-secret-key-that-is-32-bytes-long").unwrap();

    let request = Request::builder()
        .uri("/v1/groups")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().call(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_group_validation() {
    let ctx = TestContext::new();
    let (status, body) = ctx.post("/v1/groups", "alice", json!({ "name": "" })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "name");
}

#[tokio::test]
async fn test_membership_lifecycle() {
    let ctx = TestContext::new();
    let group_id = ctx.create_team("leader", &["bob"]).await;

    let (status, body) = ctx.get("/v1/groups", "bob").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groups"].as_array().unwrap().len(), 1);
    assert!(body["invitations"].as_array().unwrap().is_empty());

    let (status, body) = ctx
        .get(&format!("/v1/groups/{}/permissions", group_id), "bob")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "member");
    assert_eq!(body["can_manage_tasks"], false);

    let (status, body) = ctx
        .put(
            &format!("/v1/groups/{}/members/bob/role", group_id),
            "leader",
            json!({ "role": "deputy" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["member_roles"]["bob"], "deputy");

    let (_, body) = ctx
        .get(&format!("/v1/groups/{}/permissions", group_id), "bob")
        .await;
    assert_eq!(body["role"], "deputy");
    assert_eq!(body["is_admin"], true);
    assert_eq!(body["can_manage_tasks"], true);
    assert_eq!(body["can_manage_members"], false);

    let role_changes = ctx
        .notifier
        .sent_to("bob")
        .await
        .into_iter()
        .filter(|n| matches!(n, Notification::RoleChanged { .. }))
        .count();
    assert_eq!(role_changes, 1);
}

#[tokio::test]
async fn test_deputy_cannot_manage_members() {
    let ctx = TestContext::new();
    let group_id = ctx.create_team("leader", &["bob", "carol"]).await;
    ctx.put(
        &format!("/v1/groups/{}/members/bob/role", group_id),
        "leader",
        json!({ "role": "deputy" }),
    )
    .await;

    let (status, body) = ctx
        .post(
            &format!("/v1/groups/{}/invitations", group_id),
            "bob",
            json!({ "user_id": "dave" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = ctx
        .delete(&format!("/v1/groups/{}/members/carol", group_id), "bob")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .put(
            &format!("/v1/groups/{}/members/carol/role", group_id),
            "bob",
            json!({ "role": "deputy" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_rules() {
    let ctx = TestContext::new();
    let group_id = ctx.create_team("leader", &["bob"]).await;

    let (status, _) = ctx
        .put(
            &format!("/v1/groups/{}/members/bob/role", group_id),
            "leader",
            json!({ "role": "leader" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = ctx
        .put(
            &format!("/v1/groups/{}/members/leader/role", group_id),
            "leader",
            json!({ "role": "member" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_duplicate_invitation_conflicts() {
    let ctx = TestContext::new();
    let group_id = ctx.create_team("leader", &[]).await;
    let uri = format!("/v1/groups/{}/invitations", group_id);

    let (status, _) = ctx.post(&uri, "leader", json!({ "user_id": "bob" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = ctx.post(&uri, "leader", json!({ "user_id": "bob" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // invitee sees the group and can decline
    let (status, _) = ctx.get(&format!("/v1/groups/{}", group_id), "bob").await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = ctx
        .send(
            "POST",
            &format!("/v1/groups/{}/invitations/bob/decline", group_id),
            Some("bob"),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["pending_invitations"].as_array().unwrap().is_empty());

    let (status, _) = ctx.get(&format!("/v1/groups/{}", group_id), "bob").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_can_leave() {
    let ctx = TestContext::new();
    let group_id = ctx.create_team("leader", &["bob"]).await;

    let (status, body) = ctx
        .delete(&format!("/v1/groups/{}/members/bob", group_id), "bob")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["members"].as_array().unwrap().iter().any(|m| m == "bob"));

    let (status, _) = ctx
        .delete(&format!("/v1/groups/{}/members/leader", group_id), "leader")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_delete_group() {
    let ctx = TestContext::new();
    let group_id = ctx.create_team("leader", &["bob"]).await;

    let (status, _) = ctx.delete(&format!("/v1/groups/{}", group_id), "bob").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx
        .delete(&format!("/v1/groups/{}", group_id), "leader")
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = ctx.get(&format!("/v1/groups/{}", group_id), "leader").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
