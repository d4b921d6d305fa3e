//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An app wired to an in-memory store and a recording notifier
//! - JWT token generation for arbitrary users
//! - A JSON request helper that drives the router directly

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use teamtask_api::app::{build_router, AppState};
use teamtask_api::config::Config;
use teamtask_shared::auth::jwt::{create_token, Claims};
use teamtask_shared::notify::RecordingNotifier;
use teamtask_shared::store::memory::MemoryStore;
use tower::Service as _;

pub const TEST_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub config: Config,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    /// Creates a context with default settings
    pub fn new() -> Self {
        Self::with_vars(&[])
    }

    /// Creates a context with extra configuration variables
    pub fn with_vars(vars: &[(&str, &str)]) -> Self {
        let config = Config::from_lookup(|key| {
            if key == "JWT_SECRET" {
                return Some(TEST_SECRET.to_string());
            }
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        })
        .expect("test configuration is valid");

        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let state = AppState::from_store(config.clone(), store.clone(), notifier.clone());

        Self {
            app: build_router(state),
            config,
            store,
            notifier,
        }
    }

    /// Returns a valid token for `user_id`
    pub fn token_for(&self, user_id: &str) -> String {
        let claims = Claims::new(user_id, self.config.jwt.issuer.clone());
        create_token(&claims, TEST_SECRET).expect("token creation succeeds")
    }

    /// Sends a request as `user_id` (or anonymously) and returns status and JSON body
    ///
    /// An empty body comes back as `Value::Null`.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("authorization", format!("Bearer {}", self.token_for(user_id)));
        }

        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, user_id: &str) -> (StatusCode, Value) {
        self.send("GET", uri, Some(user_id), None).await
    }

    pub async fn post(&self, uri: &str, user_id: &str, body: Value) -> (StatusCode, Value) {
        self.send("POST", uri, Some(user_id), Some(body)).await
    }

    pub async fn put(&self, uri: &str, user_id: &str, body: Value) -> (StatusCode, Value) {
        self.send("PUT", uri, Some(user_id), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, user_id: &str) -> (StatusCode, Value) {
        self.send("DELETE", uri, Some(user_id), None).await
    }

    /// Creates a group led by `leader` and brings every user in `members` in
    ///
    /// Returns the group ID.
    pub async fn create_team(&self, leader: &str, members: &[&str]) -> String {
        let (status, group) = self
            .post("/v1/groups", leader, serde_json::json!({ "name": "Team" }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", group);
        let group_id = group["id"].as_str().unwrap().to_string();

        for &member in members {
            let (status, body) = self
                .post(
                    &format!("/v1/groups/{}/invitations", group_id),
                    leader,
                    serde_json::json!({ "user_id": member }),
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);

            let (status, body) = self
                .send(
                    "POST",
                    &format!("/v1/groups/{}/invitations/{}/accept", group_id, member),
                    Some(member),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::OK, "{}", body);
        }

        group_id
    }
}
