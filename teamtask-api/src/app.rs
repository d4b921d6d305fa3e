/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamtask_api::{app::{build_router, AppState}, config::Config};
/// use teamtask_shared::notify::TracingNotifier;
/// use teamtask_shared::store::memory::MemoryStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::from_store(
///     config,
///     Arc::new(MemoryStore::new()),
///     Arc::new(TracingNotifier::new()),
/// );
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use axum::{
    http::{header, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use teamtask_shared::auth::jwt::TokenVerifier;
use teamtask_shared::auth::middleware::jwt_auth_middleware;
use teamtask_shared::notify::Notifier;
use teamtask_shared::services::{GroupService, LabelService, TaskService};
use teamtask_shared::store::{GroupStore, HealthCheck, LabelStore, TaskStore};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is an `Arc` or a cheap handle.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,

    pub groups: GroupService,

    pub tasks: TaskService,

    pub labels: LabelService,

    /// Token validation for the auth middleware
    pub verifier: TokenVerifier,

    /// Storage probe for `/health`
    pub health: Arc<dyn HealthCheck>,
}

impl AppState {
    /// Wires every service to one store that implements all storage ports
    pub fn from_store<S>(config: Config, store: Arc<S>, notifier: Arc<dyn Notifier>) -> Self
    where
        S: GroupStore + TaskStore + LabelStore + HealthCheck + 'static,
    {
        let service_config = config.service_config();
        let group_store: Arc<dyn GroupStore> = store.clone();
        let task_store: Arc<dyn TaskStore> = store.clone();
        let label_store: Arc<dyn LabelStore> = store.clone();

        Self {
            groups: GroupService::new(
                group_store.clone(),
                task_store.clone(),
                notifier.clone(),
                service_config,
            ),
            tasks: TaskService::new(
                task_store,
                group_store,
                label_store.clone(),
                notifier,
                service_config,
            ),
            labels: LabelService::new(label_store),
            verifier: TokenVerifier::new(config.jwt.secret.clone(), config.jwt.issuer.clone()),
            health: store,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                  # Health check (public)
/// └── /v1/                                     # API v1 (JWT required)
///     ├── /groups
///     │   ├── POST   /                         # Create group
///     │   ├── GET    /                         # List my groups and invitations
///     │   ├── GET    /:id                      # Get group
///     │   ├── DELETE /:id                      # Delete group
///     │   ├── GET    /:id/permissions          # Caller's role and capabilities
///     │   ├── POST   /:id/invitations          # Invite
///     │   ├── POST   /:id/invitations/:user_id/accept
///     │   ├── POST   /:id/invitations/:user_id/decline
///     │   ├── PUT    /:id/members/:user_id/role
///     │   ├── DELETE /:id/members/:user_id     # Remove or leave
///     │   └── GET    /:id/tasks                # Group tasks
///     ├── /tasks
///     │   ├── POST   /                         # Create personal or group task
///     │   ├── GET    /                         # List personal tasks
///     │   ├── GET    /assigned                 # Group tasks assigned to me
///     │   ├── GET    /:id
///     │   ├── PUT    /:id
///     │   ├── DELETE /:id
///     │   ├── PUT    /:id/assignees            # Reassign
///     │   ├── POST   /:id/complete             # Personal completion toggle
///     │   ├── POST   /:id/confirm              # Confirm my part
///     │   ├── POST   /:id/finalize             # Close a fully confirmed task
///     │   └── GET    /:id/completion           # Completion summary
///     └── /labels
///         ├── POST   /
///         ├── GET    /
///         └── DELETE /:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Authentication (everything under `/v1`)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let group_routes = Router::new()
        .route(
            "/",
            post(routes::groups::create_group).get(routes::groups::list_groups),
        )
        .route(
            "/:id",
            get(routes::groups::get_group).delete(routes::groups::delete_group),
        )
        .route("/:id/permissions", get(routes::groups::get_permissions))
        .route("/:id/invitations", post(routes::groups::invite_member))
        .route(
            "/:id/invitations/:user_id/accept",
            post(routes::groups::accept_invitation),
        )
        .route(
            "/:id/invitations/:user_id/decline",
            post(routes::groups::decline_invitation),
        )
        .route("/:id/members/:user_id/role", put(routes::groups::set_member_role))
        .route("/:id/members/:user_id", delete(routes::groups::remove_member))
        .route("/:id/tasks", get(routes::groups::list_group_tasks));

    let task_routes = Router::new()
        .route(
            "/",
            post(routes::tasks::create_task).get(routes::tasks::list_personal_tasks),
        )
        .route("/assigned", get(routes::tasks::list_assigned_tasks))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/assignees", put(routes::tasks::reassign_task))
        .route("/:id/complete", post(routes::tasks::set_completion))
        .route("/:id/confirm", post(routes::tasks::confirm_completion))
        .route("/:id/finalize", post(routes::tasks::finalize_task))
        .route("/:id/completion", get(routes::tasks::completion_summary));

    let label_routes = Router::new()
        .route(
            "/",
            post(routes::labels::create_label).get(routes::labels::list_labels),
        )
        .route("/:id", delete(routes::labels::delete_label));

    // Build complete v1 API (require JWT authentication)
    let v1_routes = Router::new()
        .nest("/groups", group_routes)
        .nest("/tasks", task_routes)
        .nest("/labels", label_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.verifier.clone(),
            jwt_auth_middleware,
        ));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(std::time::Duration::from_secs(3600))
    };

    // Combine all routes with middleware stack
    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}
