/// Storage ports
///
/// Services never reach for a global repository. They are handed the stores
/// they need as trait objects, so the same service code runs against
/// PostgreSQL in production and an in-memory store in tests.
///
/// # Compare-and-swap
///
/// Every read returns a [`Versioned`] snapshot. Writes go through `replace`,
/// which only succeeds when the stored version still equals the version the
/// caller read; otherwise it fails with [`StoreError::Conflict`] and the
/// caller reloads and reapplies its change. This is what keeps two
/// assignees confirming at the same moment from overwriting each other.
///
/// # Adapters
///
/// - [`memory::MemoryStore`]: `tokio::sync::RwLock` backed, for tests and local runs
/// - [`postgres::PgStore`]: sqlx/PostgreSQL, `UPDATE ... WHERE version = $n`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::group::Group;
use crate::models::label::Label;
use crate::models::task::Task;

pub mod memory;
pub mod postgres;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No record with this ID
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// The record changed since it was read
    #[error("{entity} {id} was modified concurrently (expected version {expected})")]
    Conflict {
        entity: &'static str,
        id: Uuid,
        expected: i64,
    },

    /// A record with this ID already exists
    #[error("{entity} {id} already exists")]
    Duplicate { entity: &'static str, id: Uuid },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A snapshot plus the version it was read at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

/// Version assigned on insert
pub const INITIAL_VERSION: i64 = 1;

impl<T> Versioned<T> {
    pub fn new(value: T, version: i64) -> Self {
        Self { value, version }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Group persistence
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn insert_group(&self, group: Group) -> StoreResult<Versioned<Group>>;

    async fn get_group(&self, id: Uuid) -> StoreResult<Option<Versioned<Group>>>;

    /// Writes `group` if the stored version is still `expected_version`
    async fn replace_group(&self, group: Group, expected_version: i64) -> StoreResult<Versioned<Group>>;

    /// Returns false if nothing was deleted
    async fn delete_group(&self, id: Uuid) -> StoreResult<bool>;

    /// Groups the user is a member of
    async fn list_groups_for_member(&self, user_id: &str) -> StoreResult<Vec<Group>>;

    /// Groups with a pending invitation for the user
    async fn list_groups_inviting(&self, user_id: &str) -> StoreResult<Vec<Group>>;
}

/// Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert_task(&self, task: Task) -> StoreResult<Versioned<Task>>;

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Versioned<Task>>>;

    /// Writes `task` if the stored version is still `expected_version`
    async fn replace_task(&self, task: Task, expected_version: i64) -> StoreResult<Versioned<Task>>;

    /// Returns false if nothing was deleted
    async fn delete_task(&self, id: Uuid) -> StoreResult<bool>;

    /// Deletes every task of a group, returning how many were removed
    async fn delete_tasks_for_group(&self, group_id: Uuid) -> StoreResult<u64>;

    /// Personal tasks owned by the user
    async fn list_personal_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>>;

    async fn list_group_tasks(&self, group_id: Uuid) -> StoreResult<Vec<Task>>;

    /// Group tasks with the user in `assigned_to`
    async fn list_assigned_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>>;
}

/// Label persistence
#[async_trait]
pub trait LabelStore: Send + Sync {
    async fn insert_label(&self, label: Label) -> StoreResult<Label>;

    async fn get_label(&self, id: Uuid) -> StoreResult<Option<Label>>;

    async fn list_labels(&self, user_id: &str) -> StoreResult<Vec<Label>>;

    /// Returns false if nothing was deleted
    async fn delete_label(&self, id: Uuid) -> StoreResult<bool>;
}

/// Connectivity probe used by the health endpoint
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    /// Short backend name for health output
    fn backend(&self) -> &'static str;
}
