/// Application services
///
/// Services own the read-authorize-modify-write sequence for every
/// operation. They receive their stores and notifier as trait objects at
/// construction; there is no global repository.
///
/// # Writes
///
/// Every mutation loads a [`Versioned`](crate::store::Versioned) snapshot,
/// applies a pure model operation, and writes it back with the version it
/// read. A [`StoreError::Conflict`] means another writer got there first:
/// the service reloads and reapplies, up to
/// [`ServiceConfig::max_write_retries`] times, then gives up with
/// [`ServiceError::WriteContention`].
///
/// # Services
///
/// - [`groups::GroupService`]: group lifecycle, invitations, roles
/// - [`tasks::TaskService`]: personal and group tasks, confirmation, finalization
/// - [`labels::LabelService`]: per-user labels

use uuid::Uuid;

use crate::auth::authorization::AuthzError;
use crate::models::group::GroupError;
use crate::notify::{Notification, Notifier};
use crate::store::StoreError;

pub mod groups;
pub mod labels;
pub mod tasks;

pub use groups::{GroupListing, GroupPermissions, GroupService};
pub use labels::LabelService;
pub use tasks::{CompletionSummary, ConfirmationOutcome, TaskDraft, TaskService, TaskUpdate};

/// Default number of CAS retries before giving up
pub const DEFAULT_MAX_WRITE_RETRIES: u32 = 5;

/// Behavior switches shared by the services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Finalize a group task in the same write that records the last
    /// outstanding confirmation
    pub auto_finalize: bool,

    /// Retries after a version conflict (total attempts = retries + 1)
    pub max_write_retries: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            auto_finalize: true,
            max_write_retries: DEFAULT_MAX_WRITE_RETRIES,
        }
    }
}

impl ServiceConfig {
    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_write_retries.saturating_add(1)
    }
}

/// Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error type for service operations
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Membership rule violated
    #[error(transparent)]
    Group(#[from] GroupError),

    /// Caller lacks permission
    #[error(transparent)]
    Authz(#[from] AuthzError),

    /// Storage failure
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Task {0} not found")]
    TaskNotFound(Uuid),

    #[error("Group {0} not found")]
    GroupNotFound(Uuid),

    #[error("Label {0} not found")]
    LabelNotFound(Uuid),

    /// Operation not allowed in the task's current state
    #[error("{0}")]
    InvalidState(String),

    /// Assignee set rejected
    #[error("{0}")]
    InvalidAssignees(String),

    /// Malformed input that got past request validation
    #[error("{0}")]
    InvalidInput(String),

    /// Every CAS attempt lost to a concurrent writer
    #[error("{entity} {id} is being modified concurrently, gave up after {attempts} attempts")]
    WriteContention {
        entity: &'static str,
        id: Uuid,
        attempts: u32,
    },
}

/// Sends notifications, logging failures instead of returning them
pub(crate) async fn dispatch(notifier: &dyn Notifier, notifications: Vec<Notification>) {
    for notification in notifications {
        let kind = notification.kind();
        if let Err(e) = notifier.notify(notification).await {
            tracing::warn!(
                notifier = notifier.name(),
                kind,
                error = %e,
                "Failed to send notification"
            );
        }
    }
}
