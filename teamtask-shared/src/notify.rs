/// Notification intents
///
/// Services describe *what happened* as a [`Notification`] and hand it to a
/// [`Notifier`]. How (or whether) the intent reaches a device is up to the
/// notifier implementation. Delivery failures are logged by the caller and
/// never fail the operation that produced the intent.
///
/// # Implementations
///
/// - [`TracingNotifier`]: emits each intent as a structured `tracing` event
/// - [`RecordingNotifier`]: keeps intents in memory, for tests
///
/// # Example
///
/// ```
/// use teamtask_shared::notify::{Notification, Notifier, RecordingNotifier};
/// use uuid::Uuid;
///
/// # async fn example() {
/// let notifier = RecordingNotifier::new();
/// notifier
///     .notify(Notification::TaskConfirmed {
///         task_id: Uuid::new_v4(),
///         confirmed_by: "u2".to_string(),
///         recipient: "u1".to_string(),
///     })
///     .await
///     .unwrap();
///
/// assert_eq!(notifier.sent().await.len(), 1);
/// # }
/// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::group::GroupRole;

/// Something a user should hear about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A user was invited to a group
    GroupInvitation {
        group_id: Uuid,
        group_name: String,
        invited_by: String,
        recipient: String,
    },

    /// A user was assigned to a group task
    TaskAssigned {
        task_id: Uuid,
        task_title: String,
        assigned_by: String,
        recipient: String,
    },

    /// An assignee confirmed their part of a group task
    TaskConfirmed {
        task_id: Uuid,
        confirmed_by: String,
        recipient: String,
    },

    /// A group task was finalized
    TaskCompleted {
        task_id: Uuid,
        task_title: String,
        recipient: String,
    },

    /// A user was removed from (or left) a group
    MemberRemoved {
        group_id: Uuid,
        group_name: String,
        recipient: String,
    },

    /// A member's role changed
    RoleChanged {
        group_id: Uuid,
        role: GroupRole,
        recipient: String,
    },
}

impl Notification {
    /// The user this notification is addressed to
    pub fn recipient(&self) -> &str {
        match self {
            Notification::GroupInvitation { recipient, .. }
            | Notification::TaskAssigned { recipient, .. }
            | Notification::TaskConfirmed { recipient, .. }
            | Notification::TaskCompleted { recipient, .. }
            | Notification::MemberRemoved { recipient, .. }
            | Notification::RoleChanged { recipient, .. } => recipient,
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::GroupInvitation { .. } => "group_invitation",
            Notification::TaskAssigned { .. } => "task_assigned",
            Notification::TaskConfirmed { .. } => "task_confirmed",
            Notification::TaskCompleted { .. } => "task_completed",
            Notification::MemberRemoved { .. } => "member_removed",
            Notification::RoleChanged { .. } => "role_changed",
        }
    }
}

/// Error type for notification delivery
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns the notifier name, used in logs
    fn name(&self) -> &str;

    async fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Logs each intent at info level
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl TracingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for TracingNotifier {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = notification.kind(),
            recipient = notification.recipient(),
            payload = ?notification,
            "Notification"
        );
        Ok(())
    }
}

/// Keeps every intent in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    /// Notifications addressed to one user
    pub async fn sent_to(&self, recipient: &str) -> Vec<Notification> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|n| n.recipient() == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
