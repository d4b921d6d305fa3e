/// Task model and the group-task completion aggregator
///
/// Tasks are either personal (owned by `user_id`) or group tasks (owned by a
/// group, assigned to one or more members). Group tasks use a multi-party
/// completion protocol: every assignee confirms their part independently and
/// the task is finalized once all of them have.
///
/// # State Machine (group tasks)
///
/// ```text
/// open ──record_confirmation──▶ open
///      ──record_confirmation──▶ awaiting_finalization ──finalize──▶ closed
/// ```
///
/// No operation here removes a confirmation or reopens a closed task.
/// Reopening is a full edit (`reopened`), performed by a task manager.
///
/// # Immutability
///
/// `Task` is a value type. Every change returns a new `Task` with one field
/// replaced; the receiver is never modified.
///
/// # Example
///
/// ```
/// use teamtask_shared::models::task::{CompletionState, Task};
/// use uuid::Uuid;
///
/// let task = Task::group("u1", Uuid::new_v4(), "Ship release", ["a", "b"]);
///
/// let task = task.record_confirmation("a");
/// assert_eq!(task.completion_state(), CompletionState::Open);
///
/// let task = task.record_confirmation("b");
/// assert!(task.all_confirmed());
/// assert_eq!(task.completion_state(), CompletionState::AwaitingFinalization);
///
/// let task = task.finalize();
/// assert_eq!(task.completion_state(), CompletionState::Closed);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Task priority
///
/// Stored as a raw integer on the task. Anything outside 1..=3 maps to `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Maps a stored priority value to a level
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Priority::High,
            2 => Priority::Medium,
            _ => Priority::Low,
        }
    }

    /// Value stored on the task
    pub fn as_raw(&self) -> i32 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    /// Display name
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    /// Display color (hex RGB)
    pub fn color(&self) -> &'static str {
        match self {
            Priority::High => "#F44336",
            Priority::Medium => "#FF9800",
            Priority::Low => "#4CAF50",
        }
    }

    /// Sort key; lower sorts first
    pub fn sort_rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

/// Derived completion state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    /// Not completed, some assignees still to confirm
    Open,

    /// Not completed, every assignee has confirmed
    AwaitingFinalization,

    /// Completed
    Closed,
}

impl CompletionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionState::Open => "open",
            CompletionState::AwaitingFinalization => "awaiting_finalization",
            CompletionState::Closed => "closed",
        }
    }
}

fn default_priority() -> i32 {
    Priority::Medium.as_raw()
}

/// Task snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task ID
    pub id: Uuid,

    /// Task title
    pub title: String,

    /// Task description
    #[serde(default)]
    pub description: String,

    /// Overall completion flag
    #[serde(default)]
    pub is_completed: bool,

    /// Creation time (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// Advisory due date (epoch milliseconds on the wire)
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub due_date: Option<DateTime<Utc>>,

    /// Raw priority: 1 = High, 2 = Medium, 3 = Low
    #[serde(default = "default_priority")]
    pub priority: i32,

    /// Owner (the creator, for group tasks)
    pub user_id: String,

    /// Discriminates group tasks from personal tasks
    #[serde(default)]
    pub is_group_task: bool,

    /// Owning group (group tasks only)
    #[serde(default)]
    pub group_id: Option<Uuid>,

    /// Users responsible for the task (group tasks only)
    #[serde(default)]
    pub assigned_to: BTreeSet<String>,

    /// Attached label IDs
    #[serde(default)]
    pub labels: BTreeSet<Uuid>,

    /// Per-user completion acknowledgments
    #[serde(default)]
    pub completion_confirmations: BTreeMap<String, bool>,
}

impl Task {
    /// Creates a personal task owned by `user_id`
    pub fn personal(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            is_completed: false,
            created_at: Utc::now(),
            due_date: None,
            priority: default_priority(),
            user_id: user_id.into(),
            is_group_task: false,
            group_id: None,
            assigned_to: BTreeSet::new(),
            labels: BTreeSet::new(),
            completion_confirmations: BTreeMap::new(),
        }
    }

    /// Creates a group task in the open state with no confirmations
    pub fn group<I, S>(
        created_by: impl Into<String>,
        group_id: Uuid,
        title: impl Into<String>,
        assigned_to: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            is_group_task: true,
            group_id: Some(group_id),
            assigned_to: assigned_to.into_iter().map(Into::into).collect(),
            ..Self::personal(created_by, title)
        }
    }

    pub fn with_title(&self, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..self.clone()
        }
    }

    pub fn with_description(&self, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..self.clone()
        }
    }

    pub fn with_due_date(&self, due_date: Option<DateTime<Utc>>) -> Self {
        Self {
            due_date,
            ..self.clone()
        }
    }

    pub fn with_priority(&self, priority: i32) -> Self {
        Self {
            priority,
            ..self.clone()
        }
    }

    pub fn with_labels(&self, labels: BTreeSet<Uuid>) -> Self {
        Self {
            labels,
            ..self.clone()
        }
    }

    /// Replaces the assignee set; existing confirmations are kept
    pub fn with_assignees(&self, assigned_to: BTreeSet<String>) -> Self {
        Self {
            assigned_to,
            ..self.clone()
        }
    }

    pub fn with_completed(&self, is_completed: bool) -> Self {
        Self {
            is_completed,
            ..self.clone()
        }
    }

    /// Full reset: clears every confirmation and the completion flag
    pub fn reopened(&self) -> Self {
        Self {
            is_completed: false,
            completion_confirmations: BTreeMap::new(),
            ..self.clone()
        }
    }

    /// Priority level, with out-of-range values treated as `Low`
    pub fn priority_level(&self) -> Priority {
        Priority::from_raw(self.priority)
    }

    pub fn is_assignee(&self, user_id: &str) -> bool {
        self.assigned_to.contains(user_id)
    }

    /// True iff the user's confirmation entry exists and is `true`
    ///
    /// A missing entry and a `false` entry both mean "not confirmed".
    pub fn has_confirmed(&self, user_id: &str) -> bool {
        self.completion_confirmations
            .get(user_id)
            .copied()
            .unwrap_or(false)
    }

    /// True iff there is at least one assignee and every assignee confirmed
    ///
    /// An empty assignee set is never fully confirmed. Confirmations from
    /// users outside `assigned_to` are ignored.
    pub fn all_confirmed(&self) -> bool {
        !self.assigned_to.is_empty()
            && self
                .assigned_to
                .iter()
                .all(|user_id| self.has_confirmed(user_id))
    }

    /// Raw number of `true` entries, assignees or not
    pub fn confirmation_count(&self) -> usize {
        self.completion_confirmations
            .values()
            .filter(|confirmed| **confirmed)
            .count()
    }

    /// Returns a copy with the user's confirmation set to `true`
    ///
    /// Idempotent. Never touches `is_completed`; finalization is a separate
    /// decision made by the caller.
    pub fn record_confirmation(&self, user_id: &str) -> Self {
        let mut completion_confirmations = self.completion_confirmations.clone();
        completion_confirmations.insert(user_id.to_string(), true);

        Self {
            completion_confirmations,
            ..self.clone()
        }
    }

    /// Derives the completion state
    pub fn completion_state(&self) -> CompletionState {
        if self.is_completed {
            CompletionState::Closed
        } else if self.all_confirmed() {
            CompletionState::AwaitingFinalization
        } else {
            CompletionState::Open
        }
    }

    /// Returns a copy marked completed
    pub fn finalize(&self) -> Self {
        self.with_completed(true)
    }

    /// Ordering used for task lists
    ///
    /// Incomplete before completed, then priority, then earliest due date
    /// (tasks without one last), then newest first.
    pub fn display_cmp(&self, other: &Self) -> Ordering {
        self.is_completed
            .cmp(&other.is_completed)
            .then_with(|| {
                self.priority_level()
                    .sort_rank()
                    .cmp(&other.priority_level().sort_rank())
            })
            .then_with(|| match (self.due_date, other.due_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ab_task() -> Task {
        Task::group("owner", Uuid::new_v4(), "Write report", ["A", "B"])
    }

    #[test]
    fn test_priority_from_raw() {
        assert_eq!(Priority::from_raw(1), Priority::High);
        assert_eq!(Priority::from_raw(2), Priority::Medium);
        assert_eq!(Priority::from_raw(3), Priority::Low);
        assert_eq!(Priority::from_raw(0), Priority::Low);
        assert_eq!(Priority::from_raw(-7), Priority::Low);
        assert_eq!(Priority::from_raw(42), Priority::Low);
    }

    #[test]
    fn test_out_of_range_priority_maps_like_low() {
        let task = Task::personal("u1", "x").with_priority(9);
        assert_eq!(task.priority_level().color(), Priority::Low.color());
        assert_eq!(task.priority_level().sort_rank(), Priority::Low.sort_rank());
    }

    #[test]
    fn test_all_confirmed_false_without_assignees() {
        let task = Task::group("owner", Uuid::new_v4(), "Empty", Vec::<String>::new());
        assert!(!task.all_confirmed());

        let task = task.record_confirmation("A").record_confirmation("owner");
        assert!(!task.all_confirmed());
        assert_eq!(task.completion_state(), CompletionState::Open);
    }

    #[test]
    fn test_partial_confirmation() {
        let task = ab_task().record_confirmation("A");

        assert!(!task.all_confirmed());
        assert!(task.has_confirmed("A"));
        assert!(!task.has_confirmed("B"));
        assert_eq!(task.confirmation_count(), 1);
    }

    #[test]
    fn test_confirming_last_assignee() {
        let task = ab_task().record_confirmation("A").record_confirmation("B");

        assert_eq!(
            task.completion_confirmations,
            BTreeMap::from([("A".to_string(), true), ("B".to_string(), true)])
        );
        assert!(task.all_confirmed());
        assert_eq!(task.confirmation_count(), 2);
        assert!(!task.is_completed);
    }

    #[test]
    fn test_record_confirmation_is_idempotent() {
        let once = ab_task().record_confirmation("A");
        let twice = once.record_confirmation("A");

        assert_eq!(once.completion_confirmations, twice.completion_confirmations);
    }

    #[test]
    fn test_record_confirmation_leaves_receiver_untouched() {
        let task = ab_task();
        let _ = task.record_confirmation("A");

        assert!(task.completion_confirmations.is_empty());
    }

    #[test]
    fn test_false_entry_means_not_confirmed() {
        let mut task = ab_task();
        task.completion_confirmations.insert("A".to_string(), false);

        assert!(!task.has_confirmed("A"));
        assert_eq!(task.confirmation_count(), 0);

        let task = task.record_confirmation("A");
        assert!(task.has_confirmed("A"));
    }

    #[test]
    fn test_non_assignee_confirmations_are_inert_for_all_confirmed() {
        let task = ab_task()
            .record_confirmation("A")
            .record_confirmation("C");
        assert!(!task.all_confirmed());

        let task = task.record_confirmation("B");
        assert!(task.all_confirmed());
        assert_eq!(task.confirmation_count(), 3);
    }

    #[test]
    fn test_completion_state_transitions() {
        let task = ab_task();
        assert_eq!(task.completion_state(), CompletionState::Open);

        let task = task.record_confirmation("A").record_confirmation("B");
        assert_eq!(task.completion_state(), CompletionState::AwaitingFinalization);

        let task = task.finalize();
        assert_eq!(task.completion_state(), CompletionState::Closed);
        assert_eq!(task.confirmation_count(), 2);
    }

    #[test]
    fn test_reopened_clears_confirmations() {
        let task = ab_task()
            .record_confirmation("A")
            .record_confirmation("B")
            .finalize()
            .reopened();

        assert!(!task.is_completed);
        assert!(task.completion_confirmations.is_empty());
        assert_eq!(task.completion_state(), CompletionState::Open);
    }

    #[test]
    fn test_with_assignees_keeps_confirmations() {
        let task = ab_task().record_confirmation("A");
        let task = task.with_assignees(BTreeSet::from(["B".to_string()]));

        assert!(task.has_confirmed("A"));
        assert!(!task.all_confirmed());
    }

    #[test]
    fn test_display_order() {
        let now = Utc::now();
        let done = Task::personal("u", "done").with_priority(1).with_completed(true);
        let high = Task::personal("u", "high").with_priority(1);
        let low_soon = Task::personal("u", "low soon")
            .with_priority(3)
            .with_due_date(Some(now + Duration::days(1)));
        let low_later = Task::personal("u", "low later")
            .with_priority(3)
            .with_due_date(Some(now + Duration::days(5)));
        let low_undated = Task::personal("u", "low undated").with_priority(3);

        let mut tasks = vec![
            done.clone(),
            low_undated.clone(),
            low_later.clone(),
            high.clone(),
            low_soon.clone(),
        ];
        tasks.sort_by(|a, b| a.display_cmp(b));

        let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["high", "low soon", "low later", "low undated", "done"]);
    }

    #[test]
    fn test_timestamps_serialize_as_millis() {
        let task = Task::personal("u", "t");
        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["created_at"], task.created_at.timestamp_millis());
        assert!(json["due_date"].is_null());
    }
}
