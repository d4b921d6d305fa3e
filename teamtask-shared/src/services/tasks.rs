/// Task service
///
/// Personal and group task operations, including the group-task completion
/// flow:
///
/// ```text
/// Open ──(every assignee confirmed)──▶ AwaitingFinalization ──(finalize)──▶ Closed
/// ```
///
/// With `auto_finalize` on, the write that records the last outstanding
/// confirmation also closes the task, so `AwaitingFinalization` is never
/// persisted. A full reset through [`TaskUpdate::reopen`] is the only way
/// back to `Open`.
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use std::sync::Arc;
/// use teamtask_shared::models::group::Group;
/// use teamtask_shared::models::task::CompletionState;
/// use teamtask_shared::notify::TracingNotifier;
/// use teamtask_shared::services::{ServiceConfig, TaskDraft, TaskService};
/// use teamtask_shared::store::{memory::MemoryStore, GroupStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let group = Group::new("Team", "", "u1").invite("u2")?.accept_invitation("u2")?;
/// store.insert_group(group.clone()).await?;
///
/// let tasks = TaskService::new(
///     store.clone(),
///     store.clone(),
///     store,
///     Arc::new(TracingNotifier::new()),
///     ServiceConfig::default(),
/// );
///
/// let draft = TaskDraft::titled("Ship it");
/// let task = tasks
///     .create_group_task("u1", group.id, draft, BTreeSet::from(["u2".to_string()]))
///     .await?;
///
/// let outcome = tasks.confirm_completion("u2", task.id).await?;
/// assert_eq!(outcome.state, CompletionState::Closed);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{dispatch, ServiceConfig, ServiceError, ServiceResult};
use crate::auth::authorization::{
    require_assignee, require_group_member, require_task_edit, require_task_management,
    require_task_owner, require_task_view, AuthzError,
};
use crate::models::group::Group;
use crate::models::task::{CompletionState, Task};
use crate::notify::{Notification, Notifier};
use crate::store::{GroupStore, LabelStore, StoreError, TaskStore, Versioned};

/// Fields for a new task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    /// Raw priority; `None` keeps the default (Medium)
    pub priority: Option<i32>,
    pub labels: BTreeSet<Uuid>,
}

impl TaskDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    fn fill(&self, base: Task) -> Task {
        let task = base
            .with_description(self.description.clone())
            .with_due_date(self.due_date)
            .with_labels(self.labels.clone());

        match self.priority {
            Some(priority) => task.with_priority(priority),
            None => task,
        }
    }
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Removes the due date (wins over `due_date`)
    pub clear_due_date: bool,
    pub priority: Option<i32>,
    pub labels: Option<BTreeSet<Uuid>>,
    /// Full reset: clears every confirmation and the completion flag
    pub reopen: bool,
}

impl TaskUpdate {
    fn apply(&self, task: &Task) -> Task {
        let mut next = task.clone();

        if let Some(title) = &self.title {
            next = next.with_title(title.trim());
        }
        if let Some(description) = &self.description {
            next = next.with_description(description.clone());
        }
        if self.clear_due_date {
            next = next.with_due_date(None);
        } else if self.due_date.is_some() {
            next = next.with_due_date(self.due_date);
        }
        if let Some(priority) = self.priority {
            next = next.with_priority(priority);
        }
        if let Some(labels) = &self.labels {
            next = next.with_labels(labels.clone());
        }
        if self.reopen {
            next = next.reopened();
        }

        next
    }
}

/// Result of a confirmation
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationOutcome {
    pub task: Task,
    pub state: CompletionState,
    /// False when the caller had already confirmed
    pub newly_confirmed: bool,
    /// True when this confirmation closed the task
    pub finalized: bool,
}

/// Completion progress of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
    pub task_id: Uuid,
    pub state: CompletionState,
    pub is_completed: bool,
    /// Raw number of confirmations on record
    pub confirmation_count: usize,
    pub assignee_count: usize,
    /// Confirmation flag per current assignee
    pub assignees: BTreeMap<String, bool>,
}

impl CompletionSummary {
    pub fn of(task: &Task) -> Self {
        Self {
            task_id: task.id,
            state: task.completion_state(),
            is_completed: task.is_completed,
            confirmation_count: task.confirmation_count(),
            assignee_count: task.assigned_to.len(),
            assignees: task
                .assigned_to
                .iter()
                .map(|user_id| (user_id.clone(), task.has_confirmed(user_id)))
                .collect(),
        }
    }
}

fn check_title(title: &str) -> ServiceResult<()> {
    if title.trim().is_empty() {
        return Err(ServiceError::InvalidInput("Task title cannot be empty".to_string()));
    }
    Ok(())
}

fn check_assignees(group: &Group, assignees: &BTreeSet<String>) -> ServiceResult<()> {
    if assignees.is_empty() {
        return Err(ServiceError::InvalidAssignees(
            "A group task needs at least one assignee".to_string(),
        ));
    }

    let outsiders: Vec<&str> = assignees
        .iter()
        .filter(|user_id| !group.is_member(user_id))
        .map(String::as_str)
        .collect();
    if !outsiders.is_empty() {
        return Err(ServiceError::InvalidAssignees(format!(
            "Not members of the group: {}",
            outsiders.join(", ")
        )));
    }

    Ok(())
}

fn require_group_task(task: &Task) -> ServiceResult<()> {
    if !task.is_group_task {
        return Err(ServiceError::InvalidState(
            "Operation only applies to group tasks".to_string(),
        ));
    }
    Ok(())
}

fn sorted(mut tasks: Vec<Task>) -> Vec<Task> {
    tasks.sort_by(Task::display_cmp);
    tasks
}

/// Task operations
#[derive(Clone)]
pub struct TaskService {
    tasks: Arc<dyn TaskStore>,
    groups: Arc<dyn GroupStore>,
    labels: Arc<dyn LabelStore>,
    notifier: Arc<dyn Notifier>,
    config: ServiceConfig,
}

impl TaskService {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        groups: Arc<dyn GroupStore>,
        labels: Arc<dyn LabelStore>,
        notifier: Arc<dyn Notifier>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            tasks,
            groups,
            labels,
            notifier,
            config,
        }
    }

    async fn load(&self, task_id: Uuid) -> ServiceResult<Versioned<Task>> {
        self.tasks
            .get_task(task_id)
            .await?
            .ok_or(ServiceError::TaskNotFound(task_id))
    }

    /// Owning group of a group task; `None` for personal tasks or a group
    /// that no longer exists
    async fn group_of(&self, task: &Task) -> ServiceResult<Option<Group>> {
        match task.group_id {
            Some(group_id) if task.is_group_task => Ok(self
                .groups
                .get_group(group_id)
                .await?
                .map(Versioned::into_inner)),
            _ => Ok(None),
        }
    }

    async fn load_group(&self, group_id: Uuid) -> ServiceResult<Group> {
        self.groups
            .get_group(group_id)
            .await?
            .map(Versioned::into_inner)
            .ok_or(ServiceError::GroupNotFound(group_id))
    }

    async fn check_labels(&self, labels: &BTreeSet<Uuid>) -> ServiceResult<()> {
        for label_id in labels {
            if self.labels.get_label(*label_id).await?.is_none() {
                return Err(ServiceError::LabelNotFound(*label_id));
            }
        }
        Ok(())
    }

    /// Read-modify-CAS loop; returns the snapshot the change was applied to
    /// and the saved result. Unchanged values are not written.
    async fn modify<F>(&self, task_id: Uuid, mut apply: F) -> ServiceResult<(Task, Versioned<Task>)>
    where
        F: FnMut(&Task, Option<&Group>) -> ServiceResult<Task> + Send,
    {
        let attempts = self.config.max_attempts();

        for attempt in 1..=attempts {
            let current = self.load(task_id).await?;
            let group = self.group_of(&current.value).await?;
            let next = apply(&current.value, group.as_ref())?;

            if next == current.value {
                return Ok((current.value.clone(), current));
            }

            match self.tasks.replace_task(next, current.version).await {
                Ok(saved) => return Ok((current.value, saved)),
                Err(StoreError::Conflict { .. }) => {
                    debug!(%task_id, attempt, "Task write conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(%task_id, attempts, "Giving up on contended task write");
        Err(ServiceError::WriteContention {
            entity: "Task",
            id: task_id,
            attempts,
        })
    }

    fn assignment_notices<'a>(
        &self,
        task: &Task,
        actor: &str,
        recipients: impl IntoIterator<Item = &'a String>,
    ) -> Vec<Notification> {
        recipients
            .into_iter()
            .filter(|user_id| user_id.as_str() != actor)
            .map(|user_id| Notification::TaskAssigned {
                task_id: task.id,
                task_title: task.title.clone(),
                assigned_by: actor.to_string(),
                recipient: user_id.clone(),
            })
            .collect()
    }

    /// Creates a personal task owned by the caller
    pub async fn create_personal_task(&self, actor: &str, draft: TaskDraft) -> ServiceResult<Task> {
        check_title(&draft.title)?;
        self.check_labels(&draft.labels).await?;

        let task = draft.fill(Task::personal(actor, draft.title.trim()));
        let saved = self.tasks.insert_task(task).await?;

        info!(task_id = %saved.value.id, user_id = actor, "Personal task created");
        Ok(saved.into_inner())
    }

    /// Creates a group task (task managers only)
    ///
    /// Every assignee must be a member of the group.
    pub async fn create_group_task(
        &self,
        actor: &str,
        group_id: Uuid,
        draft: TaskDraft,
        assignees: BTreeSet<String>,
    ) -> ServiceResult<Task> {
        check_title(&draft.title)?;
        let group = self.load_group(group_id).await?;
        require_task_management(&group, actor)?;
        check_assignees(&group, &assignees)?;
        self.check_labels(&draft.labels).await?;

        let task = draft.fill(Task::group(actor, group_id, draft.title.trim(), assignees));
        let task = self.tasks.insert_task(task).await?.into_inner();

        info!(
            task_id = %task.id,
            %group_id,
            user_id = actor,
            assignees = task.assigned_to.len(),
            "Group task created"
        );
        let notices = self.assignment_notices(&task, actor, &task.assigned_to);
        dispatch(self.notifier.as_ref(), notices).await;

        Ok(task)
    }

    /// Fetches a task the caller may view
    pub async fn get_task(&self, actor: &str, task_id: Uuid) -> ServiceResult<Task> {
        let task = self.load(task_id).await?.into_inner();
        let group = self.group_of(&task).await?;
        require_task_view(&task, group.as_ref(), actor)?;

        Ok(task)
    }

    /// The caller's personal tasks, in display order
    pub async fn list_personal_tasks(&self, actor: &str) -> ServiceResult<Vec<Task>> {
        Ok(sorted(self.tasks.list_personal_tasks(actor).await?))
    }

    /// Group tasks assigned to the caller in groups they still belong to
    pub async fn list_assigned_tasks(&self, actor: &str) -> ServiceResult<Vec<Task>> {
        let assigned = self.tasks.list_assigned_tasks(actor).await?;
        let mut membership: HashMap<Uuid, bool> = HashMap::new();
        let mut visible = Vec::with_capacity(assigned.len());

        for task in assigned {
            let Some(group_id) = task.group_id else {
                continue;
            };
            let is_member = match membership.get(&group_id) {
                Some(is_member) => *is_member,
                None => {
                    let is_member = self
                        .groups
                        .get_group(group_id)
                        .await?
                        .is_some_and(|g| g.value.is_member(actor));
                    membership.insert(group_id, is_member);
                    is_member
                }
            };
            if is_member {
                visible.push(task);
            }
        }

        Ok(sorted(visible))
    }

    /// Tasks of a group the caller belongs to
    pub async fn list_group_tasks(&self, actor: &str, group_id: Uuid) -> ServiceResult<Vec<Task>> {
        let group = self.load_group(group_id).await?;
        require_group_member(&group, actor)?;

        Ok(sorted(self.tasks.list_group_tasks(group_id).await?))
    }

    /// Edits a task (owner for personal tasks, task managers for group tasks)
    pub async fn update_task(&self, actor: &str, task_id: Uuid, update: TaskUpdate) -> ServiceResult<Task> {
        if let Some(title) = &update.title {
            check_title(title)?;
        }
        if let Some(labels) = &update.labels {
            self.check_labels(labels).await?;
        }

        let (_, saved) = self
            .modify(task_id, |task, group| {
                require_task_edit(task, group, actor)?;
                Ok(update.apply(task))
            })
            .await?;

        info!(%task_id, user_id = actor, reopened = update.reopen, "Task updated");
        Ok(saved.into_inner())
    }

    /// Replaces the assignees of a group task (task managers only)
    ///
    /// Confirmations already on record are kept.
    pub async fn reassign_task(
        &self,
        actor: &str,
        task_id: Uuid,
        assignees: BTreeSet<String>,
    ) -> ServiceResult<Task> {
        let (before, saved) = self
            .modify(task_id, |task, group| {
                require_group_task(task)?;
                let group = group.ok_or(AuthzError::NotAuthorized)?;
                require_task_management(group, actor)?;
                check_assignees(group, &assignees)?;
                Ok(task.with_assignees(assignees.clone()))
            })
            .await?;
        let task = saved.into_inner();

        info!(%task_id, user_id = actor, assignees = task.assigned_to.len(), "Task reassigned");
        let added = task.assigned_to.difference(&before.assigned_to);
        let notices = self.assignment_notices(&task, actor, added);
        dispatch(self.notifier.as_ref(), notices).await;

        Ok(task)
    }

    /// Deletes a task (owner for personal tasks, task managers for group tasks)
    pub async fn delete_task(&self, actor: &str, task_id: Uuid) -> ServiceResult<()> {
        let task = self.load(task_id).await?.into_inner();
        let group = self.group_of(&task).await?;
        require_task_edit(&task, group.as_ref(), actor)?;

        if !self.tasks.delete_task(task_id).await? {
            return Err(ServiceError::TaskNotFound(task_id));
        }

        info!(%task_id, user_id = actor, "Task deleted");
        Ok(())
    }

    /// Marks a personal task done or not done (owner only)
    pub async fn set_personal_completion(
        &self,
        actor: &str,
        task_id: Uuid,
        completed: bool,
    ) -> ServiceResult<Task> {
        let (_, saved) = self
            .modify(task_id, |task, _| {
                if task.is_group_task {
                    return Err(ServiceError::InvalidState(
                        "Group tasks are completed through confirmation".to_string(),
                    ));
                }
                require_task_owner(task, actor)?;
                Ok(task.with_completed(completed))
            })
            .await?;

        info!(%task_id, user_id = actor, completed, "Personal task completion set");
        Ok(saved.into_inner())
    }

    /// Records the caller's confirmation on a group task (assignees only)
    ///
    /// Confirming twice is a no-op. When `auto_finalize` is on and this was
    /// the last outstanding confirmation, the task is closed in the same
    /// write.
    pub async fn confirm_completion(&self, actor: &str, task_id: Uuid) -> ServiceResult<ConfirmationOutcome> {
        let auto_finalize = self.config.auto_finalize;

        let (before, saved) = self
            .modify(task_id, |task, group| {
                require_group_task(task)?;
                let group = group.ok_or(AuthzError::NotAuthorized)?;
                require_group_member(group, actor)?;
                require_assignee(task, actor)?;
                if task.completion_state() == CompletionState::Closed {
                    return Err(ServiceError::InvalidState("Task is already completed".to_string()));
                }

                let next = task.record_confirmation(actor);
                if auto_finalize && next.all_confirmed() {
                    Ok(next.finalize())
                } else {
                    Ok(next)
                }
            })
            .await?;
        let task = saved.into_inner();

        let newly_confirmed = !before.has_confirmed(actor);
        let finalized = !before.is_completed && task.is_completed;
        info!(
            %task_id,
            user_id = actor,
            confirmations = task.confirmation_count(),
            assignees = task.assigned_to.len(),
            finalized,
            "Completion confirmed"
        );

        let mut notices = Vec::new();
        if newly_confirmed && task.user_id != actor {
            notices.push(Notification::TaskConfirmed {
                task_id,
                confirmed_by: actor.to_string(),
                recipient: task.user_id.clone(),
            });
        }
        if finalized {
            notices.extend(self.completion_notices(&task));
        }
        dispatch(self.notifier.as_ref(), notices).await;

        Ok(ConfirmationOutcome {
            state: task.completion_state(),
            task,
            newly_confirmed,
            finalized,
        })
    }

    /// Closes a group task once every assignee confirmed (task managers only)
    pub async fn finalize_task(&self, actor: &str, task_id: Uuid) -> ServiceResult<Task> {
        let (_, saved) = self
            .modify(task_id, |task, group| {
                require_group_task(task)?;
                let group = group.ok_or(AuthzError::NotAuthorized)?;
                require_task_management(group, actor)?;

                match task.completion_state() {
                    CompletionState::AwaitingFinalization => Ok(task.finalize()),
                    CompletionState::Closed => {
                        Err(ServiceError::InvalidState("Task is already completed".to_string()))
                    }
                    CompletionState::Open => {
                        let confirmed = task
                            .assigned_to
                            .iter()
                            .filter(|user_id| task.has_confirmed(user_id))
                            .count();
                        Err(ServiceError::InvalidState(format!(
                            "Only {} of {} assignees have confirmed",
                            confirmed,
                            task.assigned_to.len()
                        )))
                    }
                }
            })
            .await?;
        let task = saved.into_inner();

        info!(%task_id, user_id = actor, "Group task finalized");
        dispatch(self.notifier.as_ref(), self.completion_notices(&task)).await;

        Ok(task)
    }

    /// Completion progress of a task the caller may view
    pub async fn completion_summary(&self, actor: &str, task_id: Uuid) -> ServiceResult<CompletionSummary> {
        let task = self.get_task(actor, task_id).await?;
        Ok(CompletionSummary::of(&task))
    }

    fn completion_notices(&self, task: &Task) -> Vec<Notification> {
        let mut recipients: BTreeSet<&String> = task.assigned_to.iter().collect();
        recipients.insert(&task.user_id);

        recipients
            .into_iter()
            .map(|recipient| Notification::TaskCompleted {
                task_id: task.id,
                task_title: task.title.clone(),
                recipient: recipient.clone(),
            })
            .collect()
    }
}
