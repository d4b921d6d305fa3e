/// In-memory store
///
/// Implements every storage port over `tokio::sync::RwLock`-guarded maps.
/// The compare-and-swap check and the write happen under the same write
/// lock, so it has the same conflict semantics as the PostgreSQL adapter.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teamtask_shared::models::task::Task;
/// use teamtask_shared::store::{memory::MemoryStore, TaskStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let saved = store.insert_task(Task::personal("u1", "Buy milk")).await?;
///
/// let updated = saved.value.with_completed(true);
/// store.replace_task(updated, saved.version).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    GroupStore, HealthCheck, LabelStore, StoreError, StoreResult, TaskStore, Versioned,
    INITIAL_VERSION,
};
use crate::models::group::Group;
use crate::models::label::Label;
use crate::models::task::Task;

/// Map-backed implementation of all storage ports
#[derive(Debug, Default)]
pub struct MemoryStore {
    groups: RwLock<HashMap<Uuid, Versioned<Group>>>,
    tasks: RwLock<HashMap<Uuid, Versioned<Task>>>,
    labels: RwLock<HashMap<Uuid, Label>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn insert_versioned<T: Clone>(
    map: &mut HashMap<Uuid, Versioned<T>>,
    entity: &'static str,
    id: Uuid,
    value: T,
) -> StoreResult<Versioned<T>> {
    if map.contains_key(&id) {
        return Err(StoreError::Duplicate { entity, id });
    }

    let saved = Versioned::new(value, INITIAL_VERSION);
    map.insert(id, saved.clone());
    Ok(saved)
}

fn replace_versioned<T: Clone>(
    map: &mut HashMap<Uuid, Versioned<T>>,
    entity: &'static str,
    id: Uuid,
    value: T,
    expected_version: i64,
) -> StoreResult<Versioned<T>> {
    let current = map
        .get_mut(&id)
        .ok_or(StoreError::NotFound { entity, id })?;

    if current.version != expected_version {
        return Err(StoreError::Conflict {
            entity,
            id,
            expected: expected_version,
        });
    }

    *current = Versioned::new(value, expected_version + 1);
    Ok(current.clone())
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn insert_group(&self, group: Group) -> StoreResult<Versioned<Group>> {
        let mut groups = self.groups.write().await;
        insert_versioned(&mut groups, "Group", group.id, group)
    }

    async fn get_group(&self, id: Uuid) -> StoreResult<Option<Versioned<Group>>> {
        Ok(self.groups.read().await.get(&id).cloned())
    }

    async fn replace_group(&self, group: Group, expected_version: i64) -> StoreResult<Versioned<Group>> {
        let mut groups = self.groups.write().await;
        replace_versioned(&mut groups, "Group", group.id, group, expected_version)
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.groups.write().await.remove(&id).is_some())
    }

    async fn list_groups_for_member(&self, user_id: &str) -> StoreResult<Vec<Group>> {
        let groups = self.groups.read().await;
        let mut found: Vec<Group> = groups
            .values()
            .filter(|g| g.value.is_member(user_id))
            .map(|g| g.value.clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn list_groups_inviting(&self, user_id: &str) -> StoreResult<Vec<Group>> {
        let groups = self.groups.read().await;
        let mut found: Vec<Group> = groups
            .values()
            .filter(|g| g.value.is_invited(user_id))
            .map(|g| g.value.clone())
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: Task) -> StoreResult<Versioned<Task>> {
        let mut tasks = self.tasks.write().await;
        insert_versioned(&mut tasks, "Task", task.id, task)
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Versioned<Task>>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn replace_task(&self, task: Task, expected_version: i64) -> StoreResult<Versioned<Task>> {
        let mut tasks = self.tasks.write().await;
        replace_versioned(&mut tasks, "Task", task.id, task, expected_version)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }

    async fn delete_tasks_for_group(&self, group_id: Uuid) -> StoreResult<u64> {
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, t| t.value.group_id != Some(group_id));
        Ok((before - tasks.len()) as u64)
    }

    async fn list_personal_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|t| !t.value.is_group_task && t.value.user_id == user_id)
            .map(|t| t.value.clone())
            .collect())
    }

    async fn list_group_tasks(&self, group_id: Uuid) -> StoreResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|t| t.value.is_group_task && t.value.group_id == Some(group_id))
            .map(|t| t.value.clone())
            .collect())
    }

    async fn list_assigned_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let tasks = self.tasks.read().await;
        Ok(tasks
            .values()
            .filter(|t| t.value.is_group_task && t.value.is_assignee(user_id))
            .map(|t| t.value.clone())
            .collect())
    }
}

#[async_trait]
impl LabelStore for MemoryStore {
    async fn insert_label(&self, label: Label) -> StoreResult<Label> {
        let mut labels = self.labels.write().await;
        if labels.contains_key(&label.id) {
            return Err(StoreError::Duplicate {
                entity: "Label",
                id: label.id,
            });
        }
        labels.insert(label.id, label.clone());
        Ok(label)
    }

    async fn get_label(&self, id: Uuid) -> StoreResult<Option<Label>> {
        Ok(self.labels.read().await.get(&id).cloned())
    }

    async fn list_labels(&self, user_id: &str) -> StoreResult<Vec<Label>> {
        let labels = self.labels.read().await;
        let mut found: Vec<Label> = labels
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn delete_label(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.labels.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
