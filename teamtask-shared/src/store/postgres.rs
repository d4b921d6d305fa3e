/// PostgreSQL store
///
/// Implements the storage ports with sqlx. Set-valued fields are `TEXT[]` /
/// `UUID[]` columns, maps are `JSONB`, and every row carries a `version`
/// column used for compare-and-swap:
///
/// ```sql
/// UPDATE tasks SET ..., version = version + 1
/// WHERE id = $1 AND version = $2
/// ```
///
/// When no row comes back the adapter checks whether the row exists at all
/// to tell `Conflict` from `NotFound`.
///
/// # Example
///
/// ```no_run
/// use teamtask_shared::db::pool::{create_pool, DatabaseConfig};
/// use teamtask_shared::models::group::Group;
/// use teamtask_shared::store::{postgres::PgStore, GroupStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig {
///     url: std::env::var("DATABASE_URL")?,
///     ..Default::default()
/// })
/// .await?;
///
/// let store = PgStore::new(pool);
/// let saved = store.insert_group(Group::new("Team", "", "u1")).await?;
/// println!("Group {} at version {}", saved.value.id, saved.version);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{GroupStore, HealthCheck, LabelStore, StoreError, StoreResult, TaskStore, Versioned};
use crate::models::group::{Group, GroupRole};
use crate::models::label::Label;
use crate::models::task::Task;

/// sqlx-backed implementation of all storage ports
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn exists(&self, table: Table, id: Uuid) -> StoreResult<bool> {
        let sql = match table {
            Table::Groups => "SELECT EXISTS(SELECT 1 FROM groups WHERE id = $1)",
            Table::Tasks => "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = $1)",
        };

        let exists: bool = sqlx::query_scalar(sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists)
    }

    /// Turns an empty `UPDATE ... RETURNING` into the right error
    async fn missing_row_error(
        &self,
        table: Table,
        id: Uuid,
        expected_version: i64,
    ) -> StoreError {
        let entity = table.entity();
        match self.exists(table, id).await {
            Ok(true) => StoreError::Conflict {
                entity,
                id,
                expected: expected_version,
            },
            Ok(false) => StoreError::NotFound { entity, id },
            Err(e) => e,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Table {
    Groups,
    Tasks,
}

impl Table {
    fn entity(&self) -> &'static str {
        match self {
            Table::Groups => "Group",
            Table::Tasks => "Task",
        }
    }
}

fn map_insert_error(err: sqlx::Error, entity: &'static str, id: Uuid) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate { entity, id }
        }
        _ => StoreError::Database(err),
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    description: String,
    created_by: String,
    members: Vec<String>,
    member_roles: Json<BTreeMap<String, GroupRole>>,
    pending_invitations: Vec<String>,
    created_at: DateTime<Utc>,
    version: i64,
}

impl From<GroupRow> for Versioned<Group> {
    fn from(row: GroupRow) -> Self {
        Versioned::new(
            Group {
                id: row.id,
                name: row.name,
                description: row.description,
                created_by: row.created_by,
                members: row.members.into_iter().collect(),
                member_roles: row.member_roles.0,
                pending_invitations: row.pending_invitations.into_iter().collect(),
                created_at: row.created_at,
            },
            row.version,
        )
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: Uuid,
    title: String,
    description: String,
    is_completed: bool,
    created_at: DateTime<Utc>,
    due_date: Option<DateTime<Utc>>,
    priority: i32,
    user_id: String,
    is_group_task: bool,
    group_id: Option<Uuid>,
    assigned_to: Vec<String>,
    labels: Vec<Uuid>,
    completion_confirmations: Json<BTreeMap<String, bool>>,
    version: i64,
}

impl From<TaskRow> for Versioned<Task> {
    fn from(row: TaskRow) -> Self {
        Versioned::new(
            Task {
                id: row.id,
                title: row.title,
                description: row.description,
                is_completed: row.is_completed,
                created_at: row.created_at,
                due_date: row.due_date,
                priority: row.priority,
                user_id: row.user_id,
                is_group_task: row.is_group_task,
                group_id: row.group_id,
                assigned_to: row.assigned_to.into_iter().collect(),
                labels: row.labels.into_iter().collect(),
                completion_confirmations: row.completion_confirmations.0,
            },
            row.version,
        )
    }
}

#[derive(sqlx::FromRow)]
struct LabelRow {
    id: Uuid,
    user_id: String,
    name: String,
    color: String,
    created_at: DateTime<Utc>,
}

impl From<LabelRow> for Label {
    fn from(row: LabelRow) -> Self {
        Label {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            color: row.color,
            created_at: row.created_at,
        }
    }
}

fn into_values<R, T>(rows: Vec<R>) -> Vec<T>
where
    R: Into<Versioned<T>>,
{
    rows.into_iter().map(|row| row.into().value).collect()
}

#[async_trait]
impl GroupStore for PgStore {
    async fn insert_group(&self, group: Group) -> StoreResult<Versioned<Group>> {
        let id = group.id;
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            INSERT INTO groups (id, name, description, created_by, members,
                                member_roles, pending_invitations, created_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1)
            RETURNING id, name, description, created_by, members,
                      member_roles, pending_invitations, created_at, version
            "#,
        )
        .bind(group.id)
        .bind(group.name)
        .bind(group.description)
        .bind(group.created_by)
        .bind(group.members.into_iter().collect::<Vec<_>>())
        .bind(Json(group.member_roles))
        .bind(group.pending_invitations.into_iter().collect::<Vec<_>>())
        .bind(group.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Group", id))?;

        Ok(row.into())
    }

    async fn get_group(&self, id: Uuid) -> StoreResult<Option<Versioned<Group>>> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, created_by, members,
                   member_roles, pending_invitations, created_at, version
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn replace_group(&self, group: Group, expected_version: i64) -> StoreResult<Versioned<Group>> {
        let id = group.id;
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            UPDATE groups
            SET name = $3,
                description = $4,
                members = $5,
                member_roles = $6,
                pending_invitations = $7,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING id, name, description, created_by, members,
                      member_roles, pending_invitations, created_at, version
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(group.name)
        .bind(group.description)
        .bind(group.members.into_iter().collect::<Vec<_>>())
        .bind(Json(group.member_roles))
        .bind(group.pending_invitations.into_iter().collect::<Vec<_>>())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.missing_row_error(Table::Groups, id, expected_version).await),
        }
    }

    async fn delete_group(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_groups_for_member(&self, user_id: &str) -> StoreResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, created_by, members,
                   member_roles, pending_invitations, created_at, version
            FROM groups
            WHERE created_by = $1 OR $1 = ANY(members)
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_values(rows))
    }

    async fn list_groups_inviting(&self, user_id: &str) -> StoreResult<Vec<Group>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, created_by, members,
                   member_roles, pending_invitations, created_at, version
            FROM groups
            WHERE $1 = ANY(pending_invitations)
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_values(rows))
    }
}

#[async_trait]
impl TaskStore for PgStore {
    async fn insert_task(&self, task: Task) -> StoreResult<Versioned<Task>> {
        let id = task.id;
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            INSERT INTO tasks (id, title, description, is_completed, created_at, due_date,
                               priority, user_id, is_group_task, group_id, assigned_to,
                               labels, completion_confirmations, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 1)
            RETURNING id, title, description, is_completed, created_at, due_date,
                      priority, user_id, is_group_task, group_id, assigned_to,
                      labels, completion_confirmations, version
            "#,
        )
        .bind(task.id)
        .bind(task.title)
        .bind(task.description)
        .bind(task.is_completed)
        .bind(task.created_at)
        .bind(task.due_date)
        .bind(task.priority)
        .bind(task.user_id)
        .bind(task.is_group_task)
        .bind(task.group_id)
        .bind(task.assigned_to.into_iter().collect::<Vec<_>>())
        .bind(task.labels.into_iter().collect::<Vec<_>>())
        .bind(Json(task.completion_confirmations))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Task", id))?;

        Ok(row.into())
    }

    async fn get_task(&self, id: Uuid) -> StoreResult<Option<Versioned<Task>>> {
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, is_completed, created_at, due_date,
                   priority, user_id, is_group_task, group_id, assigned_to,
                   labels, completion_confirmations, version
            FROM tasks
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn replace_task(&self, task: Task, expected_version: i64) -> StoreResult<Versioned<Task>> {
        let id = task.id;
        let row = sqlx::query_as::<_, TaskRow>(
            r#"
            UPDATE tasks
            SET title = $3,
                description = $4,
                is_completed = $5,
                due_date = $6,
                priority = $7,
                assigned_to = $8,
                labels = $9,
                completion_confirmations = $10,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING id, title, description, is_completed, created_at, due_date,
                      priority, user_id, is_group_task, group_id, assigned_to,
                      labels, completion_confirmations, version
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(task.title)
        .bind(task.description)
        .bind(task.is_completed)
        .bind(task.due_date)
        .bind(task.priority)
        .bind(task.assigned_to.into_iter().collect::<Vec<_>>())
        .bind(task.labels.into_iter().collect::<Vec<_>>())
        .bind(Json(task.completion_confirmations))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.into()),
            None => Err(self.missing_row_error(Table::Tasks, id, expected_version).await),
        }
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_tasks_for_group(&self, group_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM tasks WHERE group_id = $1")
            .bind(group_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_personal_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, is_completed, created_at, due_date,
                   priority, user_id, is_group_task, group_id, assigned_to,
                   labels, completion_confirmations, version
            FROM tasks
            WHERE user_id = $1 AND NOT is_group_task
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_values(rows))
    }

    async fn list_group_tasks(&self, group_id: Uuid) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, is_completed, created_at, due_date,
                   priority, user_id, is_group_task, group_id, assigned_to,
                   labels, completion_confirmations, version
            FROM tasks
            WHERE group_id = $1 AND is_group_task
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_values(rows))
    }

    async fn list_assigned_tasks(&self, user_id: &str) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(
            r#"
            SELECT id, title, description, is_completed, created_at, due_date,
                   priority, user_id, is_group_task, group_id, assigned_to,
                   labels, completion_confirmations, version
            FROM tasks
            WHERE is_group_task AND $1 = ANY(assigned_to)
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_values(rows))
    }
}

#[async_trait]
impl LabelStore for PgStore {
    async fn insert_label(&self, label: Label) -> StoreResult<Label> {
        let id = label.id;
        let row = sqlx::query_as::<_, LabelRow>(
            r#"
            INSERT INTO labels (id, user_id, name, color, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, name, color, created_at
            "#,
        )
        .bind(label.id)
        .bind(label.user_id)
        .bind(label.name)
        .bind(label.color)
        .bind(label.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Label", id))?;

        Ok(row.into())
    }

    async fn get_label(&self, id: Uuid) -> StoreResult<Option<Label>> {
        let row = sqlx::query_as::<_, LabelRow>(
            "SELECT id, user_id, name, color, created_at FROM labels WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_labels(&self, user_id: &str) -> StoreResult<Vec<Label>> {
        let rows = sqlx::query_as::<_, LabelRow>(
            r#"
            SELECT id, user_id, name, color, created_at
            FROM labels
            WHERE user_id = $1
            ORDER BY name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_label(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM labels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl HealthCheck for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
