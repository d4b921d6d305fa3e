/// Authorization guards
///
/// Result-returning checks used by the services before any mutation. Every
/// group decision goes through the role resolver predicates on
/// [`Group`]; nothing here compares against `created_by` directly.
///
/// # Permission Model
///
/// 1. **Group membership**: Required to see a group and its tasks
/// 2. **Capabilities**: `ManageTasks` (leader, deputy), `ManageMembers` and
///    `ManageRoles` (leader)
/// 3. **Task ownership**: Personal tasks are visible and editable by their owner only
/// 4. **Assignment**: Only assignees confirm a group task
///
/// # Example
///
/// ```
/// use teamtask_shared::auth::authorization::{require_task_management, AuthzError};
/// use teamtask_shared::models::group::Group;
///
/// let group = Group::new("Team", "", "u1");
/// assert!(require_task_management(&group, "u1").is_ok());
/// assert!(matches!(
///     require_task_management(&group, "u2"),
///     Err(AuthzError::InsufficientRole { .. })
/// ));
/// ```

use uuid::Uuid;

use crate::models::group::{Group, GroupRole};
use crate::models::task::Task;

/// Named group capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Create, edit, delete, reassign and finalize group tasks
    ManageTasks,

    /// Invite and remove members, accept/decline on behalf of the group
    ManageMembers,

    /// Promote and demote deputies
    ManageRoles,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ManageTasks => "manage_tasks",
            Capability::ManageMembers => "manage_members",
            Capability::ManageRoles => "manage_roles",
        }
    }

    /// Evaluates the capability for a user
    pub fn allows(&self, group: &Group, user_id: &str) -> bool {
        match self {
            Capability::ManageTasks => group.can_manage_tasks(user_id),
            Capability::ManageMembers => group.can_manage_members(user_id),
            Capability::ManageRoles => group.can_manage_roles(user_id),
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// User is not a member of the group
    #[error("Not a member of group {0}")]
    NotMember(Uuid),

    /// User's role does not grant the capability
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole {
        required: Capability,
        actual: GroupRole,
    },

    /// User is not assigned to the task
    #[error("Not assigned to task {0}")]
    NotAssignee(Uuid),

    /// User doesn't own the resource
    #[error("Not authorized to access this resource")]
    NotAuthorized,
}

/// Checks that a user belongs to a group
pub fn require_group_member(group: &Group, user_id: &str) -> Result<(), AuthzError> {
    if !group.is_member(user_id) {
        return Err(AuthzError::NotMember(group.id));
    }

    Ok(())
}

/// Checks a capability, reporting the resolved role on failure
pub fn require_capability(
    group: &Group,
    user_id: &str,
    capability: Capability,
) -> Result<(), AuthzError> {
    if !capability.allows(group, user_id) {
        return Err(AuthzError::InsufficientRole {
            required: capability,
            actual: group.resolve_role(user_id),
        });
    }

    Ok(())
}

pub fn require_task_management(group: &Group, user_id: &str) -> Result<(), AuthzError> {
    require_capability(group, user_id, Capability::ManageTasks)
}

pub fn require_member_management(group: &Group, user_id: &str) -> Result<(), AuthzError> {
    require_capability(group, user_id, Capability::ManageMembers)
}

pub fn require_role_management(group: &Group, user_id: &str) -> Result<(), AuthzError> {
    require_capability(group, user_id, Capability::ManageRoles)
}

/// Checks that a user is assigned to a task
pub fn require_assignee(task: &Task, user_id: &str) -> Result<(), AuthzError> {
    if !task.is_assignee(user_id) {
        return Err(AuthzError::NotAssignee(task.id));
    }

    Ok(())
}

/// Checks that a user owns a task
pub fn require_task_owner(task: &Task, user_id: &str) -> Result<(), AuthzError> {
    if task.user_id != user_id {
        return Err(AuthzError::NotAuthorized);
    }

    Ok(())
}

/// Checks read access to a task
///
/// Personal tasks: the owner. Group tasks: any member of the owning group.
/// `group` must be the task's group for group tasks and is ignored otherwise.
pub fn require_task_view(task: &Task, group: Option<&Group>, user_id: &str) -> Result<(), AuthzError> {
    match (task.is_group_task, group) {
        (false, _) => require_task_owner(task, user_id),
        (true, Some(group)) => require_group_member(group, user_id),
        (true, None) => Err(AuthzError::NotAuthorized),
    }
}

/// Checks edit access to a task
///
/// Personal tasks: the owner. Group tasks: task managers of the owning group.
pub fn require_task_edit(task: &Task, group: Option<&Group>, user_id: &str) -> Result<(), AuthzError> {
    match (task.is_group_task, group) {
        (false, _) => require_task_owner(task, user_id),
        (true, Some(group)) => require_task_management(group, user_id),
        (true, None) => Err(AuthzError::NotAuthorized),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team() -> Group {
        let mut group = Group::new("Team", "", "leader");
        group.members.insert("deputy".to_string());
        group.members.insert("member".to_string());
        group.member_roles.insert("deputy".to_string(), GroupRole::Deputy);
        group
    }

    #[test]
    fn test_capabilities_follow_resolver() {
        let group = team();

        assert!(require_task_management(&group, "leader").is_ok());
        assert!(require_task_management(&group, "deputy").is_ok());
        assert_eq!(
            require_task_management(&group, "member"),
            Err(AuthzError::InsufficientRole {
                required: Capability::ManageTasks,
                actual: GroupRole::Member,
            })
        );

        assert!(require_member_management(&group, "leader").is_ok());
        assert!(require_member_management(&group, "deputy").is_err());
        assert!(require_role_management(&group, "leader").is_ok());
        assert!(require_role_management(&group, "deputy").is_err());
    }

    #[test]
    fn test_require_group_member() {
        let group = team();

        assert!(require_group_member(&group, "member").is_ok());
        assert_eq!(
            require_group_member(&group, "outsider"),
            Err(AuthzError::NotMember(group.id))
        );
    }

    #[test]
    fn test_personal_task_access() {
        let task = Task::personal("owner", "Buy milk");

        assert!(require_task_view(&task, None, "owner").is_ok());
        assert!(require_task_edit(&task, None, "owner").is_ok());
        assert_eq!(require_task_view(&task, None, "other"), Err(AuthzError::NotAuthorized));
    }

    #[test]
    fn test_group_task_access() {
        let group = team();
        let task = Task::group("leader", group.id, "Plan", ["member"]);

        assert!(require_task_view(&task, Some(&group), "member").is_ok());
        assert!(require_task_view(&task, Some(&group), "outsider").is_err());
        assert!(require_task_edit(&task, Some(&group), "deputy").is_ok());
        assert!(require_task_edit(&task, Some(&group), "member").is_err());
        assert!(require_task_view(&task, None, "member").is_err());
    }

    #[test]
    fn test_require_assignee() {
        let task = Task::group("leader", Uuid::new_v4(), "Plan", ["member"]);

        assert!(require_assignee(&task, "member").is_ok());
        assert_eq!(require_assignee(&task, "deputy"), Err(AuthzError::NotAssignee(task.id)));
    }

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::InsufficientRole {
            required: Capability::ManageMembers,
            actual: GroupRole::Deputy,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient permissions: requires manage_members, has deputy"
        );
    }
}
