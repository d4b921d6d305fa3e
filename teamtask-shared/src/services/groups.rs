/// Group service
///
/// Group lifecycle, invitations, membership and roles. Authorization is
/// decided by the guards in [`crate::auth::authorization`]; the membership
/// rules themselves live on [`Group`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use teamtask_shared::models::group::GroupRole;
/// use teamtask_shared::notify::TracingNotifier;
/// use teamtask_shared::services::{GroupService, ServiceConfig};
/// use teamtask_shared::store::memory::MemoryStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// let groups = GroupService::new(
///     store.clone(),
///     store,
///     Arc::new(TracingNotifier::new()),
///     ServiceConfig::default(),
/// );
///
/// let group = groups.create_group("u1", "Launch", "").await?;
/// groups.invite("u1", group.id, "u2").await?;
/// groups.accept_invitation("u2", group.id, "u2").await?;
/// groups.set_role("u1", group.id, "u2", GroupRole::Deputy).await?;
///
/// let permissions = groups.permissions("u2", group.id).await?;
/// assert!(permissions.can_manage_tasks);
/// # Ok(())
/// # }
/// ```

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{dispatch, ServiceConfig, ServiceError, ServiceResult};
use crate::auth::authorization::{
    require_group_member, require_member_management, require_role_management, AuthzError,
};
use crate::models::group::{Group, GroupRole};
use crate::notify::{Notification, Notifier};
use crate::store::{GroupStore, StoreError, TaskStore, Versioned};

/// Groups visible to a user
#[derive(Debug, Clone, Serialize)]
pub struct GroupListing {
    /// Groups the user belongs to
    pub groups: Vec<Group>,

    /// Groups with a pending invitation for the user
    pub invitations: Vec<Group>,
}

/// A user's resolved role and capabilities in one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupPermissions {
    pub group_id: Uuid,
    pub user_id: String,
    pub role: GroupRole,
    pub is_leader: bool,
    pub is_admin: bool,
    pub can_manage_tasks: bool,
    pub can_manage_members: bool,
    pub can_manage_roles: bool,
}

impl GroupPermissions {
    pub fn resolve(group: &Group, user_id: &str) -> Self {
        Self {
            group_id: group.id,
            user_id: user_id.to_string(),
            role: group.resolve_role(user_id),
            is_leader: group.is_leader(user_id),
            is_admin: group.is_admin(user_id),
            can_manage_tasks: group.can_manage_tasks(user_id),
            can_manage_members: group.can_manage_members(user_id),
            can_manage_roles: group.can_manage_roles(user_id),
        }
    }
}

/// Group operations
#[derive(Clone)]
pub struct GroupService {
    groups: Arc<dyn GroupStore>,
    tasks: Arc<dyn TaskStore>,
    notifier: Arc<dyn Notifier>,
    config: ServiceConfig,
}

impl GroupService {
    pub fn new(
        groups: Arc<dyn GroupStore>,
        tasks: Arc<dyn TaskStore>,
        notifier: Arc<dyn Notifier>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            groups,
            tasks,
            notifier,
            config,
        }
    }

    async fn load(&self, group_id: Uuid) -> ServiceResult<Versioned<Group>> {
        self.groups
            .get_group(group_id)
            .await?
            .ok_or(ServiceError::GroupNotFound(group_id))
    }

    /// Read-modify-CAS loop; returns the snapshot the change was applied to
    /// and the saved result
    async fn modify<F>(&self, group_id: Uuid, mut apply: F) -> ServiceResult<(Group, Versioned<Group>)>
    where
        F: FnMut(&Group) -> ServiceResult<Group> + Send,
    {
        let attempts = self.config.max_attempts();

        for attempt in 1..=attempts {
            let current = self.load(group_id).await?;
            let next = apply(&current.value)?;

            match self.groups.replace_group(next, current.version).await {
                Ok(saved) => return Ok((current.value, saved)),
                Err(StoreError::Conflict { .. }) => {
                    debug!(%group_id, attempt, "Group write conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(%group_id, attempts, "Giving up on contended group write");
        Err(ServiceError::WriteContention {
            entity: "Group",
            id: group_id,
            attempts,
        })
    }

    /// Creates a group led by `user_id`
    pub async fn create_group(
        &self,
        user_id: &str,
        name: &str,
        description: &str,
    ) -> ServiceResult<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::InvalidInput("Group name cannot be empty".to_string()));
        }

        let saved = self
            .groups
            .insert_group(Group::new(name, description, user_id))
            .await?;

        info!(group_id = %saved.value.id, user_id, "Group created");
        Ok(saved.into_inner())
    }

    /// Fetches a group for a member or an invitee
    pub async fn get_group(&self, user_id: &str, group_id: Uuid) -> ServiceResult<Group> {
        let group = self.load(group_id).await?.into_inner();
        if !group.is_invited(user_id) {
            require_group_member(&group, user_id)?;
        }

        Ok(group)
    }

    /// Groups the user belongs to or is invited to
    pub async fn list_groups(&self, user_id: &str) -> ServiceResult<GroupListing> {
        Ok(GroupListing {
            groups: self.groups.list_groups_for_member(user_id).await?,
            invitations: self.groups.list_groups_inviting(user_id).await?,
        })
    }

    /// The caller's resolved role and capabilities
    pub async fn permissions(&self, user_id: &str, group_id: Uuid) -> ServiceResult<GroupPermissions> {
        let group = self.load(group_id).await?.into_inner();
        require_group_member(&group, user_id)?;

        Ok(GroupPermissions::resolve(&group, user_id))
    }

    /// Invites a user (member managers only)
    pub async fn invite(&self, actor: &str, group_id: Uuid, invitee: &str) -> ServiceResult<Group> {
        let (_, saved) = self
            .modify(group_id, |group| {
                require_member_management(group, actor)?;
                Ok(group.invite(invitee)?)
            })
            .await?;
        let group = saved.into_inner();

        info!(%group_id, user_id = invitee, invited_by = actor, "User invited to group");
        dispatch(
            self.notifier.as_ref(),
            vec![Notification::GroupInvitation {
                group_id,
                group_name: group.name.clone(),
                invited_by: actor.to_string(),
                recipient: invitee.to_string(),
            }],
        )
        .await;

        Ok(group)
    }

    /// Accepts an invitation, by the invitee or a member manager
    pub async fn accept_invitation(
        &self,
        actor: &str,
        group_id: Uuid,
        invitee: &str,
    ) -> ServiceResult<Group> {
        let (_, saved) = self
            .modify(group_id, |group| {
                if actor != invitee {
                    require_member_management(group, actor)?;
                }
                Ok(group.accept_invitation(invitee)?)
            })
            .await?;

        info!(%group_id, user_id = invitee, "Invitation accepted");
        Ok(saved.into_inner())
    }

    /// Declines an invitation, by the invitee or a member manager
    pub async fn decline_invitation(
        &self,
        actor: &str,
        group_id: Uuid,
        invitee: &str,
    ) -> ServiceResult<Group> {
        let (_, saved) = self
            .modify(group_id, |group| {
                if actor != invitee {
                    require_member_management(group, actor)?;
                }
                Ok(group.decline_invitation(invitee)?)
            })
            .await?;

        info!(%group_id, user_id = invitee, "Invitation declined");
        Ok(saved.into_inner())
    }

    /// Sets a member's role (role managers only)
    pub async fn set_role(
        &self,
        actor: &str,
        group_id: Uuid,
        target: &str,
        role: GroupRole,
    ) -> ServiceResult<Group> {
        let (before, saved) = self
            .modify(group_id, |group| {
                require_role_management(group, actor)?;
                Ok(group.set_role(target, role)?)
            })
            .await?;

        info!(%group_id, user_id = target, role = %role, "Member role set");
        if before.resolve_role(target) != role {
            dispatch(
                self.notifier.as_ref(),
                vec![Notification::RoleChanged {
                    group_id,
                    role,
                    recipient: target.to_string(),
                }],
            )
            .await;
        }

        Ok(saved.into_inner())
    }

    /// Removes a member; members may also remove themselves
    pub async fn remove_member(&self, actor: &str, group_id: Uuid, target: &str) -> ServiceResult<Group> {
        let (_, saved) = self
            .modify(group_id, |group| {
                if actor != target {
                    require_member_management(group, actor)?;
                }
                Ok(group.remove_member(target)?)
            })
            .await?;
        let group = saved.into_inner();

        info!(%group_id, user_id = target, removed_by = actor, "Member removed");
        if actor != target {
            dispatch(
                self.notifier.as_ref(),
                vec![Notification::MemberRemoved {
                    group_id,
                    group_name: group.name.clone(),
                    recipient: target.to_string(),
                }],
            )
            .await;
        }

        Ok(group)
    }

    /// Deletes a group and all of its tasks (leader only)
    pub async fn delete_group(&self, actor: &str, group_id: Uuid) -> ServiceResult<()> {
        let group = self.load(group_id).await?.into_inner();
        if !group.is_leader(actor) {
            warn!(%group_id, user_id = actor, "Rejected group deletion by non-leader");
            return Err(AuthzError::NotAuthorized.into());
        }

        // Group before its tasks; a racing create then sees GroupNotFound.
        if !self.groups.delete_group(group_id).await? {
            return Err(ServiceError::GroupNotFound(group_id));
        }
        let removed_tasks = self.tasks.delete_tasks_for_group(group_id).await?;

        info!(%group_id, removed_tasks, "Group deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authorization::Capability;
    use crate::models::group::GroupError;
    use crate::models::task::Task;
    use crate::notify::RecordingNotifier;
    use crate::services::{TaskDraft, TaskService};
    use crate::store::memory::MemoryStore;

    fn setup() -> (GroupService, Arc<MemoryStore>, Arc<RecordingNotifier>) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let service = GroupService::new(
            store.clone(),
            store.clone(),
            notifier.clone(),
            ServiceConfig::default(),
        );
        (service, store, notifier)
    }

    async fn team(service: &GroupService) -> Group {
        let group = service.create_group("leader", "Team", "").await.unwrap();
        for user in ["deputy", "member"] {
            service.invite("leader", group.id, user).await.unwrap();
            service.accept_invitation(user, group.id, user).await.unwrap();
        }
        service
            .set_role("leader", group.id, "deputy", GroupRole::Deputy)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_group_makes_creator_leader() {
        let (service, _, _) = setup();
        let group = service.create_group("u1", "  Launch ", "prep").await.unwrap();

        assert_eq!(group.name, "Launch");
        assert!(group.is_member("u1"));
        let permissions = service.permissions("u1", group.id).await.unwrap();
        assert_eq!(permissions.role, GroupRole::Leader);
        assert!(permissions.can_manage_members);
    }

    #[tokio::test]
    async fn test_create_group_rejects_blank_name() {
        let (service, _, _) = setup();
        let result = service.create_group("u1", "   ", "").await;

        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_invite_and_accept_flow() {
        let (service, _, notifier) = setup();
        let group = service.create_group("u1", "Team", "").await.unwrap();

        service.invite("u1", group.id, "u2").await.unwrap();
        assert_eq!(notifier.sent_to("u2").await.len(), 1);

        // invitee can see the group before accepting
        assert!(service.get_group("u2", group.id).await.is_ok());
        let listing = service.list_groups("u2").await.unwrap();
        assert!(listing.groups.is_empty());
        assert_eq!(listing.invitations.len(), 1);

        let group = service.accept_invitation("u2", group.id, "u2").await.unwrap();
        assert!(group.is_member("u2"));
        assert_eq!(
            service.permissions("u2", group.id).await.unwrap().role,
            GroupRole::Member
        );
    }

    #[tokio::test]
    async fn test_only_leader_invites() {
        let (service, _, _) = setup();
        let group = team(&service).await;

        let result = service.invite("deputy", group.id, "u9").await;
        assert!(matches!(
            result,
            Err(ServiceError::Authz(AuthzError::InsufficientRole {
                required: Capability::ManageMembers,
                actual: GroupRole::Deputy,
            }))
        ));
    }

    #[tokio::test]
    async fn test_leader_declines_on_behalf_of_group() {
        let (service, _, _) = setup();
        let group = service.create_group("u1", "Team", "").await.unwrap();
        service.invite("u1", group.id, "u2").await.unwrap();

        assert!(service.decline_invitation("u3", group.id, "u2").await.is_err());
        let group = service.decline_invitation("u1", group.id, "u2").await.unwrap();
        assert!(!group.is_invited("u2"));
    }

    #[tokio::test]
    async fn test_accept_without_invitation() {
        let (service, _, _) = setup();
        let group = service.create_group("u1", "Team", "").await.unwrap();

        let result = service.accept_invitation("u2", group.id, "u2").await;
        assert!(matches!(
            result,
            Err(ServiceError::Group(GroupError::NotInvited(_)))
        ));
    }

    #[tokio::test]
    async fn test_set_role_notifies_on_change_only() {
        let (service, _, notifier) = setup();
        let group = team(&service).await;
        let before = notifier.sent_to("deputy").await.len();

        service
            .set_role("leader", group.id, "deputy", GroupRole::Deputy)
            .await
            .unwrap();
        assert_eq!(notifier.sent_to("deputy").await.len(), before);

        let group = service
            .set_role("leader", group.id, "deputy", GroupRole::Member)
            .await
            .unwrap();
        assert_eq!(group.member_roles.get("deputy"), Some(&GroupRole::Member));
        assert_eq!(notifier.sent_to("deputy").await.len(), before + 1);
    }

    #[tokio::test]
    async fn test_deputy_cannot_set_roles() {
        let (service, _, _) = setup();
        let group = team(&service).await;

        let result = service
            .set_role("deputy", group.id, "member", GroupRole::Deputy)
            .await;
        assert!(matches!(result, Err(ServiceError::Authz(_))));
    }

    #[tokio::test]
    async fn test_remove_and_leave() {
        let (service, _, notifier) = setup();
        let group = team(&service).await;

        let group = service.remove_member("member", group.id, "member").await.unwrap();
        assert!(!group.is_member("member"));
        assert!(notifier
            .sent_to("member")
            .await
            .iter()
            .all(|n| !matches!(n, Notification::MemberRemoved { .. })));

        assert!(service.remove_member("deputy", group.id, "leader").await.is_err());
        let group = service.remove_member("leader", group.id, "deputy").await.unwrap();
        assert!(!group.member_roles.contains_key("deputy"));
        assert!(matches!(
            service.remove_member("leader", group.id, "leader").await,
            Err(ServiceError::Group(GroupError::CreatorImmutable))
        ));
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_group() {
        let (service, _, _) = setup();
        let group = team(&service).await;

        assert!(matches!(
            service.get_group("outsider", group.id).await,
            Err(ServiceError::Authz(AuthzError::NotMember(_)))
        ));
        assert!(service.permissions("outsider", group.id).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_group_removes_tasks() {
        let (service, store, _) = setup();
        let group = team(&service).await;
        store
            .insert_task(Task::group("leader", group.id, "Plan", ["member"]))
            .await
            .unwrap();

        assert!(service.delete_group("deputy", group.id).await.is_err());
        service.delete_group("leader", group.id).await.unwrap();

        assert!(store.list_group_tasks(group.id).await.unwrap().is_empty());
        assert!(matches!(
            service.get_group("leader", group.id).await,
            Err(ServiceError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stored_leader_entry_grants_nothing_to_non_creator() {
        let (service, store, _) = setup();
        let group = team(&service).await;
        let group_id = group.id;
        let stored = store.get_group(group_id).await.unwrap().unwrap();

        let mut tampered = group.clone();
        tampered.member_roles.insert("member".to_string(), GroupRole::Leader);
        store.replace_group(tampered, stored.version).await.unwrap();

        let permissions = service.permissions("member", group_id).await.unwrap();
        assert_eq!(permissions.role, GroupRole::Member);
        assert!(!permissions.is_leader);
        assert!(!permissions.can_manage_tasks);

        let result = service.delete_group("member", group_id).await;
        assert!(matches!(result, Err(ServiceError::Authz(AuthzError::NotAuthorized))));
        assert!(service.get_group("leader", group_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_task_creation_fails_once_group_is_deleted() {
        let (service, store, _) = setup();
        let group = team(&service).await;
        let tasks = TaskService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(RecordingNotifier::new()),
            ServiceConfig::default(),
        );

        service.delete_group("leader", group.id).await.unwrap();

        let result = tasks
            .create_group_task(
                "leader",
                group.id,
                TaskDraft::titled("Too late"),
                ["member".to_string()].into_iter().collect(),
            )
            .await;
        assert!(matches!(result, Err(ServiceError::GroupNotFound(_))));
        assert!(store.list_group_tasks(group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_group() {
        let (service, _, _) = setup();
        let result = service.invite("u1", Uuid::new_v4(), "u2").await;

        assert!(matches!(result, Err(ServiceError::GroupNotFound(_))));
    }
}
