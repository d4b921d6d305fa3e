/// Group model, role resolver and membership operations
///
/// A group is a collaborative workspace. Its creator is permanently the
/// leader; every other member's role comes from `member_roles`, falling back
/// to `member` when no entry exists.
///
/// # Roles
///
/// - **leader**: The creator. Full authority over tasks, members and roles
/// - **deputy**: Can create, edit, delete, reassign and finalize group tasks
/// - **member**: Can view group tasks and confirm their own assignments
///
/// # Role Resolution
///
/// Resolution is evaluated in a fixed precedence order:
///
/// ```text
/// user == created_by                   → Leader
/// member_roles[user] is deputy/member  → Assigned(role)
/// otherwise                            → DefaultMember
/// ```
///
/// The creator check always wins, even when `member_roles` carries a stale
/// entry for the creator. A `leader` entry for anyone else resolves to
/// `member`.
///
/// # Example
///
/// ```
/// use teamtask_shared::models::group::{Group, GroupRole};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let group = Group::new("Launch", "Release prep", "u1")
///     .invite("u2")?
///     .accept_invitation("u2")?
///     .set_role("u2", GroupRole::Deputy)?;
///
/// assert_eq!(group.resolve_role("u1"), GroupRole::Leader);
/// assert_eq!(group.resolve_role("u2"), GroupRole::Deputy);
/// assert_eq!(group.resolve_role("u3"), GroupRole::Member);
/// assert!(group.can_manage_tasks("u2"));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Role of a user within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    /// Group creator: manages tasks, members and roles
    Leader,

    /// Can manage group tasks but not membership
    Deputy,

    /// Can view tasks and confirm own assignments
    Member,
}

impl GroupRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Leader => "leader",
            GroupRole::Deputy => "deputy",
            GroupRole::Member => "member",
        }
    }

    /// Leader and deputy are the admin roles
    pub fn is_admin(&self) -> bool {
        matches!(self, GroupRole::Leader | GroupRole::Deputy)
    }
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a resolved role came from, in precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleGrant {
    /// The user created the group
    Leader,

    /// An explicit entry in `member_roles`
    Assigned(GroupRole),

    /// No entry; the default applies
    DefaultMember,
}

impl RoleGrant {
    /// The effective role for this grant
    pub fn role(&self) -> GroupRole {
        match self {
            RoleGrant::Leader => GroupRole::Leader,
            RoleGrant::Assigned(role) => *role,
            RoleGrant::DefaultMember => GroupRole::Member,
        }
    }
}

/// Errors raised by membership operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    /// User is already in the group
    #[error("User {0} is already a member of this group")]
    AlreadyMember(String),

    /// User already has an invitation waiting
    #[error("User {0} already has a pending invitation")]
    AlreadyInvited(String),

    /// Accept/decline for a user who was never invited
    #[error("User {0} has no pending invitation")]
    NotInvited(String),

    /// Target user is not in the group
    #[error("User {0} is not a member of this group")]
    NotMember(String),

    /// The creator cannot be removed or have their role changed
    #[error("The group creator cannot be removed or reassigned")]
    CreatorImmutable,

    /// Leadership is never assigned through `member_roles`
    #[error("The leader role cannot be assigned")]
    CannotAssignLeader,
}

/// Group snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Display description
    #[serde(default)]
    pub description: String,

    /// User who created the group (permanently the leader)
    pub created_by: String,

    /// Current members, including the creator
    #[serde(default)]
    pub members: BTreeSet<String>,

    /// Explicit roles for non-creator members
    #[serde(default)]
    pub member_roles: BTreeMap<String, GroupRole>,

    /// Users invited but not yet accepted
    #[serde(default)]
    pub pending_invitations: BTreeSet<String>,

    /// When the group was created (epoch milliseconds on the wire)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Group {
    /// Creates a new group with the creator as its only member
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        created_by: impl Into<String>,
    ) -> Self {
        let created_by = created_by.into();

        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            members: BTreeSet::from([created_by.clone()]),
            created_by,
            member_roles: BTreeMap::new(),
            pending_invitations: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }

    /// Resolves where a user's role comes from
    pub fn role_grant(&self, user_id: &str) -> RoleGrant {
        if user_id == self.created_by {
            return RoleGrant::Leader;
        }

        // Leader is reserved for the creator; a stray entry grants nothing.
        match self.member_roles.get(user_id) {
            Some(GroupRole::Leader) | None => RoleGrant::DefaultMember,
            Some(role) => RoleGrant::Assigned(*role),
        }
    }

    /// Resolves a user's effective role
    ///
    /// Absent users resolve to `Member`; this never fails.
    pub fn resolve_role(&self, user_id: &str) -> GroupRole {
        self.role_grant(user_id).role()
    }

    /// Can create, edit, delete, reassign and finalize group tasks
    pub fn can_manage_tasks(&self, user_id: &str) -> bool {
        self.resolve_role(user_id).is_admin()
    }

    /// Can invite and remove members, and accept/decline on behalf of the group
    pub fn can_manage_members(&self, user_id: &str) -> bool {
        user_id == self.created_by
    }

    /// Can promote and demote deputies
    ///
    /// Same predicate as `can_manage_members` today; kept separate so the two
    /// policies can diverge without touching call sites.
    pub fn can_manage_roles(&self, user_id: &str) -> bool {
        user_id == self.created_by
    }

    pub fn is_leader(&self, user_id: &str) -> bool {
        self.resolve_role(user_id) == GroupRole::Leader
    }

    pub fn is_deputy(&self, user_id: &str) -> bool {
        self.resolve_role(user_id) == GroupRole::Deputy
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.is_leader(user_id) || self.is_deputy(user_id)
    }

    /// Checks membership (the creator always counts)
    pub fn is_member(&self, user_id: &str) -> bool {
        user_id == self.created_by || self.members.contains(user_id)
    }

    /// Checks for a pending invitation
    pub fn is_invited(&self, user_id: &str) -> bool {
        self.pending_invitations.contains(user_id)
    }

    /// Returns a copy with `user_id` added to the pending invitations
    pub fn invite(&self, user_id: &str) -> Result<Self, GroupError> {
        if self.is_member(user_id) {
            return Err(GroupError::AlreadyMember(user_id.to_string()));
        }
        if self.is_invited(user_id) {
            return Err(GroupError::AlreadyInvited(user_id.to_string()));
        }

        let mut next = self.clone();
        next.pending_invitations.insert(user_id.to_string());
        Ok(next)
    }

    /// Returns a copy with the invitation turned into membership
    pub fn accept_invitation(&self, user_id: &str) -> Result<Self, GroupError> {
        if !self.is_invited(user_id) {
            return Err(GroupError::NotInvited(user_id.to_string()));
        }

        let mut next = self.clone();
        next.pending_invitations.remove(user_id);
        next.members.insert(user_id.to_string());
        Ok(next)
    }

    /// Returns a copy with the invitation dropped
    pub fn decline_invitation(&self, user_id: &str) -> Result<Self, GroupError> {
        if !self.is_invited(user_id) {
            return Err(GroupError::NotInvited(user_id.to_string()));
        }

        let mut next = self.clone();
        next.pending_invitations.remove(user_id);
        Ok(next)
    }

    /// Returns a copy with an explicit role for a non-creator member
    pub fn set_role(&self, user_id: &str, role: GroupRole) -> Result<Self, GroupError> {
        if user_id == self.created_by {
            return Err(GroupError::CreatorImmutable);
        }
        if role == GroupRole::Leader {
            return Err(GroupError::CannotAssignLeader);
        }
        if !self.members.contains(user_id) {
            return Err(GroupError::NotMember(user_id.to_string()));
        }

        let mut next = self.clone();
        next.member_roles.insert(user_id.to_string(), role);
        Ok(next)
    }

    /// Returns a copy without the member and their role entry
    pub fn remove_member(&self, user_id: &str) -> Result<Self, GroupError> {
        if user_id == self.created_by {
            return Err(GroupError::CreatorImmutable);
        }
        if !self.members.contains(user_id) {
            return Err(GroupError::NotMember(user_id.to_string()));
        }

        let mut next = self.clone();
        next.members.remove(user_id);
        next.member_roles.remove(user_id);
        Ok(next)
    }
}
