use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Account role. Roles are flat: each one maps to an explicit permission set
/// in [`Role::permissions`], nothing is inherited.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "moderator")]
    Moderator,
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "superadmin")]
    Superadmin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    CreatePoem,
    /// Like and comment on published poems.
    Interact,
    SubmitApplication,
    ReviewPoems,
    ModerateComments,
    ReviewApplications,
    DeleteAnyPoem,
    ViewStats,
    ListUsers,
    ManageRoles,
    ManageUserSecurity,
}

use Permission::*;

const USER_PERMISSIONS: &[Permission] = &[CreatePoem, Interact, SubmitApplication];

const MODERATOR_PERMISSIONS: &[Permission] = &[
    CreatePoem,
    Interact,
    SubmitApplication,
    ReviewPoems,
    ModerateComments,
    ReviewApplications,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    CreatePoem,
    Interact,
    SubmitApplication,
    ReviewPoems,
    ModerateComments,
    ReviewApplications,
    DeleteAnyPoem,
    ViewStats,
    ListUsers,
];

const SUPERADMIN_PERMISSIONS: &[Permission] = &[
    CreatePoem,
    Interact,
    SubmitApplication,
    ReviewPoems,
    ModerateComments,
    ReviewApplications,
    DeleteAnyPoem,
    ViewStats,
    ListUsers,
    ManageRoles,
    ManageUserSecurity,
];

impl Role {
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::User => USER_PERMISSIONS,
            Role::Moderator => MODERATOR_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
            Role::Superadmin => SUPERADMIN_PERMISSIONS,
        }
    }

    pub fn has(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreatePoem => "create_poem",
            Interact => "interact",
            SubmitApplication => "submit_application",
            ReviewPoems => "review_poems",
            ModerateComments => "moderate_comments",
            ReviewApplications => "review_applications",
            DeleteAnyPoem => "delete_any_poem",
            ViewStats => "view_stats",
            ListUsers => "list_users",
            ManageRoles => "manage_roles",
            ManageUserSecurity => "manage_user_security",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_cannot_review() {
        assert!(Role::User.has(CreatePoem));
        assert!(!Role::User.has(ReviewPoems));
        assert!(!Role::User.has(ReviewApplications));
    }

    #[test]
    fn moderator_reviews_but_cannot_manage_users() {
        assert!(Role::Moderator.has(ReviewPoems));
        assert!(Role::Moderator.has(ReviewApplications));
        assert!(!Role::Moderator.has(ListUsers));
        assert!(!Role::Moderator.has(DeleteAnyPoem));
    }

    #[test]
    fn only_superadmin_manages_roles_and_security() {
        for role in [Role::User, Role::Moderator, Role::Admin] {
            assert!(!role.has(ManageRoles), "{role} must not manage roles");
            assert!(!role.has(ManageUserSecurity));
        }
        assert!(Role::Superadmin.has(ManageRoles));
        assert!(Role::Superadmin.has(ManageUserSecurity));
    }

    #[test]
    fn role_serializes_snake_case() {
        let json = serde_json::to_string(&Role::Superadmin).unwrap();
        assert_eq!(json, "\"superadmin\"");
        assert!(serde_json::from_str::<Role>("\"banned\"").is_err());
    }
}
