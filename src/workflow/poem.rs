use super::{Driver, Edge, EntityKind, Lifecycle};
use crate::permission::Permission;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

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
pub enum PoemStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "published")]
    Published,
}

impl Lifecycle for PoemStatus {
    const KIND: EntityKind = EntityKind::Poem;
    const ALL: &'static [Self] = &[
        PoemStatus::Draft,
        PoemStatus::UnderReview,
        PoemStatus::Published,
    ];

    fn edge(self, to: Self) -> Option<Edge> {
        use PoemStatus::*;

        let driver = match (self, to) {
            (Draft, UnderReview) => Driver::Owner,
            (UnderReview, Published) => Driver::Holder(Permission::ReviewPoems),
            // author withdraws, or a reviewer sends it back
            (UnderReview, Draft) => Driver::OwnerOrHolder(Permission::ReviewPoems),
            // author revises, or a reviewer unpublishes
            (Published, UnderReview) => Driver::OwnerOrHolder(Permission::ReviewPoems),
            _ => return None,
        };
        Some(Edge::new(driver))
    }

    fn as_str(self) -> &'static str {
        match self {
            PoemStatus::Draft => "draft",
            PoemStatus::UnderReview => "under_review",
            PoemStatus::Published => "published",
        }
    }
}

impl fmt::Display for PoemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Role;
    use crate::workflow::tests::{now, owner, stranger};
    use crate::workflow::{evaluate_transition, WorkflowError};

    #[test]
    fn edges_match_table() {
        use PoemStatus::*;
        assert_eq!(Draft.targets(), vec![UnderReview]);
        assert_eq!(UnderReview.targets(), vec![Draft, Published]);
        assert_eq!(Published.targets(), vec![UnderReview]);
        assert!(!Draft.can_transition_to(Published));
        assert!(!Published.can_transition_to(Draft));
    }

    #[test]
    fn author_submits_draft() {
        let decision = evaluate_transition(
            PoemStatus::Draft,
            PoemStatus::UnderReview,
            &owner(Role::User),
            None,
            now(),
        )
        .unwrap();
        assert_eq!(decision.to, PoemStatus::UnderReview);
        assert_eq!(decision.at, now());
        assert!(decision.audit.is_none());
    }

    #[test]
    fn moderator_cannot_submit_someone_elses_draft() {
        let err = evaluate_transition(
            PoemStatus::Draft,
            PoemStatus::UnderReview,
            &stranger(Role::Moderator),
            None,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted { .. }));
    }

    #[test]
    fn only_reviewers_publish() {
        let err = evaluate_transition(
            PoemStatus::UnderReview,
            PoemStatus::Published,
            &owner(Role::User),
            None,
            now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            WorkflowError::NotPermitted {
                kind: EntityKind::Poem,
                from: "under_review",
                to: "published",
                role: Role::User,
            }
        );

        for role in [Role::Moderator, Role::Admin, Role::Superadmin] {
            let decision = evaluate_transition(
                PoemStatus::UnderReview,
                PoemStatus::Published,
                &stranger(role),
                None,
                now(),
            )
            .unwrap();
            assert_eq!(decision.to, PoemStatus::Published);
        }
    }

    #[test]
    fn withdraw_and_return_to_draft() {
        assert!(evaluate_transition(
            PoemStatus::UnderReview,
            PoemStatus::Draft,
            &owner(Role::User),
            None,
            now(),
        )
        .is_ok());
        assert!(evaluate_transition(
            PoemStatus::UnderReview,
            PoemStatus::Draft,
            &stranger(Role::Moderator),
            None,
            now(),
        )
        .is_ok());
        assert!(evaluate_transition(
            PoemStatus::UnderReview,
            PoemStatus::Draft,
            &stranger(Role::User),
            None,
            now(),
        )
        .is_err());
    }

    #[test]
    fn unpublish_for_revision() {
        assert!(evaluate_transition(
            PoemStatus::Published,
            PoemStatus::UnderReview,
            &owner(Role::User),
            None,
            now(),
        )
        .is_ok());
        assert!(evaluate_transition(
            PoemStatus::Published,
            PoemStatus::UnderReview,
            &stranger(Role::User),
            None,
            now(),
        )
        .is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&PoemStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");
        let parsed: PoemStatus = serde_json::from_str("\"published\"").unwrap();
        assert_eq!(parsed, PoemStatus::Published);
    }
}
