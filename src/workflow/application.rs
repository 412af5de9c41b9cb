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
pub enum ApplicationStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Reviewer action recorded in an application's review history.
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
pub enum ReviewAction {
    #[sea_orm(string_value = "start_review")]
    StartReview,
    #[sea_orm(string_value = "approve")]
    Approve,
    #[sea_orm(string_value = "reject")]
    Reject,
    #[sea_orm(string_value = "request_changes")]
    RequestChanges,
}

impl ApplicationStatus {
    /// Statuses that count as the user's live application.
    pub const OPEN: &'static [Self] = &[
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
    ];

    /// Whether the applicant may still edit the content.
    pub fn is_editable(self) -> bool {
        matches!(self, ApplicationStatus::Draft | ApplicationStatus::Rejected)
    }
}

impl Lifecycle for ApplicationStatus {
    const KIND: EntityKind = EntityKind::Application;
    const ALL: &'static [Self] = &[
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderReview,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    fn edge(self, to: Self) -> Option<Edge> {
        use ApplicationStatus::*;
        const REVIEWER: Driver = Driver::Holder(Permission::ReviewApplications);

        let edge = match (self, to) {
            (Draft, Submitted) => Edge::new(Driver::Owner),
            // resubmission after a rejection
            (Rejected, Submitted) => Edge::new(Driver::Owner),
            (Submitted, UnderReview) => Edge::audited(REVIEWER, ReviewAction::StartReview),
            (Submitted, Rejected) => Edge::audited(REVIEWER, ReviewAction::Reject),
            (UnderReview, Approved) => Edge::audited(REVIEWER, ReviewAction::Approve),
            (UnderReview, Rejected) => Edge::audited(REVIEWER, ReviewAction::Reject),
            (UnderReview, Submitted) => Edge::audited(REVIEWER, ReviewAction::RequestChanges),
            _ => return None,
        };
        Some(edge)
    }

    fn as_str(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "draft",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::UnderReview => "under_review",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviewAction::StartReview => "start_review",
            ReviewAction::Approve => "approve",
            ReviewAction::Reject => "reject",
            ReviewAction::RequestChanges => "request_changes",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::Role;
    use crate::workflow::tests::{now, owner, stranger};
    use crate::workflow::{evaluate_transition, WorkflowError};

    #[test]
    fn approved_is_terminal() {
        assert!(ApplicationStatus::Approved.is_terminal());
        for &to in ApplicationStatus::ALL {
            let err = evaluate_transition(
                ApplicationStatus::Approved,
                to,
                &owner(Role::Superadmin),
                None,
                now(),
            )
            .unwrap_err();
            assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn edges_match_table() {
        use ApplicationStatus::*;
        assert_eq!(Draft.targets(), vec![Submitted]);
        assert_eq!(Submitted.targets(), vec![UnderReview, Rejected]);
        assert_eq!(UnderReview.targets(), vec![Submitted, Approved, Rejected]);
        assert_eq!(Rejected.targets(), vec![Submitted]);
        assert!(Approved.targets().is_empty());
        // no way back to draft once submitted
        assert!(!Rejected.can_transition_to(Draft));
    }

    #[test]
    fn applicant_submission_has_no_audit() {
        for from in [ApplicationStatus::Draft, ApplicationStatus::Rejected] {
            let decision = evaluate_transition(
                from,
                ApplicationStatus::Submitted,
                &owner(Role::User),
                Some("please"),
                now(),
            )
            .unwrap();
            assert_eq!(decision.to, ApplicationStatus::Submitted);
            assert!(decision.audit.is_none());
        }
    }

    #[test]
    fn reviewer_edges_append_one_entry() {
        use ApplicationStatus::*;
        let cases = [
            (Submitted, UnderReview, ReviewAction::StartReview),
            (Submitted, Rejected, ReviewAction::Reject),
            (UnderReview, Approved, ReviewAction::Approve),
            (UnderReview, Rejected, ReviewAction::Reject),
            (UnderReview, Submitted, ReviewAction::RequestChanges),
        ];
        let reviewer = stranger(Role::Moderator);
        for (from, to, action) in cases {
            let decision =
                evaluate_transition(from, to, &reviewer, Some("Lovely imagery"), now()).unwrap();
            let audit = decision.audit.expect("reviewer edge must be audited");
            assert_eq!(audit.action, action);
            assert_eq!(audit.reviewer_id, reviewer.user_id);
            assert_eq!(audit.feedback.as_deref(), Some("Lovely imagery"));
            assert_eq!(audit.at, now());
        }
    }

    #[test]
    fn applicant_cannot_review_own_application() {
        let err = evaluate_transition(
            ApplicationStatus::UnderReview,
            ApplicationStatus::Approved,
            &owner(Role::User),
            None,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted { .. }));
    }

    #[test]
    fn reviewer_cannot_submit_on_behalf_of_applicant() {
        let err = evaluate_transition(
            ApplicationStatus::Draft,
            ApplicationStatus::Submitted,
            &stranger(Role::Admin),
            None,
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::NotPermitted { .. }));
    }

    #[test]
    fn editable_only_in_draft_or_rejected() {
        assert!(ApplicationStatus::Draft.is_editable());
        assert!(ApplicationStatus::Rejected.is_editable());
        assert!(!ApplicationStatus::Submitted.is_editable());
        assert!(!ApplicationStatus::UnderReview.is_editable());
        assert!(!ApplicationStatus::Approved.is_editable());
    }
}
