//! Lifecycle policy for poems and author applications.
//!
//! Each lifecycle is a closed enum with an explicit edge table. The table is
//! role independent; [`Driver`] only says who is allowed to take an edge.
//! Nothing here touches the database: callers persist the returned
//! [`Decision`] themselves.

pub mod application;
pub mod poem;

pub use application::{ApplicationStatus, ReviewAction};
pub use poem::PoemStatus;

use crate::permission::{Permission, Role};
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Poem,
    Application,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Poem => f.write_str("poem"),
            EntityKind::Application => f.write_str("application"),
        }
    }
}

/// Who may take an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Owner,
    Holder(Permission),
    OwnerOrHolder(Permission),
}

impl Driver {
    fn admits(self, actor: &Actor) -> bool {
        match self {
            Driver::Owner => actor.is_owner,
            Driver::Holder(permission) => actor.role.has(permission),
            Driver::OwnerOrHolder(permission) => actor.is_owner || actor.role.has(permission),
        }
    }
}

/// One permitted (source, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub driver: Driver,
    /// Review-history action recorded when the edge is taken, if any.
    pub audit: Option<ReviewAction>,
}

impl Edge {
    pub const fn new(driver: Driver) -> Self {
        Self {
            driver,
            audit: None,
        }
    }

    pub const fn audited(driver: Driver, action: ReviewAction) -> Self {
        Self {
            driver,
            audit: Some(action),
        }
    }
}

/// A status enum with a fixed transition table.
pub trait Lifecycle: Copy + Eq + fmt::Debug + 'static {
    const KIND: EntityKind;
    const ALL: &'static [Self];

    /// The edge from `self` to `to`, or `None` when the table has no such edge.
    /// Self-loops are never implied.
    fn edge(self, to: Self) -> Option<Edge>;

    fn as_str(self) -> &'static str;

    fn can_transition_to(self, to: Self) -> bool {
        self.edge(to).is_some()
    }

    /// Every status reachable in one step. Used to check the edge tables.
    #[cfg(test)]
    fn targets(self) -> Vec<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|&to| self.can_transition_to(to))
            .collect()
    }

    #[cfg(test)]
    fn is_terminal(self) -> bool {
        self.targets().is_empty()
    }
}

/// The user asking for a transition, relative to the entity being moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i32,
    pub role: Role,
    pub is_owner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub reviewer_id: i32,
    pub action: ReviewAction,
    pub feedback: Option<String>,
    pub at: NaiveDateTime,
}

/// Outcome of an allowed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision<S> {
    pub from: S,
    pub to: S,
    /// Timestamp to store as the entity's `updated_at`.
    pub at: NaiveDateTime,
    pub audit: Option<AuditEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Invalid {kind} transition from '{from}' to '{to}'")]
    InvalidTransition {
        kind: EntityKind,
        from: &'static str,
        to: &'static str,
    },

    #[error("Role '{role}' may not move this {kind} from '{from}' to '{to}'")]
    NotPermitted {
        kind: EntityKind,
        from: &'static str,
        to: &'static str,
        role: Role,
    },
}

/// Decide whether `actor` may move an entity from `current` to `requested`.
///
/// `feedback` only ends up in the audit entry of audited edges.
pub fn evaluate_transition<S: Lifecycle>(
    current: S,
    requested: S,
    actor: &Actor,
    feedback: Option<&str>,
    at: NaiveDateTime,
) -> Result<Decision<S>, WorkflowError> {
    let edge = current
        .edge(requested)
        .ok_or(WorkflowError::InvalidTransition {
            kind: S::KIND,
            from: current.as_str(),
            to: requested.as_str(),
        })?;

    if !edge.driver.admits(actor) {
        return Err(WorkflowError::NotPermitted {
            kind: S::KIND,
            from: current.as_str(),
            to: requested.as_str(),
            role: actor.role,
        });
    }

    let audit = edge.audit.map(|action| AuditEntry {
        reviewer_id: actor.user_id,
        action,
        feedback: feedback
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string),
        at,
    });

    Ok(Decision {
        from: current,
        to: requested,
        at,
        audit,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub fn now() -> NaiveDateTime {
        chrono::DateTime::from_timestamp(1_700_000_000, 0)
            .unwrap()
            .naive_utc()
    }

    pub fn owner(role: Role) -> Actor {
        Actor {
            user_id: 1,
            role,
            is_owner: true,
        }
    }

    pub fn stranger(role: Role) -> Actor {
        Actor {
            user_id: 2,
            role,
            is_owner: false,
        }
    }

    /// Every pair outside the table fails with InvalidTransition, even for a
    /// superadmin owner.
    fn assert_closed_table<S: Lifecycle>() {
        let actor = owner(Role::Superadmin);
        for &from in S::ALL {
            for &to in S::ALL {
                let result = evaluate_transition(from, to, &actor, None, now());
                if from.can_transition_to(to) {
                    assert!(result.is_ok(), "{from:?} -> {to:?} should be allowed");
                } else {
                    assert_eq!(
                        result.unwrap_err(),
                        WorkflowError::InvalidTransition {
                            kind: S::KIND,
                            from: from.as_str(),
                            to: to.as_str(),
                        }
                    );
                }
            }
        }
    }

    #[test]
    fn poem_table_is_closed() {
        assert_closed_table::<PoemStatus>();
    }

    #[test]
    fn application_table_is_closed() {
        assert_closed_table::<ApplicationStatus>();
    }

    #[test]
    fn same_state_is_never_a_no_op() {
        let actor = owner(Role::Superadmin);
        for &s in PoemStatus::ALL {
            assert!(evaluate_transition(s, s, &actor, None, now()).is_err());
        }
        for &s in ApplicationStatus::ALL {
            assert!(evaluate_transition(s, s, &actor, None, now()).is_err());
        }
    }

    #[test]
    fn evaluation_is_repeatable() {
        let actor = stranger(Role::Moderator);
        let first = evaluate_transition(
            PoemStatus::UnderReview,
            PoemStatus::Published,
            &actor,
            None,
            now(),
        );
        let second = evaluate_transition(
            PoemStatus::UnderReview,
            PoemStatus::Published,
            &actor,
            None,
            now(),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn error_message_names_both_states() {
        let err = evaluate_transition(
            PoemStatus::Draft,
            PoemStatus::Published,
            &owner(Role::User),
            None,
            now(),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid poem transition from 'draft' to 'published'"
        );
    }

    #[test]
    fn blank_feedback_is_dropped() {
        let decision = evaluate_transition(
            ApplicationStatus::UnderReview,
            ApplicationStatus::Rejected,
            &stranger(Role::Admin),
            Some("   "),
            now(),
        )
        .unwrap();
        assert_eq!(decision.audit.unwrap().feedback, None);
    }
}
