//! Wish - the shared goal item and its lifecycle states.

use crate::role::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Store-assigned identifier of a wish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WishId(pub Uuid);

impl WishId {
    pub fn new_v4() -> Self {
        WishId(Uuid::new_v4())
    }
}

impl fmt::Display for WishId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for WishId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(WishId)
    }
}

/// Lifecycle state of a wish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WishStatus {
    Pending,
    WaitingConfirmation,
    Completed,
    PendingDelete,
    Deleted,
}

impl WishStatus {
    pub const ALL: [WishStatus; 5] = [
        WishStatus::Pending,
        WishStatus::WaitingConfirmation,
        WishStatus::Completed,
        WishStatus::PendingDelete,
        WishStatus::Deleted,
    ];

    /// States that carry an open proposal awaiting the counter-party.
    pub fn awaits_counterpart(self) -> bool {
        matches!(
            self,
            WishStatus::WaitingConfirmation | WishStatus::PendingDelete
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WishStatus::Pending => "pending",
            WishStatus::WaitingConfirmation => "waiting_confirmation",
            WishStatus::Completed => "completed",
            WishStatus::PendingDelete => "pending_delete",
            WishStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for WishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown wish status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for WishStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WishStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A shared wish as stored by the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wish {
    pub id: WishId,
    pub title: String,
    pub status: WishStatus,
    pub created_by_role: Role,
    pub proposed_by_role: Option<Role>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
}

/// A broken lifecycle invariant on a stored wish.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("completedAt must be set iff status is completed (status = {0})")]
    CompletionMismatch(WishStatus),

    #[error("proposedByRole must be set iff a proposal is open (status = {0})")]
    ProposerMismatch(WishStatus),
}

impl Wish {
    /// A freshly created wish: pending, no proposer, no completion.
    pub fn create(id: WishId, new: NewWish, sort_order: i64, created_at: DateTime<Utc>) -> Self {
        Wish {
            id,
            title: new.title,
            status: WishStatus::Pending,
            created_by_role: new.created_by_role,
            proposed_by_role: None,
            completed_at: None,
            sort_order,
            created_at,
        }
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if self.completed_at.is_some() != (self.status == WishStatus::Completed) {
            return Err(InvariantViolation::CompletionMismatch(self.status));
        }
        if self.proposed_by_role.is_some() != self.status.awaits_counterpart() {
            return Err(InvariantViolation::ProposerMismatch(self.status));
        }
        Ok(())
    }

    /// True when `role` is the party expected to answer the open proposal.
    pub fn awaits(&self, role: Role) -> bool {
        self.status.awaits_counterpart() && self.proposed_by_role == Some(role.counterpart())
    }
}

/// Creation request for a wish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWish {
    pub title: String,
    pub created_by_role: Role,
    /// Explicit position; appended after the current last wish when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

impl NewWish {
    pub fn new(title: impl Into<String>, created_by_role: Role) -> Self {
        NewWish {
            title: title.into(),
            created_by_role,
            sort_order: None,
        }
    }

    pub fn at(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Wish {
        Wish::create(
            WishId::new_v4(),
            NewWish::new("See the northern lights", Role::User),
            0,
            Utc::now(),
        )
    }

    #[test]
    fn created_wish_is_pending_and_valid() {
        let wish = sample();
        assert_eq!(wish.status, WishStatus::Pending);
        assert_eq!(wish.proposed_by_role, None);
        assert_eq!(wish.check_invariants(), Ok(()));
    }

    #[test]
    fn completion_without_timestamp_is_invalid() {
        let mut wish = sample();
        wish.status = WishStatus::Completed;
        assert_eq!(
            wish.check_invariants(),
            Err(InvariantViolation::CompletionMismatch(WishStatus::Completed))
        );
    }

    #[test]
    fn open_proposal_requires_proposer() {
        let mut wish = sample();
        wish.status = WishStatus::PendingDelete;
        assert!(matches!(
            wish.check_invariants(),
            Err(InvariantViolation::ProposerMismatch(_))
        ));

        wish.proposed_by_role = Some(Role::Admin);
        assert!(wish.awaits(Role::User));
        assert!(!wish.awaits(Role::Admin));
    }

    #[test]
    fn status_round_trips_through_its_name() {
        for status in WishStatus::ALL {
            assert_eq!(status.as_str().parse::<WishStatus>(), Ok(status));
        }
        assert!("done".parse::<WishStatus>().is_err());
    }

    #[test]
    fn wire_shape_uses_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["createdByRole"], "user");
        assert!(json["proposedByRole"].is_null());
        assert_eq!(json["sortOrder"], 0);
    }
}
