//! WishPatch - the partial field update sent to the store.
//!
//! Nullable columns use `Option<Option<T>>`: the outer `None` leaves the
//! field untouched, `Some(None)` clears it. On the wire an untouched field is
//! omitted and a cleared one is written as `null`.

use crate::role::Role;
use crate::wish::{Wish, WishStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<WishStatus>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub proposed_by_role: Option<Option<Role>>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    pub completed_at: Option<Option<DateTime<Utc>>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i64>,
}

/// The workflow state a status change was planned against.
///
/// Stores apply a guarded update only while the row still holds this status
/// and proposer; otherwise they answer [`StoreError::Conflict`](crate::error::StoreError::Conflict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Precondition {
    pub status: WishStatus,
    pub proposed_by_role: Option<Role>,
}

impl Precondition {
    pub fn of(wish: &Wish) -> Self {
        Self {
            status: wish.status,
            proposed_by_role: wish.proposed_by_role,
        }
    }

    pub fn holds_for(&self, wish: &Wish) -> bool {
        wish.status == self.status && wish.proposed_by_role == self.proposed_by_role
    }
}

/// Maps a present key (even `null`) to `Some(..)`; absent keys fall back to `default`.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

impl WishPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: WishStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn proposed_by(mut self, role: Option<Role>) -> Self {
        self.proposed_by_role = Some(role);
        self
    }

    pub fn completed_at(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.completed_at = Some(at);
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = Some(sort_order);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.proposed_by_role.is_none()
            && self.completed_at.is_none()
            && self.title.is_none()
            && self.sort_order.is_none()
    }

    /// Writes every present field onto `wish`.
    pub fn apply_to(&self, wish: &mut Wish) {
        if let Some(status) = self.status {
            wish.status = status;
        }
        if let Some(role) = self.proposed_by_role {
            wish.proposed_by_role = role;
        }
        if let Some(at) = self.completed_at {
            wish.completed_at = at;
        }
        if let Some(title) = &self.title {
            wish.title = title.clone();
        }
        if let Some(sort_order) = self.sort_order {
            wish.sort_order = sort_order;
        }
    }

    pub fn applied(&self, wish: &Wish) -> Wish {
        let mut next = wish.clone();
        self.apply_to(&mut next);
        next
    }

    /// Status changes only make sense from the state they were planned in;
    /// renames and reorders apply whatever the row's state.
    pub fn precondition(&self, pre_image: &Wish) -> Option<Precondition> {
        self.status.map(|_| Precondition::of(pre_image))
    }

    /// The patch restoring every field this patch touches to its value in `pre_image`.
    pub fn inverse(&self, pre_image: &Wish) -> WishPatch {
        WishPatch {
            status: self.status.map(|_| pre_image.status),
            proposed_by_role: self.proposed_by_role.map(|_| pre_image.proposed_by_role),
            completed_at: self.completed_at.map(|_| pre_image.completed_at),
            title: self.title.as_ref().map(|_| pre_image.title.clone()),
            sort_order: self.sort_order.map(|_| pre_image.sort_order),
        }
    }
}
