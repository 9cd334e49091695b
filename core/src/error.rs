use crate::bus::MissingResource;
use crate::role::Role;
use crate::wish::{WishId, WishStatus};
use crate::workflow::ActionKind;
use thiserror::Error;

/// Failure reported by a persistence collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("wish {0} not found in store")]
    NotFound(WishId),

    /// A guarded update found the row in a different workflow state.
    #[error("wish {0} changed in the store since it was read")]
    Conflict(WishId),

    #[error("store rejected the request: {0}")]
    Rejected(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the wish workflow and the boards built on it.
///
/// Nothing here is fatal: every variant is recovered by retrying the user
/// action or refreshing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WishError {
    #[error("cannot {action} a {from} wish as {actor}")]
    InvalidTransition {
        from: WishStatus,
        action: ActionKind,
        actor: Role,
    },

    #[error("wish {0} not found")]
    NotFound(WishId),

    #[error("wish title must not be empty")]
    EmptyTitle,

    #[error("new order is not a permutation of the current wishes")]
    NotAPermutation,

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error(transparent)]
    Unwired(#[from] MissingResource),

    #[error("board is no longer mounted")]
    Unmounted,
}

impl WishError {
    /// True for failures of the external store, as opposed to local rejections.
    pub fn is_persistence(&self) -> bool {
        matches!(self, WishError::Persistence(_))
    }

    /// True when the store refused a write planned against an outdated copy.
    pub fn is_conflict(&self) -> bool {
        matches!(self, WishError::Persistence(StoreError::Conflict(_)))
    }
}

pub type WishResult<T> = Result<T, WishError>;
