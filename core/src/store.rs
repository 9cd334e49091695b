use crate::error::StoreError;
use crate::patch::{Precondition, WishPatch};
use crate::wish::{NewWish, Wish, WishId};
use async_trait::async_trait;
use std::sync::Arc;

pub type StoreResult<T> = Result<T, StoreError>;

/// The persistence collaborator: durable storage and querying of wishes.
///
/// Implementations must apply each `update_wish` atomically for its row and
/// must never hard-delete; `deleted` is a status, not a removal.
#[async_trait]
pub trait WishStore: Send + Sync + 'static {
    /// All wishes, ordered by `sort_order` ascending.
    async fn list_wishes(&self) -> StoreResult<Vec<Wish>>;

    async fn get_wish(&self, id: WishId) -> StoreResult<Option<Wish>>;

    /// Stores a new pending wish and returns it with its assigned id.
    async fn insert_wish(&self, new: NewWish) -> StoreResult<Wish>;

    /// Applies every present field of `patch` in one request, provided the
    /// row still satisfies `expected`. The check and the write are one atomic
    /// step; a row that fails the check is left untouched and reported as
    /// [`StoreError::Conflict`].
    async fn update_wish_if(
        &self,
        id: WishId,
        expected: Option<Precondition>,
        patch: &WishPatch,
    ) -> StoreResult<Wish>;

    /// Unconditional update.
    async fn update_wish(&self, id: WishId, patch: &WishPatch) -> StoreResult<Wish> {
        self.update_wish_if(id, None, patch).await
    }
}

/// Shared, type-erased store handle, as placed on the `Bus`.
pub type SharedStore = Arc<dyn WishStore>;

#[async_trait]
impl<S: WishStore + ?Sized> WishStore for Arc<S> {
    async fn list_wishes(&self) -> StoreResult<Vec<Wish>> {
        (**self).list_wishes().await
    }

    async fn get_wish(&self, id: WishId) -> StoreResult<Option<Wish>> {
        (**self).get_wish(id).await
    }

    async fn insert_wish(&self, new: NewWish) -> StoreResult<Wish> {
        (**self).insert_wish(new).await
    }

    async fn update_wish_if(
        &self,
        id: WishId,
        expected: Option<Precondition>,
        patch: &WishPatch,
    ) -> StoreResult<Wish> {
        (**self).update_wish_if(id, expected, patch).await
    }
}
