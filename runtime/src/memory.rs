//! In-memory `WishStore`, publishing a change notice after every write.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tandem_core::error::StoreError;
use tandem_core::event::{ChangeNotice, SharedFeed};
use tandem_core::patch::{Precondition, WishPatch};
use tandem_core::reorder::sort_wishes;
use tandem_core::store::{StoreResult, WishStore};
use tandem_core::wish::{NewWish, Wish, WishId};

#[derive(Default)]
pub struct MemoryWishStore {
    rows: RwLock<HashMap<WishId, Wish>>,
    feed: Option<SharedFeed>,
    failing_updates: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryWishStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(feed: SharedFeed) -> Self {
        Self {
            feed: Some(feed),
            ..Self::default()
        }
    }

    /// Makes the next `n` calls to `update_wish` fail with a backend error.
    pub fn fail_next_updates(&self, n: usize) {
        self.failing_updates.store(n, Ordering::SeqCst);
    }

    /// Update requests received so far, including failed ones.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    fn notify(&self) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeNotice::wishes());
        }
    }

    fn take_failure(&self) -> bool {
        self.failing_updates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl WishStore for MemoryWishStore {
    async fn list_wishes(&self) -> StoreResult<Vec<Wish>> {
        let mut wishes: Vec<Wish> = self.rows.read().values().cloned().collect();
        sort_wishes(&mut wishes);
        Ok(wishes)
    }

    async fn get_wish(&self, id: WishId) -> StoreResult<Option<Wish>> {
        Ok(self.rows.read().get(&id).cloned())
    }

    async fn insert_wish(&self, new: NewWish) -> StoreResult<Wish> {
        let wish = {
            let mut rows = self.rows.write();
            let sort_order = new.sort_order.unwrap_or_else(|| {
                rows.values().map(|w| w.sort_order + 1).max().unwrap_or(0)
            });
            let wish = Wish::create(WishId::new_v4(), new, sort_order, Utc::now());
            rows.insert(wish.id, wish.clone());
            wish
        };
        tracing::debug!(tandem.wish = %wish.id, "Inserted wish");
        self.notify();
        Ok(wish)
    }

    async fn update_wish_if(
        &self,
        id: WishId,
        expected: Option<Precondition>,
        patch: &WishPatch,
    ) -> StoreResult<Wish> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.take_failure() {
            return Err(StoreError::Backend("injected update failure".to_string()));
        }
        let wish = {
            let mut rows = self.rows.write();
            let wish = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            if expected.is_some_and(|expected| !expected.holds_for(wish)) {
                tracing::debug!(tandem.wish = %id, status = %wish.status, "Guarded update refused");
                return Err(StoreError::Conflict(id));
            }
            patch.apply_to(wish);
            wish.clone()
        };
        self.notify();
        Ok(wish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::BroadcastFeed;
    use std::sync::Arc;
    use tandem_core::event::{ChangeFeed, WISHES_TOPIC};
    use tandem_core::role::Role;
    use tandem_core::wish::WishStatus;

    #[tokio::test]
    async fn inserts_append_and_list_is_ordered() {
        let store = MemoryWishStore::new();
        let a = store.insert_wish(NewWish::new("a", Role::Admin)).await.unwrap();
        let b = store.insert_wish(NewWish::new("b", Role::User)).await.unwrap();
        let first = store
            .insert_wish(NewWish::new("first", Role::User).at(-1))
            .await
            .unwrap();

        assert_eq!((a.sort_order, b.sort_order), (0, 1));
        let titles: Vec<_> = store
            .list_wishes()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.title)
            .collect();
        assert_eq!(titles, vec!["first", "a", "b"]);
        assert_eq!(first.status, WishStatus::Pending);
    }

    #[tokio::test]
    async fn writes_publish_notices() {
        let feed = Arc::new(BroadcastFeed::default());
        let store = MemoryWishStore::with_feed(feed.clone());
        let mut sub = feed.subscribe(WISHES_TOPIC);

        let wish = store.insert_wish(NewWish::new("x", Role::User)).await.unwrap();
        assert!(sub.next_change().await.is_some());

        store
            .update_wish(wish.id, &WishPatch::new().title("y"))
            .await
            .unwrap();
        assert!(sub.next_change().await.is_some());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemoryWishStore::new();
        let wish = store.insert_wish(NewWish::new("x", Role::User)).await.unwrap();
        store.fail_next_updates(1);

        let patch = WishPatch::new().sort_order(4);
        assert!(matches!(
            store.update_wish(wish.id, &patch).await,
            Err(StoreError::Backend(_))
        ));
        assert_eq!(store.update_wish(wish.id, &patch).await.unwrap().sort_order, 4);
        assert_eq!(store.update_count(), 2);
    }

    #[tokio::test]
    async fn guarded_update_refuses_a_moved_row() {
        let store = MemoryWishStore::new();
        let wish = store.insert_wish(NewWish::new("x", Role::User)).await.unwrap();
        let stale = Precondition::of(&wish);

        store
            .update_wish(wish.id, &WishPatch::new().status(WishStatus::Deleted))
            .await
            .unwrap();

        let propose = WishPatch::new()
            .status(WishStatus::WaitingConfirmation)
            .proposed_by(Some(Role::User));
        assert_eq!(
            store.update_wish_if(wish.id, Some(stale), &propose).await,
            Err(StoreError::Conflict(wish.id))
        );
        assert_eq!(
            store.get_wish(wish.id).await.unwrap().map(|w| w.status),
            Some(WishStatus::Deleted)
        );
    }

    #[tokio::test]
    async fn updating_unknown_wish_is_not_found() {
        let store = MemoryWishStore::new();
        let id = WishId::new_v4();
        assert_eq!(
            store.update_wish(id, &WishPatch::new().title("t")).await,
            Err(StoreError::NotFound(id))
        );
    }
}
