//! Two mounted boards converging over one store and one change feed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::prelude::*;
use tandem_core::store::{SharedStore, StoreResult};
use tandem_runtime::prelude::*;
use tokio::sync::Notify;

async fn eventually(board: &SharedBoard, what: &str, pred: impl Fn(&WishBoard) -> bool) {
    let converged = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if pred(&*board.lock().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(converged.is_ok(), "board never converged: {what}");
}

async fn mount(store: SharedStore, feed: &Arc<BroadcastFeed>, role: Role) -> BoardSync {
    BoardSync::mount(WishBoard::new(store, Session::for_role(role)), feed.as_ref())
        .await
        .unwrap()
}

#[tokio::test]
async fn both_clients_converge_through_the_workflow() {
    let feed = Arc::new(BroadcastFeed::new(16));
    let store: SharedStore = Arc::new(MemoryWishStore::with_feed(feed.clone()));
    let admin = mount(store.clone(), &feed, Role::Admin).await;
    let user = mount(store.clone(), &feed, Role::User).await;

    let added = admin
        .dispatch(Command::Add {
            title: "Cook dinner together".into(),
        })
        .await
        .unwrap();
    let id = added[0].id;
    eventually(&user.board(), "sees new wish", |b| b.get(id).is_some()).await;

    admin
        .dispatch(Command::Act {
            id,
            action: WishAction::ProposeComplete,
        })
        .await
        .unwrap();
    eventually(&user.board(), "sees proposal", |b| {
        b.allowed_actions(id) == vec![ActionKind::Confirm, ActionKind::Reject]
    })
    .await;

    user.dispatch(Command::Act {
        id,
        action: WishAction::confirm(),
    })
    .await
    .unwrap();
    eventually(&admin.board(), "sees completion", |b| {
        b.get(id).is_some_and(|w| w.status == WishStatus::Completed && w.completed_at.is_some())
    })
    .await;
}

#[tokio::test]
async fn refetched_client_rejects_outdated_action_locally() {
    let memory = Arc::new(MemoryWishStore::new());
    let wish = memory
        .insert_wish(NewWish::new("Learn to dance", Role::User))
        .await
        .unwrap();

    let mut user = WishBoard::new(memory.clone(), Session::for_role(Role::User));
    user.refresh().await.unwrap();

    let mut admin = WishBoard::new(memory.clone(), Session::for_role(Role::Admin));
    admin.refresh().await.unwrap();
    admin.perform(wish.id, WishAction::RequestDelete).await.unwrap();

    let before = memory.update_count();
    user.refresh().await.unwrap();
    assert!(user.perform(wish.id, WishAction::ProposeComplete).await.is_err());
    assert_eq!(memory.update_count(), before);
    assert_eq!(user.allowed_actions(wish.id), vec![ActionKind::ConfirmDelete, ActionKind::RejectDelete]);
}

async fn board(store: &Arc<MemoryWishStore>, role: Role) -> WishBoard {
    let mut board = WishBoard::new(store.clone(), Session::for_role(role));
    board.refresh().await.unwrap();
    board
}

#[tokio::test]
async fn stale_board_cannot_move_a_completed_wish() {
    let memory = Arc::new(MemoryWishStore::new());
    let wish = memory
        .insert_wish(NewWish::new("Run a marathon", Role::User))
        .await
        .unwrap();

    // Both copies are taken while the wish is still pending and never refreshed.
    let mut stale = [board(&memory, Role::Admin).await, board(&memory, Role::Admin).await];

    board(&memory, Role::Admin)
        .await
        .perform(wish.id, WishAction::ProposeComplete)
        .await
        .unwrap();
    let done = board(&memory, Role::User)
        .await
        .perform(wish.id, WishAction::confirm())
        .await
        .unwrap();
    assert_eq!(done.status, WishStatus::Completed);

    for (board, action) in stale
        .iter_mut()
        .zip([WishAction::RequestDelete, WishAction::ProposeComplete])
    {
        assert_eq!(board.get(wish.id).map(|w| w.status), Some(WishStatus::Pending));
        let err = board.perform(wish.id, action).await.unwrap_err();
        assert!(err.is_conflict(), "{err}");

        let stored = memory.get_wish(wish.id).await.unwrap().unwrap();
        assert_eq!(stored, done);
        assert_eq!(stored.check_invariants(), Ok(()));
        // Rolled back, then refetched.
        assert_eq!(board.get(wish.id), Some(&done));
    }
}

#[tokio::test]
async fn stale_board_cannot_revive_a_deleted_wish() {
    let memory = Arc::new(MemoryWishStore::new());
    let wish = memory
        .insert_wish(NewWish::new("Learn the cello", Role::Admin))
        .await
        .unwrap();
    let mut stale = board(&memory, Role::User).await;

    board(&memory, Role::Admin)
        .await
        .perform(wish.id, WishAction::RequestDelete)
        .await
        .unwrap();
    let deleted = board(&memory, Role::User)
        .await
        .perform(wish.id, WishAction::ConfirmDelete)
        .await
        .unwrap();

    let err = stale
        .perform(wish.id, WishAction::ProposeComplete)
        .await
        .unwrap_err();
    assert!(err.is_conflict(), "{err}");
    assert_eq!(memory.get_wish(wish.id).await.unwrap(), Some(deleted.clone()));
    assert_eq!(stale.get(wish.id), Some(&deleted));
    // Only an admin reopens tombstones.
    assert!(stale.allowed_actions(wish.id).is_empty());
}

#[tokio::test]
async fn stale_mounted_board_resyncs_after_conflict() {
    let feed = Arc::new(BroadcastFeed::new(16));
    let memory = Arc::new(MemoryWishStore::new());
    let wish = memory
        .insert_wish(NewWish::new("Sleep under the stars", Role::User))
        .await
        .unwrap();
    // Writes below bypass the feed, so the mounted board never hears of them.
    let sync = mount(memory.clone(), &feed, Role::User).await;
    memory
        .update_wish(wish.id, &WishPatch::new().status(WishStatus::Deleted))
        .await
        .unwrap();

    let err = sync
        .dispatch(Command::Act {
            id: wish.id,
            action: WishAction::RequestDelete,
        })
        .await
        .unwrap_err();
    assert!(err.is_conflict());
    let board = sync.board();
    assert_eq!(
        board.lock().await.get(wish.id).map(|w| w.status),
        Some(WishStatus::Deleted)
    );
}

#[tokio::test]
async fn failed_write_rolls_back_and_store_is_untouched() {
    let feed = Arc::new(BroadcastFeed::new(16));
    let memory = Arc::new(MemoryWishStore::with_feed(feed.clone()));
    let wish = memory
        .insert_wish(NewWish::new("Stargazing", Role::Admin))
        .await
        .unwrap();
    let sync = mount(memory.clone(), &feed, Role::User).await;

    memory.fail_next_updates(1);
    let err = sync
        .dispatch(Command::Rename {
            id: wish.id,
            title: "Stargazing in the desert".into(),
        })
        .await
        .unwrap_err();
    assert!(err.is_persistence());

    let board = sync.board();
    assert_eq!(board.lock().await.get(wish.id), Some(&wish));
    assert_eq!(memory.get_wish(wish.id).await.unwrap(), Some(wish));
}

#[tokio::test]
async fn unmount_stops_listening() {
    let feed = Arc::new(BroadcastFeed::new(16));
    let store: SharedStore = Arc::new(MemoryWishStore::with_feed(feed.clone()));
    let sync = mount(store.clone(), &feed, Role::Admin).await;
    let handle = sync.handle();
    assert_eq!(feed.subscriber_count(WISHES_TOPIC), 1);

    sync.unmount();
    tokio::time::timeout(Duration::from_secs(1), async {
        while feed.subscriber_count(WISHES_TOPIC) > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("subscription outlived the board");

    assert!(!handle.is_mounted());
    assert_eq!(
        handle
            .dispatch(Command::Add {
                title: "too late".into()
            })
            .await,
        Err(WishError::Unmounted)
    );
}

/// Holds every update until released.
struct GatedStore {
    inner: MemoryWishStore,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl WishStore for GatedStore {
    async fn list_wishes(&self) -> StoreResult<Vec<Wish>> {
        self.inner.list_wishes().await
    }

    async fn get_wish(&self, id: WishId) -> StoreResult<Option<Wish>> {
        self.inner.get_wish(id).await
    }

    async fn insert_wish(&self, new: NewWish) -> StoreResult<Wish> {
        self.inner.insert_wish(new).await
    }

    async fn update_wish_if(
        &self,
        id: WishId,
        expected: Option<Precondition>,
        patch: &WishPatch,
    ) -> StoreResult<Wish> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.update_wish_if(id, expected, patch).await
    }
}

#[tokio::test]
async fn in_flight_result_is_discarded_after_unmount() {
    let feed = Arc::new(BroadcastFeed::new(16));
    let gated = Arc::new(GatedStore {
        inner: MemoryWishStore::new(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let wish = gated
        .insert_wish(NewWish::new("Road trip", Role::User))
        .await
        .unwrap();

    let sync = mount(gated.clone(), &feed, Role::Admin).await;
    let handle = sync.handle();
    let in_flight = tokio::spawn(async move {
        handle
            .dispatch(Command::Act {
                id: wish.id,
                action: WishAction::ProposeComplete,
            })
            .await
    });

    gated.entered.notified().await;
    drop(sync);
    gated.release.notify_one();

    let stored = in_flight.await.unwrap().unwrap();
    assert_eq!(stored[0].status, WishStatus::WaitingConfirmation);
    assert_eq!(
        gated.get_wish(wish.id).await.unwrap().map(|w| w.status),
        Some(WishStatus::WaitingConfirmation)
    );
}
