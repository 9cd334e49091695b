//! BoardSync - keeps a mounted board converged with the store.
//!
//! Mounting subscribes to the wish topic, refetches once, and spawns a task
//! that refetches on every notice. Dropping the `BoardSync` unmounts: the task
//! is aborted and its subscription dropped. Mutations already in flight are
//! left to finish; their result is discarded if the board is gone.

use crate::board::{Command, WishBoard};
use std::sync::{Arc, Weak};
use tandem_core::event::{ChangeFeed, WISHES_TOPIC};
use tandem_core::prelude::*;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub type SharedBoard = Arc<Mutex<WishBoard>>;

pub struct BoardSync {
    board: SharedBoard,
    task: JoinHandle<()>,
}

impl BoardSync {
    /// Mounts `board`. Must be called inside a tokio runtime.
    pub async fn mount(board: WishBoard, feed: &dyn ChangeFeed) -> WishResult<Self> {
        // Subscribe before the initial fetch so no change falls in between.
        let mut subscription = feed.subscribe(WISHES_TOPIC);
        let role = board.role();
        let board = Arc::new(Mutex::new(board));
        board.lock().await.refresh().await?;

        let weak = Arc::downgrade(&board);
        let task = tokio::spawn(async move {
            while subscription.next_change().await.is_some() {
                let Some(board) = weak.upgrade() else {
                    break;
                };
                if let Err(e) = board.lock().await.refresh().await {
                    tracing::warn!(error = %e, tandem.actor = %role, "Refetch after notice failed");
                }
            }
            subscription.unsubscribe();
        });

        tracing::info!(tandem.actor = %role, "Board mounted");
        Ok(Self { board, task })
    }

    pub fn board(&self) -> SharedBoard {
        self.board.clone()
    }

    /// A handle that does not keep the board mounted.
    pub fn handle(&self) -> BoardHandle {
        BoardHandle {
            board: Arc::downgrade(&self.board),
        }
    }

    pub async fn dispatch(&self, command: Command) -> WishResult<Vec<Wish>> {
        self.handle().dispatch(command).await
    }

    pub fn unmount(self) {}
}

impl Drop for BoardSync {
    fn drop(&mut self) {
        self.task.abort();
        tracing::debug!("Board unmounted");
    }
}

/// Weak reference to a mounted board, as held by in-flight UI callbacks.
#[derive(Clone)]
pub struct BoardHandle {
    board: Weak<Mutex<WishBoard>>,
}

impl BoardHandle {
    pub fn is_mounted(&self) -> bool {
        self.board.strong_count() > 0
    }

    /// Begins locally, sends without holding the board lock, then settles if
    /// the board is still mounted. A conflict also triggers a refetch.
    pub async fn dispatch(&self, command: Command) -> WishResult<Vec<Wish>> {
        let (mutation, store) = {
            let board = self.board.upgrade().ok_or(WishError::Unmounted)?;
            let mut guard = board.lock().await;
            (guard.begin(command)?, guard.store())
        };

        let sent = mutation.send(&store).await;

        let Some(board) = self.board.upgrade() else {
            tracing::debug!("Board unmounted while mutation was in flight; result discarded");
            return sent.into_result();
        };
        let mut guard = board.lock().await;
        let result = guard.settle(mutation, sent);
        guard.resync_on_conflict(&result).await;
        result
    }
}
