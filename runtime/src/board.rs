//! WishBoard - one client's optimistic view of the shared list.
//!
//! Every change is a [`Command`] turned into a [`Mutation`]:
//!
//! 1. `begin` validates the command against the local copy and applies it
//!    locally, keeping the pre-image of every row it touched;
//! 2. `Mutation::send` issues the store requests, without holding the board;
//! 3. `settle` adopts the rows the store accepted and applies the inverse
//!    patches, built from the pre-images, to the rest.
//!
//! Status changes are sent guarded by the state they were planned against. A
//! board that missed a notice gets a conflict back, rolls back and refetches.

use crate::nodes::{PlannedChange, persist_axon};
use chrono::Utc;
use std::sync::Arc;
use tandem_core::prelude::*;
use tandem_core::reorder::{self, sort_wishes};
use tandem_core::store::SharedStore;
use tandem_core::workflow::{self, Clock, SystemClock};
use tracing::warn;

/// Which wishes the board shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WishFilter {
    /// Everything but tombstones.
    #[default]
    All,
    /// Not yet finished: pending or with an open proposal.
    Open,
    /// Open proposals the other party is waiting on us to answer.
    AwaitingMe,
    Completed,
    Deleted,
}

impl WishFilter {
    pub fn matches(self, wish: &Wish, role: Role) -> bool {
        match self {
            WishFilter::All => wish.status != WishStatus::Deleted,
            WishFilter::Open => matches!(
                wish.status,
                WishStatus::Pending | WishStatus::WaitingConfirmation | WishStatus::PendingDelete
            ),
            WishFilter::AwaitingMe => wish.awaits(role),
            WishFilter::Completed => wish.status == WishStatus::Completed,
            WishFilter::Deleted => wish.status == WishStatus::Deleted,
        }
    }
}

/// A user intent against the board.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add { title: String },
    Rename { id: WishId, title: String },
    Act { id: WishId, action: WishAction },
    Reorder { order: Vec<WishId> },
    Move { from: usize, to: usize },
}

/// A locally applied change awaiting the store's answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert {
        placeholder: WishId,
        new: NewWish,
    },
    Update {
        pre_image: Wish,
        patch: WishPatch,
    },
    Reorder {
        changes: Vec<(WishId, WishPatch)>,
        pre_images: Vec<Wish>,
    },
}

/// The store's answer to a [`Mutation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sent {
    /// Rows the store accepted, as stored.
    pub stored: Vec<Wish>,
    /// The first failed request, if any.
    pub error: Option<WishError>,
}

impl Sent {
    fn from_result(result: WishResult<Wish>) -> Self {
        match result {
            Ok(wish) => Sent {
                stored: vec![wish],
                error: None,
            },
            Err(e) => Sent {
                stored: Vec::new(),
                error: Some(e),
            },
        }
    }

    pub fn into_result(self) -> WishResult<Vec<Wish>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.stored),
        }
    }
}

impl Mutation {
    /// Issues the store requests. Reorders send one independent update per
    /// changed wish; some may land while others fail.
    pub async fn send(&self, store: &SharedStore) -> Sent {
        match self {
            Mutation::Insert { new, .. } => {
                Sent::from_result(store.insert_wish(new.clone()).await.map_err(WishError::from))
            }
            Mutation::Update { pre_image, patch } => {
                Sent::from_result(persist(store, pre_image, patch).await)
            }
            Mutation::Reorder {
                changes,
                pre_images,
            } => {
                let mut sent = Sent {
                    stored: Vec::with_capacity(changes.len()),
                    error: None,
                };
                for ((_, patch), pre_image) in changes.iter().zip(pre_images) {
                    match persist(store, pre_image, patch).await {
                        Ok(wish) => sent.stored.push(wish),
                        Err(e) => {
                            sent.error.get_or_insert(e);
                        }
                    }
                }
                sent
            }
        }
    }
}

async fn persist(store: &SharedStore, pre_image: &Wish, patch: &WishPatch) -> WishResult<Wish> {
    let mut bus = Bus::new().with(store.clone());
    let change = PlannedChange {
        pre_image: pre_image.clone(),
        patch: patch.clone(),
    };
    persist_axon()
        .execute(change, &mut bus)
        .await
        .map(|applied| applied.wish)
        .into_result()
}

pub struct WishBoard {
    store: SharedStore,
    session: Session,
    clock: Arc<dyn Clock>,
    wishes: Vec<Wish>,
    filter: WishFilter,
}

impl WishBoard {
    pub fn new(store: SharedStore, session: Session) -> Self {
        Self {
            store,
            session,
            clock: Arc::new(SystemClock),
            wishes: Vec::new(),
            filter: WishFilter::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn role(&self) -> Role {
        self.session.current_role()
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn filter(&self) -> WishFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: WishFilter) {
        self.filter = filter;
    }

    /// All known wishes, tombstones included, in display order.
    pub fn wishes(&self) -> &[Wish] {
        &self.wishes
    }

    /// The wishes the current filter shows, in display order.
    pub fn visible(&self) -> Vec<&Wish> {
        let role = self.role();
        self.wishes
            .iter()
            .filter(|w| self.filter.matches(w, role))
            .collect()
    }

    pub fn get(&self, id: WishId) -> Option<&Wish> {
        self.wishes.iter().find(|w| w.id == id)
    }

    fn get_mut(&mut self, id: WishId) -> Option<&mut Wish> {
        self.wishes.iter_mut().find(|w| w.id == id)
    }

    /// Buttons to render for `id`; empty for unknown wishes.
    pub fn allowed_actions(&self, id: WishId) -> Vec<ActionKind> {
        self.get(id)
            .map(|w| workflow::allowed_actions_at(w, self.role(), self.clock.now()))
            .unwrap_or_default()
    }

    /// Full refetch; replaces the local list with the store's.
    pub async fn refresh(&mut self) -> WishResult<()> {
        let mut wishes = self.store.list_wishes().await?;
        sort_wishes(&mut wishes);
        tracing::debug!(count = wishes.len(), tandem.actor = %self.role(), "Board refreshed");
        self.wishes = wishes;
        Ok(())
    }

    /// Validates `command` against the local copy and applies it locally.
    ///
    /// Rejected commands change nothing and yield no mutation to send.
    pub fn begin(&mut self, command: Command) -> WishResult<Mutation> {
        match command {
            Command::Add { title } => {
                let title = clean_title(&title)?;
                let sort_order = self.next_sort_order();
                let new = NewWish::new(title, self.role()).at(sort_order);
                let placeholder = WishId::new_v4();
                let local = Wish::create(placeholder, new.clone(), sort_order, Utc::now());
                self.wishes.push(local);
                Ok(Mutation::Insert { placeholder, new })
            }
            Command::Rename { id, title } => {
                let title = clean_title(&title)?;
                self.begin_update(id, WishPatch::new().title(title))
            }
            Command::Act { id, action } => {
                let wish = self.get(id).ok_or(WishError::NotFound(id))?;
                let patch = workflow::plan(wish, self.role(), action, self.clock.now())?;
                self.begin_update(id, patch)
            }
            Command::Reorder { order } => {
                let order = if order.len() == self.wishes.len() {
                    order
                } else {
                    self.splice_visible(&order)?
                };
                self.begin_reorder(&order)
            }
            Command::Move { from, to } => {
                let visible: Vec<WishId> = self.visible().iter().map(|w| w.id).collect();
                let order = self.splice_visible(&reorder::move_to(&visible, from, to))?;
                self.begin_reorder(&order)
            }
        }
    }

    /// Full order with the visible rows' slots refilled from `visible_order`.
    /// Hidden rows keep their positions.
    fn splice_visible(&self, visible_order: &[WishId]) -> WishResult<Vec<WishId>> {
        let role = self.role();
        let shown = |w: &Wish| self.filter.matches(w, role);
        if visible_order.len() != self.wishes.iter().filter(|w| shown(w)).count() {
            return Err(WishError::NotAPermutation);
        }
        let mut refill = visible_order.iter().copied();
        Ok(self
            .wishes
            .iter()
            .map(|w| if shown(w) { refill.next().unwrap_or(w.id) } else { w.id })
            .collect())
    }

    fn begin_update(&mut self, id: WishId, patch: WishPatch) -> WishResult<Mutation> {
        let wish = self.get_mut(id).ok_or(WishError::NotFound(id))?;
        let pre_image = wish.clone();
        patch.apply_to(wish);
        Ok(Mutation::Update { pre_image, patch })
    }

    fn begin_reorder(&mut self, order: &[WishId]) -> WishResult<Mutation> {
        let changes = reorder::reorder(&self.wishes, order)?;
        let mut pre_images = Vec::with_capacity(changes.len());
        for (id, patch) in &changes {
            if let Some(wish) = self.get_mut(*id) {
                pre_images.push(wish.clone());
                patch.apply_to(wish);
            }
        }
        sort_wishes(&mut self.wishes);
        Ok(Mutation::Reorder {
            changes,
            pre_images,
        })
    }

    /// Adopts what the store accepted and rolls every other touched row back
    /// to its pre-image.
    pub fn settle(&mut self, mutation: Mutation, sent: Sent) -> WishResult<Vec<Wish>> {
        if let Mutation::Insert { placeholder, .. } = &mutation {
            self.wishes.retain(|w| w.id != *placeholder);
        }
        self.adopt(&sent.stored);

        if sent.error.is_some() {
            match &mutation {
                Mutation::Insert { .. } => {}
                Mutation::Update { pre_image, patch } => self.revert(pre_image, patch),
                Mutation::Reorder {
                    changes,
                    pre_images,
                } => {
                    for ((id, patch), pre_image) in changes.iter().zip(pre_images) {
                        if !sent.stored.iter().any(|w| w.id == *id) {
                            self.revert(pre_image, patch);
                        }
                    }
                }
            }
        }
        sort_wishes(&mut self.wishes);

        if let Some(e) = &sent.error {
            warn!(error = %e, tandem.actor = %self.role(), "Mutation failed; local copy reverted");
        }
        sent.into_result()
    }

    /// A conflict means the local copy was outdated: refetch it.
    pub(crate) async fn resync_on_conflict(&mut self, result: &WishResult<Vec<Wish>>) {
        if !matches!(result, Err(e) if e.is_conflict()) {
            return;
        }
        if let Err(e) = self.refresh().await {
            warn!(error = %e, tandem.actor = %self.role(), "Refetch after conflict failed");
        }
    }

    fn adopt(&mut self, stored: &[Wish]) {
        for wish in stored {
            match self.get_mut(wish.id) {
                Some(local) => *local = wish.clone(),
                None => self.wishes.push(wish.clone()),
            }
        }
    }

    /// Applies the inverse of `patch`, unless a refetch already replaced the
    /// optimistic row with the store's state.
    fn revert(&mut self, pre_image: &Wish, patch: &WishPatch) {
        let undo = patch.inverse(pre_image);
        if let Some(local) = self.get_mut(pre_image.id) {
            if patch.applied(local) == *local {
                undo.apply_to(local);
            }
        }
    }

    /// begin, send, settle.
    pub async fn execute(&mut self, command: Command) -> WishResult<Vec<Wish>> {
        let mutation = self.begin(command)?;
        let sent = mutation.send(&self.store).await;
        let result = self.settle(mutation, sent);
        self.resync_on_conflict(&result).await;
        result
    }

    pub async fn add(&mut self, title: &str) -> WishResult<Wish> {
        let stored = self
            .execute(Command::Add {
                title: title.to_string(),
            })
            .await?;
        single(stored)
    }

    pub async fn rename(&mut self, id: WishId, title: &str) -> WishResult<Wish> {
        let stored = self
            .execute(Command::Rename {
                id,
                title: title.to_string(),
            })
            .await?;
        single(stored)
    }

    pub async fn perform(&mut self, id: WishId, action: WishAction) -> WishResult<Wish> {
        let stored = self.execute(Command::Act { id, action }).await?;
        single(stored)
    }

    pub async fn reorder(&mut self, order: Vec<WishId>) -> WishResult<()> {
        self.execute(Command::Reorder { order }).await.map(drop)
    }

    pub async fn move_wish(&mut self, from: usize, to: usize) -> WishResult<()> {
        self.execute(Command::Move { from, to }).await.map(drop)
    }

    fn next_sort_order(&self) -> i64 {
        self.wishes
            .iter()
            .map(|w| w.sort_order + 1)
            .max()
            .unwrap_or(0)
    }
}

fn clean_title(title: &str) -> WishResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WishError::EmptyTitle);
    }
    Ok(title.to_string())
}

fn single(mut stored: Vec<Wish>) -> WishResult<Wish> {
    stored
        .pop()
        .ok_or_else(|| StoreError::Rejected("store returned no row".to_string()).into())
}
