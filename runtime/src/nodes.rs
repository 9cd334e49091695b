//! Workflow nodes: load the wish, plan the action, persist the patch.
//!
//! Every node reads its collaborators from the [`Bus`]:
//!
//! | Resource            | Used by               |
//! |---------------------|-----------------------|
//! | `SharedStore`       | `LoadWish`, `PersistPatch` |
//! | `Session`           | `PlanAction`          |
//! | `Arc<dyn Clock>`    | `PlanAction` (optional, defaults to the system clock) |

use crate::axon::Axon;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tandem_core::prelude::*;
use tandem_core::store::SharedStore;
use tandem_core::workflow::{self, Clock};

/// A user intent addressed to one wish.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub wish: WishId,
    pub action: WishAction,
}

impl ActionRequest {
    pub fn new(wish: WishId, action: WishAction) -> Self {
        Self { wish, action }
    }
}

/// The request together with the freshly read wish.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWish {
    pub request: ActionRequest,
    pub wish: Wish,
}

/// A validated mutation and the snapshot it was planned against.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub pre_image: Wish,
    pub patch: WishPatch,
}

/// The store's view of the wish after the change.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedChange {
    pub pre_image: Wish,
    pub patch: WishPatch,
    pub wish: Wish,
}

fn store(bus: &Bus) -> Result<SharedStore, WishError> {
    Ok(bus.require::<SharedStore>()?.clone())
}

/// Reads the current state of the addressed wish from the store.
#[derive(Debug, Clone, Copy)]
pub struct LoadWish;

#[async_trait]
impl Transition<ActionRequest, LoadedWish> for LoadWish {
    type Error = WishError;

    async fn run(&self, request: ActionRequest, bus: &mut Bus) -> Outcome<LoadedWish, WishError> {
        let store = match store(bus) {
            Ok(store) => store,
            Err(e) => return Outcome::Fault(e),
        };
        match store.get_wish(request.wish).await {
            Ok(Some(wish)) => Outcome::Next(LoadedWish { request, wish }),
            Ok(None) => Outcome::Fault(WishError::NotFound(request.wish)),
            Err(e) => Outcome::Fault(e.into()),
        }
    }
}

/// Checks the action against the transition table for the session's role.
#[derive(Debug, Clone, Copy)]
pub struct PlanAction;

#[async_trait]
impl Transition<LoadedWish, PlannedChange> for PlanAction {
    type Error = WishError;

    async fn run(&self, loaded: LoadedWish, bus: &mut Bus) -> Outcome<PlannedChange, WishError> {
        let actor = match bus.require::<Session>() {
            Ok(session) => session.current_role(),
            Err(e) => return Outcome::Fault(e.into()),
        };
        let now = bus
            .get::<Arc<dyn Clock>>()
            .map(|clock| clock.now())
            .unwrap_or_else(Utc::now);

        workflow::plan(&loaded.wish, actor, loaded.request.action, now)
            .map(|patch| PlannedChange {
                pre_image: loaded.wish,
                patch,
            })
            .into()
    }
}

/// Sends the planned patch as one combined update, guarded by the state it
/// was planned against when it changes the status.
#[derive(Debug, Clone, Copy)]
pub struct PersistPatch;

#[async_trait]
impl Transition<PlannedChange, AppliedChange> for PersistPatch {
    type Error = WishError;

    async fn run(&self, change: PlannedChange, bus: &mut Bus) -> Outcome<AppliedChange, WishError> {
        let store = match store(bus) {
            Ok(store) => store,
            Err(e) => return Outcome::Fault(e),
        };
        let id = change.pre_image.id;
        let expected = change.patch.precondition(&change.pre_image);
        match store.update_wish_if(id, expected, &change.patch).await {
            Ok(wish) => {
                tracing::info!(tandem.wish = %id, status = %wish.status, "Wish updated");
                Outcome::Next(AppliedChange {
                    pre_image: change.pre_image,
                    patch: change.patch,
                    wish,
                })
            }
            Err(e) => {
                tracing::warn!(tandem.wish = %id, error = %e, "Wish update failed");
                Outcome::Fault(e.into())
            }
        }
    }
}

/// Authoritative path: read fresh state, validate, persist.
pub fn workflow_axon() -> Axon<ActionRequest, AppliedChange, WishError> {
    Axon::new("wish.workflow")
        .then(Traced::new(LoadWish, "LoadWish"))
        .then(Traced::new(PlanAction, "PlanAction"))
        .then(Traced::new(PersistPatch, "PersistPatch"))
}

/// Persist-only path for changes already planned against a local copy.
pub fn persist_axon() -> Axon<PlannedChange, AppliedChange, WishError> {
    Axon::new("wish.persist").then(Traced::new(PersistPatch, "PersistPatch"))
}

/// Runs `action` for the Bus's session against the store's current state.
pub async fn run_action(bus: &mut Bus, wish: WishId, action: WishAction) -> WishResult<Wish> {
    workflow_axon()
        .execute(ActionRequest::new(wish, action), bus)
        .await
        .map(|applied| applied.wish)
        .into_result()
}
