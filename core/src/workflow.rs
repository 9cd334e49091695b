//! # Wish Workflow: propose, counter-party confirms
//!
//! The engine is a pure function from `(wish, actor, action)` to the exact
//! field mutation the store should apply. It never mutates anything itself,
//! so a rejected action leaves no partial state behind.
//!
//! | From                 | Action           | Actor            | To                   |
//! |----------------------|------------------|------------------|----------------------|
//! | pending              | propose-complete | any              | waiting_confirmation |
//! | waiting_confirmation | confirm          | not the proposer | completed            |
//! | waiting_confirmation | reject           | not the proposer | pending              |
//! | pending              | request-delete   | any              | pending_delete       |
//! | pending_delete       | confirm-delete   | not the proposer | deleted              |
//! | pending_delete       | reject-delete    | not the proposer | pending              |
//! | completed / deleted  | reopen           | admin            | pending              |

use crate::error::{WishError, WishResult};
use crate::patch::WishPatch;
use crate::role::Role;
use crate::wish::{Wish, WishStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A user intent against one wish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum WishAction {
    ProposeComplete,
    /// `completed_at` may backdate the completion; defaults to now.
    Confirm {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed_at: Option<DateTime<Utc>>,
    },
    Reject,
    RequestDelete,
    ConfirmDelete,
    RejectDelete,
    Reopen,
}

impl WishAction {
    pub fn confirm() -> Self {
        WishAction::Confirm { completed_at: None }
    }

    pub fn confirm_on(completed_at: DateTime<Utc>) -> Self {
        WishAction::Confirm {
            completed_at: Some(completed_at),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            WishAction::ProposeComplete => ActionKind::ProposeComplete,
            WishAction::Confirm { .. } => ActionKind::Confirm,
            WishAction::Reject => ActionKind::Reject,
            WishAction::RequestDelete => ActionKind::RequestDelete,
            WishAction::ConfirmDelete => ActionKind::ConfirmDelete,
            WishAction::RejectDelete => ActionKind::RejectDelete,
            WishAction::Reopen => ActionKind::Reopen,
        }
    }
}

/// Data-free discriminant of [`WishAction`], used for rendering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ProposeComplete,
    Confirm,
    Reject,
    RequestDelete,
    ConfirmDelete,
    RejectDelete,
    Reopen,
}

impl ActionKind {
    pub const ALL: [ActionKind; 7] = [
        ActionKind::ProposeComplete,
        ActionKind::Confirm,
        ActionKind::Reject,
        ActionKind::RequestDelete,
        ActionKind::ConfirmDelete,
        ActionKind::RejectDelete,
        ActionKind::Reopen,
    ];

    /// The action with no payload attached.
    pub fn bare(self) -> WishAction {
        match self {
            ActionKind::ProposeComplete => WishAction::ProposeComplete,
            ActionKind::Confirm => WishAction::confirm(),
            ActionKind::Reject => WishAction::Reject,
            ActionKind::RequestDelete => WishAction::RequestDelete,
            ActionKind::ConfirmDelete => WishAction::ConfirmDelete,
            ActionKind::RejectDelete => WishAction::RejectDelete,
            ActionKind::Reopen => WishAction::Reopen,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::ProposeComplete => "propose-complete",
            ActionKind::Confirm => "confirm",
            ActionKind::Reject => "reject",
            ActionKind::RequestDelete => "request-delete",
            ActionKind::ConfirmDelete => "confirm-delete",
            ActionKind::RejectDelete => "reject-delete",
            ActionKind::Reopen => "reopen",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plans the mutation for `action` taken by `actor` on `wish`.
///
/// `now` is used only when a confirmation carries no explicit date.
pub fn plan(
    wish: &Wish,
    actor: Role,
    action: WishAction,
    now: DateTime<Utc>,
) -> WishResult<WishPatch> {
    use WishStatus::*;

    let invalid = || WishError::InvalidTransition {
        from: wish.status,
        action: action.kind(),
        actor,
    };
    // An open proposal may only be answered by the other party. A row with no
    // recorded proposer cannot be answered by anyone.
    let counterpart = wish.proposed_by_role.is_some_and(|p| p != actor);

    let patch = match (wish.status, action) {
        (Pending, WishAction::ProposeComplete) => WishPatch::new()
            .status(WaitingConfirmation)
            .proposed_by(Some(actor)),

        (WaitingConfirmation, WishAction::Confirm { completed_at }) if counterpart => {
            WishPatch::new()
                .status(Completed)
                .completed_at(Some(completed_at.unwrap_or(now)))
                .proposed_by(None)
        }

        (WaitingConfirmation, WishAction::Reject) if counterpart => {
            WishPatch::new().status(Pending).proposed_by(None)
        }

        (Pending, WishAction::RequestDelete) => WishPatch::new()
            .status(PendingDelete)
            .proposed_by(Some(actor)),

        (PendingDelete, WishAction::ConfirmDelete) if counterpart => {
            WishPatch::new().status(Deleted).proposed_by(None)
        }

        (PendingDelete, WishAction::RejectDelete) if counterpart => {
            WishPatch::new().status(Pending).proposed_by(None)
        }

        (Completed | Deleted, WishAction::Reopen) if actor.is_admin() => WishPatch::new()
            .status(Pending)
            .completed_at(None)
            .proposed_by(None),

        _ => return Err(invalid()),
    };

    tracing::debug!(
        tandem.wish = %wish.id,
        tandem.action = %action.kind(),
        tandem.actor = %actor,
        from = %wish.status,
        "Planned wish transition"
    );
    Ok(patch)
}

/// The actions `actor` may take on `wish` right now.
pub fn allowed_actions(wish: &Wish, actor: Role) -> Vec<ActionKind> {
    allowed_actions_at(wish, actor, Utc::now())
}

/// [`allowed_actions`] evaluated at `now`.
pub fn allowed_actions_at(wish: &Wish, actor: Role, now: DateTime<Utc>) -> Vec<ActionKind> {
    ActionKind::ALL
        .into_iter()
        .filter(|kind| plan(wish, actor, kind.bare(), now).is_ok())
        .collect()
}

/// Source of "now" for confirmations without an explicit date.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// The workflow engine bound to a clock.
#[derive(Debug, Clone, Default)]
pub struct WishWorkflow<C = SystemClock> {
    clock: C,
}

impl WishWorkflow<SystemClock> {
    pub fn new() -> Self {
        Self { clock: SystemClock }
    }
}

impl<C: Clock> WishWorkflow<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock }
    }

    pub fn plan(&self, wish: &Wish, actor: Role, action: WishAction) -> WishResult<WishPatch> {
        plan(wish, actor, action, self.clock.now())
    }

    /// Plans and applies locally, returning the next state and the patch that produced it.
    pub fn step(&self, wish: &Wish, actor: Role, action: WishAction) -> WishResult<(Wish, WishPatch)> {
        let patch = self.plan(wish, actor, action)?;
        Ok((patch.applied(wish), patch))
    }

    pub fn allowed_actions(&self, wish: &Wish, actor: Role) -> Vec<ActionKind> {
        allowed_actions_at(wish, actor, self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wish::{NewWish, WishId};
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn pending(created_by: Role) -> Wish {
        Wish::create(
            WishId::new_v4(),
            NewWish::new("Road trip along the coast", created_by),
            0,
            at(2023, 6, 1),
        )
    }

    fn engine() -> WishWorkflow<FixedClock> {
        WishWorkflow::with_clock(FixedClock(at(2025, 2, 14)))
    }

    /// Every reachable state, with every possible proposer.
    fn all_states() -> Vec<Wish> {
        let mut out = Vec::new();
        for creator in Role::ALL {
            let base = pending(creator);
            for status in WishStatus::ALL {
                let mut w = base.clone();
                w.status = status;
                if status == WishStatus::Completed {
                    w.completed_at = Some(at(2024, 5, 5));
                }
                if status.awaits_counterpart() {
                    for proposer in Role::ALL {
                        let mut p = w.clone();
                        p.proposed_by_role = Some(proposer);
                        out.push(p);
                    }
                } else {
                    out.push(w);
                }
            }
        }
        out
    }

    #[test]
    fn answering_actions_on_pending_are_rejected() {
        let wish = pending(Role::User);
        for actor in Role::ALL {
            for action in [
                WishAction::confirm(),
                WishAction::Reject,
                WishAction::ConfirmDelete,
                WishAction::RejectDelete,
            ] {
                let err = engine().plan(&wish, actor, action).unwrap_err();
                assert!(matches!(err, WishError::InvalidTransition { .. }));
            }
        }
    }

    #[test]
    fn proposer_can_never_answer_own_proposal() {
        for wish in all_states().into_iter().filter(|w| w.status.awaits_counterpart()) {
            let proposer = wish.proposed_by_role.unwrap();
            for kind in [
                ActionKind::Confirm,
                ActionKind::Reject,
                ActionKind::ConfirmDelete,
                ActionKind::RejectDelete,
            ] {
                assert!(
                    engine().plan(&wish, proposer, kind.bare()).is_err(),
                    "{proposer} answered own {kind} on {}",
                    wish.status
                );
            }
        }
    }

    #[test]
    fn counterpart_answers_clear_the_proposer() {
        for proposer in Role::ALL {
            let (proposed, _) = engine()
                .step(&pending(proposer), proposer, WishAction::ProposeComplete)
                .unwrap();
            let other = proposer.counterpart();

            let (done, _) = engine().step(&proposed, other, WishAction::confirm()).unwrap();
            assert_eq!(done.status, WishStatus::Completed);
            assert_eq!(done.proposed_by_role, None);
            assert_eq!(done.completed_at, Some(at(2025, 2, 14)));

            let (back, _) = engine().step(&proposed, other, WishAction::Reject).unwrap();
            assert_eq!(back.status, WishStatus::Pending);
            assert_eq!(back.proposed_by_role, None);
        }
    }

    #[test]
    fn double_propose_is_rejected() {
        let wish = pending(Role::Admin);
        let (proposed, _) = engine()
            .step(&wish, Role::Admin, WishAction::ProposeComplete)
            .unwrap();
        let err = engine()
            .plan(&proposed, Role::Admin, WishAction::ProposeComplete)
            .unwrap_err();
        assert_eq!(
            err,
            WishError::InvalidTransition {
                from: WishStatus::WaitingConfirmation,
                action: ActionKind::ProposeComplete,
                actor: Role::Admin,
            }
        );
    }

    #[test]
    fn exhaustive_walk_preserves_invariants() {
        for wish in all_states() {
            assert_eq!(wish.check_invariants(), Ok(()));
            for actor in Role::ALL {
                for kind in ActionKind::ALL {
                    if let Ok((next, _)) = engine().step(&wish, actor, kind.bare()) {
                        assert_eq!(
                            next.check_invariants(),
                            Ok(()),
                            "{kind} by {actor} from {} broke an invariant",
                            wish.status
                        );
                        assert_eq!(next.created_by_role, wish.created_by_role);
                    }
                }
            }
        }
    }

    #[test]
    fn only_admin_reopens() {
        for wish in all_states()
            .into_iter()
            .filter(|w| matches!(w.status, WishStatus::Completed | WishStatus::Deleted))
        {
            assert!(engine().plan(&wish, Role::User, WishAction::Reopen).is_err());

            let (reopened, _) = engine().step(&wish, Role::Admin, WishAction::Reopen).unwrap();
            assert_eq!(reopened.status, WishStatus::Pending);
            assert_eq!(reopened.completed_at, None);
        }
    }

    #[test]
    fn confirmation_can_be_backdated() {
        let wish = pending(Role::User);
        let (proposed, _) = engine()
            .step(&wish, Role::Admin, WishAction::ProposeComplete)
            .unwrap();
        let patch = engine()
            .plan(&proposed, Role::User, WishAction::confirm_on(at(2024, 1, 1)))
            .unwrap();
        assert_eq!(patch.completed_at, Some(Some(at(2024, 1, 1))));
    }

    #[test]
    fn unattributed_proposal_cannot_be_answered() {
        let mut wish = pending(Role::User);
        wish.status = WishStatus::WaitingConfirmation;
        for actor in Role::ALL {
            assert!(engine().plan(&wish, actor, WishAction::confirm()).is_err());
        }
    }

    #[test]
    fn engine_reads_its_own_clock() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        #[derive(Default)]
        struct Ticking(AtomicUsize);

        impl Clock for Ticking {
            fn now(&self) -> DateTime<Utc> {
                self.0.fetch_add(1, Ordering::SeqCst);
                at(2025, 2, 14)
            }
        }

        let engine = WishWorkflow::with_clock(Ticking::default());
        let wish = pending(Role::Admin);
        assert_eq!(
            engine.allowed_actions(&wish, Role::User),
            allowed_actions(&wish, Role::User)
        );
        assert_eq!(engine.clock.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn allowed_actions_follow_the_table() {
        let wish = pending(Role::User);
        assert_eq!(
            allowed_actions(&wish, Role::User),
            vec![ActionKind::ProposeComplete, ActionKind::RequestDelete]
        );

        let (deleting, _) = engine()
            .step(&wish, Role::User, WishAction::RequestDelete)
            .unwrap();
        assert!(allowed_actions(&deleting, Role::User).is_empty());
        assert_eq!(
            allowed_actions(&deleting, Role::Admin),
            vec![ActionKind::ConfirmDelete, ActionKind::RejectDelete]
        );
    }

    #[test]
    fn action_wire_shape_is_tagged() {
        let json = serde_json::to_value(WishAction::confirm_on(at(2024, 1, 1))).unwrap();
        assert_eq!(json["action"], "confirm");
        let back: WishAction = serde_json::from_value(serde_json::json!({"action": "reopen"})).unwrap();
        assert_eq!(back, WishAction::Reopen);
    }
}
