//! Tandem core: the two-party wish workflow and the seams to its collaborators.
//!
//! Storage, realtime notification and identity are reached only through the
//! [`WishStore`], [`ChangeFeed`] and [`IdentityProvider`] traits.

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod outcome;
pub mod patch;
pub mod reorder;
pub mod role;
pub mod store;
pub mod telemetry;
pub mod transition;
pub mod wish;
pub mod workflow;

pub use bus::{Bus, MissingResource};
pub use config::{ConfigError, TandemConfig};
pub use error::{StoreError, WishError, WishResult};
pub use event::{ChangeFeed, ChangeNotice, EventSource, SharedFeed, Subscription, WISHES_TOPIC};
pub use identity::{IdentityError, IdentityProvider, RoleDirectory, Session};
pub use outcome::Outcome;
pub use patch::{Precondition, WishPatch};
pub use role::Role;
pub use store::{SharedStore, StoreResult, WishStore};
pub use transition::Transition;
pub use wish::{NewWish, Wish, WishId, WishStatus};
pub use workflow::{ActionKind, Clock, FixedClock, SystemClock, WishAction, WishWorkflow};

pub mod prelude {
    pub use crate::bus::Bus;
    pub use crate::error::{StoreError, WishError, WishResult};
    pub use crate::event::{ChangeFeed, ChangeNotice, Subscription, WISHES_TOPIC};
    pub use crate::identity::{IdentityProvider, Session};
    pub use crate::outcome::Outcome;
    pub use crate::patch::{Precondition, WishPatch};
    pub use crate::role::Role;
    pub use crate::store::WishStore;
    pub use crate::telemetry::Traced;
    pub use crate::transition::Transition;
    pub use crate::wish::{NewWish, Wish, WishId, WishStatus};
    pub use crate::workflow::{ActionKind, WishAction, WishWorkflow};
}
