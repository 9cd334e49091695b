//! Async side of Tandem: the workflow pipeline, the optimistic board and
//! change-feed synchronisation, plus in-process store and feed implementations.

pub mod axon;
pub mod board;
pub mod feed;
pub mod memory;
pub mod nodes;
pub mod sync;

pub mod prelude {
    pub use crate::axon::Axon;
    pub use crate::board::{Command, Mutation, Sent, WishBoard, WishFilter};
    pub use crate::feed::BroadcastFeed;
    pub use crate::memory::MemoryWishStore;
    pub use crate::nodes::{ActionRequest, run_action, workflow_axon};
    pub use crate::sync::{BoardHandle, BoardSync, SharedBoard};
}

pub use axon::Axon;
pub use board::{Command, Mutation, Sent, WishBoard, WishFilter};
pub use feed::BroadcastFeed;
pub use memory::MemoryWishStore;
pub use sync::{BoardHandle, BoardSync};
