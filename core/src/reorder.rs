//! Manual ordering of wishes.
//!
//! Display order is `sort_order` ascending. A reorder assigns the dense index
//! of the new arrangement and only emits patches for wishes whose position
//! changed; each one is persisted independently.

use crate::error::{WishError, WishResult};
use crate::patch::WishPatch;
use crate::wish::{Wish, WishId};
use std::collections::{HashMap, HashSet};

/// Sorts by `sort_order`, breaking ties by creation time then id.
pub fn sort_wishes(wishes: &mut [Wish]) {
    wishes.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Patches that move `current` into `new_order`.
pub fn reorder(current: &[Wish], new_order: &[WishId]) -> WishResult<Vec<(WishId, WishPatch)>> {
    let positions: HashMap<WishId, i64> = current.iter().map(|w| (w.id, w.sort_order)).collect();
    let unique: HashSet<&WishId> = new_order.iter().collect();

    if new_order.len() != current.len()
        || unique.len() != new_order.len()
        || !new_order.iter().all(|id| positions.contains_key(id))
    {
        return Err(WishError::NotAPermutation);
    }

    Ok(new_order
        .iter()
        .enumerate()
        .filter_map(|(index, id)| {
            let index = index as i64;
            (positions[id] != index).then(|| (*id, WishPatch::new().sort_order(index)))
        })
        .collect())
}

/// Moves the id at `from` to index `to`, shifting the others. Out-of-range
/// indices are clamped to the end.
pub fn move_to(ids: &[WishId], from: usize, to: usize) -> Vec<WishId> {
    let mut out = ids.to_vec();
    if from >= out.len() {
        return out;
    }
    let id = out.remove(from);
    let to = to.min(out.len());
    out.insert(to, id);
    out
}
