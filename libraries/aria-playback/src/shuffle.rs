//! Shuffle derivation for the active queue
//!
//! The active (played) order is always derived from the master (insertion)
//! order. With shuffle on, the entry at the pinned position keeps its place
//! and the entries before and after it are shuffled separately.

use crate::types::ShuffleMode;
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};

/// Shuffle a batch in place (Fisher-Yates)
pub fn shuffle_batch<T>(items: &mut [T]) {
    shuffle_batch_with_rng(items, &mut thread_rng());
}

pub fn shuffle_batch_with_rng<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// Derive the active order from `master`, pinning `master[pinned]`
///
/// - `Off`: `master` verbatim
/// - `Songs`: `shuffle(master[..pinned]) ++ [master[pinned]] ++ shuffle(master[pinned+1..])`,
///   or a full shuffle when `pinned` is out of bounds
pub fn derive_active<T: Clone>(master: &[T], pinned: usize, mode: ShuffleMode) -> Vec<T> {
    derive_active_with_rng(master, pinned, mode, &mut thread_rng())
}

pub fn derive_active_with_rng<T: Clone, R: Rng + ?Sized>(
    master: &[T],
    pinned: usize,
    mode: ShuffleMode,
    rng: &mut R,
) -> Vec<T> {
    let mut active = master.to_vec();
    match mode {
        ShuffleMode::Off => {}
        ShuffleMode::Songs => {
            if pinned < active.len() {
                let (before, rest) = active.split_at_mut(pinned);
                before.shuffle(rng);
                rest[1..].shuffle(rng);
            } else {
                active.shuffle(rng);
            }
        }
    }
    active
}
