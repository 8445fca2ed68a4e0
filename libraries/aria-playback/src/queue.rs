//! Play queue
//!
//! Two views of the same entries:
//! - Master queue: insertion order, as the catalog handed it over
//! - Active queue: played order, equal to master with shuffle off and a
//!   derived permutation of it with shuffle on
//!
//! The play index is an offset into the active queue.

use crate::error::{PlaybackError, Result};
use crate::item::MediaItem;
use crate::shuffle::{derive_active, shuffle_batch};
use crate::types::ShuffleMode;

#[derive(Debug, Clone, Default)]
pub struct PlayQueue {
    /// Insertion order
    master: Vec<MediaItem>,

    /// Played order
    active: Vec<MediaItem>,

    /// Offset into `active`
    index: usize,

    shuffle: ShuffleMode,
}

impl PlayQueue {
    /// Create an empty queue
    pub fn new(shuffle: ShuffleMode) -> Self {
        Self {
            shuffle,
            ..Self::default()
        }
    }

    /// Active (played) order
    pub fn items(&self) -> &[MediaItem] {
        &self.active
    }

    /// Insertion order
    pub fn master(&self) -> &[MediaItem] {
        &self.master
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn shuffle(&self) -> ShuffleMode {
        self.shuffle
    }

    /// Item at the play index
    pub fn current(&self) -> Option<&MediaItem> {
        self.active.get(self.index)
    }

    pub fn get(&self, index: usize) -> Option<&MediaItem> {
        self.active.get(index)
    }

    /// Move the play index
    pub fn set_index(&mut self, index: usize) -> Result<()> {
        if index >= self.active.len() {
            return Err(PlaybackError::IndexOutOfBounds(index));
        }
        self.index = index;
        Ok(())
    }

    /// Replace both queues and rewind to the head
    pub fn replace(&mut self, items: Vec<MediaItem>) {
        self.active = derive_active(&items, 0, self.shuffle);
        self.master = items;
        self.index = 0;
    }

    /// Extend the queue
    ///
    /// With shuffle on, the batch is shuffled on its own and appended to the
    /// active order, leaving already-queued entries where they are.
    pub fn append(&mut self, items: Vec<MediaItem>) {
        self.master.extend(items.iter().cloned());
        match self.shuffle {
            ShuffleMode::Off => self.active.extend(items),
            ShuffleMode::Songs => {
                let mut batch = items;
                shuffle_batch(&mut batch);
                self.active.extend(batch);
            }
        }
    }

    /// Insert `item` at active position `at`
    ///
    /// The master queue receives it at the same offset (clamped to its end).
    /// Inserting at or before the play index shifts the index so the
    /// current item stays current.
    pub fn insert(&mut self, item: MediaItem, at: usize) -> Result<()> {
        if at > self.active.len() {
            return Err(PlaybackError::IndexOutOfBounds(at));
        }
        let was_empty = self.active.is_empty();

        let master_at = at.min(self.master.len());
        self.master.insert(master_at, item.clone());
        self.active.insert(at, item);

        if !was_empty && at <= self.index {
            self.index += 1;
        }
        Ok(())
    }

    /// Remove the entry at active position `at`
    ///
    /// The same entry is removed from the master queue, wherever it sits
    /// there. The entry at the play index cannot be removed.
    pub fn remove(&mut self, at: usize) -> Result<MediaItem> {
        if at >= self.active.len() {
            return Err(PlaybackError::IndexOutOfBounds(at));
        }
        if at == self.index {
            return Err(PlaybackError::InvalidPlayingItemRemoval);
        }

        let removed = self.active.remove(at);
        let master_at = self
            .master
            .iter()
            .position(|entry| entry.same_entry(&removed))
            .or_else(|| self.master.iter().position(|entry| *entry == removed));
        if let Some(master_at) = master_at {
            self.master.remove(master_at);
        }

        if at < self.index {
            self.index -= 1;
        }
        Ok(removed)
    }

    /// Change the shuffle mode, keeping the current item current
    ///
    /// Returns `false` when the mode was already set.
    pub fn set_shuffle(&mut self, mode: ShuffleMode) -> bool {
        if self.shuffle == mode {
            return false;
        }
        self.shuffle = mode;

        // Locate the current entry in insertion order
        let pinned = self
            .current()
            .and_then(|current| self.master.iter().position(|e| e.same_entry(current)))
            .unwrap_or(self.master.len());

        self.active = derive_active(&self.master, pinned, mode);
        if pinned < self.master.len() {
            self.index = pinned;
        } else {
            self.index = 0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemMetadata;

    fn items(n: usize) -> Vec<MediaItem> {
        (0..n)
            .map(|i| MediaItem::new(format!("/music/{i}.mp3"), ItemMetadata::default()))
            .collect()
    }

    fn locators(items: &[MediaItem]) -> Vec<String> {
        let mut v: Vec<String> = items.iter().map(|i| i.locator().to_string()).collect();
        v.sort();
        v
    }

    #[test]
    fn replace_rewinds() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue.replace(items(3));
        queue.set_index(2).unwrap();
        queue.replace(items(5));
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.items(), queue.master());
    }

    #[test]
    fn insert_before_current_shifts_index() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue.replace(items(4));
        queue.set_index(2).unwrap();
        let current = queue.current().cloned().unwrap();

        let extra = MediaItem::new("/music/extra.mp3", ItemMetadata::default());
        queue.insert(extra, 0).unwrap();

        assert_eq!(queue.index(), 3);
        assert!(queue.current().unwrap().same_entry(&current));
    }

    #[test]
    fn insert_after_current_keeps_index() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue.replace(items(4));
        queue.set_index(1).unwrap();
        queue
            .insert(MediaItem::new("/x.mp3", ItemMetadata::default()), 2)
            .unwrap();
        assert_eq!(queue.index(), 1);
        assert_eq!(queue.get(2).unwrap().locator(), "/x.mp3");
    }

    #[test]
    fn insert_into_empty_queue() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue
            .insert(MediaItem::new("/x.mp3", ItemMetadata::default()), 0)
            .unwrap();
        assert_eq!(queue.index(), 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn insert_out_of_bounds() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue.replace(items(2));
        let result = queue.insert(MediaItem::new("/x.mp3", ItemMetadata::default()), 3);
        assert_eq!(result, Err(PlaybackError::IndexOutOfBounds(3)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn remove_current_is_rejected() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue.replace(items(3));
        queue.set_index(1).unwrap();

        let before = queue.items().to_vec();
        assert_eq!(
            queue.remove(1).unwrap_err(),
            PlaybackError::InvalidPlayingItemRemoval
        );
        assert_eq!(queue.items(), before.as_slice());
        assert_eq!(queue.index(), 1);
    }

    #[test]
    fn remove_before_current_shifts_index() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue.replace(items(3));
        queue.set_index(2).unwrap();

        let removed = queue.remove(0).unwrap();
        assert_eq!(removed.locator(), "/music/0.mp3");
        assert_eq!(queue.index(), 1);
        assert_eq!(queue.current().unwrap().locator(), "/music/2.mp3");
        assert_eq!(queue.master().len(), 2);
    }

    #[test]
    fn shuffled_remove_drops_same_entry_from_master() {
        let mut queue = PlayQueue::new(ShuffleMode::Songs);
        queue.replace(items(10));

        let target = queue.get(5).cloned().unwrap();
        queue.remove(5).unwrap();

        assert!(!queue.master().iter().any(|e| e.same_entry(&target)));
        assert_eq!(locators(queue.items()), locators(queue.master()));
    }

    #[test]
    fn append_under_shuffle_keeps_existing_prefix() {
        let mut queue = PlayQueue::new(ShuffleMode::Songs);
        queue.replace(items(5));
        let prefix = queue.items().to_vec();

        let more: Vec<MediaItem> = (5..10)
            .map(|i| MediaItem::new(format!("/music/{i}.mp3"), ItemMetadata::default()))
            .collect();
        queue.append(more);

        assert_eq!(&queue.items()[..5], prefix.as_slice());
        assert_eq!(locators(queue.items()), locators(queue.master()));
        assert_eq!(queue.len(), 10);
    }

    #[test]
    fn toggling_shuffle_pins_current() {
        let mut queue = PlayQueue::new(ShuffleMode::Off);
        queue.replace(items(12));
        queue.set_index(4).unwrap();
        let current = queue.current().cloned().unwrap();

        assert!(queue.set_shuffle(ShuffleMode::Songs));
        assert_eq!(queue.index(), 4);
        assert!(queue.current().unwrap().same_entry(&current));

        // Move somewhere else in the shuffled order, then turn shuffle off
        queue.set_index(9).unwrap();
        let current = queue.current().cloned().unwrap();
        assert!(queue.set_shuffle(ShuffleMode::Off));
        assert!(queue.current().unwrap().same_entry(&current));
        assert_eq!(queue.items(), queue.master());

        assert!(!queue.set_shuffle(ShuffleMode::Off));
    }
}
