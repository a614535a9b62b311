//! Per-character partitions
//!
//! Every character owns one locked cell holding its queues, ledger entry,
//! session binding and last reported checkpoint. All operations for a
//! character run under that cell's lock, so they are linearized; different
//! characters never share a cell lock. The outer map lock is only held long
//! enough to find, insert or remove a cell.

use crate::directory::SessionDirectory;
use crate::ledger::ConfirmationLedger;
use crate::store::GrantStore;
use bondsmith_core::CharacterId;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// State owned by one character.
///
/// The store, ledger and directory inside a partition only ever hold entries
/// for the partition's own character.
#[derive(Debug, Default)]
pub struct CharacterPartition {
    /// Pending grant queues
    pub store: GrantStore,
    /// Confirmed watermark and bond orders
    pub ledger: ConfirmationLedger,
    /// Live session binding
    pub sessions: SessionDirectory,
    /// Level the client reported on its most recent join
    pub last_reported_level: Option<u32>,
    retired: bool,
}

type Cell = Arc<Mutex<CharacterPartition>>;

/// Map of character to locked partition.
#[derive(Debug, Default)]
pub struct CharacterPartitions {
    cells: RwLock<HashMap<CharacterId, Cell>>,
}

impl CharacterPartitions {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, character_id: &CharacterId) -> Cell {
        if let Some(cell) = self.cells.read().get(character_id) {
            return Arc::clone(cell);
        }
        Arc::clone(self.cells.write().entry(character_id.clone()).or_default())
    }

    /// Run `f` against the character's partition, creating it if needed.
    ///
    /// A caller that was waiting on a cell that got removed in the meantime
    /// retries against the character's current cell.
    pub fn with<R>(
        &self,
        character_id: &CharacterId,
        f: impl FnOnce(&mut CharacterPartition) -> R,
    ) -> R {
        loop {
            let cell = self.cell(character_id);
            let mut partition = cell.lock();
            if partition.retired {
                drop(partition);
                self.unlink(character_id, &cell);
                continue;
            }
            return f(&mut partition);
        }
    }

    fn unlink(&self, character_id: &CharacterId, cell: &Cell) {
        let mut cells = self.cells.write();
        if cells
            .get(character_id)
            .is_some_and(|current| Arc::ptr_eq(current, cell))
        {
            cells.remove(character_id);
        }
    }

    /// Run `f` against the character's partition only if it already exists
    pub fn with_existing<R>(
        &self,
        character_id: &CharacterId,
        f: impl FnOnce(&mut CharacterPartition) -> R,
    ) -> Option<R> {
        let cell = self.cells.read().get(character_id).map(Arc::clone)?;
        let mut partition = cell.lock();
        if partition.retired {
            return None;
        }
        Some(f(&mut partition))
    }

    /// Drop the character's partition, running `retire` on it under its lock.
    ///
    /// An operation that held the cell before the removal is ordered before
    /// it. One still waiting on the cell sees it retired and moves to a fresh
    /// partition, so its effects are not lost.
    pub fn remove(
        &self,
        character_id: &CharacterId,
        retire: impl FnOnce(&mut CharacterPartition),
    ) -> bool {
        let Some(cell) = self.cells.write().remove(character_id) else {
            return false;
        };
        let mut partition = cell.lock();
        retire(&mut partition);
        partition.retired = true;
        true
    }

    /// Characters with a partition
    pub fn character_ids(&self) -> Vec<CharacterId> {
        let mut ids: Vec<_> = self.cells.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of partitions
    pub fn len(&self) -> usize {
        self.cells.read().len()
    }

    /// True when no character has state
    pub fn is_empty(&self) -> bool {
        self.cells.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn with_creates_partition_on_first_use() {
        let partitions = CharacterPartitions::new();
        let id = CharacterId::new("renarin");

        assert!(partitions.with_existing(&id, |_| ()).is_none());
        partitions.with(&id, |p| p.last_reported_level = Some(2));

        assert_eq!(partitions.with_existing(&id, |p| p.last_reported_level), Some(Some(2)));
        assert_eq!(partitions.character_ids(), vec![id]);
    }

    #[test]
    fn remove_discards_state() {
        let partitions = CharacterPartitions::new();
        let id = CharacterId::new("renarin");
        partitions.with(&id, |p| p.ledger.record_level_ack(&id, 3));

        assert!(partitions.remove(&id, |_| {}));
        assert!(!partitions.remove(&id, |_| {}));
        assert_eq!(partitions.with(&id, |p| p.ledger.confirmed_level(&id)), None);
    }

    #[test]
    fn holder_of_a_removed_cell_moves_to_a_fresh_partition() {
        let partitions = CharacterPartitions::new();
        let id = CharacterId::new("renarin");
        let stale = partitions.cell(&id);

        partitions.remove(&id, |p| p.last_reported_level = Some(1));

        assert!(stale.lock().retired);
        assert_eq!(stale.lock().last_reported_level, Some(1));
        partitions.with(&id, |p| p.last_reported_level = Some(4));
        assert!(!Arc::ptr_eq(&stale, &partitions.cell(&id)));
        assert_eq!(partitions.with_existing(&id, |p| p.last_reported_level), Some(Some(4)));
    }

    #[test]
    fn retired_cell_left_in_the_map_is_replaced() {
        let partitions = CharacterPartitions::new();
        let id = CharacterId::new("renarin");
        let retired = Arc::new(Mutex::new(CharacterPartition {
            retired: true,
            ..CharacterPartition::default()
        }));
        partitions.cells.write().insert(id.clone(), Arc::clone(&retired));

        assert!(partitions.with_existing(&id, |_| ()).is_none());
        partitions.with(&id, |p| p.last_reported_level = Some(2));

        assert!(!Arc::ptr_eq(&retired, &partitions.cell(&id)));
        assert_eq!(partitions.with(&id, |p| p.last_reported_level), Some(2));
    }

    #[test]
    fn concurrent_writes_and_removals_settle_on_one_partition() {
        let partitions = Arc::new(CharacterPartitions::new());
        let id = CharacterId::new("renarin");

        let writers: Vec<_> = (0..4)
            .map(|_| {
                let partitions = Arc::clone(&partitions);
                let id = id.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        partitions.with(&id, |p| {
                            let next = p.last_reported_level.unwrap_or(0) + 1;
                            p.last_reported_level = Some(next);
                        });
                    }
                })
            })
            .collect();
        for _ in 0..50 {
            partitions.remove(&id, |_| {});
        }
        for writer in writers {
            writer.join().unwrap();
        }

        partitions.with(&id, |p| p.last_reported_level = Some(100));
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions.with(&id, |p| p.last_reported_level), Some(100));
    }

    #[test]
    fn concurrent_updates_to_one_character_are_linearized() {
        let partitions = Arc::new(CharacterPartitions::new());
        let id = CharacterId::new("renarin");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let partitions = Arc::clone(&partitions);
                let id = id.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        partitions.with(&id, |p| {
                            let next = p.last_reported_level.unwrap_or(0) + 1;
                            p.last_reported_level = Some(next);
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(partitions.with(&id, |p| p.last_reported_level), Some(800));
    }
}
