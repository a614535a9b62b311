//! In-memory character records.
//!
//! Stand-in for the external record store. The grant protocol only ever reads
//! persisted levels from it.

use bondsmith_core::{CharacterId, CharacterRecords};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Persisted levels held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCharacterRecords {
    levels: RwLock<HashMap<CharacterId, u32>>,
}

impl InMemoryCharacterRecords {
    /// Create an empty record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from `(character, level)` pairs
    pub fn from_levels(levels: impl IntoIterator<Item = (CharacterId, u32)>) -> Self {
        Self {
            levels: RwLock::new(levels.into_iter().collect()),
        }
    }

    /// Save a character's level
    pub fn save_level(&self, character_id: CharacterId, level: u32) {
        self.levels.write().insert(character_id, level);
    }

    /// Delete a character record
    pub fn delete(&self, character_id: &CharacterId) -> bool {
        self.levels.write().remove(character_id).is_some()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.levels.read().len()
    }

    /// True when no records are stored
    pub fn is_empty(&self) -> bool {
        self.levels.read().is_empty()
    }
}

impl CharacterRecords for InMemoryCharacterRecords {
    fn persisted_level(&self, character_id: &CharacterId) -> Option<u32> {
        self.levels.read().get(character_id).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saved_levels_are_readable() {
        let records = InMemoryCharacterRecords::from_levels([(CharacterId::new("lift"), 3)]);
        records.save_level(CharacterId::new("wyndle"), 1);

        assert_eq!(records.persisted_level(&CharacterId::new("lift")), Some(3));
        assert_eq!(records.persisted_level(&CharacterId::new("wyndle")), Some(1));
        assert_eq!(records.len(), 2);

        assert!(records.delete(&CharacterId::new("lift")));
        assert_eq!(records.persisted_level(&CharacterId::new("lift")), None);
    }
}
