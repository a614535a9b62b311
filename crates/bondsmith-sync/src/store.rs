//! Pending grant queues
//!
//! One FIFO queue per (character, grant kind). Queues only shrink through a
//! head-matched acknowledgment; there is no expiry and no cancellation.
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut store = GrantStore::new();
//! store.enqueue(&character_id, event);
//!
//! // Dequeues only if the head is the acknowledged grant
//! store.acknowledge(&character_id, GrantKind::LevelUp, &AckMatcher::Level(6));
//! ```

use bondsmith_core::{AckMatcher, CharacterId, GrantEvent, GrantKind};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
struct CharacterQueues {
    queues: [VecDeque<GrantEvent>; 4],
}

impl CharacterQueues {
    fn queue(&self, kind: GrantKind) -> &VecDeque<GrantEvent> {
        &self.queues[kind.index()]
    }

    fn queue_mut(&mut self, kind: GrantKind) -> &mut VecDeque<GrantEvent> {
        &mut self.queues[kind.index()]
    }
}

/// Owned copy of every pending queue for one character.
///
/// Changing the snapshot never touches the store it was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingSnapshot {
    queues: [Vec<GrantEvent>; 4],
}

impl PendingSnapshot {
    /// Pending grants of one kind, head first
    pub fn of_kind(&self, kind: GrantKind) -> &[GrantEvent] {
        &self.queues[kind.index()]
    }

    /// Mutable access to one kind's copy
    pub fn of_kind_mut(&mut self, kind: GrantKind) -> &mut Vec<GrantEvent> {
        &mut self.queues[kind.index()]
    }

    /// Every pending grant, kinds in [`GrantKind::ALL`] order, queue order within a kind
    pub fn iter(&self) -> impl Iterator<Item = &GrantEvent> {
        self.queues.iter().flatten()
    }

    /// Total pending grants across kinds
    pub fn len(&self) -> usize {
        self.queues.iter().map(Vec::len).sum()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(Vec::is_empty)
    }
}

/// Pending grants for every known character.
#[derive(Debug, Clone, Default)]
pub struct GrantStore {
    characters: HashMap<CharacterId, CharacterQueues>,
}

impl GrantStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `event` to the tail of its kind's queue.
    ///
    /// Always succeeds and always grows the queue by one, including for
    /// grants identical to ones already pending.
    pub fn enqueue(&mut self, character_id: &CharacterId, event: GrantEvent) {
        let kind = event.kind();
        self.characters
            .entry(character_id.clone())
            .or_default()
            .queue_mut(kind)
            .push_back(event);
    }

    /// Remove the head of `(character_id, kind)` iff it satisfies `matcher`.
    ///
    /// A mismatched head or an empty queue is a no-op, never an error.
    /// Returns the removed grant.
    pub fn acknowledge(
        &mut self,
        character_id: &CharacterId,
        kind: GrantKind,
        matcher: &AckMatcher,
    ) -> Option<GrantEvent> {
        let queue = self.characters.get_mut(character_id)?.queue_mut(kind);
        if queue.front().is_some_and(|head| matcher.matches(head)) {
            queue.pop_front()
        } else {
            None
        }
    }

    /// Copy of every pending queue for the character
    pub fn peek_all(&self, character_id: &CharacterId) -> PendingSnapshot {
        let mut snapshot = PendingSnapshot::default();
        if let Some(queues) = self.characters.get(character_id) {
            for kind in GrantKind::ALL {
                snapshot
                    .of_kind_mut(kind)
                    .extend(queues.queue(kind).iter().cloned());
            }
        }
        snapshot
    }

    /// True when nothing of `kind` is pending for the character
    pub fn is_empty(&self, character_id: &CharacterId, kind: GrantKind) -> bool {
        self.pending_len(character_id, kind) == 0
    }

    /// Number of pending grants of `kind`
    pub fn pending_len(&self, character_id: &CharacterId, kind: GrantKind) -> usize {
        self.characters
            .get(character_id)
            .map_or(0, |queues| queues.queue(kind).len())
    }

    /// Highest level among pending level-ups
    pub fn highest_pending_level(&self, character_id: &CharacterId) -> Option<u32> {
        self.characters
            .get(character_id)?
            .queue(GrantKind::LevelUp)
            .iter()
            .filter_map(GrantEvent::level)
            .max()
    }

    /// Whether a level-up to `level` is already pending
    pub fn has_pending_level(&self, character_id: &CharacterId, level: u32) -> bool {
        self.characters.get(character_id).is_some_and(|queues| {
            queues
                .queue(GrantKind::LevelUp)
                .iter()
                .any(|event| event.level() == Some(level))
        })
    }

    /// Drop every queue of a deleted character. Returns whether anything was held.
    pub fn forget(&mut self, character_id: &CharacterId) -> bool {
        self.characters.remove(character_id).is_some()
    }
}
