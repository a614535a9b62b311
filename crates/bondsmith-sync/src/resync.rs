//! Resync planning
//!
//! On reconnect the client reports the level it believes it is at. Replaying
//! the pending queue is not enough to close every gap: the queue may have been
//! fully drained before the disconnect while the server advanced the character
//! through another path. The confirmation watermark, not the queue, says what
//! the client should already know, so the planner synthesizes one `RESYNC`
//! level-up per missing level.

use crate::ledger::ConfirmationLedger;
use crate::store::GrantStore;
use bondsmith_core::{CharacterId, CharacterRecords, Clock, GrantEvent};
use std::sync::Arc;
use tracing::debug;

/// Synthesizes catch-up level-ups on reconnect.
#[derive(Clone)]
pub struct ResyncPlanner {
    records: Arc<dyn CharacterRecords>,
    clock: Arc<dyn Clock>,
}

impl ResyncPlanner {
    /// Create a planner reading persisted levels from `records`
    pub fn new(records: Arc<dyn CharacterRecords>, clock: Arc<dyn Clock>) -> Self {
        Self { records, clock }
    }

    /// Level the server considers confirmed for the character.
    ///
    /// The ledger watermark when one exists. A character that never acked a
    /// level falls back to its persisted record, and a character the record
    /// store does not know falls back to `client_reported_level`, so a first
    /// connection never synthesizes levels 1 through current.
    pub fn server_level(
        &self,
        character_id: &CharacterId,
        ledger: &ConfirmationLedger,
        client_reported_level: u32,
    ) -> u32 {
        ledger
            .confirmed_level(character_id)
            .or_else(|| self.records.persisted_level(character_id))
            .unwrap_or(client_reported_level)
    }

    /// Enqueue a `RESYNC` level-up for every level in
    /// `client_reported_level + 1 ..= server_level`, ascending.
    ///
    /// Levels already pending are skipped so repeated reconnects do not grow
    /// the queue. Returns the synthesized grants.
    pub fn plan_catch_up(
        &self,
        character_id: &CharacterId,
        client_reported_level: u32,
        ledger: &ConfirmationLedger,
        store: &mut GrantStore,
    ) -> Vec<GrantEvent> {
        let server_level = self.server_level(character_id, ledger, client_reported_level);
        if server_level <= client_reported_level {
            return Vec::new();
        }

        let issued_at = self.clock.now();
        let mut synthesized = Vec::new();
        for level in client_reported_level + 1..=server_level {
            if store.has_pending_level(character_id, level) {
                continue;
            }
            let event = GrantEvent::catch_up(character_id.clone(), level, issued_at);
            store.enqueue(character_id, event.clone());
            synthesized.push(event);
        }

        debug!(
            character_id = %character_id,
            client_level = client_reported_level,
            server_level,
            synthesized = synthesized.len(),
            "Planned catch-up level-ups"
        );
        synthesized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::InMemoryCharacterRecords;
    use bondsmith_core::{GrantKind, Issuer, SystemClock};

    fn planner(levels: &[(&str, u32)]) -> ResyncPlanner {
        let records = InMemoryCharacterRecords::from_levels(
            levels
                .iter()
                .map(|(id, level)| (CharacterId::new(*id), *level)),
        );
        ResyncPlanner::new(Arc::new(records), Arc::new(SystemClock))
    }

    fn pending_levels(store: &GrantStore, id: &CharacterId) -> Vec<u32> {
        store
            .peek_all(id)
            .of_kind(GrantKind::LevelUp)
            .iter()
            .filter_map(GrantEvent::level)
            .collect()
    }

    #[test]
    fn gap_produces_one_resync_level_up_per_missing_level() {
        let planner = planner(&[]);
        let mut ledger = ConfirmationLedger::new();
        let mut store = GrantStore::new();
        let id = CharacterId::new("szeth");
        ledger.record_level_ack(&id, 8);

        let synthesized = planner.plan_catch_up(&id, 5, &ledger, &mut store);

        assert_eq!(synthesized.len(), 3);
        assert!(synthesized.iter().all(|e| e.issued_by() == &Issuer::Resync));
        assert_eq!(pending_levels(&store, &id), vec![6, 7, 8]);
    }

    #[test]
    fn client_at_or_above_watermark_gets_nothing() {
        let planner = planner(&[]);
        let mut ledger = ConfirmationLedger::new();
        let mut store = GrantStore::new();
        let id = CharacterId::new("szeth");
        ledger.record_level_ack(&id, 5);

        assert!(planner.plan_catch_up(&id, 5, &ledger, &mut store).is_empty());
        assert!(planner.plan_catch_up(&id, 9, &ledger, &mut store).is_empty());
        assert!(store.is_empty(&id, GrantKind::LevelUp));
    }

    #[test]
    fn first_connection_uses_persisted_level() {
        let planner = planner(&[("szeth", 7)]);
        let ledger = ConfirmationLedger::new();
        let mut store = GrantStore::new();
        let id = CharacterId::new("szeth");

        assert!(planner.plan_catch_up(&id, 7, &ledger, &mut store).is_empty());

        let behind = planner.plan_catch_up(&id, 6, &ledger, &mut store);
        assert_eq!(behind.iter().filter_map(GrantEvent::level).collect::<Vec<_>>(), vec![7]);
    }

    #[test]
    fn unknown_character_trusts_client_report() {
        let planner = planner(&[]);
        let ledger = ConfirmationLedger::new();
        let mut store = GrantStore::new();
        let id = CharacterId::new("nale");

        assert_eq!(planner.server_level(&id, &ledger, 4), 4);
        assert!(planner.plan_catch_up(&id, 4, &ledger, &mut store).is_empty());
    }

    #[test]
    fn repeated_reconnects_do_not_duplicate_catch_up() {
        let planner = planner(&[]);
        let mut ledger = ConfirmationLedger::new();
        let mut store = GrantStore::new();
        let id = CharacterId::new("szeth");
        ledger.record_level_ack(&id, 8);

        planner.plan_catch_up(&id, 5, &ledger, &mut store);
        let second = planner.plan_catch_up(&id, 5, &ledger, &mut store);

        assert!(second.is_empty());
        assert_eq!(pending_levels(&store, &id), vec![6, 7, 8]);
    }
}
