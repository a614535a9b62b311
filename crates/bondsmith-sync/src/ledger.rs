//! Confirmation ledger
//!
//! Server-confirmed state per character: the level watermark and the set of
//! acknowledged bond orders. Only the acknowledgment path writes here.

use bondsmith_core::CharacterId;
use std::collections::{BTreeSet, HashMap};

/// Confirmed state for one character.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerEntry {
    confirmed_level: Option<u32>,
    confirmed_bond_orders: BTreeSet<String>,
}

impl LedgerEntry {
    /// Highest acknowledged level, if any level was ever acknowledged
    pub fn confirmed_level(&self) -> Option<u32> {
        self.confirmed_level
    }

    /// Acknowledged bond orders
    pub fn confirmed_bond_orders(&self) -> &BTreeSet<String> {
        &self.confirmed_bond_orders
    }
}

/// Watermarks and bond sets for every character.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationLedger {
    entries: HashMap<CharacterId, LedgerEntry>,
}

impl ConfirmationLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the watermark to `level`. Never lowers it.
    ///
    /// Returns true if the watermark moved.
    pub fn record_level_ack(&mut self, character_id: &CharacterId, level: u32) -> bool {
        let entry = self.entries.entry(character_id.clone()).or_default();
        match entry.confirmed_level {
            Some(current) if current >= level => false,
            _ => {
                entry.confirmed_level = Some(level);
                true
            }
        }
    }

    /// Record an acknowledged bond. Returns true the first time an order is seen.
    pub fn record_bond_ack(&mut self, character_id: &CharacterId, order_name: &str) -> bool {
        self.entries
            .entry(character_id.clone())
            .or_default()
            .confirmed_bond_orders
            .insert(order_name.to_string())
    }

    /// Current watermark; `None` until the first level acknowledgment
    pub fn confirmed_level(&self, character_id: &CharacterId) -> Option<u32> {
        self.entries.get(character_id)?.confirmed_level
    }

    /// Whether the bond to `order_name` has been acknowledged
    pub fn has_bond(&self, character_id: &CharacterId, order_name: &str) -> bool {
        self.entries
            .get(character_id)
            .is_some_and(|entry| entry.confirmed_bond_orders.contains(order_name))
    }

    /// Full entry for the character
    pub fn entry(&self, character_id: &CharacterId) -> Option<&LedgerEntry> {
        self.entries.get(character_id)
    }

    /// Drop a deleted character's entry
    pub fn forget(&mut self, character_id: &CharacterId) -> bool {
        self.entries.remove(character_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_level_ack_keeps_watermark() {
        let mut ledger = ConfirmationLedger::new();
        let id = CharacterId::new("dalinar");

        assert!(ledger.record_level_ack(&id, 8));
        assert!(!ledger.record_level_ack(&id, 6));
        assert!(!ledger.record_level_ack(&id, 8));

        assert_eq!(ledger.confirmed_level(&id), Some(8));
    }

    #[test]
    fn watermark_is_absent_until_first_level_ack() {
        let mut ledger = ConfirmationLedger::new();
        let id = CharacterId::new("dalinar");

        ledger.record_bond_ack(&id, "Bondsmiths");
        assert_eq!(ledger.confirmed_level(&id), None);
        assert!(ledger.has_bond(&id, "Bondsmiths"));
    }

    #[test]
    fn bond_ack_is_idempotent() {
        let mut ledger = ConfirmationLedger::new();
        let id = CharacterId::new("dalinar");

        assert!(ledger.record_bond_ack(&id, "Bondsmiths"));
        assert!(!ledger.record_bond_ack(&id, "Bondsmiths"));
        assert_eq!(
            ledger.entry(&id).map(|e| e.confirmed_bond_orders().len()),
            Some(1)
        );
    }

    #[test]
    fn entries_are_per_character() {
        let mut ledger = ConfirmationLedger::new();
        let a = CharacterId::new("dalinar");
        let b = CharacterId::new("navani");

        ledger.record_level_ack(&a, 9);
        ledger.record_bond_ack(&a, "Bondsmiths");

        assert_eq!(ledger.confirmed_level(&b), None);
        assert!(!ledger.has_bond(&b, "Bondsmiths"));
    }
}
