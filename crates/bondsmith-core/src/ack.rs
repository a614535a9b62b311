//! Acknowledgment matching.
//!
//! Acknowledgments can arrive out of causal order relative to newly issued
//! grants, so a dequeue never pops blindly: the queue head must equal the
//! acknowledged content field by field.

use crate::grant::{GrantEvent, GrantKind, GrantPayload};

/// Exact-field matcher derived from a client acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckMatcher {
    /// Level-up ack carrying the applied level
    Level(u32),
    /// Bond ack carrying the order name
    Bond(String),
    /// Expertise ack carrying the expertise name
    Expertise(String),
    /// Item ack carrying the item id and quantity
    Item {
        /// Catalog item identifier
        item_id: String,
        /// Number of items
        quantity: u32,
    },
}

impl AckMatcher {
    /// Queue this ack targets
    pub fn kind(&self) -> GrantKind {
        match self {
            AckMatcher::Level(_) => GrantKind::LevelUp,
            AckMatcher::Bond(_) => GrantKind::Bond,
            AckMatcher::Expertise(_) => GrantKind::Expertise,
            AckMatcher::Item { .. } => GrantKind::Item,
        }
    }

    /// Whether `event` is the grant this ack confirms
    pub fn matches(&self, event: &GrantEvent) -> bool {
        match (self, &event.payload) {
            (AckMatcher::Level(level), GrantPayload::LevelUp { new_level, .. }) => {
                level == new_level
            }
            (AckMatcher::Bond(order), GrantPayload::Bond { order_name, .. }) => {
                order == order_name
            }
            (AckMatcher::Expertise(name), GrantPayload::Expertise { expertise_name, .. }) => {
                name == expertise_name
            }
            (
                AckMatcher::Item { item_id, quantity },
                GrantPayload::Item {
                    item_id: granted_id,
                    quantity: granted_quantity,
                    ..
                },
            ) => item_id == granted_id && quantity == granted_quantity,
            _ => false,
        }
    }
}
