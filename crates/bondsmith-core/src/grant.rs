//! Grant events
//!
//! A grant is a one-directional state change pushed from the server to one
//! character's client. Every grant kind is an explicit variant of
//! [`GrantPayload`]; code that delivers, acknowledges or replays grants matches
//! on it exhaustively.

use crate::identifiers::CharacterId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Wire form of [`Issuer::Resync`].
pub const RESYNC_ISSUER: &str = "RESYNC";

// =============================================================================
// Issuer
// =============================================================================

/// Who issued a grant.
///
/// Synthesized catch-up grants carry [`Issuer::Resync`]. Clients apply them
/// exactly like facilitator grants; the distinction only matters for audit
/// display.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Issuer {
    /// Issued by a named facilitator
    Facilitator(String),
    /// Synthesized by the resync planner on reconnect
    Resync,
}

impl Issuer {
    /// Create a facilitator issuer
    pub fn facilitator(name: impl Into<String>) -> Self {
        Self::Facilitator(name.into())
    }

    /// Whether this grant was synthesized on reconnect
    pub fn is_resync(&self) -> bool {
        matches!(self, Self::Resync)
    }

    /// Audit label as sent on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Self::Facilitator(name) => name,
            Self::Resync => RESYNC_ISSUER,
        }
    }
}

impl fmt::Display for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Issuer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Issuer {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == RESYNC_ISSUER {
            Ok(Self::Resync)
        } else {
            Ok(Self::Facilitator(raw))
        }
    }
}

// =============================================================================
// Grant Kind
// =============================================================================

/// Discriminant of a grant, the second half of every pending-queue key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantKind {
    /// Level advancement
    LevelUp,
    /// Supernatural bond to an order
    Bond,
    /// New expertise
    Expertise,
    /// Inventory item
    Item,
}

impl GrantKind {
    /// Every kind, in the order pending queues are replayed on connect.
    pub const ALL: [GrantKind; 4] = [
        GrantKind::LevelUp,
        GrantKind::Bond,
        GrantKind::Expertise,
        GrantKind::Item,
    ];

    /// Dense index for per-kind arrays
    pub const fn index(self) -> usize {
        match self {
            GrantKind::LevelUp => 0,
            GrantKind::Bond => 1,
            GrantKind::Expertise => 2,
            GrantKind::Item => 3,
        }
    }

    /// Stable snake_case name
    pub fn as_str(self) -> &'static str {
        match self {
            GrantKind::LevelUp => "level_up",
            GrantKind::Bond => "bond",
            GrantKind::Expertise => "expertise",
            GrantKind::Item => "item",
        }
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Grant Payload and Event
// =============================================================================

/// Kind-specific content of a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantPayload {
    /// Advance the character to `new_level`
    LevelUp {
        /// Level the character reaches by applying this grant
        new_level: u32,
        /// Issuer for audit display
        issued_by: Issuer,
    },
    /// Bond the character to a narrative order
    Bond {
        /// Order name; bonds are idempotent per order
        order_name: String,
        /// Creature the bond is formed with
        bond_creature_type: String,
        /// The two surges the bond unlocks
        surge_pair: (String, String),
        /// Philosophy text shown to the player
        philosophy: String,
        /// Issuer for audit display
        issued_by: Issuer,
    },
    /// Grant an expertise
    Expertise {
        /// Expertise name from the catalog
        expertise_name: String,
        /// Issuer for audit display
        issued_by: Issuer,
    },
    /// Grant a quantity of an item
    Item {
        /// Catalog item identifier
        item_id: String,
        /// Number of items granted
        quantity: u32,
        /// Issuer for audit display
        issued_by: Issuer,
    },
}

impl GrantPayload {
    /// Kind of this payload
    pub fn kind(&self) -> GrantKind {
        match self {
            GrantPayload::LevelUp { .. } => GrantKind::LevelUp,
            GrantPayload::Bond { .. } => GrantKind::Bond,
            GrantPayload::Expertise { .. } => GrantKind::Expertise,
            GrantPayload::Item { .. } => GrantKind::Item,
        }
    }

    /// Issuer recorded on the payload
    pub fn issued_by(&self) -> &Issuer {
        match self {
            GrantPayload::LevelUp { issued_by, .. }
            | GrantPayload::Bond { issued_by, .. }
            | GrantPayload::Expertise { issued_by, .. }
            | GrantPayload::Item { issued_by, .. } => issued_by,
        }
    }
}

/// A grant addressed to one character, stamped with its issuance time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantEvent {
    /// Character the grant targets
    pub character_id: CharacterId,
    /// When the grant was issued
    pub issued_at: DateTime<Utc>,
    /// Kind-specific content
    pub payload: GrantPayload,
}

impl GrantEvent {
    /// Create a grant event
    pub fn new(character_id: CharacterId, issued_at: DateTime<Utc>, payload: GrantPayload) -> Self {
        Self {
            character_id,
            issued_at,
            payload,
        }
    }

    /// Synthesized level-up closing a resync gap
    pub fn catch_up(character_id: CharacterId, new_level: u32, issued_at: DateTime<Utc>) -> Self {
        Self::new(
            character_id,
            issued_at,
            GrantPayload::LevelUp {
                new_level,
                issued_by: Issuer::Resync,
            },
        )
    }

    /// Kind of this grant
    pub fn kind(&self) -> GrantKind {
        self.payload.kind()
    }

    /// Issuer of this grant
    pub fn issued_by(&self) -> &Issuer {
        self.payload.issued_by()
    }

    /// Target level if this is a level-up
    pub fn level(&self) -> Option<u32> {
        match &self.payload {
            GrantPayload::LevelUp { new_level, .. } => Some(*new_level),
            _ => None,
        }
    }
}

// =============================================================================
// Grant Requests
// =============================================================================

/// A facilitator's request to grant something, before the server stamps it.
///
/// Level-up requests carry no level: the server computes the next level from
/// its own view of the character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantRequest {
    /// Advance the character by one level
    LevelUp,
    /// Bond the character to an order
    Bond {
        /// Order name
        order_name: String,
        /// Creature the bond is formed with
        bond_creature_type: String,
        /// The two surges the bond unlocks
        surge_pair: (String, String),
        /// Philosophy text
        philosophy: String,
    },
    /// Grant an expertise
    Expertise {
        /// Expertise name
        expertise_name: String,
    },
    /// Grant a quantity of an item
    Item {
        /// Catalog item identifier
        item_id: String,
        /// Number of items
        quantity: u32,
    },
}

impl GrantRequest {
    /// Turn the request into a payload. `next_level` is only evaluated for level-ups.
    pub fn into_payload(self, issued_by: Issuer, next_level: impl FnOnce() -> u32) -> GrantPayload {
        match self {
            GrantRequest::LevelUp => GrantPayload::LevelUp {
                new_level: next_level(),
                issued_by,
            },
            GrantRequest::Bond {
                order_name,
                bond_creature_type,
                surge_pair,
                philosophy,
            } => GrantPayload::Bond {
                order_name,
                bond_creature_type,
                surge_pair,
                philosophy,
                issued_by,
            },
            GrantRequest::Expertise { expertise_name } => GrantPayload::Expertise {
                expertise_name,
                issued_by,
            },
            GrantRequest::Item { item_id, quantity } => GrantPayload::Item {
                item_id,
                quantity,
                issued_by,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resync_issuer_uses_sentinel_on_the_wire() {
        let json = serde_json::to_string(&Issuer::Resync).unwrap();
        assert_eq!(json, "\"RESYNC\"");

        let back: Issuer = serde_json::from_str("\"RESYNC\"").unwrap();
        assert!(back.is_resync());

        let gm: Issuer = serde_json::from_str("\"Dalinar\"").unwrap();
        assert_eq!(gm, Issuer::facilitator("Dalinar"));
    }

    #[test]
    fn kind_indices_are_dense() {
        for (position, kind) in GrantKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), position);
        }
    }

    #[test]
    fn level_up_request_evaluates_next_level() {
        let payload = GrantRequest::LevelUp.into_payload(Issuer::facilitator("GM"), || 6);
        assert_eq!(
            payload,
            GrantPayload::LevelUp {
                new_level: 6,
                issued_by: Issuer::facilitator("GM"),
            }
        );
    }

    #[test]
    fn non_level_requests_skip_level_computation() {
        let payload = GrantRequest::Expertise {
            expertise_name: "Military Tactics".to_string(),
        }
        .into_payload(Issuer::facilitator("GM"), || {
            panic!("level computed for an expertise grant")
        });
        assert_eq!(payload.kind(), GrantKind::Expertise);
    }
}
