//! Grant protocol wire format.
//!
//! JSON text frames of the form `{"schema_version": 1, "message": {"type": ..., ...}}`.
//! Inbound frames come from facilitators (grant requests) and player clients
//! (join and acks); outbound frames carry deliveries and receipts.

use crate::ack::AckMatcher;
use crate::grant::{GrantEvent, GrantKind, GrantPayload, GrantRequest, Issuer};
use crate::identifiers::{CharacterId, SessionId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Version stamped on every frame; mismatching frames are rejected.
pub const WIRE_SCHEMA_VERSION: u16 = 1;

/// Frame decoding and encoding failures.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Not valid JSON, unknown message type, or missing fields
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Frame was produced for a different schema version
    #[error("unsupported schema version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the frame
        found: u16,
        /// Version this build speaks
        expected: u16,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFrame<M> {
    schema_version: u16,
    message: M,
}

#[derive(Deserialize)]
struct FrameHeader {
    schema_version: u16,
}

// =============================================================================
// Inbound
// =============================================================================

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Identify the connection as a facilitator
    Facilitate {
        /// Facilitator name recorded on issued grants
        facilitator: String,
    },
    /// Facilitator: grant the next level
    GrantLevelUp {
        /// Target character
        character_id: CharacterId,
    },
    /// Facilitator: grant a bond
    GrantBond {
        /// Target character
        character_id: CharacterId,
        /// Order name
        order_name: String,
        /// Creature the bond is formed with
        bond_creature_type: String,
        /// Surges unlocked by the bond
        surge_pair: (String, String),
        /// Philosophy text
        philosophy: String,
    },
    /// Facilitator: grant an expertise
    GrantExpertise {
        /// Target character
        character_id: CharacterId,
        /// Expertise name
        expertise_name: String,
    },
    /// Facilitator: grant an item
    GrantItem {
        /// Target character
        character_id: CharacterId,
        /// Catalog item identifier
        item_id: String,
        /// Number of items
        quantity: u32,
    },
    /// Player: join or reconnect as a character
    Join {
        /// Character being played
        character_id: CharacterId,
        /// Level the client currently shows
        current_level: u32,
    },
    /// Player: level-up applied
    LevelUpAck {
        /// Acknowledging character
        character_id: CharacterId,
        /// Level that was applied
        new_level: u32,
    },
    /// Player: bond applied
    BondAck {
        /// Acknowledging character
        character_id: CharacterId,
        /// Order that was applied
        order_name: String,
    },
    /// Player: expertise applied
    ExpertiseAck {
        /// Acknowledging character
        character_id: CharacterId,
        /// Expertise that was applied
        expertise_name: String,
    },
    /// Player: item applied
    ItemAck {
        /// Acknowledging character
        character_id: CharacterId,
        /// Item that was applied
        item_id: String,
        /// Quantity that was applied
        quantity: u32,
    },
}

/// Inbound message sorted by the protocol operation it drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Connection claims the facilitator role
    Facilitate(String),
    /// Facilitator grant issuance
    Grant(CharacterId, GrantRequest),
    /// Player join or reconnect with its checkpoint level
    Join(CharacterId, u32),
    /// Player acknowledgment
    Ack(CharacterId, AckMatcher),
}

impl ClientMessage {
    /// Classify into the protocol operation this message drives
    pub fn into_inbound(self) -> Inbound {
        match self {
            ClientMessage::Facilitate { facilitator } => Inbound::Facilitate(facilitator),
            ClientMessage::GrantLevelUp { character_id } => {
                Inbound::Grant(character_id, GrantRequest::LevelUp)
            }
            ClientMessage::GrantBond {
                character_id,
                order_name,
                bond_creature_type,
                surge_pair,
                philosophy,
            } => Inbound::Grant(
                character_id,
                GrantRequest::Bond {
                    order_name,
                    bond_creature_type,
                    surge_pair,
                    philosophy,
                },
            ),
            ClientMessage::GrantExpertise {
                character_id,
                expertise_name,
            } => Inbound::Grant(character_id, GrantRequest::Expertise { expertise_name }),
            ClientMessage::GrantItem {
                character_id,
                item_id,
                quantity,
            } => Inbound::Grant(character_id, GrantRequest::Item { item_id, quantity }),
            ClientMessage::Join {
                character_id,
                current_level,
            } => Inbound::Join(character_id, current_level),
            ClientMessage::LevelUpAck {
                character_id,
                new_level,
            } => Inbound::Ack(character_id, AckMatcher::Level(new_level)),
            ClientMessage::BondAck {
                character_id,
                order_name,
            } => Inbound::Ack(character_id, AckMatcher::Bond(order_name)),
            ClientMessage::ExpertiseAck {
                character_id,
                expertise_name,
            } => Inbound::Ack(character_id, AckMatcher::Expertise(expertise_name)),
            ClientMessage::ItemAck {
                character_id,
                item_id,
                quantity,
            } => Inbound::Ack(character_id, AckMatcher::Item { item_id, quantity }),
        }
    }
}

// =============================================================================
// Outbound
// =============================================================================

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Level-up delivery (may repeat)
    LevelUpDelivered {
        /// Target character
        character_id: CharacterId,
        /// Level to apply
        new_level: u32,
        /// Facilitator name or `RESYNC`
        granted_by: Issuer,
        /// Issuance time
        timestamp: DateTime<Utc>,
    },
    /// Bond delivery (may repeat)
    BondDelivered {
        /// Target character
        character_id: CharacterId,
        /// Order name
        order_name: String,
        /// Creature the bond is formed with
        bond_creature_type: String,
        /// Surges unlocked by the bond
        surge_pair: (String, String),
        /// Philosophy text
        philosophy: String,
        /// Facilitator name
        granted_by: Issuer,
        /// Issuance time
        timestamp: DateTime<Utc>,
    },
    /// Expertise delivery (may repeat)
    ExpertiseDelivered {
        /// Target character
        character_id: CharacterId,
        /// Expertise name
        expertise_name: String,
        /// Facilitator name
        granted_by: Issuer,
        /// Issuance time
        timestamp: DateTime<Utc>,
    },
    /// Item delivery (may repeat)
    ItemDelivered {
        /// Target character
        character_id: CharacterId,
        /// Catalog item identifier
        item_id: String,
        /// Number of items
        quantity: u32,
        /// Facilitator name
        granted_by: Issuer,
        /// Issuance time
        timestamp: DateTime<Utc>,
    },
    /// Join accepted; `pending` deliveries were replayed ahead of this frame
    Joined {
        /// Character bound to the connection
        character_id: CharacterId,
        /// Session created for the binding
        session_id: SessionId,
        /// Number of pending grants replayed
        pending: usize,
    },
    /// Receipt for a facilitator grant
    Issued {
        /// Target character
        character_id: CharacterId,
        /// Kind of grant issued
        kind: GrantKind,
    },
    /// Frame rejected; no state changed
    Rejected {
        /// Human-readable reason
        reason: String,
    },
}

impl From<&GrantEvent> for ServerMessage {
    fn from(event: &GrantEvent) -> Self {
        let character_id = event.character_id.clone();
        let timestamp = event.issued_at;
        match &event.payload {
            GrantPayload::LevelUp {
                new_level,
                issued_by,
            } => ServerMessage::LevelUpDelivered {
                character_id,
                new_level: *new_level,
                granted_by: issued_by.clone(),
                timestamp,
            },
            GrantPayload::Bond {
                order_name,
                bond_creature_type,
                surge_pair,
                philosophy,
                issued_by,
            } => ServerMessage::BondDelivered {
                character_id,
                order_name: order_name.clone(),
                bond_creature_type: bond_creature_type.clone(),
                surge_pair: surge_pair.clone(),
                philosophy: philosophy.clone(),
                granted_by: issued_by.clone(),
                timestamp,
            },
            GrantPayload::Expertise {
                expertise_name,
                issued_by,
            } => ServerMessage::ExpertiseDelivered {
                character_id,
                expertise_name: expertise_name.clone(),
                granted_by: issued_by.clone(),
                timestamp,
            },
            GrantPayload::Item {
                item_id,
                quantity,
                issued_by,
            } => ServerMessage::ItemDelivered {
                character_id,
                item_id: item_id.clone(),
                quantity: *quantity,
                granted_by: issued_by.clone(),
                timestamp,
            },
        }
    }
}

// =============================================================================
// Framing
// =============================================================================

fn encode<M: Serialize>(message: M) -> Result<String, WireError> {
    let frame = WireFrame {
        schema_version: WIRE_SCHEMA_VERSION,
        message,
    };
    Ok(serde_json::to_string(&frame)?)
}

fn decode<M: DeserializeOwned>(text: &str) -> Result<M, WireError> {
    let header: FrameHeader = serde_json::from_str(text)?;
    if header.schema_version != WIRE_SCHEMA_VERSION {
        return Err(WireError::UnsupportedVersion {
            found: header.schema_version,
            expected: WIRE_SCHEMA_VERSION,
        });
    }
    let frame: WireFrame<M> = serde_json::from_str(text)?;
    Ok(frame.message)
}

/// Frame an outbound message
pub fn encode_server_message(message: &ServerMessage) -> Result<String, WireError> {
    encode(message)
}

/// Parse an inbound frame
pub fn decode_client_message(text: &str) -> Result<ClientMessage, WireError> {
    decode(text)
}

/// Frame an inbound message (client side)
pub fn encode_client_message(message: &ClientMessage) -> Result<String, WireError> {
    encode(message)
}

/// Parse an outbound frame (client side)
pub fn decode_server_message(text: &str) -> Result<ServerMessage, WireError> {
    decode(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn ack_frame_decodes_to_matcher() {
        let text = r#"{"schema_version":1,"message":{"type":"item_ack","character_id":"adolin","item_id":"shardblade","quantity":1}}"#;
        let inbound = decode_client_message(text).unwrap().into_inbound();

        assert_eq!(
            inbound,
            Inbound::Ack(
                CharacterId::new("adolin"),
                AckMatcher::Item {
                    item_id: "shardblade".to_string(),
                    quantity: 1,
                }
            )
        );
    }

    #[test]
    fn ack_missing_fields_is_malformed() {
        let text = r#"{"schema_version":1,"message":{"type":"item_ack","character_id":"adolin"}}"#;
        assert_matches!(decode_client_message(text), Err(WireError::Malformed(_)));
    }

    #[test]
    fn unknown_message_type_is_malformed() {
        let text = r#"{"schema_version":1,"message":{"type":"grant_shardplate","character_id":"adolin"}}"#;
        assert_matches!(decode_client_message(text), Err(WireError::Malformed(_)));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let text = r#"{"schema_version":9,"message":{"type":"join","character_id":"adolin","current_level":3}}"#;
        assert_matches!(
            decode_client_message(text),
            Err(WireError::UnsupportedVersion {
                found: 9,
                expected: WIRE_SCHEMA_VERSION
            })
        );
    }

    #[test]
    fn join_ignores_extra_client_fields() {
        let text = r#"{"schema_version":1,"message":{"type":"join","character_id":"adolin","current_level":3,"ancestry":"alethi"}}"#;
        assert_eq!(
            decode_client_message(text).unwrap().into_inbound(),
            Inbound::Join(CharacterId::new("adolin"), 3)
        );
    }

    #[test]
    fn catch_up_delivery_is_granted_by_resync() {
        let issued_at = Utc::now();
        let event = GrantEvent::catch_up(CharacterId::new("adolin"), 4, issued_at);
        let text = encode_server_message(&ServerMessage::from(&event)).unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["schema_version"], 1);
        assert_eq!(value["message"]["type"], "level_up_delivered");
        assert_eq!(value["message"]["new_level"], 4);
        assert_eq!(value["message"]["granted_by"], "RESYNC");

        assert_eq!(
            decode_server_message(&text).unwrap(),
            ServerMessage::LevelUpDelivered {
                character_id: CharacterId::new("adolin"),
                new_level: 4,
                granted_by: Issuer::Resync,
                timestamp: issued_at,
            }
        );
    }

    #[test]
    fn bond_grant_carries_surge_pair_as_array() {
        let message = ClientMessage::GrantBond {
            character_id: CharacterId::new("kaladin"),
            order_name: "Windrunners".to_string(),
            bond_creature_type: "honorspren".to_string(),
            surge_pair: ("Adhesion".to_string(), "Gravitation".to_string()),
            philosophy: "Life before death".to_string(),
        };
        let text = encode_client_message(&message).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value["message"]["surge_pair"],
            serde_json::json!(["Adhesion", "Gravitation"])
        );
        assert_eq!(decode_client_message(&text).unwrap(), message);
    }
}
