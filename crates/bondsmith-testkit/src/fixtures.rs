//! Grant event factories.
//!
//! Every factory stamps events at the [`FixedClock::epoch`](crate::FixedClock::epoch)
//! instant and attributes facilitator grants to `"GM"`.

use bondsmith_core::{CharacterId, Clock, GrantEvent, GrantPayload, Issuer};

use crate::time::FixedClock;

/// Facilitator name used by the factories
pub const TEST_FACILITATOR: &str = "GM";

/// Character identifier
pub fn character(id: &str) -> CharacterId {
    CharacterId::new(id)
}

fn stamped(character_id: &CharacterId, payload: GrantPayload) -> GrantEvent {
    GrantEvent::new(character_id.clone(), FixedClock::epoch().now(), payload)
}

/// Facilitator level-up to `new_level`
pub fn level_up(character_id: &CharacterId, new_level: u32) -> GrantEvent {
    stamped(
        character_id,
        GrantPayload::LevelUp {
            new_level,
            issued_by: Issuer::facilitator(TEST_FACILITATOR),
        },
    )
}

/// Facilitator bond to `order_name` with placeholder details
pub fn bond(character_id: &CharacterId, order_name: &str) -> GrantEvent {
    stamped(
        character_id,
        GrantPayload::Bond {
            order_name: order_name.to_string(),
            bond_creature_type: "honorspren".to_string(),
            surge_pair: ("Adhesion".to_string(), "Gravitation".to_string()),
            philosophy: "Life before death".to_string(),
            issued_by: Issuer::facilitator(TEST_FACILITATOR),
        },
    )
}

/// Facilitator expertise grant
pub fn expertise(character_id: &CharacterId, expertise_name: &str) -> GrantEvent {
    stamped(
        character_id,
        GrantPayload::Expertise {
            expertise_name: expertise_name.to_string(),
            issued_by: Issuer::facilitator(TEST_FACILITATOR),
        },
    )
}

/// Facilitator item grant
pub fn item(character_id: &CharacterId, item_id: &str, quantity: u32) -> GrantEvent {
    stamped(
        character_id,
        GrantPayload::Item {
            item_id: item_id.to_string(),
            quantity,
            issued_by: Issuer::facilitator(TEST_FACILITATOR),
        },
    )
}
