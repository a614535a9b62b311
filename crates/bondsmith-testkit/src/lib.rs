//! Bondsmith Testing Infrastructure
//!
//! Test doubles for the collaborator traits in `bondsmith-core` and factories
//! for grant events, so protocol tests run without a network transport.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! bondsmith-testkit = { path = "../bondsmith-testkit" }
//! ```
//!
//! ```rust,ignore
//! use bondsmith_testkit::*;
//!
//! let connection = RecordingConnection::shared("kaladin");
//! let gateway = test_gateway(&[("kaladin", 5)]);
//! gateway.on_connect(&character("kaladin"), connection.clone(), 5);
//! ```

pub mod connection;
pub mod fixtures;
pub mod time;

pub use connection::{ClosedConnection, RecordingConnection};
pub use fixtures::*;
pub use time::FixedClock;

pub use bondsmith_sync::InMemoryCharacterRecords;

use bondsmith_core::GatewayConfig;
use bondsmith_sync::DeliveryGateway;
use std::sync::Arc;

/// Gateway over in-memory records seeded with `(character, level)` pairs and a
/// fixed clock
pub fn test_gateway(levels: &[(&str, u32)]) -> DeliveryGateway {
    test_gateway_with_config(levels, GatewayConfig::default())
}

/// [`test_gateway`] with a custom configuration
pub fn test_gateway_with_config(levels: &[(&str, u32)], config: GatewayConfig) -> DeliveryGateway {
    let records = InMemoryCharacterRecords::from_levels(
        levels.iter().map(|(id, level)| (character(id), *level)),
    );
    DeliveryGateway::new(config, Arc::new(records), Arc::new(FixedClock::epoch()))
}
