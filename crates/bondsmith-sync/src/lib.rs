//! # Bondsmith Sync - Layer 2: Grant Synchronization Protocol
//!
//! Pushes facilitator grants (level-ups, bonds, expertises, items) to one
//! character's client over a reconnect-prone connection, and brings a client
//! that reconnects back to the server-confirmed view.
//!
//! Components, leaves first:
//! - [`GrantStore`]: per-character, per-kind FIFO queues of pending grants
//! - [`ConfirmationLedger`]: level watermark and acknowledged bond orders
//! - [`ResyncPlanner`]: synthesizes `RESYNC` level-ups for a reconnect gap
//! - [`SessionDirectory`]: character to zero-or-one live connection
//! - [`DeliveryGateway`]: connect/issue/ack/disconnect entry points
//!
//! Every character's state lives in its own locked [`CharacterPartition`].
//! Delivery is at-least-once; clients apply deliveries idempotently. Nothing is
//! persisted, so a process restart loses in-flight grants.

#![forbid(unsafe_code)]

pub mod directory;
pub mod gateway;
pub mod ledger;
pub mod partition;
pub mod records;
pub mod resync;
pub mod store;

pub use directory::{Session, SessionDirectory};
pub use gateway::{AckOutcome, CharacterSnapshot, ConnectOutcome, DeliveryGateway, GatewayStats};
pub use ledger::{ConfirmationLedger, LedgerEntry};
pub use partition::{CharacterPartition, CharacterPartitions};
pub use records::InMemoryCharacterRecords;
pub use resync::ResyncPlanner;
pub use store::{GrantStore, PendingSnapshot};
