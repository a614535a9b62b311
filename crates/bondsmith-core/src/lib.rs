//! # Bondsmith Core - Layer 1: Grant Types and Interfaces
//!
//! Foundation types shared by every Bondsmith crate:
//! - **Identifiers**: `CharacterId`, `SessionId`
//! - **Grants**: the `GrantEvent` tagged union, `GrantKind`, `Issuer`, facilitator `GrantRequest`s
//! - **Acknowledgments**: `AckMatcher`, the exact-field head matcher used to dequeue grants
//! - **Wire**: versioned JSON frames exchanged with facilitators and player clients
//! - **Config**: `GatewayConfig` delivery tunables
//! - **Effects**: collaborator traits (`Clock`, `GrantConnection`, `CharacterRecords`)
//!
//! Nothing in this crate performs I/O. Handlers for the effect traits live in
//! `bondsmith-sync` (in-memory records), `bondsmith-server` (socket connections)
//! and `bondsmith-testkit` (recording and fixed-clock doubles).

#![forbid(unsafe_code)]

pub mod ack;
pub mod config;
pub mod effects;
pub mod grant;
pub mod identifiers;
pub mod wire;

pub use ack::AckMatcher;
pub use config::GatewayConfig;
pub use effects::{CharacterRecords, Clock, GrantConnection, PushError, SystemClock};
pub use grant::{GrantEvent, GrantKind, GrantPayload, GrantRequest, Issuer, RESYNC_ISSUER};
pub use identifiers::{CharacterId, SessionId};
pub use wire::{ClientMessage, Inbound, ServerMessage, WireError, WIRE_SCHEMA_VERSION};
