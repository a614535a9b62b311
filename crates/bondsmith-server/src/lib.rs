//! # Bondsmith Server
//!
//! Websocket front end for the grant protocol. Facilitators and player clients
//! share one endpoint (`/ws`); the first frame of a connection decides its
//! role. HTTP endpoints expose health, aggregate stats and per-character
//! protocol state.

#![forbid(unsafe_code)]

pub mod config;
pub mod server;
pub mod websocket;

pub use config::{CharacterSeed, ConfigError, ServerConfig};
pub use server::{GrantServer, ServerState};
pub use websocket::{ChannelConnection, ConnectionRole, SessionHandler};
