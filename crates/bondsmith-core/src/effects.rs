//! Collaborator trait definitions
//!
//! The grant protocol is pure in-memory bookkeeping. Everything it needs from
//! the outside world comes through the traits below:
//!
//! - `Clock`: issuance timestamps
//! - `GrantConnection`: best-effort, non-blocking push to one live client
//! - `CharacterRecords`: read-only view of the external character record store
//!
//! Handlers: `SystemClock` here, `InMemoryCharacterRecords` in `bondsmith-sync`,
//! socket-backed connections in `bondsmith-server`, and test doubles in
//! `bondsmith-testkit`.

use crate::grant::GrantEvent;
use crate::identifiers::CharacterId;
use chrono::{DateTime, Utc};

/// Wall-clock source for grant timestamps.
pub trait Clock: Send + Sync {
    /// Current time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Push failures. None of these are retried by the protocol; an unacknowledged
/// grant is redelivered on the next connect instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    /// The connection has gone away
    #[error("connection closed")]
    Closed,
    /// The grant could not be framed for this connection
    #[error("failed to frame grant: {0}")]
    Encode(String),
}

/// One live client connection.
///
/// `push` must return without waiting on the network: implementations hand
/// the grant to a buffer drained elsewhere. The protocol calls it while holding
/// the target character's partition lock.
pub trait GrantConnection: Send + Sync {
    /// Hand a grant to the connection for delivery
    fn push(&self, event: &GrantEvent) -> Result<(), PushError>;

    /// Short label for logs
    fn describe(&self) -> String;
}

/// Read-only view of persisted character records.
pub trait CharacterRecords: Send + Sync {
    /// Persisted level of the character, if the record store knows it
    fn persisted_level(&self, character_id: &CharacterId) -> Option<u32>;
}
