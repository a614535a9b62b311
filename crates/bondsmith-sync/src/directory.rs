//! Session directory
//!
//! Bookkeeping only: which connection, if any, a character is bound to right
//! now. Connect and disconnect events are the only writers.

use bondsmith_core::{CharacterId, GrantConnection, SessionId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Live binding of a character to one connection.
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    connection: Arc<dyn GrantConnection>,
    connected_at: DateTime<Utc>,
}

impl Session {
    /// Identifier of this binding
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Connection handle grants are pushed to
    pub fn connection(&self) -> &Arc<dyn GrantConnection> {
        &self.connection
    }

    /// When the binding was created
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("connection", &self.connection.describe())
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

/// Character to zero-or-one live session.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    sessions: HashMap<CharacterId, Session>,
}

impl SessionDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `character_id` to `connection`, replacing any existing binding.
    ///
    /// Returns the new session id and the replaced session, if there was one.
    pub fn register(
        &mut self,
        character_id: &CharacterId,
        connection: Arc<dyn GrantConnection>,
        connected_at: DateTime<Utc>,
    ) -> (SessionId, Option<Session>) {
        let session = Session {
            id: SessionId::new_v4(),
            connection,
            connected_at,
        };
        let id = session.id;
        let replaced = self.sessions.insert(character_id.clone(), session);
        (id, replaced)
    }

    /// Unbind the character unconditionally
    pub fn remove(&mut self, character_id: &CharacterId) -> Option<Session> {
        self.sessions.remove(character_id)
    }

    /// Unbind the character only if `session_id` is still its current session
    pub fn remove_if_current(&mut self, character_id: &CharacterId, session_id: SessionId) -> bool {
        if self.is_current(character_id, session_id) {
            self.sessions.remove(character_id);
            true
        } else {
            false
        }
    }

    /// Current session for the character
    pub fn get(&self, character_id: &CharacterId) -> Option<&Session> {
        self.sessions.get(character_id)
    }

    /// Whether the character has a live session
    pub fn is_connected(&self, character_id: &CharacterId) -> bool {
        self.sessions.contains_key(character_id)
    }

    /// Whether `session_id` is the character's current session
    pub fn is_current(&self, character_id: &CharacterId, session_id: SessionId) -> bool {
        self.sessions
            .get(character_id)
            .is_some_and(|session| session.id == session_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when nobody is connected
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
