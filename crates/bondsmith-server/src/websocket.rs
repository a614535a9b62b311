//! WebSocket connection handling
//!
//! Each socket gets an unbounded outbound channel drained by a writer task.
//! Grant pushes and replies go through the same channel, so a client sees the
//! replayed deliveries of a join before the `joined` frame.

use axum::extract::ws::{Message, WebSocket};
use bondsmith_core::wire::{decode_client_message, encode_server_message};
use bondsmith_core::{
    CharacterId, GrantConnection, GrantEvent, Inbound, PushError, ServerMessage, SessionId,
    RESYNC_ISSUER,
};
use bondsmith_sync::{AckOutcome, DeliveryGateway};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// [`GrantConnection`] that frames grants into a socket's outbound channel.
#[derive(Debug, Clone)]
pub struct ChannelConnection {
    label: String,
    outbound: mpsc::UnboundedSender<String>,
}

impl ChannelConnection {
    /// Wrap the outbound channel of one socket
    pub fn new(label: impl Into<String>, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            label: label.into(),
            outbound,
        }
    }
}

impl GrantConnection for ChannelConnection {
    fn push(&self, event: &GrantEvent) -> Result<(), PushError> {
        let frame = encode_server_message(&ServerMessage::from(event))
            .map_err(|e| PushError::Encode(e.to_string()))?;
        self.outbound.send(frame).map_err(|_| PushError::Closed)
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// What a connection has identified itself as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Nothing received yet
    Unbound,
    /// Facilitator issuing grants under this name
    Facilitator(String),
    /// Player bound to a character
    Player {
        /// Character being played
        character_id: CharacterId,
        /// Gateway session of the binding
        session_id: SessionId,
    },
}

/// Protocol state of one socket, independent of the socket itself.
pub struct SessionHandler {
    gateway: Arc<DeliveryGateway>,
    connection: ChannelConnection,
    role: ConnectionRole,
}

impl SessionHandler {
    /// Create a handler replying through `outbound`
    pub fn new(
        gateway: Arc<DeliveryGateway>,
        label: impl Into<String>,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            gateway,
            connection: ChannelConnection::new(label, outbound),
            role: ConnectionRole::Unbound,
        }
    }

    /// Current role
    pub fn role(&self) -> &ConnectionRole {
        &self.role
    }

    /// Handle one inbound text frame
    pub fn handle_text(&mut self, text: &str) {
        let message = match decode_client_message(text) {
            Ok(message) => message,
            Err(error) => {
                warn!(connection = %self.connection.label, %error, "Dropping malformed frame");
                self.reply(ServerMessage::Rejected {
                    reason: error.to_string(),
                });
                return;
            }
        };
        self.handle_inbound(message.into_inbound());
    }

    fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Facilitate(name) => self.facilitate(name),
            Inbound::Grant(character_id, request) => {
                let ConnectionRole::Facilitator(facilitator) = &self.role else {
                    self.reject("only a facilitator connection may issue grants");
                    return;
                };
                let event = self
                    .gateway
                    .issue(&character_id, request, Some(facilitator.as_str()));
                self.reply(ServerMessage::Issued {
                    character_id,
                    kind: event.kind(),
                });
            }
            Inbound::Join(character_id, current_level) => self.join(character_id, current_level),
            Inbound::Ack(character_id, ack) => {
                let bound = match &self.role {
                    ConnectionRole::Player {
                        character_id: bound,
                        ..
                    } => bound == &character_id,
                    _ => false,
                };
                if !bound {
                    self.reject("acknowledgment for a character this connection is not playing");
                    return;
                }
                if let AckOutcome::Dequeued(event) = self.gateway.on_acknowledge(&character_id, ack)
                {
                    debug!(
                        connection = %self.connection.label,
                        character_id = %character_id,
                        kind = %event.kind(),
                        "Acknowledged"
                    );
                }
            }
        }
    }

    fn facilitate(&mut self, name: String) {
        if matches!(self.role, ConnectionRole::Player { .. }) {
            self.reject("connection already joined as a character");
            return;
        }
        if name == RESYNC_ISSUER {
            self.reject("facilitator name is reserved for resynchronized grants");
            return;
        }
        info!(connection = %self.connection.label, facilitator = %name, "Facilitator connected");
        self.role = ConnectionRole::Facilitator(name);
    }

    fn join(&mut self, character_id: CharacterId, current_level: u32) {
        if matches!(self.role, ConnectionRole::Facilitator(_)) {
            self.reject("facilitator connections cannot join as a character");
            return;
        }
        self.close();

        let outcome = self.gateway.on_connect(
            &character_id,
            Arc::new(self.connection.clone()),
            current_level,
        );
        self.reply(ServerMessage::Joined {
            character_id: character_id.clone(),
            session_id: outcome.session_id,
            pending: outcome.replayed,
        });
        self.role = ConnectionRole::Player {
            character_id,
            session_id: outcome.session_id,
        };
    }

    /// Release the character binding, if any. Pending grants stay queued.
    pub fn close(&mut self) {
        if let ConnectionRole::Player {
            character_id,
            session_id,
        } = &self.role
        {
            self.gateway.on_session_closed(character_id, *session_id);
            self.role = ConnectionRole::Unbound;
        }
    }

    fn reject(&self, reason: &str) {
        warn!(connection = %self.connection.label, reason, "Rejected frame");
        self.reply(ServerMessage::Rejected {
            reason: reason.to_string(),
        });
    }

    fn reply(&self, message: ServerMessage) {
        match encode_server_message(&message) {
            Ok(frame) => {
                if self.connection.outbound.send(frame).is_err() {
                    debug!(connection = %self.connection.label, "Reply dropped, socket closed");
                }
            }
            Err(error) => warn!(connection = %self.connection.label, %error, "Failed to encode reply"),
        }
    }
}

/// Drive one socket until it closes
pub async fn handle_socket(socket: WebSocket, gateway: Arc<DeliveryGateway>) {
    let label = format!("ws-{}", Uuid::new_v4());
    info!(connection = %label, "New WebSocket connection");

    let (mut sink, mut stream) = socket.split();
    let (outbound, mut frames) = mpsc::unbounded_channel::<String>();

    let writer_label = label.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = frames.recv().await {
            if let Err(error) = sink.send(Message::Text(frame)).await {
                debug!(connection = %writer_label, %error, "Socket write failed");
                break;
            }
        }
    });

    let mut handler = SessionHandler::new(gateway, label.clone(), outbound);
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handler.handle_text(&text),
            Ok(Message::Binary(data)) => {
                warn!(connection = %label, bytes = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(frame)) => {
                debug!(connection = %label, ?frame, "Client closed connection");
                break;
            }
            Err(error) => {
                warn!(connection = %label, %error, "WebSocket error");
                break;
            }
        }
    }

    handler.close();
    drop(handler);
    writer.abort();
    info!(connection = %label, "WebSocket connection closed");
}
