//! Delivery gateway
//!
//! Connection-facing entry point of the grant protocol. Each operation runs
//! under the target character's partition lock.
//!
//! Event lifecycle: `Pending` (queued) -> `Delivered` (pushed to a live
//! connection, still queued) -> `Acknowledged` (dequeued by a head-matched
//! ack). A disconnect before the ack leaves the grant pending and it is
//! redelivered verbatim on the next connect. Grants never expire and cannot
//! be withdrawn.
//!
//! Pushes are best-effort. A failed push is logged and dropped; the queued
//! copy is what guarantees delivery.

use crate::partition::{CharacterPartition, CharacterPartitions};
use crate::resync::ResyncPlanner;
use bondsmith_core::{
    AckMatcher, CharacterId, CharacterRecords, Clock, GatewayConfig, GrantConnection, GrantEvent,
    GrantKind, GrantPayload, GrantRequest, Issuer, SessionId,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of binding a connection to a character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// Session created for the binding
    pub session_id: SessionId,
    /// Catch-up level-ups synthesized for this connect
    pub synthesized: usize,
    /// Pending grants pushed to the connection
    pub replayed: usize,
}

/// What an acknowledgment did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckOutcome {
    /// The head of the queue matched and was removed
    Dequeued(GrantEvent),
    /// Nothing matched: a stale, duplicate or out-of-order ack
    Stale,
}

/// Point-in-time view of one character's protocol state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CharacterSnapshot {
    /// Character described
    pub character_id: CharacterId,
    /// Whether a live session is bound
    pub connected: bool,
    /// Pending grants per kind
    pub pending: BTreeMap<GrantKind, usize>,
    /// Confirmed level watermark
    pub confirmed_level: Option<u32>,
    /// Acknowledged bond orders
    pub confirmed_bond_orders: Vec<String>,
}

/// Aggregate counters across characters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GatewayStats {
    /// Characters with protocol state
    pub characters: usize,
    /// Characters with a live session
    pub connected: usize,
    /// Pending grants across every character and kind
    pub pending: usize,
}

/// Grant delivery over per-character partitions.
pub struct DeliveryGateway {
    config: GatewayConfig,
    partitions: CharacterPartitions,
    planner: ResyncPlanner,
    records: Arc<dyn CharacterRecords>,
    clock: Arc<dyn Clock>,
}

impl DeliveryGateway {
    /// Create a gateway over the given collaborators
    pub fn new(
        config: GatewayConfig,
        records: Arc<dyn CharacterRecords>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            partitions: CharacterPartitions::new(),
            planner: ResyncPlanner::new(Arc::clone(&records), Arc::clone(&clock)),
            records,
            clock,
        }
    }

    /// Bind `connection` to the character, close any resync gap, and replay
    /// every pending grant to it.
    ///
    /// Replay follows [`GrantKind::ALL`] across kinds and queue order within
    /// a kind.
    pub fn on_connect(
        &self,
        character_id: &CharacterId,
        connection: Arc<dyn GrantConnection>,
        client_checkpoint: u32,
    ) -> ConnectOutcome {
        let now = self.clock.now();
        self.partitions.with(character_id, |partition| {
            let (session_id, replaced) =
                partition
                    .sessions
                    .register(character_id, Arc::clone(&connection), now);
            if let Some(replaced) = replaced {
                info!(
                    character_id = %character_id,
                    replaced = %replaced.id(),
                    session = %session_id,
                    "Session replaced by reconnect"
                );
            }
            partition.last_reported_level = Some(client_checkpoint);

            let synthesized = self
                .planner
                .plan_catch_up(
                    character_id,
                    client_checkpoint,
                    &partition.ledger,
                    &mut partition.store,
                )
                .len();

            let mut replayed = 0;
            for event in partition.store.peek_all(character_id).iter() {
                push(character_id, connection.as_ref(), event);
                replayed += 1;
            }

            info!(
                character_id = %character_id,
                session = %session_id,
                checkpoint = client_checkpoint,
                synthesized,
                replayed,
                "Character connected"
            );
            ConnectOutcome {
                session_id,
                synthesized,
                replayed,
            }
        })
    }

    /// Stamp a facilitator request, queue it, and push it to a live session.
    ///
    /// Level-up requests resolve to the level after the highest the server
    /// knows of: pending level-ups, the confirmed watermark, the persisted
    /// record, then the last checkpoint the client reported. Never fails; an
    /// offline character simply keeps the grant queued.
    pub fn issue(
        &self,
        character_id: &CharacterId,
        request: GrantRequest,
        facilitator: Option<&str>,
    ) -> GrantEvent {
        let issuer = Issuer::facilitator(facilitator.unwrap_or(&self.config.facilitator_name));
        let issued_at = self.clock.now();
        self.partitions.with(character_id, |partition| {
            let payload =
                request.into_payload(issuer, || self.next_level(character_id, partition));
            let event = GrantEvent::new(character_id.clone(), issued_at, payload);
            self.enqueue_and_push(character_id, partition, event.clone());
            event
        })
    }

    /// Queue an already stamped grant and push it to a live session
    pub fn issue_event(&self, event: GrantEvent) {
        let character_id = event.character_id.clone();
        self.partitions.with(&character_id, |partition| {
            self.enqueue_and_push(&character_id, partition, event);
        });
    }

    fn enqueue_and_push(
        &self,
        character_id: &CharacterId,
        partition: &mut CharacterPartition,
        event: GrantEvent,
    ) {
        debug!(
            character_id = %character_id,
            kind = %event.kind(),
            issued_by = %event.issued_by(),
            "Grant issued"
        );
        if let Some(session) = partition.sessions.get(character_id) {
            push(character_id, session.connection().as_ref(), &event);
        }
        partition.store.enqueue(character_id, event);
    }

    fn next_level(&self, character_id: &CharacterId, partition: &CharacterPartition) -> u32 {
        let known = partition
            .ledger
            .confirmed_level(character_id)
            .or_else(|| self.records.persisted_level(character_id))
            .or(partition.last_reported_level)
            .unwrap_or(0);
        let pending = partition
            .store
            .highest_pending_level(character_id)
            .unwrap_or(0);
        let base = known.max(pending);
        if base == u32::MAX {
            warn!(
                character_id = %character_id,
                level = base,
                "Level-up requested at the maximum level; granting the same level"
            );
        }
        base.saturating_add(1)
    }

    /// Apply a client acknowledgment.
    ///
    /// Dequeues the head of the acked kind iff it matches. A dequeued level-up
    /// raises the watermark and a dequeued bond records its order. Anything
    /// else is stale and ignored.
    pub fn on_acknowledge(&self, character_id: &CharacterId, ack: AckMatcher) -> AckOutcome {
        let kind = ack.kind();
        let outcome = self.partitions.with_existing(character_id, |partition| {
            let removed = partition.store.acknowledge(character_id, kind, &ack)?;
            match &removed.payload {
                GrantPayload::LevelUp { new_level, .. } => {
                    partition.ledger.record_level_ack(character_id, *new_level);
                }
                GrantPayload::Bond { order_name, .. } => {
                    partition.ledger.record_bond_ack(character_id, order_name);
                }
                GrantPayload::Expertise { .. } | GrantPayload::Item { .. } => {}
            }
            Some(removed)
        });

        match outcome.flatten() {
            Some(event) => {
                debug!(character_id = %character_id, kind = %kind, "Grant acknowledged");
                AckOutcome::Dequeued(event)
            }
            None => {
                debug!(
                    character_id = %character_id,
                    kind = %kind,
                    ack = ?ack,
                    "Ignoring stale acknowledgment"
                );
                AckOutcome::Stale
            }
        }
    }

    /// Unbind the character's session. Pending grants stay queued.
    pub fn on_disconnect(&self, character_id: &CharacterId) {
        let removed = self
            .partitions
            .with_existing(character_id, |partition| {
                partition.sessions.remove(character_id)
            })
            .flatten();
        if let Some(session) = removed {
            info!(character_id = %character_id, session = %session.id(), "Character disconnected");
        }
    }

    /// Unbind the character only if `session_id` is still its session.
    ///
    /// A late close from a connection that was already replaced by a
    /// reconnect leaves the newer binding alone.
    pub fn on_session_closed(&self, character_id: &CharacterId, session_id: SessionId) -> bool {
        let removed = self
            .partitions
            .with_existing(character_id, |partition| {
                partition.sessions.remove_if_current(character_id, session_id)
            })
            .unwrap_or(false);
        if removed {
            info!(character_id = %character_id, session = %session_id, "Character disconnected");
        } else {
            debug!(character_id = %character_id, session = %session_id, "Ignoring close of replaced session");
        }
        removed
    }

    /// Drop every piece of protocol state for a deleted character.
    ///
    /// Operations that were already waiting on the character when it was
    /// forgotten run against fresh state afterwards, so a grant issued
    /// concurrently with the delete is kept rather than silently discarded.
    pub fn forget_character(&self, character_id: &CharacterId) -> bool {
        let removed = self.partitions.remove(character_id, |partition| {
            partition.store.forget(character_id);
            partition.ledger.forget(character_id);
            partition.sessions.remove(character_id);
        });
        if removed {
            info!(character_id = %character_id, "Forgot character state");
        }
        removed
    }

    /// Protocol state of one character
    pub fn snapshot(&self, character_id: &CharacterId) -> CharacterSnapshot {
        self.partitions
            .with_existing(character_id, |partition| snapshot_of(character_id, partition))
            .unwrap_or_else(|| CharacterSnapshot {
                character_id: character_id.clone(),
                connected: false,
                pending: GrantKind::ALL.iter().map(|kind| (*kind, 0)).collect(),
                confirmed_level: None,
                confirmed_bond_orders: Vec::new(),
            })
    }

    /// Pending grants for the character, as they would be replayed
    pub fn pending(&self, character_id: &CharacterId) -> Vec<GrantEvent> {
        self.partitions
            .with_existing(character_id, |partition| {
                partition.store.peek_all(character_id).iter().cloned().collect()
            })
            .unwrap_or_default()
    }

    /// Aggregate counters
    pub fn stats(&self) -> GatewayStats {
        let mut stats = GatewayStats::default();
        for character_id in self.partitions.character_ids() {
            let snapshot = self.snapshot(&character_id);
            stats.characters += 1;
            stats.connected += usize::from(snapshot.connected);
            stats.pending += snapshot.pending.values().sum::<usize>();
        }
        stats
    }
}

fn snapshot_of(character_id: &CharacterId, partition: &CharacterPartition) -> CharacterSnapshot {
    let entry = partition.ledger.entry(character_id);
    CharacterSnapshot {
        character_id: character_id.clone(),
        connected: partition.sessions.is_connected(character_id),
        pending: GrantKind::ALL
            .iter()
            .map(|kind| (*kind, partition.store.pending_len(character_id, *kind)))
            .collect(),
        confirmed_level: entry.and_then(|e| e.confirmed_level()),
        confirmed_bond_orders: entry
            .map(|e| e.confirmed_bond_orders().iter().cloned().collect())
            .unwrap_or_default(),
    }
}

fn push(character_id: &CharacterId, connection: &dyn GrantConnection, event: &GrantEvent) {
    match connection.push(event) {
        Ok(()) => debug!(
            character_id = %character_id,
            kind = %event.kind(),
            connection = %connection.describe(),
            "Pushed grant"
        ),
        Err(error) => warn!(
            character_id = %character_id,
            kind = %event.kind(),
            connection = %connection.describe(),
            %error,
            "Push failed; grant stays pending"
        ),
    }
}
