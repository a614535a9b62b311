//! Connection doubles.

use bondsmith_core::{GrantConnection, GrantEvent, GrantKind, PushError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connection that records every pushed grant.
///
/// Once [`close`](Self::close)d it rejects pushes like a dropped socket.
#[derive(Debug)]
pub struct RecordingConnection {
    label: String,
    delivered: Mutex<Vec<GrantEvent>>,
    closed: AtomicBool,
}

impl RecordingConnection {
    /// Create an open connection
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            delivered: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Create an open connection behind an `Arc`
    pub fn shared(label: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(label))
    }

    /// Start rejecting pushes
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Every grant pushed so far, in push order
    pub fn delivered(&self) -> Vec<GrantEvent> {
        self.delivered.lock().clone()
    }

    /// Pushed grants of one kind
    pub fn delivered_of(&self, kind: GrantKind) -> Vec<GrantEvent> {
        self.delivered
            .lock()
            .iter()
            .filter(|event| event.kind() == kind)
            .cloned()
            .collect()
    }

    /// Levels of pushed level-ups, in push order
    pub fn delivered_levels(&self) -> Vec<u32> {
        self.delivered
            .lock()
            .iter()
            .filter_map(GrantEvent::level)
            .collect()
    }
}

impl GrantConnection for RecordingConnection {
    fn push(&self, event: &GrantEvent) -> Result<(), PushError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PushError::Closed);
        }
        self.delivered.lock().push(event.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("recording:{}", self.label)
    }
}

/// Connection whose every push fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosedConnection;

impl GrantConnection for ClosedConnection {
    fn push(&self, _event: &GrantEvent) -> Result<(), PushError> {
        Err(PushError::Closed)
    }

    fn describe(&self) -> String {
        "closed".to_string()
    }
}
