//! Session events and the sink they are emitted through.

use crate::record::{ServiceRecord, SessionId};
use async_channel::{Receiver, Sender, TrySendError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Kinds of events a session can emit, named as the calling layer sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventKind {
    /// Broadcast registration confirmed by the network
    #[serde(rename = "broadcast.started")]
    BroadcastStarted,

    /// Broadcast was disposed
    #[serde(rename = "broadcast.stopped")]
    BroadcastStopped,

    /// Broadcast registration failed
    #[serde(rename = "broadcast.error")]
    BroadcastError,

    /// Browsing started
    #[serde(rename = "discovery.started")]
    DiscoveryStarted,

    /// A service instance appeared (name and type only, unresolved)
    #[serde(rename = "discovery.serviceFound")]
    ServiceFound,

    /// A previously found instance disappeared
    #[serde(rename = "discovery.serviceLost")]
    ServiceLost,

    /// A resolve request completed with port, host and attributes
    #[serde(rename = "discovery.serviceResolved")]
    ServiceResolved,

    /// A resolve request failed
    #[serde(rename = "discovery.resolveError")]
    ResolveError,

    /// Browsing could not be started
    #[serde(rename = "discovery.error")]
    DiscoveryError,

    /// Discovery was disposed
    #[serde(rename = "discovery.stopped")]
    DiscoveryStopped,
}

impl SessionEventKind {
    /// Returns the wire name of this event kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEventKind::BroadcastStarted => "broadcast.started",
            SessionEventKind::BroadcastStopped => "broadcast.stopped",
            SessionEventKind::BroadcastError => "broadcast.error",
            SessionEventKind::DiscoveryStarted => "discovery.started",
            SessionEventKind::ServiceFound => "discovery.serviceFound",
            SessionEventKind::ServiceLost => "discovery.serviceLost",
            SessionEventKind::ServiceResolved => "discovery.serviceResolved",
            SessionEventKind::ResolveError => "discovery.resolveError",
            SessionEventKind::DiscoveryError => "discovery.error",
            SessionEventKind::DiscoveryStopped => "discovery.stopped",
        }
    }

    /// Returns true for failure notifications.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SessionEventKind::BroadcastError
                | SessionEventKind::ResolveError
                | SessionEventKind::DiscoveryError
        )
    }
}

/// An asynchronous notification from a session to the calling layer.
///
/// Tagged with the id of the session that produced it; the caller uses the id
/// to route the event back to the originating request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// Id of the session that emitted this event
    pub id: SessionId,

    /// What happened
    pub kind: SessionEventKind,

    /// The service concerned, when one is
    pub service: Option<ServiceRecord>,

    /// Failure description on error events
    pub message: Option<String>,

    /// Emission timestamp
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    /// Creates a success notification.
    pub fn success(id: SessionId, kind: SessionEventKind, service: Option<ServiceRecord>) -> Self {
        Self {
            id,
            kind,
            service,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a failure notification.
    pub fn failure(id: SessionId, kind: SessionEventKind, message: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            service: None,
            message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Attaches the service this event concerns.
    pub fn with_service(mut self, service: ServiceRecord) -> Self {
        self.service = Some(service);
        self
    }
}

/// Shared, clonable handle through which sessions emit events.
///
/// Emission never blocks the emitting thread: the sink drops the event with a
/// warning when the channel is full, and silently stops once the receiving
/// side is gone. Each event is delivered whole; concurrent emitters cannot
/// interleave within one event.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<SessionEvent>,
}

impl EventSink {
    /// Creates a sink and the receiver the calling layer consumes.
    pub fn channel(capacity: usize) -> (Self, Receiver<SessionEvent>) {
        let (tx, rx) = async_channel::bounded(capacity);
        (Self { tx }, rx)
    }

    /// Emits one event.
    pub fn emit(&self, event: SessionEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(
                    id = event.id,
                    kind = event.kind.as_str(),
                    "Event channel full, dropping event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                debug!(
                    id = event.id,
                    kind = event.kind.as_str(),
                    "Event channel closed, discarding event"
                );
            }
        }
    }
}
