//! The operation layer callers drive sessions through.

use crate::broadcast::BroadcastSession;
use crate::discovery::DiscoverySession;
use crate::registry::SessionRegistry;
use crate::transport::{MdnsSdTransport, MdnsTransport};
use async_channel::Receiver;
use lampion_core::{
    EventSink, LampionConfig, LampionError, Result, ServiceRecord, SessionEvent, SessionId,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Entry point for the calling layer.
///
/// Owns the mDNS transport, the session registry and the event channel.
/// Immediate results answer only whether a request was accepted and whether
/// the id was known; every network outcome arrives later on the event
/// receiver, tagged with the id of the session that produced it.
pub struct LampionService {
    transport: Arc<dyn MdnsTransport>,
    registry: Arc<SessionRegistry>,
    events: EventSink,
    event_rx: Receiver<SessionEvent>,
}

impl LampionService {
    /// Creates a service backed by the OS mDNS daemon.
    pub fn new(config: LampionConfig) -> Result<Self> {
        config.validate().map_err(LampionError::InvalidConfig)?;
        let transport = Arc::new(MdnsSdTransport::new(&config)?);
        Self::with_transport(config, transport)
    }

    /// Creates a service over a caller-supplied transport. Tests use this
    /// with the mock transport.
    pub fn with_transport(
        config: LampionConfig,
        transport: Arc<dyn MdnsTransport>,
    ) -> Result<Self> {
        config.validate().map_err(LampionError::InvalidConfig)?;

        let (events, event_rx) = EventSink::channel(config.event_capacity);

        info!("Lampion session service created");

        Ok(Self {
            transport,
            registry: Arc::new(SessionRegistry::new()),
            events,
            event_rx,
        })
    }

    /// Returns the event receiver for the calling layer.
    pub fn event_receiver(&self) -> Receiver<SessionEvent> {
        self.event_rx.clone()
    }

    /// Number of live sessions, (broadcasts, discoveries).
    pub fn session_counts(&self) -> (usize, usize) {
        self.registry.counts()
    }

    /// Creates a broadcast session for `record` under `id`.
    ///
    /// Rejects ids already active among broadcasts; the caller must stop the
    /// existing session before reusing its id.
    pub fn initialize_broadcast(
        &self,
        id: SessionId,
        record: ServiceRecord,
        verbose: bool,
    ) -> Result<()> {
        record.validate().map_err(LampionError::InvalidRecord)?;

        let registry = Arc::clone(&self.registry);
        let session = BroadcastSession::new(
            id,
            record,
            verbose,
            Arc::clone(&self.transport),
            self.events.clone(),
            Box::new(move || registry.remove_broadcast(id)),
        );

        self.registry.insert_broadcast(id, session)?;
        debug!(id, "Broadcast session initialized");
        Ok(())
    }

    /// Starts a broadcast. Returns false when the id is unknown.
    pub fn start_broadcast(&self, id: SessionId) -> bool {
        match self.registry.broadcast(id) {
            Some(session) => {
                session.start();
                true
            }
            None => {
                debug!(id, "Start requested for unknown broadcast session");
                false
            }
        }
    }

    /// Disposes a broadcast. Returns false when the id is unknown.
    pub fn stop_broadcast(&self, id: SessionId) -> bool {
        match self.registry.broadcast(id) {
            Some(session) => {
                session.dispose();
                true
            }
            None => {
                debug!(id, "Stop requested for unknown broadcast session");
                false
            }
        }
    }

    /// Creates a discovery session for `service_type` under `id`.
    pub fn initialize_discovery(
        &self,
        id: SessionId,
        service_type: &str,
        verbose: bool,
    ) -> Result<()> {
        if service_type.trim().is_empty() {
            return Err(LampionError::InvalidRecord(
                "service type must not be empty".to_string(),
            ));
        }

        let registry = Arc::clone(&self.registry);
        let session = DiscoverySession::new(
            id,
            service_type,
            verbose,
            Arc::clone(&self.transport),
            self.events.clone(),
            Box::new(move || registry.remove_discovery(id)),
        );

        self.registry.insert_discovery(id, session)?;
        debug!(id, service_type, "Discovery session initialized");
        Ok(())
    }

    /// Starts a discovery. Returns false when the id is unknown.
    pub fn start_discovery(&self, id: SessionId) -> bool {
        match self.registry.discovery(id) {
            Some(session) => {
                session.start();
                true
            }
            None => {
                debug!(id, "Start requested for unknown discovery session");
                false
            }
        }
    }

    /// Requests resolution of a discovered instance. Returns false when the
    /// id is unknown; resolution outcomes arrive as events.
    pub fn resolve_service(&self, id: SessionId, name: &str, service_type: &str) -> bool {
        match self.registry.discovery(id) {
            Some(session) => {
                session.resolve_service(name, service_type);
                true
            }
            None => {
                debug!(id, "Resolve requested for unknown discovery session");
                false
            }
        }
    }

    /// Disposes a discovery. Returns false when the id is unknown.
    pub fn stop_discovery(&self, id: SessionId) -> bool {
        match self.registry.discovery(id) {
            Some(session) => {
                session.dispose();
                true
            }
            None => {
                debug!(id, "Stop requested for unknown discovery session");
                false
            }
        }
    }

    /// Disposes every live session and shuts the transport down.
    pub fn shutdown(&self) -> Result<()> {
        info!("Shutting down Lampion session service");
        self.registry.dispose_all();
        self.transport.shutdown()
    }
}
