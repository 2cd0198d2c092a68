//! Discovery sessions: one mDNS browse operation each, with on-demand
//! resolution of specific instances.

use crate::session::{Session, SessionState};
use crate::transport::{BrowseUpdate, MdnsTransport, ResolveUpdate};
use lampion_core::{
    EventSink, LampionError, ServiceRecord, SessionEvent, SessionEventKind, SessionId, SessionKind,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns one browse operation for a service type.
///
/// Found and lost instances are tracked in a set keyed by (name, type); a
/// found record carries only name and type until [`resolve_service`]
/// populates port, host and attributes on request. Resolves for different
/// instances run independently and never block each other.
///
/// [`resolve_service`]: DiscoverySession::resolve_service
pub struct DiscoverySession {
    id: SessionId,
    service_type: String,
    verbose: bool,
    transport: Arc<dyn MdnsTransport>,
    events: EventSink,
    on_dispose: Box<dyn Fn() + Send + Sync>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: SessionState,
    discovered: HashMap<(String, String), ServiceRecord>,
    pump: Option<JoinHandle<()>>,
    resolves: Vec<JoinHandle<()>>,
}

impl DiscoverySession {
    pub(crate) fn new(
        id: SessionId,
        service_type: impl Into<String>,
        verbose: bool,
        transport: Arc<dyn MdnsTransport>,
        events: EventSink,
        on_dispose: Box<dyn Fn() + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            service_type: service_type.into(),
            verbose,
            transport,
            events,
            on_dispose,
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                discovered: HashMap::new(),
                pump: None,
                resolves: Vec::new(),
            }),
        })
    }

    /// The service type this session browses for.
    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Snapshot of the currently discovered instances.
    pub fn discovered_services(&self) -> Vec<ServiceRecord> {
        self.inner.lock().discovered.values().cloned().collect()
    }

    /// Starts browsing. Non-blocking; instances are reported through
    /// `discovery.serviceFound` / `discovery.serviceLost` events as the
    /// network announces them.
    pub fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Running => {
                self.log("Discovery already running");
                return;
            }
            SessionState::Stopped => {
                debug!(id = self.id, "Ignoring start on a disposed discovery");
                return;
            }
            SessionState::Created => {}
        }

        let updates = match self.transport.browse(&self.service_type) {
            Ok(updates) => updates,
            Err(e) => {
                warn!(id = self.id, error = %e, "Browse rejected");
                self.events.emit(SessionEvent::failure(
                    self.id,
                    SessionEventKind::DiscoveryError,
                    e.to_string(),
                ));
                return;
            }
        };

        inner.state = SessionState::Running;
        self.log("Discovery started");
        self.events.emit(SessionEvent::success(
            self.id,
            SessionEventKind::DiscoveryStarted,
            None,
        ));

        let session = Arc::clone(self);
        inner.pump = Some(tokio::spawn(async move {
            while let Ok(update) = updates.recv().await {
                session.handle_update(update);
            }
        }));
    }

    fn handle_update(&self, update: BrowseUpdate) {
        match update {
            BrowseUpdate::Found { name, service_type } => self.on_found(name, service_type),
            BrowseUpdate::Lost { name, service_type } => self.on_lost(name, service_type),
            BrowseUpdate::Resolved(record) => self.on_background_resolved(record),
        }
    }

    fn on_found(&self, name: String, service_type: String) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            return;
        }

        let key = (name.clone(), service_type.clone());
        if inner.discovered.contains_key(&key) {
            // Repeat announcement of an instance we already track
            return;
        }

        let record = ServiceRecord::found(name, service_type);
        inner.discovered.insert(key, record.clone());

        self.log(&format!("Found service {}", record));
        self.events.emit(SessionEvent::success(
            self.id,
            SessionEventKind::ServiceFound,
            Some(record),
        ));
    }

    fn on_lost(&self, name: String, service_type: String) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            return;
        }

        if let Some(record) = inner.discovered.remove(&(name, service_type)) {
            self.log(&format!("Lost service {}", record));
            self.events.emit(SessionEvent::success(
                self.id,
                SessionEventKind::ServiceLost,
                Some(record),
            ));
        }
    }

    /// The daemon resolves instances on its own while browsing; keep the
    /// stored record fresh but emit nothing. `serviceResolved` events only
    /// answer explicit resolve requests.
    fn on_background_resolved(&self, record: ServiceRecord) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            return;
        }

        if let Some(existing) = inner.discovered.get_mut(&record.instance_key()) {
            existing.port = record.port;
            existing.host = record.host;
            existing.attributes = record.attributes;
        }
    }

    /// Requests resolution of one discovered instance. Non-blocking; the
    /// outcome arrives as a `discovery.serviceResolved` or
    /// `discovery.resolveError` event. Requests for unknown instances fail
    /// with an error event rather than a call failure.
    pub fn resolve_service(self: &Arc<Self>, name: &str, service_type: &str) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            self.events.emit(
                SessionEvent::failure(
                    self.id,
                    SessionEventKind::ResolveError,
                    "discovery session is not running",
                )
                .with_service(ServiceRecord::found(name, service_type)),
            );
            return;
        }

        let key = (name.to_string(), service_type.to_string());
        if !inner.discovered.contains_key(&key) {
            let error = LampionError::unknown_service(name, service_type);
            debug!(id = self.id, name, service_type, "Resolve for unknown service");
            self.events.emit(
                SessionEvent::failure(self.id, SessionEventKind::ResolveError, error.to_string())
                    .with_service(ServiceRecord::found(name, service_type)),
            );
            return;
        }

        let updates = match self.transport.resolve(service_type, name) {
            Ok(updates) => updates,
            Err(e) => {
                warn!(id = self.id, name, error = %e, "Resolve rejected");
                self.events.emit(
                    SessionEvent::failure(self.id, SessionEventKind::ResolveError, e.to_string())
                        .with_service(ServiceRecord::found(name, service_type)),
                );
                return;
            }
        };

        self.log(&format!("Resolving service {} ({})", name, service_type));

        let session = Arc::clone(self);
        let name = name.to_string();
        let service_type = service_type.to_string();
        inner.resolves.retain(|handle| !handle.is_finished());
        inner.resolves.push(tokio::spawn(async move {
            match updates.recv().await {
                Ok(ResolveUpdate::Resolved(record)) => session.on_resolved(record),
                Ok(ResolveUpdate::Failed { reason }) => {
                    session.on_resolve_failed(&name, &service_type, reason)
                }
                Err(_) => session.on_resolve_failed(
                    &name,
                    &service_type,
                    "resolver stream closed".to_string(),
                ),
            }
        }));
    }

    fn on_resolved(&self, record: ServiceRecord) {
        let mut inner = self.inner.lock();
        if inner.state != SessionState::Running {
            // Resolution answered after dispose
            return;
        }

        inner
            .discovered
            .insert(record.instance_key(), record.clone());

        self.log(&format!("Resolved service {} on port {}", record, record.port));
        self.events.emit(SessionEvent::success(
            self.id,
            SessionEventKind::ServiceResolved,
            Some(record),
        ));
    }

    fn on_resolve_failed(&self, name: &str, service_type: &str, reason: String) {
        let inner = self.inner.lock();
        if inner.state != SessionState::Running {
            return;
        }

        warn!(id = self.id, name, reason = %reason, "Resolve failed");
        self.events.emit(
            SessionEvent::failure(self.id, SessionEventKind::ResolveError, reason)
                .with_service(ServiceRecord::found(name, service_type)),
        );
    }

    /// Cancels the browse and any in-flight resolves, clears the discovered
    /// set and removes this session from its registry. Idempotent.
    pub fn dispose(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Stopped {
                return;
            }
            let was_running = inner.state == SessionState::Running;
            inner.state = SessionState::Stopped;

            if let Some(pump) = inner.pump.take() {
                pump.abort();
            }
            for handle in inner.resolves.drain(..) {
                handle.abort();
            }
            inner.discovered.clear();

            if was_running {
                if let Err(e) = self.transport.stop_browse(&self.service_type) {
                    warn!(id = self.id, error = %e, "Failed to stop browse");
                }
            }

            self.log("Discovery stopped");
            self.events.emit(SessionEvent::success(
                self.id,
                SessionEventKind::DiscoveryStopped,
                None,
            ));
        }
        (self.on_dispose)();
    }

    fn log(&self, message: &str) {
        if self.verbose {
            info!(id = self.id, "{}", message);
        } else {
            debug!(id = self.id, "{}", message);
        }
    }
}

impl Session for DiscoverySession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Discovery
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    fn dispose(&self) {
        DiscoverySession::dispose(self);
    }
}
