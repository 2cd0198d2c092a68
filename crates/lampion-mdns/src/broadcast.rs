//! Broadcast sessions: one outbound mDNS service registration each.

use crate::session::{Session, SessionState};
use crate::transport::{MdnsTransport, RegistrationUpdate};
use lampion_core::{EventSink, ServiceRecord, SessionEvent, SessionEventKind, SessionId, SessionKind};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns one outbound service registration.
///
/// Created by the operation layer in `Created` state; `start` hands the
/// record to the transport and a pump task turns the asynchronous
/// confirmation into a `broadcast.started` or `broadcast.error` event.
/// `dispose` withdraws the advertisement and is the last word: the
/// `broadcast.stopped` event is the final event this session emits.
pub struct BroadcastSession {
    id: SessionId,
    verbose: bool,
    transport: Arc<dyn MdnsTransport>,
    events: EventSink,
    on_dispose: Box<dyn Fn() + Send + Sync>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: SessionState,
    record: ServiceRecord,
    fullname: Option<String>,
    pump: Option<JoinHandle<()>>,
    registering: bool,
}

impl BroadcastSession {
    pub(crate) fn new(
        id: SessionId,
        record: ServiceRecord,
        verbose: bool,
        transport: Arc<dyn MdnsTransport>,
        events: EventSink,
        on_dispose: Box<dyn Fn() + Send + Sync>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            verbose,
            transport,
            events,
            on_dispose,
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                record,
                fullname: None,
                pump: None,
                registering: false,
            }),
        })
    }

    /// The record this session advertises.
    pub fn record(&self) -> ServiceRecord {
        self.inner.lock().record.clone()
    }

    /// Hands the record to the network. Non-blocking; the outcome arrives as
    /// an event. A no-op when already running or with a registration still
    /// in flight, so repeated starts cannot double-register.
    pub fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        match inner.state {
            SessionState::Running => {
                self.log("Broadcast already running");
                return;
            }
            SessionState::Stopped => {
                debug!(id = self.id, "Ignoring start on a disposed broadcast");
                return;
            }
            SessionState::Created => {}
        }
        if inner.registering {
            return;
        }

        let handle = match self.transport.register(&inner.record) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(id = self.id, error = %e, "Broadcast registration rejected");
                self.events.emit(
                    SessionEvent::failure(self.id, SessionEventKind::BroadcastError, e.to_string())
                        .with_service(inner.record.clone()),
                );
                return;
            }
        };

        self.log("Broadcast registration submitted");
        inner.fullname = Some(handle.fullname);
        inner.registering = true;

        let session = Arc::clone(self);
        let updates = handle.updates;
        inner.pump = Some(tokio::spawn(async move {
            match updates.recv().await {
                Ok(RegistrationUpdate::Registered { fullname }) => session.on_registered(fullname),
                Ok(RegistrationUpdate::Failed { reason }) => session.on_registration_failed(reason),
                Err(_) => {}
            }
        }));
    }

    fn on_registered(&self, fullname: String) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Stopped {
            // Disposed while the confirmation was in flight
            return;
        }
        inner.state = SessionState::Running;
        inner.registering = false;

        if self.verbose {
            info!(id = self.id, fullname = %fullname, "Broadcast started");
        } else {
            debug!(id = self.id, fullname = %fullname, "Broadcast started");
        }
        self.events.emit(SessionEvent::success(
            self.id,
            SessionEventKind::BroadcastStarted,
            Some(inner.record.clone()),
        ));
    }

    fn on_registration_failed(&self, reason: String) {
        let mut inner = self.inner.lock();
        if inner.state == SessionState::Stopped {
            return;
        }
        // Back to square one; the caller may retry or dispose
        inner.registering = false;
        inner.fullname = None;

        warn!(id = self.id, reason = %reason, "Broadcast registration failed");
        self.events.emit(
            SessionEvent::failure(self.id, SessionEventKind::BroadcastError, reason)
                .with_service(inner.record.clone()),
        );
    }

    /// Withdraws the advertisement and removes this session from its
    /// registry. Idempotent; safe while a registration is in flight.
    pub fn dispose(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.state == SessionState::Stopped {
                return;
            }
            inner.state = SessionState::Stopped;
            inner.registering = false;

            if let Some(pump) = inner.pump.take() {
                pump.abort();
            }

            if let Some(fullname) = inner.fullname.take() {
                // Registry removal does not wait for OS cleanup
                if let Err(e) = self.transport.unregister(&fullname) {
                    warn!(id = self.id, error = %e, "Failed to unregister broadcast");
                }
            }

            self.log("Broadcast stopped");
            self.events.emit(SessionEvent::success(
                self.id,
                SessionEventKind::BroadcastStopped,
                Some(inner.record.clone()),
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

impl Session for BroadcastSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Broadcast
    }

    fn state(&self) -> SessionState {
        self.inner.lock().state
    }

    fn dispose(&self) {
        BroadcastSession::dispose(self);
    }
}
