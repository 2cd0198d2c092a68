//! In-memory transport for tests.
//!
//! Lets a test play the role of the OS mDNS subsystem: registrations,
//! browse updates and resolve answers are injected by hand, and every call
//! the sessions make is recorded for assertions.

use super::{BrowseUpdate, MdnsTransport, RegistrationHandle, RegistrationUpdate, ResolveUpdate};
use async_channel::Sender;
use lampion_core::{LampionError, Result, ServiceRecord};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Deterministic stand-in for [`super::MdnsSdTransport`].
///
/// Share one instance (via `Arc`) between the service under test and the
/// test itself; the test side drives callbacks with the `confirm_*` /
/// `push_*` methods.
#[derive(Default)]
pub struct MockTransport {
    registrations: Mutex<HashMap<String, Sender<RegistrationUpdate>>>,
    browses: Mutex<HashMap<String, Sender<BrowseUpdate>>>,
    pending_resolves: Mutex<HashMap<(String, String), Sender<ResolveUpdate>>>,
    resolve_answers: Mutex<HashMap<(String, String), ResolveUpdate>>,

    registered: Mutex<Vec<String>>,
    unregistered: Mutex<Vec<String>>,
    browsed: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,

    register_error: Mutex<Option<String>>,
    browse_error: Mutex<Option<String>>,
    shut_down: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `register` call fail immediately.
    pub fn set_register_error(&self, reason: impl Into<String>) {
        *self.register_error.lock() = Some(reason.into());
    }

    /// Makes every subsequent `browse` call fail immediately.
    pub fn set_browse_error(&self, reason: impl Into<String>) {
        *self.browse_error.lock() = Some(reason.into());
    }

    /// Confirms a pending registration, as the network would.
    pub fn confirm_registration(&self, fullname: &str) {
        if let Some(tx) = self.registrations.lock().get(fullname) {
            let _ = tx.try_send(RegistrationUpdate::Registered {
                fullname: fullname.to_string(),
            });
        }
    }

    /// Fails a pending registration.
    pub fn fail_registration(&self, fullname: &str, reason: impl Into<String>) {
        if let Some(tx) = self.registrations.lock().get(fullname) {
            let _ = tx.try_send(RegistrationUpdate::Failed {
                reason: reason.into(),
            });
        }
    }

    /// Reports an instance of a browsed type appearing.
    pub fn push_found(&self, service_type: &str, name: &str) {
        if let Some(tx) = self.browses.lock().get(service_type) {
            let _ = tx.try_send(BrowseUpdate::Found {
                name: name.to_string(),
                service_type: service_type.to_string(),
            });
        }
    }

    /// Reports an instance disappearing.
    pub fn push_lost(&self, service_type: &str, name: &str) {
        if let Some(tx) = self.browses.lock().get(service_type) {
            let _ = tx.try_send(BrowseUpdate::Lost {
                name: name.to_string(),
                service_type: service_type.to_string(),
            });
        }
    }

    /// Reports a daemon-side resolution arriving on the browse stream.
    pub fn push_resolved(&self, service_type: &str, record: ServiceRecord) {
        if let Some(tx) = self.browses.lock().get(service_type) {
            let _ = tx.try_send(BrowseUpdate::Resolved(record));
        }
    }

    /// Cans the answer for a future resolve of (type, name); the resolve
    /// completes as soon as it is requested.
    pub fn answer_resolve(&self, service_type: &str, name: &str, update: ResolveUpdate) {
        self.resolve_answers
            .lock()
            .insert((service_type.to_string(), name.to_string()), update);
    }

    /// Completes a resolve that is already pending.
    pub fn complete_resolve(&self, service_type: &str, name: &str, update: ResolveUpdate) {
        if let Some(tx) = self
            .pending_resolves
            .lock()
            .remove(&(service_type.to_string(), name.to_string()))
        {
            let _ = tx.try_send(update);
        }
    }

    pub fn registered_services(&self) -> Vec<String> {
        self.registered.lock().clone()
    }

    pub fn unregistered_services(&self) -> Vec<String> {
        self.unregistered.lock().clone()
    }

    pub fn browsed_types(&self) -> Vec<String> {
        self.browsed.lock().clone()
    }

    pub fn stopped_types(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl MdnsTransport for MockTransport {
    fn register(&self, record: &ServiceRecord) -> Result<RegistrationHandle> {
        if let Some(reason) = self.register_error.lock().clone() {
            return Err(LampionError::registration(&record.name, reason));
        }

        let fullname = record.fullname("local.");
        let (tx, rx) = async_channel::bounded(4);
        self.registrations.lock().insert(fullname.clone(), tx);
        self.registered.lock().push(fullname.clone());

        Ok(RegistrationHandle {
            fullname,
            updates: rx,
        })
    }

    fn unregister(&self, fullname: &str) -> Result<()> {
        self.registrations.lock().remove(fullname);
        self.unregistered.lock().push(fullname.to_string());
        Ok(())
    }

    fn browse(&self, service_type: &str) -> Result<async_channel::Receiver<BrowseUpdate>> {
        if let Some(reason) = self.browse_error.lock().clone() {
            return Err(LampionError::browse(service_type, reason));
        }

        let (tx, rx) = async_channel::bounded(64);
        self.browses.lock().insert(service_type.to_string(), tx);
        self.browsed.lock().push(service_type.to_string());
        Ok(rx)
    }

    fn stop_browse(&self, service_type: &str) -> Result<()> {
        self.browses.lock().remove(service_type);
        self.stopped.lock().push(service_type.to_string());
        Ok(())
    }

    fn resolve(
        &self,
        service_type: &str,
        name: &str,
    ) -> Result<async_channel::Receiver<ResolveUpdate>> {
        let key = (service_type.to_string(), name.to_string());
        let (tx, rx) = async_channel::bounded(1);

        if let Some(update) = self.resolve_answers.lock().remove(&key) {
            let _ = tx.try_send(update);
        } else {
            self.pending_resolves.lock().insert(key, tx);
        }

        Ok(rx)
    }

    fn shutdown(&self) -> Result<()> {
        self.shut_down.store(true, Ordering::SeqCst);
        self.registrations.lock().clear();
        self.browses.lock().clear();
        self.pending_resolves.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_confirm() {
        let transport = MockTransport::new();
        let record = ServiceRecord::new("MyPrinter", "_http._tcp", 8080);

        let handle = transport.register(&record).unwrap();
        assert_eq!(handle.fullname, "MyPrinter._http._tcp.local.");
        assert_eq!(transport.registered_services().len(), 1);

        transport.confirm_registration(&handle.fullname);
        match handle.updates.recv().await.unwrap() {
            RegistrationUpdate::Registered { fullname } => {
                assert_eq!(fullname, "MyPrinter._http._tcp.local.")
            }
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_browse_updates_flow() {
        let transport = MockTransport::new();
        let rx = transport.browse("_http._tcp").unwrap();

        transport.push_found("_http._tcp", "MyPrinter");
        transport.push_lost("_http._tcp", "MyPrinter");

        assert!(matches!(
            rx.recv().await.unwrap(),
            BrowseUpdate::Found { .. }
        ));
        assert!(matches!(rx.recv().await.unwrap(), BrowseUpdate::Lost { .. }));
    }

    #[tokio::test]
    async fn test_canned_resolve_answer() {
        let transport = MockTransport::new();
        let record = ServiceRecord::new("MyPrinter", "_http._tcp", 8080);
        transport.answer_resolve("_http._tcp", "MyPrinter", ResolveUpdate::Resolved(record));

        let rx = transport.resolve("_http._tcp", "MyPrinter").unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            ResolveUpdate::Resolved(_)
        ));
    }

    #[test]
    fn test_register_error_injection() {
        let transport = MockTransport::new();
        transport.set_register_error("daemon unavailable");

        let record = ServiceRecord::new("MyPrinter", "_http._tcp", 8080);
        assert!(transport.register(&record).is_err());
    }
}
