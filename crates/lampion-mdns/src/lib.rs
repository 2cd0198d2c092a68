//! mDNS/DNS-SD service broadcasting and discovery sessions
//!
//! This crate lets a calling layer open independent, cancellable mDNS
//! operations keyed by its own integer identifiers:
//! - Broadcast a named service with TXT metadata on the local network
//! - Browse for services of a given type and track them as they come and go
//! - Resolve a specific discovered instance to its port, host and attributes
//!
//! # Architecture
//!
//! One [`LampionService`] owns the mDNS transport, a registry of live
//! sessions and the event channel toward the caller:
//! 1. The caller initializes a broadcast or discovery session under an id
//! 2. Session operations return immediately; network outcomes arrive later
//!    as [`SessionEvent`]s tagged with the same id
//! 3. Disposing a session cancels its network operation and removes the id
//!    from the registry, which makes the id immediately reusable
//!
//! OS-level callbacks are funneled through per-session pump tasks so that
//! each session's events reach the caller in the order the network reported
//! them.
//!
//! # Example
//!
//! ```no_run
//! use lampion_core::{LampionConfig, ServiceRecord};
//! use lampion_mdns::LampionService;
//!
//! #[tokio::main]
//! async fn main() -> lampion_core::Result<()> {
//!     let service = LampionService::new(LampionConfig::default())?;
//!     let events = service.event_receiver();
//!
//!     let record = ServiceRecord::new("MyPrinter", "_http._tcp", 8080)
//!         .with_attribute("path", "/");
//!     service.initialize_broadcast(1, record, false)?;
//!     service.start_broadcast(1);
//!
//!     while let Ok(event) = events.recv().await {
//!         println!("session {}: {}", event.id, event.kind.as_str());
//!     }
//!     Ok(())
//! }
//! ```

pub mod broadcast;
pub mod config;
pub mod discovery;
pub mod registry;
pub mod service;
pub mod session;
pub mod transport;

pub use broadcast::BroadcastSession;
pub use config::LampionConfig;
pub use discovery::DiscoverySession;
pub use registry::SessionRegistry;
pub use service::LampionService;
pub use session::{Session, SessionState};
pub use transport::{
    BrowseUpdate, MdnsSdTransport, MdnsTransport, RegistrationHandle, RegistrationUpdate,
    ResolveUpdate,
};

// Re-exported so callers can consume events without naming lampion-core
pub use lampion_core::{SessionEvent, SessionEventKind};
