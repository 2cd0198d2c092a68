//! # Lampion Core
//!
//! Foundational types for the Lampion mDNS/DNS-SD session library.
//!
//! This crate provides the building blocks shared by every Lampion component:
//!
//! - **Records**: `ServiceRecord`, the value describing a service to broadcast
//!   or one discovered on the local network, plus the `SessionId` correlation
//!   key.
//! - **Events**: `SessionEvent` and `EventSink`, the asynchronous channel
//!   through which sessions report outcomes back to the calling layer.
//! - **Errors**: `LampionError`, the error taxonomy for every operation,
//!   using `thiserror` for all failure modes.
//! - **Configuration**: `LampionConfig` with serde defaults and validation.
//!
//! No mDNS dependency lives here; the transport integration is in
//! `lampion-mdns`.

pub mod config;
pub mod error;
pub mod event;
pub mod record;

// Re-export commonly used types for convenience
pub use config::LampionConfig;
pub use error::{LampionError, Result};
pub use event::{EventSink, SessionEvent, SessionEventKind};
pub use record::{ServiceRecord, SessionId, SessionKind};
