//! Error types for Lampion operations.

use crate::record::{SessionId, SessionKind};
use thiserror::Error;

/// Result type alias using LampionError as the error type.
pub type Result<T> = std::result::Result<T, LampionError>;

/// Errors that can occur while broadcasting or discovering services.
///
/// Network-level failures (`Registration`, `Browse`, `Resolution`) are never
/// returned from public operations directly; they travel to the caller as
/// error events so the request/response contract stays non-blocking.
#[derive(Debug, Error)]
pub enum LampionError {
    /// Initialize was called with an id already active for that kind
    #[error("A {kind} session with id {id} is already active")]
    DuplicateId { kind: SessionKind, id: SessionId },

    /// Service record validation failed
    #[error("Invalid service record: {0}")]
    InvalidRecord(String),

    /// Configuration validation failed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The mDNS daemon could not be created
    #[error("Failed to initialize mDNS transport: {0}")]
    TransportInit(String),

    /// Registering a service with the network failed
    #[error("Failed to register service '{service}': {reason}")]
    Registration { service: String, reason: String },

    /// Browsing for a service type failed
    #[error("Failed to browse for service type '{service_type}': {reason}")]
    Browse {
        service_type: String,
        reason: String,
    },

    /// Resolving a specific service instance failed
    #[error("Failed to resolve service '{service}': {reason}")]
    Resolution { service: String, reason: String },

    /// Resolve was requested for an instance that was never found
    #[error("Service not found in discovered set: {name} ({service_type})")]
    UnknownService {
        name: String,
        service_type: String,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LampionError {
    /// Creates a registration failure.
    pub fn registration(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Registration {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Creates a browse failure.
    pub fn browse(service_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Browse {
            service_type: service_type.into(),
            reason: reason.into(),
        }
    }

    /// Creates a resolution failure.
    pub fn resolution(service: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolution {
            service: service.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unknown-service failure.
    pub fn unknown_service(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self::UnknownService {
            name: name.into(),
            service_type: service_type.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_id_display() {
        let err = LampionError::DuplicateId {
            kind: SessionKind::Broadcast,
            id: 7,
        };
        let display = format!("{}", err);
        assert!(display.contains("broadcast"));
        assert!(display.contains('7'));
    }

    #[test]
    fn test_helper_constructors() {
        let err = LampionError::registration("MyPrinter", "daemon gone");
        assert!(matches!(err, LampionError::Registration { .. }));

        let err = LampionError::browse("_http._tcp", "socket error");
        assert!(matches!(err, LampionError::Browse { .. }));

        let err = LampionError::unknown_service("Ghost", "_http._tcp");
        let display = format!("{}", err);
        assert!(display.contains("Ghost"));
        assert!(display.contains("_http._tcp"));
    }
}
