//! Service records and session identity types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Caller-assigned session identifier.
///
/// Unique within its kind (broadcast vs discovery) for the lifetime of the
/// session. Every event a session emits carries this id so the caller can
/// correlate asynchronous outcomes back to the originating request.
pub type SessionId = u32;

/// The two kinds of sessions a caller can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// An outbound service registration
    Broadcast,

    /// A browse operation for a service type
    Discovery,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::Broadcast => write!(f, "broadcast"),
            SessionKind::Discovery => write!(f, "discovery"),
        }
    }
}

/// A service to broadcast on the local network, or one discovered on it.
///
/// A record obtained from a `discovery.serviceFound` event is *found*, not
/// *resolved*: only `name` and `service_type` are populated. Port, host and
/// attributes are filled in by a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Instance name (e.g. "MyPrinter")
    pub name: String,

    /// Service type (e.g. "_http._tcp")
    pub service_type: String,

    /// Service port. Zero on a found-but-unresolved record.
    pub port: u16,

    /// Hostname, when known
    pub host: Option<String>,

    /// TXT record key/value metadata
    pub attributes: HashMap<String, String>,
}

impl ServiceRecord {
    /// Creates a record for a service to broadcast.
    pub fn new(name: impl Into<String>, service_type: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            port,
            host: None,
            attributes: HashMap::new(),
        }
    }

    /// Creates an unresolved record for a service that was found while
    /// browsing. Port, host and attributes stay empty until resolution.
    pub fn found(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            port: 0,
            host: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets the hostname to advertise with.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Adds a TXT record attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Validates the record for broadcasting.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("service name must not be empty".to_string());
        }
        if self.service_type.trim().is_empty() {
            return Err("service type must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("service port must not be zero".to_string());
        }
        Ok(())
    }

    /// Returns true once port, host and attributes carry resolved data.
    pub fn is_resolved(&self) -> bool {
        self.port != 0
    }

    /// The (name, type) pair identifying this instance within a browse.
    pub fn instance_key(&self) -> (String, String) {
        (self.name.clone(), self.service_type.clone())
    }

    /// Returns the fully qualified service type (e.g. "_http._tcp.local.").
    pub fn type_domain(&self, domain: &str) -> String {
        qualify_type(&self.service_type, domain)
    }

    /// Returns the full instance name (e.g. "MyPrinter._http._tcp.local.").
    pub fn fullname(&self, domain: &str) -> String {
        format!("{}.{}", self.name, self.type_domain(domain))
    }
}

impl fmt::Display for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.service_type)
    }
}

/// Qualifies a service type with the mDNS domain.
///
/// Types already carrying a trailing dot are taken as fully qualified.
pub fn qualify_type(service_type: &str, domain: &str) -> String {
    if service_type.ends_with('.') {
        service_type.to_string()
    } else {
        format!("{}.{}", service_type, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_creation() {
        let record = ServiceRecord::new("MyPrinter", "_http._tcp", 8080)
            .with_attribute("path", "/");

        assert_eq!(record.name, "MyPrinter");
        assert_eq!(record.service_type, "_http._tcp");
        assert_eq!(record.port, 8080);
        assert_eq!(record.host, None);
        assert_eq!(record.attributes.get("path"), Some(&"/".to_string()));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_found_record_is_unresolved() {
        let record = ServiceRecord::found("MyPrinter", "_http._tcp");

        assert!(!record.is_resolved());
        assert_eq!(record.port, 0);
        assert!(record.host.is_none());
        assert!(record.attributes.is_empty());
    }

    #[test]
    fn test_validation_rejects_empty_name() {
        let record = ServiceRecord::new("", "_http._tcp", 8080);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_type() {
        let record = ServiceRecord::new("MyPrinter", "  ", 8080);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let record = ServiceRecord::new("MyPrinter", "_http._tcp", 0);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_type_qualification() {
        let record = ServiceRecord::new("MyPrinter", "_http._tcp", 8080);

        assert_eq!(record.type_domain("local."), "_http._tcp.local.");
        assert_eq!(record.fullname("local."), "MyPrinter._http._tcp.local.");
        assert_eq!(qualify_type("_http._tcp.local.", "local."), "_http._tcp.local.");
    }

    #[test]
    fn test_instance_key() {
        let record = ServiceRecord::found("MyPrinter", "_http._tcp");
        assert_eq!(
            record.instance_key(),
            ("MyPrinter".to_string(), "_http._tcp".to_string())
        );
    }

    #[test]
    fn test_session_kind_display() {
        assert_eq!(SessionKind::Broadcast.to_string(), "broadcast");
        assert_eq!(SessionKind::Discovery.to_string(), "discovery");
    }
}
