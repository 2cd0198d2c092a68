//! Transport seam between sessions and the OS mDNS daemon.
//!
//! Sessions never talk to `mdns-sd` directly; they go through the
//! [`MdnsTransport`] trait so tests can substitute an in-memory
//! implementation ([`mock::MockTransport`]) and drive OS callbacks by hand.

pub mod mock;

use async_channel::Receiver;
use lampion_core::{record, LampionConfig, LampionError, Result, ServiceRecord};
use mdns_sd::{DaemonEvent, ServiceDaemon, ServiceEvent as MdnsEvent, ServiceInfo};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Capacity of the per-browse update channel.
const BROWSE_CHANNEL_CAPACITY: usize = 256;

/// Updates delivered for one outbound service registration.
#[derive(Debug, Clone)]
pub enum RegistrationUpdate {
    /// The network confirmed the registration
    Registered { fullname: String },

    /// The registration failed
    Failed { reason: String },
}

/// Handle for one outbound registration.
pub struct RegistrationHandle {
    /// Full instance name the service was registered under
    pub fullname: String,

    /// Confirmation stream; one terminal update per registration attempt
    pub updates: Receiver<RegistrationUpdate>,
}

/// Updates delivered on a browse stream.
#[derive(Debug, Clone)]
pub enum BrowseUpdate {
    /// An instance of the browsed type appeared
    Found { name: String, service_type: String },

    /// A previously seen instance disappeared
    Lost { name: String, service_type: String },

    /// The daemon resolved an instance on its own
    Resolved(ServiceRecord),
}

/// Outcome of one targeted resolve request.
#[derive(Debug, Clone)]
pub enum ResolveUpdate {
    /// Resolution succeeded
    Resolved(ServiceRecord),

    /// Resolution failed or timed out
    Failed { reason: String },
}

/// Interface to the OS mDNS subsystem.
///
/// Every method returns immediately; network outcomes arrive on the returned
/// channels. Implementations must tolerate concurrent calls from the
/// caller's thread and from session pump tasks.
pub trait MdnsTransport: Send + Sync {
    /// Registers a service advertisement. The handle's update stream carries
    /// the asynchronous confirmation or failure.
    fn register(&self, record: &ServiceRecord) -> Result<RegistrationHandle>;

    /// Withdraws an advertisement. Completion of the OS-level cleanup is not
    /// awaited.
    fn unregister(&self, fullname: &str) -> Result<()>;

    /// Starts browsing for a service type.
    fn browse(&self, service_type: &str) -> Result<Receiver<BrowseUpdate>>;

    /// Stops an active browse.
    fn stop_browse(&self, service_type: &str) -> Result<()>;

    /// Resolves one specific instance of a service type. The returned stream
    /// carries exactly one update; concurrent resolves are independent.
    fn resolve(&self, service_type: &str, name: &str) -> Result<Receiver<ResolveUpdate>>;

    /// Shuts the transport down.
    fn shutdown(&self) -> Result<()>;
}

/// Production transport over one shared `mdns-sd` service daemon.
pub struct MdnsSdTransport {
    daemon: ServiceDaemon,
    domain: String,
    resolve_timeout: Duration,
}

impl MdnsSdTransport {
    /// Creates the daemon.
    pub fn new(config: &LampionConfig) -> Result<Self> {
        let daemon =
            ServiceDaemon::new().map_err(|e| LampionError::TransportInit(e.to_string()))?;

        Ok(Self {
            daemon,
            domain: config.default_domain.clone(),
            resolve_timeout: config.resolve_timeout(),
        })
    }

    fn qualified(&self, service_type: &str) -> String {
        record::qualify_type(service_type, &self.domain)
    }
}

impl MdnsTransport for MdnsSdTransport {
    fn register(&self, record: &ServiceRecord) -> Result<RegistrationHandle> {
        let ty_domain = record.type_domain(&self.domain);
        let host = advertised_host(record, &self.domain);

        let info = ServiceInfo::new(
            &ty_domain,
            &record.name,
            &host,
            "",
            record.port,
            record.attributes.clone(),
        )
        .map_err(|e| LampionError::registration(&record.name, e.to_string()))?
        .enable_addr_auto();

        let fullname = info.get_fullname().to_string();

        // Watch the daemon before registering so the announcement cannot be
        // missed.
        let monitor = self
            .daemon
            .monitor()
            .map_err(|e| LampionError::registration(&record.name, e.to_string()))?;

        self.daemon
            .register(info)
            .map_err(|e| LampionError::registration(&record.name, e.to_string()))?;

        let (tx, rx) = async_channel::bounded(4);
        let watched = fullname.clone();
        tokio::spawn(async move {
            loop {
                match monitor.recv_async().await {
                    Ok(DaemonEvent::Announce(name, addresses)) if name == watched => {
                        debug!(fullname = %watched, addresses = %addresses, "Service announced");
                        let _ = tx
                            .send(RegistrationUpdate::Registered {
                                fullname: watched.clone(),
                            })
                            .await;
                        break;
                    }
                    Ok(DaemonEvent::Error(e)) => {
                        let _ = tx
                            .send(RegistrationUpdate::Failed {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
        });

        Ok(RegistrationHandle {
            fullname,
            updates: rx,
        })
    }

    fn unregister(&self, fullname: &str) -> Result<()> {
        // The status receiver is dropped on purpose: id reuse must not wait
        // for OS cleanup to drain.
        let _status = self
            .daemon
            .unregister(fullname)
            .map_err(|e| LampionError::registration(fullname, e.to_string()))?;
        Ok(())
    }

    fn browse(&self, service_type: &str) -> Result<Receiver<BrowseUpdate>> {
        let ty_domain = self.qualified(service_type);

        let receiver = self
            .daemon
            .browse(&ty_domain)
            .map_err(|e| LampionError::browse(service_type, e.to_string()))?;

        let (tx, rx) = async_channel::bounded(BROWSE_CHANNEL_CAPACITY);
        let domain = self.domain.clone();
        tokio::spawn(async move {
            while let Ok(event) = receiver.recv_async().await {
                let update = match event {
                    MdnsEvent::ServiceFound(ty, fullname) => Some(BrowseUpdate::Found {
                        name: instance_name(&fullname),
                        service_type: short_type(&ty, &domain),
                    }),
                    MdnsEvent::ServiceRemoved(ty, fullname) => Some(BrowseUpdate::Lost {
                        name: instance_name(&fullname),
                        service_type: short_type(&ty, &domain),
                    }),
                    MdnsEvent::ServiceResolved(info) => {
                        Some(BrowseUpdate::Resolved(record_from_info(&info, &domain)))
                    }
                    MdnsEvent::SearchStarted(ty) => {
                        debug!(service_type = %ty, "Search started");
                        None
                    }
                    MdnsEvent::SearchStopped(ty) => {
                        debug!(service_type = %ty, "Search stopped");
                        None
                    }
                };
                if let Some(update) = update {
                    if tx.send(update).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(rx)
    }

    fn stop_browse(&self, service_type: &str) -> Result<()> {
        let ty_domain = self.qualified(service_type);
        self.daemon
            .stop_browse(&ty_domain)
            .map_err(|e| LampionError::browse(service_type, e.to_string()))
    }

    fn resolve(&self, service_type: &str, name: &str) -> Result<Receiver<ResolveUpdate>> {
        let ty_domain = self.qualified(service_type);

        // mdns-sd has no per-instance query, so a targeted resolve opens a
        // second browse of the type and completes on the first matching
        // answer. The session's own browse of the same type keeps running,
        // which is why no stop_browse happens here; the extra listener goes
        // away when this receiver is dropped.
        let receiver = self
            .daemon
            .browse(&ty_domain)
            .map_err(|e| LampionError::resolution(name, e.to_string()))?;

        let (tx, rx) = async_channel::bounded(1);
        let target = name.to_string();
        let domain = self.domain.clone();
        let timeout = self.resolve_timeout;
        tokio::spawn(async move {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                tokio::select! {
                    result = receiver.recv_async() => match result {
                        Ok(MdnsEvent::ServiceResolved(info)) => {
                            let record = record_from_info(&info, &domain);
                            if record.name == target {
                                let _ = tx.send(ResolveUpdate::Resolved(record)).await;
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(_) => {
                            let _ = tx
                                .send(ResolveUpdate::Failed {
                                    reason: "mDNS daemon closed the browse stream".to_string(),
                                })
                                .await;
                            return;
                        }
                    },
                    _ = tokio::time::sleep_until(deadline) => {
                        warn!(instance = %target, ?timeout, "Resolve timed out");
                        let _ = tx
                            .send(ResolveUpdate::Failed {
                                reason: format!("no answer within {:?}", timeout),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    fn shutdown(&self) -> Result<()> {
        let _status = self
            .daemon
            .shutdown()
            .map_err(|e| LampionError::Internal(format!("Failed to shutdown mDNS daemon: {}", e)))?;
        Ok(())
    }
}

/// Hostname to advertise a record under, qualified with the mDNS domain.
fn advertised_host(record: &ServiceRecord, domain: &str) -> String {
    let host = record.host.clone().unwrap_or_else(|| {
        hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".to_string())
    });

    if host.ends_with('.') {
        host
    } else {
        format!("{}.{}", host, domain)
    }
}

/// Extracts the instance name from a full service name.
///
/// "MyPrinter._http._tcp.local." becomes "MyPrinter".
fn instance_name(fullname: &str) -> String {
    fullname
        .find("._")
        .map(|i| &fullname[..i])
        .unwrap_or(fullname)
        .to_string()
}

/// Strips the domain suffix off a fully qualified service type.
///
/// "_http._tcp.local." becomes "_http._tcp".
fn short_type(ty_domain: &str, domain: &str) -> String {
    let trimmed = ty_domain.trim_end_matches('.');
    let domain = domain.trim_end_matches('.');
    trimmed
        .strip_suffix(&format!(".{}", domain))
        .unwrap_or(trimmed)
        .to_string()
}

/// Converts resolved ServiceInfo from mdns-sd to a ServiceRecord.
fn record_from_info(info: &ServiceInfo, domain: &str) -> ServiceRecord {
    let fullname = info.get_fullname();
    let name = instance_name(fullname);
    let service_type = fullname
        .find("._")
        .map(|i| short_type(&fullname[i + 1..], domain))
        .unwrap_or_default();

    let host = if info.get_hostname().is_empty() {
        // Fall back to an address, preferring IPv4
        info.get_addresses()
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| info.get_addresses().iter().next())
            .map(|a| a.to_string())
    } else {
        Some(info.get_hostname().to_string())
    };

    let mut attributes = HashMap::new();
    for property in info.get_properties().iter() {
        attributes.insert(property.key().to_string(), property.val_str().to_string());
    }

    ServiceRecord {
        name,
        service_type,
        port: info.get_port(),
        host,
        attributes,
    }
}
