//! Domain types shared by the check builder, the registry client and the daemon.
//!
//! A `ServiceDescriptor` is produced fresh for every reconciliation cycle
//! by the discovery source. Check specifications and registration records
//! are derived from it, submitted once, and dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::parse::parse_bool;

/// Registry-wide identifier of a service instance.
pub type ServiceId = String;

/// Sentinel address meaning "use the registry agent's own address".
pub const BACKEND_SENTINEL: &str = "backend";

// ── Service descriptor ────────────────────────────────────────────

/// How the advertised address of a service is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IpMode {
    /// Advertise this address verbatim.
    Literal(String),
    /// Ask the registry agent for its own address at registration time.
    ResolveViaRegistryHost,
}

impl IpMode {
    /// Parse the textual form used by discovery sources.
    pub fn parse(raw: &str) -> Self {
        IpMode::from(raw.to_string())
    }

    /// The literal address, if one is already known.
    pub fn literal(&self) -> Option<&str> {
        match self {
            IpMode::Literal(addr) => Some(addr),
            IpMode::ResolveViaRegistryHost => None,
        }
    }
}

impl From<String> for IpMode {
    fn from(raw: String) -> Self {
        if raw == BACKEND_SENTINEL {
            IpMode::ResolveViaRegistryHost
        } else {
            IpMode::Literal(raw)
        }
    }
}

impl From<IpMode> for String {
    fn from(mode: IpMode) -> Self {
        match mode {
            IpMode::Literal(addr) => addr,
            IpMode::ResolveViaRegistryHost => BACKEND_SENTINEL.to_string(),
        }
    }
}

impl fmt::Display for IpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpMode::Literal(addr) => f.write_str(addr),
            IpMode::ResolveViaRegistryHost => f.write_str(BACKEND_SENTINEL),
        }
    }
}

/// Where a service was discovered. Only used for default naming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub container_name: String,
}

/// One discovered service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub id: ServiceId,
    pub name: String,
    pub ip: IpMode,
    pub port: u16,
    /// Order-preserving, duplicates allowed.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form per-service configuration (`check_*` directives etc.).
    #[serde(default)]
    pub attrs: HashMap<String, String>,
    #[serde(default)]
    pub origin: Origin,
}

impl ServiceDescriptor {
    /// Look up an attribute, treating empty values as absent.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Whether the check these attributes select dials the service's own
    /// port. Follows the builder's precedence: http and https win, script
    /// and docker outrank tcp, and tcp only counts when it parses as true.
    pub fn checks_own_port(&self) -> bool {
        if self.attr("check_http").is_some() || self.attr("check_https").is_some() {
            return true;
        }
        if self.attr("check_script").is_some() || self.attr("check_docker").is_some() {
            return false;
        }
        self.attr("check_tcp").and_then(parse_bool) == Some(true)
    }

    /// The same descriptor with a concrete address substituted.
    pub fn with_ip(mut self, addr: impl Into<String>) -> Self {
        self.ip = IpMode::Literal(addr.into());
        self
    }
}

// ── Check specification ───────────────────────────────────────────

/// Health check derived from a descriptor's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSpec {
    pub check_id: String,
    pub name: String,
    /// Empty for TTL checks.
    pub interval: String,
    pub initial_status: String,
    pub deregister_after: String,
    pub kind: CheckKind,
}

/// The mutually exclusive check forms. Exactly one is chosen per service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckKind {
    Http {
        url: String,
        method: Option<String>,
    },
    Https {
        url: String,
        method: Option<String>,
        tls_skip_verify: bool,
    },
    Script {
        args: Vec<String>,
    },
    Docker {
        args: Vec<String>,
        container_id: String,
        shell: String,
    },
    Tcp {
        address: String,
        timeout: Option<String>,
    },
    Ttl {
        ttl: String,
    },
}

impl CheckKind {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Http { .. } => "http",
            CheckKind::Https { .. } => "https",
            CheckKind::Script { .. } => "script",
            CheckKind::Docker { .. } => "docker",
            CheckKind::Tcp { .. } => "tcp",
            CheckKind::Ttl { .. } => "ttl",
        }
    }
}

// ── Registration ──────────────────────────────────────────────────

/// The unit submitted to the registry: a resolved descriptor plus its check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub id: ServiceId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    pub check: Option<CheckSpec>,
}

impl RegistrationRecord {
    /// Pair a descriptor whose address is already resolved with its check.
    pub fn new(descriptor: &ServiceDescriptor, address: &str, check: Option<CheckSpec>) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            address: address.to_string(),
            port: descriptor.port,
            tags: descriptor.tags.clone(),
            check,
        }
    }
}

/// A service entry as stored by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredService {
    pub id: ServiceId,
    pub service: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
}

impl RegisteredService {
    /// Whether this entry already advertises the given name and endpoint.
    pub fn matches(&self, name: &str, address: &str, port: u16) -> bool {
        self.address == address && self.port == port && self.service == name
    }

    /// Map back to the descriptor shape. Attributes and origin are not
    /// stored by the registry and come back empty.
    pub fn into_descriptor(self) -> ServiceDescriptor {
        ServiceDescriptor {
            id: self.id,
            name: self.service,
            ip: IpMode::parse(&self.address),
            port: self.port,
            tags: self.tags,
            attrs: HashMap::new(),
            origin: Origin::default(),
        }
    }
}

impl From<&RegistrationRecord> for RegisteredService {
    fn from(record: &RegistrationRecord) -> Self {
        Self {
            id: record.id.clone(),
            service: record.name.clone(),
            address: record.address.clone(),
            port: record.port,
            tags: record.tags.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(ip: &str) -> ServiceDescriptor {
        ServiceDescriptor {
            id: "web-1".to_string(),
            name: "web".to_string(),
            ip: IpMode::parse(ip),
            port: 8080,
            tags: vec!["b".to_string(), "a".to_string(), "b".to_string()],
            attrs: HashMap::from([
                ("check_http".to_string(), "/health".to_string()),
                ("check_ttl".to_string(), String::new()),
            ]),
            origin: Origin {
                container_id: "c0ffee".to_string(),
                container_name: "web".to_string(),
            },
        }
    }

    #[test]
    fn backend_sentinel_parses_to_registry_host() {
        assert_eq!(IpMode::parse("backend"), IpMode::ResolveViaRegistryHost);
        assert_eq!(IpMode::parse("10.0.0.1"), IpMode::Literal("10.0.0.1".into()));
        assert_eq!(IpMode::parse("Backend"), IpMode::Literal("Backend".into()));
    }

    #[test]
    fn ip_mode_serializes_as_plain_string() {
        let json = serde_json::to_string(&IpMode::ResolveViaRegistryHost).unwrap();
        assert_eq!(json, "\"backend\"");

        let mode: IpMode = serde_json::from_str("\"192.168.1.5\"").unwrap();
        assert_eq!(mode.literal(), Some("192.168.1.5"));
    }

    #[test]
    fn empty_attr_counts_as_absent() {
        let svc = descriptor("10.0.0.1");
        assert_eq!(svc.attr("check_http"), Some("/health"));
        assert_eq!(svc.attr("check_ttl"), None);
        assert_eq!(svc.attr("check_tcp"), None);
    }

    #[test]
    fn checks_own_port_follows_variant_precedence() {
        let mut svc = descriptor("10.0.0.1");
        assert!(svc.checks_own_port());

        svc.attrs.clear();
        svc.attrs.insert("check_tcp".into(), "false".into());
        assert!(!svc.checks_own_port());

        svc.attrs.insert("check_tcp".into(), "T".into());
        assert!(svc.checks_own_port());

        svc.attrs.insert("check_docker".into(), "nc -z".into());
        assert!(!svc.checks_own_port());

        svc.attrs.insert("check_https".into(), "/ready".into());
        assert!(svc.checks_own_port());
    }

    #[test]
    fn with_ip_replaces_sentinel() {
        let svc = descriptor("backend").with_ip("172.17.0.1");
        assert_eq!(svc.ip, IpMode::Literal("172.17.0.1".into()));
    }

    #[test]
    fn record_keeps_tag_order_and_duplicates() {
        let svc = descriptor("10.0.0.1");
        let record = RegistrationRecord::new(&svc, "10.0.0.1", None);
        assert_eq!(record.tags, vec!["b", "a", "b"]);
        assert_eq!(record.address, "10.0.0.1");
    }

    #[test]
    fn registered_service_matches_on_name_address_port() {
        let entry = RegisteredService {
            id: "web-1".into(),
            service: "web".into(),
            address: "10.0.0.1".into(),
            port: 8080,
            tags: vec![],
        };
        assert!(entry.matches("web", "10.0.0.1", 8080));
        assert!(!entry.matches("web", "10.0.0.1", 8081));
        assert!(!entry.matches("api", "10.0.0.1", 8080));
        assert!(!entry.matches("web", "10.0.0.2", 8080));
    }

    #[test]
    fn into_descriptor_drops_attrs_and_origin() {
        let entry = RegisteredService {
            id: "web-1".into(),
            service: "web".into(),
            address: "10.0.0.1".into(),
            port: 8080,
            tags: vec!["a".into(), "b".into()],
        };
        let svc = entry.into_descriptor();
        assert_eq!(svc.name, "web");
        assert_eq!(svc.tags, vec!["a", "b"]);
        assert!(svc.attrs.is_empty());
        assert_eq!(svc.origin, Origin::default());
    }

    #[test]
    fn check_kind_serializes_tagged() {
        let kind = CheckKind::Ttl { ttl: "30s".into() };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "ttl");
        assert_eq!(json["ttl"], "30s");
        assert_eq!(kind.label(), "ttl");
    }
}
