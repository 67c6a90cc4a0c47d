//! registrard.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::parse::parse_duration;
use crate::types::ServiceDescriptor;

const DEFAULT_CONSUL_ADDRESS: &str = "127.0.0.1:8500";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate service id: {0}")]
    DuplicateId(String),

    #[error("service {0} requests a port check but has port 0")]
    MissingPort(String),

    #[error("service {0} has an empty name")]
    EmptyName(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrarConfig {
    #[serde(default)]
    pub consul: ConsulConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    /// Extra `CONSUL_CHECK_*` overrides layered under the process environment.
    #[serde(default)]
    pub check_env: HashMap<String, String>,
    /// Statically declared services, standing in for a discovery source.
    #[serde(default)]
    pub services: Vec<ServiceDescriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsulConfig {
    /// Agent address as `host:port`.
    #[serde(default = "default_address")]
    pub address: String,
    /// ACL token sent with every request.
    pub token: Option<String>,
    /// Per-request timeout (e.g. "5s", "500ms").
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Time between reconciliation cycles (e.g. "30s", "1m").
    pub interval: Option<String>,
}

fn default_address() -> String {
    DEFAULT_CONSUL_ADDRESS.to_string()
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            token: None,
            timeout: None,
        }
    }
}

impl ConsulConfig {
    pub fn timeout(&self) -> Duration {
        self.timeout
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        self.interval
            .as_deref()
            .and_then(parse_duration)
            .unwrap_or(DEFAULT_SYNC_INTERVAL)
    }
}

impl RegistrarConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RegistrarConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the invariants a single reconciliation pass relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consul.timeout().is_zero() {
            return Err(ConfigError::ZeroDuration("consul.timeout"));
        }
        if self.sync.interval().is_zero() {
            return Err(ConfigError::ZeroDuration("sync.interval"));
        }

        let mut seen = HashSet::new();
        for svc in &self.services {
            if !seen.insert(svc.id.as_str()) {
                return Err(ConfigError::DuplicateId(svc.id.clone()));
            }
            if svc.name.is_empty() {
                return Err(ConfigError::EmptyName(svc.id.clone()));
            }
            if svc.port == 0 && svc.checks_own_port() {
                return Err(ConfigError::MissingPort(svc.id.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IpMode;
    use std::io::Write;

    const SAMPLE: &str = r#"
[consul]
address = "consul.internal:8500"
token = "s3cret"
timeout = "2s"

[sync]
interval = "1m"

[check_env]
CONSUL_CHECK_INTERVAL = "15s"

[[services]]
id = "web-1"
name = "web"
ip = "backend"
port = 8080
tags = ["a", "b"]
attrs = { check_http = "/health" }
origin = { container_id = "abc", container_name = "web" }

[[services]]
id = "db-1"
name = "db"
ip = "10.0.0.7"
port = 5432
"#;

    #[test]
    fn test_parse_minimal() {
        let config: RegistrarConfig = toml::from_str("").unwrap();
        assert_eq!(config.consul.address, "127.0.0.1:8500");
        assert_eq!(config.consul.timeout(), Duration::from_secs(5));
        assert_eq!(config.sync.interval(), Duration::from_secs(30));
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_parse_full() {
        let config: RegistrarConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.consul.address, "consul.internal:8500");
        assert_eq!(config.consul.token.as_deref(), Some("s3cret"));
        assert_eq!(config.consul.timeout(), Duration::from_secs(2));
        assert_eq!(config.sync.interval(), Duration::from_secs(60));
        assert_eq!(config.check_env["CONSUL_CHECK_INTERVAL"], "15s");

        assert_eq!(config.services.len(), 2);
        let web = &config.services[0];
        assert_eq!(web.ip, IpMode::ResolveViaRegistryHost);
        assert_eq!(web.tags, vec!["a", "b"]);
        assert_eq!(web.origin.container_name, "web");

        let db = &config.services[1];
        assert_eq!(db.ip, IpMode::Literal("10.0.0.7".into()));
        assert!(db.attrs.is_empty());
        assert!(db.origin.container_id.is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = RegistrarConfig::from_file(file.path()).unwrap();
        assert_eq!(config.services.len(), 2);
    }

    #[test]
    fn test_roundtrip_toml() {
        let config: RegistrarConfig = toml::from_str(SAMPLE).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("backend"));
        assert!(rendered.contains("consul.internal:8500"));
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut config: RegistrarConfig = toml::from_str(SAMPLE).unwrap();
        config.services[1].id = "web-1".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateId("web-1".to_string()))
        );
    }

    #[test]
    fn validate_rejects_zero_port_with_port_check() {
        let mut config: RegistrarConfig = toml::from_str(SAMPLE).unwrap();
        config.services[0].port = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingPort("web-1".to_string()))
        );

        // No port-based check requested, so port 0 is tolerated.
        config.services[0].attrs.clear();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_ignores_tcp_check_that_is_not_true() {
        let mut config: RegistrarConfig = toml::from_str(SAMPLE).unwrap();
        let svc = &mut config.services[1];
        svc.port = 0;
        svc.attrs.insert("check_tcp".to_string(), "false".to_string());
        svc.attrs.insert("check_ttl".to_string(), "30".to_string());
        assert!(config.validate().is_ok());

        // A script check outranks tcp, so the port is never dialed.
        let svc = &mut config.services[1];
        svc.attrs.clear();
        svc.attrs.insert("check_script".to_string(), "ping".to_string());
        svc.attrs.insert("check_tcp".to_string(), "true".to_string());
        assert!(config.validate().is_ok());

        config.services[1].attrs.remove("check_script");
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingPort("db-1".to_string()))
        );
    }

    #[test]
    fn validate_rejects_zero_sync_interval() {
        let mut config: RegistrarConfig = toml::from_str(SAMPLE).unwrap();
        config.sync.interval = Some("0s".to_string());
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("sync.interval"))
        );
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let mut config: RegistrarConfig = toml::from_str(SAMPLE).unwrap();
        config.consul.timeout = Some("0ms".to_string());
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroDuration("consul.timeout"))
        );
    }

    #[test]
    fn from_file_rejects_zero_interval() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[sync]\ninterval = \"0\"\n").unwrap();

        let err = RegistrarConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("sync.interval"));
    }
}
