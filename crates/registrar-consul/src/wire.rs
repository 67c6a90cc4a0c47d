//! JSON shapes of the Consul agent API.
//!
//! Only the fields this adapter reads or writes are modelled. Empty
//! optional fields are omitted on the way out so the agent applies its
//! own defaults.

use serde::{Deserialize, Serialize};

use registrar_core::{CheckKind, CheckSpec, RegisteredService, RegistrationRecord};

/// Body of `PUT /v1/agent/service/register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceRegistration {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<AgentServiceCheck>,
}

/// The `Check` object of a registration, flattened from [`CheckSpec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentServiceCheck {
    #[serde(rename = "CheckID", skip_serializing_if = "String::is_empty")]
    pub check_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub interval: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub deregister_critical_service_after: String,
    #[serde(rename = "HTTP", skip_serializing_if = "String::is_empty")]
    pub http: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(rename = "TLSSkipVerify", skip_serializing_if = "is_false")]
    pub tls_skip_verify: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(rename = "DockerContainerID", skip_serializing_if = "String::is_empty")]
    pub docker_container_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub shell: String,
    #[serde(rename = "TCP", skip_serializing_if = "String::is_empty")]
    pub tcp: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub timeout: String,
    #[serde(rename = "TTL", skip_serializing_if = "String::is_empty")]
    pub ttl: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl From<&CheckSpec> for AgentServiceCheck {
    fn from(spec: &CheckSpec) -> Self {
        let mut check = AgentServiceCheck {
            check_id: spec.check_id.clone(),
            name: spec.name.clone(),
            interval: spec.interval.clone(),
            status: spec.initial_status.clone(),
            deregister_critical_service_after: spec.deregister_after.clone(),
            ..Default::default()
        };

        match &spec.kind {
            CheckKind::Http { url, method } => {
                check.http = url.clone();
                check.method = method.clone().unwrap_or_default();
            }
            CheckKind::Https {
                url,
                method,
                tls_skip_verify,
            } => {
                check.http = url.clone();
                check.method = method.clone().unwrap_or_default();
                check.tls_skip_verify = *tls_skip_verify;
            }
            CheckKind::Script { args } => {
                check.args = args.clone();
            }
            CheckKind::Docker {
                args,
                container_id,
                shell,
            } => {
                check.args = args.clone();
                check.docker_container_id = container_id.clone();
                check.shell = shell.clone();
            }
            CheckKind::Tcp { address, timeout } => {
                check.tcp = address.clone();
                check.timeout = timeout.clone().unwrap_or_default();
            }
            CheckKind::Ttl { ttl } => {
                check.ttl = ttl.clone();
            }
        }

        check
    }
}

impl From<&RegistrationRecord> for AgentServiceRegistration {
    fn from(record: &RegistrationRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            port: record.port,
            tags: record.tags.clone(),
            address: record.address.clone(),
            check: record.check.as_ref().map(AgentServiceCheck::from),
        }
    }
}

/// One entry of `GET /v1/agent/services`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentService {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Service")]
    pub service: String,
    /// The agent sends `null` for services registered without tags.
    #[serde(rename = "Tags", default)]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "Port", default)]
    pub port: u16,
    #[serde(rename = "Address", default)]
    pub address: String,
}

impl From<AgentService> for RegisteredService {
    fn from(svc: AgentService) -> Self {
        Self {
            id: svc.id,
            service: svc.service,
            address: svc.address,
            port: svc.port,
            tags: svc.tags.unwrap_or_default(),
        }
    }
}

impl From<&AgentServiceRegistration> for AgentService {
    fn from(reg: &AgentServiceRegistration) -> Self {
        Self {
            id: reg.id.clone(),
            service: reg.name.clone(),
            tags: Some(reg.tags.clone()),
            port: reg.port,
            address: reg.address.clone(),
        }
    }
}

/// The subset of `GET /v1/agent/self` needed for address resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSelf {
    #[serde(rename = "Member", default)]
    pub member: Option<AgentMember>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMember {
    #[serde(rename = "Addr", default)]
    pub addr: Option<String>,
}

impl AgentSelf {
    /// The agent's own address, if it reported one.
    pub fn address(&self) -> Option<&str> {
        self.member
            .as_ref()
            .and_then(|m| m.addr.as_deref())
            .filter(|a| !a.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(kind: CheckKind) -> CheckSpec {
        CheckSpec {
            check_id: "service:web-1".into(),
            name: "Check service: web".into(),
            interval: "10s".into(),
            initial_status: "warning".into(),
            deregister_after: "1h".into(),
            kind,
        }
    }

    #[test]
    fn https_check_serializes_consul_keys() {
        let check = AgentServiceCheck::from(&spec(CheckKind::Https {
            url: "https://10.0.0.1:443/h".into(),
            method: Some("GET".into()),
            tls_skip_verify: true,
        }));
        let value = serde_json::to_value(&check).unwrap();
        assert_eq!(
            value,
            json!({
                "CheckID": "service:web-1",
                "Name": "Check service: web",
                "Interval": "10s",
                "Status": "warning",
                "DeregisterCriticalServiceAfter": "1h",
                "HTTP": "https://10.0.0.1:443/h",
                "Method": "GET",
                "TLSSkipVerify": true,
            })
        );
    }

    #[test]
    fn ttl_check_omits_interval() {
        let mut ttl = spec(CheckKind::Ttl { ttl: "30s".into() });
        ttl.interval = String::new();
        let value = serde_json::to_value(AgentServiceCheck::from(&ttl)).unwrap();
        assert_eq!(value["TTL"], "30s");
        assert!(value.get("Interval").is_none());
        assert!(value.get("HTTP").is_none());
    }

    #[test]
    fn docker_check_carries_container_and_shell() {
        let value = serde_json::to_value(AgentServiceCheck::from(&spec(CheckKind::Docker {
            args: vec!["l".into(), "s".into()],
            container_id: "c0ffee".into(),
            shell: "/bin/sh".into(),
        })))
        .unwrap();
        assert_eq!(value["Args"], json!(["l", "s"]));
        assert_eq!(value["DockerContainerID"], "c0ffee");
        assert_eq!(value["Shell"], "/bin/sh");
    }

    #[test]
    fn registration_without_check_omits_check_key() {
        let record = RegistrationRecord {
            id: "web-1".into(),
            name: "web".into(),
            address: "10.0.0.1".into(),
            port: 8080,
            tags: vec!["a".into(), "b".into()],
            check: None,
        };
        let value = serde_json::to_value(AgentServiceRegistration::from(&record)).unwrap();
        assert_eq!(value["ID"], "web-1");
        assert_eq!(value["Tags"], json!(["a", "b"]));
        assert!(value.get("Check").is_none());
    }

    #[test]
    fn agent_service_null_tags_become_empty() {
        let svc: AgentService = serde_json::from_value(json!({
            "ID": "db-1",
            "Service": "db",
            "Tags": null,
            "Port": 5432,
            "Address": "10.0.0.7",
            "Weights": { "Passing": 1, "Warning": 1 }
        }))
        .unwrap();
        let registered = RegisteredService::from(svc);
        assert!(registered.tags.is_empty());
        assert_eq!(registered.port, 5432);
    }

    #[test]
    fn agent_self_address() {
        let me: AgentSelf =
            serde_json::from_value(json!({ "Member": { "Addr": "172.17.0.1", "Port": 8301 } }))
                .unwrap();
        assert_eq!(me.address(), Some("172.17.0.1"));

        let me: AgentSelf = serde_json::from_value(json!({ "Config": {} })).unwrap();
        assert_eq!(me.address(), None);
    }
}
