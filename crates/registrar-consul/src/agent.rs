//! Consul agent HTTP client.
//!
//! Talks plain HTTP/1.1 to a local Consul agent over a pooled hyper
//! client. Every request is bounded by the configured timeout; failures
//! are returned as-is and never retried here.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use registrar_core::config::ConsulConfig;
use registrar_core::{RegisteredService, RegistrationRecord, ServiceId};

use crate::client::RegistryClient;
use crate::error::{RegistryError, RegistryResult};
use crate::wire::{AgentSelf, AgentService, AgentServiceRegistration};

const TOKEN_HEADER: &str = "x-consul-token";
const USER_AGENT: &str = concat!("registrar/", env!("CARGO_PKG_VERSION"));

/// Client for the Consul agent API.
#[derive(Clone)]
pub struct ConsulClient {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    http: Client<HttpConnector, Full<Bytes>>,
}

impl ConsulClient {
    /// Build a client from the `[consul]` config section.
    pub fn new(config: &ConsulConfig) -> RegistryResult<Self> {
        Self::from_parts(&config.address, config.token.clone(), config.timeout())
    }

    /// Build a client for an agent at `address` (`host:port`).
    pub fn from_parts(
        address: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> RegistryResult<Self> {
        let base_url = format!("http://{address}");
        let uri: Uri = base_url
            .parse()
            .map_err(|e| RegistryError::InvalidAddress(format!("{address}: {e}")))?;
        if address.contains('/') || uri.authority().is_none() {
            return Err(RegistryError::InvalidAddress(address.to_string()));
        }

        let http = Client::builder(TokioExecutor::new()).build_http();

        debug!(%base_url, ?timeout, "consul client created");

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.is_empty()),
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> RegistryResult<Bytes> {
        let uri = format!("{}{}", self.base_url, path);

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(&uri)
            .header("user-agent", USER_AGENT);
        if let Some(token) = &self.token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        let exchange = async {
            let resp = self
                .http
                .request(req)
                .await
                .map_err(|e| RegistryError::Transport(e.to_string()))?;
            let status = resp.status();
            let bytes = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| RegistryError::Transport(e.to_string()))?
                .to_bytes();
            Ok::<_, RegistryError>((status, bytes))
        };

        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RegistryError::Timeout(self.timeout))??;

        debug!(%method, %uri, status = status.as_u16(), "consul request");

        if !status.is_success() {
            return Err(RegistryError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).trim().to_string(),
            });
        }

        Ok(bytes)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> RegistryResult<T> {
        let bytes = self.request(Method::GET, path, None).await?;
        serde_json::from_slice(&bytes).map_err(|e| RegistryError::Decode(format!("{path}: {e}")))
    }
}

#[async_trait]
impl RegistryClient for ConsulClient {
    async fn list_registrations(&self) -> RegistryResult<HashMap<ServiceId, RegisteredService>> {
        let services: HashMap<String, AgentService> = self.get_json("/v1/agent/services").await?;
        Ok(services
            .into_iter()
            .map(|(id, svc)| (id, RegisteredService::from(svc)))
            .collect())
    }

    async fn submit_registration(&self, record: &RegistrationRecord) -> RegistryResult<()> {
        let body = serde_json::to_vec(&AgentServiceRegistration::from(record))
            .map_err(|e| RegistryError::Encode(e.to_string()))?;
        self.request(Method::PUT, "/v1/agent/service/register", Some(body))
            .await?;
        Ok(())
    }

    async fn deregister(&self, id: &str) -> RegistryResult<()> {
        let path = format!("/v1/agent/service/deregister/{}", urlencoding::encode(id));
        self.request(Method::PUT, &path, None).await?;
        Ok(())
    }

    async fn self_address(&self) -> RegistryResult<String> {
        let me: AgentSelf = self.get_json("/v1/agent/self").await?;
        me.address()
            .map(str::to_string)
            .ok_or_else(|| RegistryError::Resolution("agent did not report Member.Addr".to_string()))
    }

    async fn current_leader(&self) -> RegistryResult<String> {
        let leader: String = self.get_json("/v1/status/leader").await?;
        info!(%leader, "consul: current leader");
        Ok(leader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_host_port() {
        let client =
            ConsulClient::from_parts("127.0.0.1:8500", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:8500");

        let client =
            ConsulClient::from_parts("consul.service:8500", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://consul.service:8500");
    }

    #[test]
    fn rejects_urls_and_garbage() {
        for addr in ["http://127.0.0.1:8500", "127.0.0.1:8500/v1", "bad host", ""] {
            assert!(
                matches!(
                    ConsulClient::from_parts(addr, None, Duration::from_secs(1)),
                    Err(RegistryError::InvalidAddress(_))
                ),
                "{addr:?}"
            );
        }
    }

    #[test]
    fn empty_token_is_dropped() {
        let client = ConsulClient::from_parts(
            "127.0.0.1:8500",
            Some(String::new()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert!(client.token.is_none());
    }

    #[tokio::test]
    async fn closed_port_is_a_transport_error() {
        let client =
            ConsulClient::from_parts("127.0.0.1:1", None, Duration::from_secs(2)).unwrap();
        let err = client.current_leader().await.unwrap_err();
        assert!(matches!(err, RegistryError::Transport(_)), "{err}");
    }
}
