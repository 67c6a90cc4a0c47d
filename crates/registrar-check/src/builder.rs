//! Check specification builder.
//!
//! Inspects a service's `check_*` attributes and derives at most one
//! registry health check. Variant selection looks only at the literal
//! service attributes; the remaining fields go through the
//! [`AttributeResolver`] chain.

use tracing::debug;

use registrar_core::{CheckKind, CheckSpec, ServiceDescriptor};

use crate::parse::{
    interpolate, normalize_ttl, parse_bool, split_docker_args, split_script_args,
};
use crate::resolver::AttributeResolver;

/// Check interval when none is configured.
pub const DEFAULT_INTERVAL: &str = "10s";
/// Status a check starts in right after registration.
pub const DEFAULT_STATUS: &str = "warning";
/// How long a critical service stays registered.
pub const DEFAULT_DEREGISTER_AFTER: &str = "1h";

const DEFAULT_SHELL: &str = "/bin/sh";
const DEFAULT_TLS_SKIP_VERIFY: &str = "true";

/// Builds check specifications from service descriptors.
pub struct CheckBuilder {
    resolver: AttributeResolver,
}

impl CheckBuilder {
    pub fn new(resolver: AttributeResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &AttributeResolver {
        &self.resolver
    }

    /// Derive the check for `service`, or `None` when no check attribute
    /// applies.
    ///
    /// The service address is used verbatim in URLs and TCP targets, so
    /// callers should resolve registry-host addresses first.
    pub fn build(&self, service: &ServiceDescriptor) -> Option<CheckSpec> {
        let ip = service.ip.to_string();
        let kind = self.select_kind(service, &ip)?;

        // TTL and interval are mutually exclusive in the registry.
        let interval = match kind {
            CheckKind::Ttl { .. } => String::new(),
            _ => self.resolver.resolve_or(service, "interval", DEFAULT_INTERVAL),
        };

        let spec = CheckSpec {
            check_id: self
                .resolver
                .resolve_or(service, "id", &format!("service:{}", service.id)),
            name: self.resolver.resolve_or(
                service,
                "name",
                &format!("Check service: {}", service.origin.container_name),
            ),
            interval,
            initial_status: self
                .resolver
                .resolve_or(service, "initial_status", DEFAULT_STATUS),
            deregister_after: self.resolver.resolve_or(
                service,
                "deregister_critical_service_after",
                DEFAULT_DEREGISTER_AFTER,
            ),
            kind,
        };

        debug!(
            service = %service.id,
            check = spec.kind.label(),
            check_id = %spec.check_id,
            "built check specification"
        );

        Some(spec)
    }

    fn select_kind(&self, service: &ServiceDescriptor, ip: &str) -> Option<CheckKind> {
        let port = service.port;

        if let Some(path) = service.attr("check_http") {
            return Some(CheckKind::Http {
                url: format!("http://{ip}:{port}{path}"),
                method: self.resolver.resolve(service, "method"),
            });
        }

        if let Some(path) = service.attr("check_https") {
            let skip = self
                .resolver
                .resolve_or(service, "tls_skip_verify", DEFAULT_TLS_SKIP_VERIFY);
            return Some(CheckKind::Https {
                url: format!("https://{ip}:{port}{path}"),
                method: self.resolver.resolve(service, "method"),
                tls_skip_verify: parse_bool(&skip).unwrap_or(true),
            });
        }

        if let Some(command) = service.attr("check_script") {
            return Some(CheckKind::Script {
                args: split_script_args(&interpolate(command, ip, port)),
            });
        }

        if let Some(command) = service.attr("check_docker") {
            return Some(CheckKind::Docker {
                args: split_docker_args(&interpolate(command, ip, port)),
                container_id: service.origin.container_id.clone(),
                shell: self.resolver.resolve_or(service, "shell", DEFAULT_SHELL),
            });
        }

        if let Some(tcp) = service.attr("check_tcp") {
            if parse_bool(tcp) == Some(true) {
                return Some(CheckKind::Tcp {
                    address: format!("{ip}:{port}"),
                    timeout: service.attr("check_timeout").map(str::to_string),
                });
            }
            debug!(service = %service.id, value = tcp, "check_tcp not enabled, skipping");
        }

        if let Some(ttl) = service.attr("check_ttl") {
            return Some(CheckKind::Ttl {
                ttl: normalize_ttl(ttl),
            });
        }

        None
    }
}

impl Default for CheckBuilder {
    fn default() -> Self {
        Self::new(AttributeResolver::default())
    }
}
