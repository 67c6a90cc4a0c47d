//! registrar-check — health check derivation for registered services.
//!
//! Turns the `check_*` attributes of a `ServiceDescriptor` into at most
//! one `CheckSpec`. The builder is a pure function of the descriptor and
//! an injected environment lookup, so it can run anywhere without
//! touching process state.
//!
//! # Attribute resolution
//!
//! ```text
//! AttributeResolver
//!   ├── ServiceAttrs   check_<key>        (per-service attribute)
//!   ├── EnvOverrides   CONSUL_CHECK_<KEY> (injected EnvLookup)
//!   └── static default supplied by the caller
//! ```
//!
//! # Variant precedence
//!
//! `check_http` → `check_https` → `check_script` → `check_docker` →
//! `check_tcp` (only when true) → `check_ttl`. The first one present wins;
//! when none is present the service is registered without a check.

pub mod builder;
pub mod parse;
pub mod resolver;

pub use builder::{CheckBuilder, DEFAULT_DEREGISTER_AFTER, DEFAULT_INTERVAL, DEFAULT_STATUS};
pub use resolver::{
    AttributeResolver, AttributeSource, EnvLookup, EnvOverrides, MapEnv, ProcessEnv, ServiceAttrs,
};
