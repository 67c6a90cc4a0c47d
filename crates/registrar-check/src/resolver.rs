//! Attribute resolution — ordered lookup tiers for check fields.
//!
//! Each field of a check is resolved by asking every tier in order and
//! taking the first non-empty answer. The caller supplies the static
//! default used when no tier answers.

use std::collections::HashMap;

use tracing::trace;

use registrar_core::ServiceDescriptor;

/// Read-only view of environment variables.
///
/// Injected into the resolver so that check building never reads
/// process state directly.
pub trait EnvLookup: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads the real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
}

impl MapEnv {
    pub fn new(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl EnvLookup for MapEnv {
    fn get(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// One tier of the resolution chain.
pub trait AttributeSource: Send + Sync {
    /// Tier name for diagnostics.
    fn name(&self) -> &'static str;

    /// Value for `key` (unprefixed, e.g. `"interval"`), if this tier has one.
    fn lookup(&self, service: &ServiceDescriptor, key: &str) -> Option<String>;
}

/// Per-service attributes: `check_<key>` with the key lower-cased.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAttrs;

impl AttributeSource for ServiceAttrs {
    fn name(&self) -> &'static str {
        "service"
    }

    fn lookup(&self, service: &ServiceDescriptor, key: &str) -> Option<String> {
        let attr = format!("check_{}", key.to_lowercase());
        service.attr(&attr).map(str::to_string)
    }
}

/// Environment overrides: `CONSUL_CHECK_<KEY>` with the key upper-cased.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides<E> {
    env: E,
}

impl<E: EnvLookup> EnvOverrides<E> {
    pub fn new(env: E) -> Self {
        Self { env }
    }
}

impl<E: EnvLookup> AttributeSource for EnvOverrides<E> {
    fn name(&self) -> &'static str {
        "env"
    }

    fn lookup(&self, _service: &ServiceDescriptor, key: &str) -> Option<String> {
        let var = format!("CONSUL_CHECK_{}", key.to_uppercase());
        self.env.get(&var).filter(|v| !v.is_empty())
    }
}

/// Resolves check fields through an ordered list of tiers.
pub struct AttributeResolver {
    tiers: Vec<Box<dyn AttributeSource>>,
}

impl AttributeResolver {
    /// Resolver with an explicit tier list, consulted front to back.
    pub fn new(tiers: Vec<Box<dyn AttributeSource>>) -> Self {
        Self { tiers }
    }

    /// The standard chain: service attributes, then the given environment.
    pub fn with_env<E: EnvLookup + 'static>(env: E) -> Self {
        Self::new(vec![Box::new(ServiceAttrs), Box::new(EnvOverrides::new(env))])
    }

    /// Append a tier after the existing ones.
    pub fn push_tier(mut self, tier: Box<dyn AttributeSource>) -> Self {
        self.tiers.push(tier);
        self
    }

    /// Insert a tier at `index` (clamped to the end of the chain).
    pub fn insert_tier(mut self, index: usize, tier: Box<dyn AttributeSource>) -> Self {
        let index = index.min(self.tiers.len());
        self.tiers.insert(index, tier);
        self
    }

    /// Names of the configured tiers, in lookup order.
    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// First non-empty value across all tiers.
    pub fn resolve(&self, service: &ServiceDescriptor, key: &str) -> Option<String> {
        self.tiers.iter().find_map(|tier| {
            let value = tier.lookup(service, key).filter(|v| !v.is_empty())?;
            trace!(service = %service.id, key, tier = tier.name(), "check attribute resolved");
            Some(value)
        })
    }

    /// Like [`resolve`](Self::resolve), falling back to a static default.
    pub fn resolve_or(&self, service: &ServiceDescriptor, key: &str, default: &str) -> String {
        self.resolve(service, key)
            .unwrap_or_else(|| default.to_string())
    }
}

impl Default for AttributeResolver {
    fn default() -> Self {
        Self::with_env(ProcessEnv)
    }
}
