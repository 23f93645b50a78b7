//! Protocol plugins and the registry that maps names to them.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};
use tr_codec::FieldMap;
use tr_common::{Error, Result};

/// Inbound HTTP requests and responses.
pub const HTTP: &str = "HTTP";
/// Redis-style command traffic.
pub const REDIS: &str = "REDIS";
/// Process-local cache lookups (see [`crate::cache`]).
pub const APCU: &str = "APCU";

/// Capabilities the engine needs from a wire protocol.
///
/// Implementations are stateless and shared across threads. The engine never
/// interprets payload text itself; everything protocol-specific goes through
/// this trait.
pub trait Protocol: Send + Sync {
    /// Whether recorded and live requests are compared field by field.
    /// When false, label equality alone selects a recorded action.
    fn should_diff(&self) -> bool;

    /// Short matching key derived from a request, e.g. the command name.
    fn label(&self, request: &str) -> String;

    fn flat_request(&self, request: &str) -> tr_codec::Result<FieldMap>;

    fn flat_response(&self, response: &str) -> tr_codec::Result<FieldMap>;
}

/// Name → plugin table. Populated at startup, read on every call.
#[derive(Default)]
pub struct ProtocolRegistry {
    plugins: RwLock<HashMap<String, Arc<dyn Protocol>>>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. A second registration under the same name replaces
    /// the first.
    pub fn register(&self, name: impl Into<String>, plugin: Arc<dyn Protocol>) {
        let name = name.into();
        let previous = self.plugins.write().insert(name.clone(), plugin);
        if previous.is_some() {
            warn!(protocol = %name, "protocol re-registered; previous plugin replaced");
        } else {
            debug!(protocol = %name, "protocol registered");
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Protocol>> {
        self.plugins
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::ProtocolNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.plugins.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protocols", &self.names())
            .finish()
    }
}
