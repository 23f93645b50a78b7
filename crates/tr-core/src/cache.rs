//! Process-local cache that cooperates with capture and replay.
//!
//! In replay mode every key is prefixed with the bound session id, so
//! concurrently replayed sessions never see each other's entries. In record
//! mode every [`LocalCache::load`] is captured as an [`APCU`] action whose
//! request is the key and whose response is the JSON of the value, or
//! [`EMPTY_VALUE`] on a miss.
//!
//! Values are stored either typed (read back only as the same type) or as
//! text, which the first typed load decodes from JSON and caches in decoded
//! form.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use tr_codec::{CodecError, FieldMap};
use tr_common::{Error, Result};
use tr_config::CacheSettings;

use crate::action::Action;
use crate::context::Context;
use crate::message::Message;
use crate::mode::ModeSwitch;
use crate::protocol::{Protocol, APCU};
use crate::recorder::Recorder;

/// Recorded response for a cache miss.
pub const EMPTY_VALUE: &str = "::empty::";

/// A cached value.
#[derive(Clone)]
pub enum CacheValue {
    Typed {
        value: Arc<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
    /// JSON text, decodable into any matching type.
    Text(String),
}

impl CacheValue {
    pub fn typed<T: Any + Send + Sync>(value: T) -> Self {
        CacheValue::Typed {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            CacheValue::Typed { type_name, .. } => type_name,
            CacheValue::Text(_) => "text",
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            CacheValue::Typed { value, .. } => value.downcast_ref::<T>(),
            CacheValue::Text(_) => None,
        }
    }
}

impl fmt::Debug for CacheValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheValue::Typed { type_name, .. } => write!(f, "Typed({type_name})"),
            CacheValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
        }
    }
}

struct CacheItem {
    /// `None` once expired; the key stays so a late expiry check cannot
    /// remove an entry stored after it.
    value: Option<CacheValue>,
    expire_at: Option<Instant>,
}

pub struct LocalCache {
    mode: Arc<ModeSwitch>,
    recorder: Arc<Recorder>,
    default_ttl: Option<Duration>,
    items: DashMap<String, CacheItem>,
}

impl LocalCache {
    pub fn new(mode: Arc<ModeSwitch>, recorder: Arc<Recorder>, settings: &CacheSettings) -> Self {
        Self {
            mode,
            recorder,
            default_ttl: settings.default_ttl_secs.map(Duration::from_secs),
            items: DashMap::new(),
        }
    }

    fn full_key(&self, ctx: &Context, key: &str) -> Result<String> {
        if self.mode.is_replay() {
            let id = ctx.session_id().ok_or(Error::SessionIdUnbound)?;
            Ok(format!("{id}{key}"))
        } else {
            Ok(key.to_string())
        }
    }

    /// Look up `key` as a `T`.
    ///
    /// `Ok(None)` on a miss or an expired entry. A typed entry of another type
    /// is a `TypeMismatch`; a text entry that is not valid JSON for `T` is a
    /// JSON error, unless `T` is `String`, in which case the raw text is
    /// returned.
    pub fn load<T>(&self, ctx: &Context, key: &str) -> Result<Option<T>>
    where
        T: Any + Clone + Send + Sync + Serialize + DeserializeOwned,
    {
        let full = self.full_key(ctx, key)?;
        let found = self.load_item::<T>(&full)?;
        if self.mode.is_record() {
            self.record_load(ctx, key, found.as_ref());
        }
        Ok(found)
    }

    fn load_item<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: Any + Clone + Send + Sync + DeserializeOwned,
    {
        let Some(mut item) = self.items.get_mut(key) else {
            return Ok(None);
        };
        if item.expire_at.is_some_and(|at| Instant::now() >= at) {
            if item.value.take().is_some() {
                debug!(key, "cache entry expired");
            }
            return Ok(None);
        }
        let value = match &item.value {
            Some(value) => value.clone(),
            None => return Ok(None),
        };

        match value {
            CacheValue::Typed { value, type_name } => value
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or_else(|| Error::TypeMismatch {
                    expected: std::any::type_name::<T>().to_string(),
                    found: type_name.to_string(),
                }),
            CacheValue::Text(text) => match serde_json::from_str::<T>(&text) {
                Ok(decoded) => {
                    item.value = Some(CacheValue::typed(decoded.clone()));
                    Ok(Some(decoded))
                }
                Err(e) => raw_string::<T>(text).map(Some).ok_or(Error::Json(e)),
            },
        }
    }

    fn record_load<T>(&self, ctx: &Context, key: &str, found: Option<&T>)
    where
        T: Any + Clone + Send + Sync + Serialize,
    {
        let response = match found {
            Some(value) => {
                let value = value.clone();
                Message::new(move || serde_json::to_string(&value).unwrap_or_default())
            }
            None => Message::from_text(EMPTY_VALUE),
        };
        self.recorder
            .record_action(ctx, Action::new(APCU, Message::from_text(key), response));
    }

    /// Store a typed value with the configured default TTL.
    pub fn store<T: Any + Send + Sync>(&self, ctx: &Context, key: &str, value: T) -> Result<()> {
        self.insert(ctx, key, CacheValue::typed(value), self.default_ttl)
    }

    /// Store a typed value expiring after `ttl`. A zero TTL never expires.
    pub fn store_with_ttl<T: Any + Send + Sync>(
        &self,
        ctx: &Context,
        key: &str,
        value: T,
        ttl: Duration,
    ) -> Result<()> {
        self.insert(ctx, key, CacheValue::typed(value), Some(ttl))
    }

    /// Store JSON text to be decoded on first typed load.
    pub fn store_text(&self, ctx: &Context, key: &str, text: impl Into<String>) -> Result<()> {
        self.insert(ctx, key, CacheValue::Text(text.into()), self.default_ttl)
    }

    fn insert(
        &self,
        ctx: &Context,
        key: &str,
        value: CacheValue,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let full = self.full_key(ctx, key)?;
        let expire_at = ttl
            .filter(|ttl| !ttl.is_zero())
            .and_then(|ttl| Instant::now().checked_add(ttl));
        self.items.insert(
            full,
            CacheItem {
                value: Some(value),
                expire_at,
            },
        );
        Ok(())
    }

    pub fn delete(&self, ctx: &Context, key: &str) -> Result<()> {
        let full = self.full_key(ctx, key)?;
        self.items.remove(&full);
        Ok(())
    }

    /// Visit entries by full key until `f` returns false. Expired entries
    /// are visited with `None`.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, Option<&CacheValue>) -> bool,
    {
        for entry in self.items.iter() {
            if !f(entry.key(), entry.value().value.as_ref()) {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn raw_string<T: Any>(text: String) -> Option<T> {
    if TypeId::of::<T>() != TypeId::of::<String>() {
        return None;
    }
    let boxed: Box<dyn Any> = Box::new(text);
    boxed.downcast::<T>().ok().map(|b| *b)
}

impl fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalCache")
            .field("entries", &self.items.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

/// Plugin for recorded cache lookups.
///
/// The request is the key, matched exactly. The response is flattened from
/// JSON into `$`-rooted paths (`$.a`, `$[0]`).
#[derive(Debug, Default)]
pub struct ApcuProtocol;

impl Protocol for ApcuProtocol {
    fn should_diff(&self) -> bool {
        true
    }

    fn label(&self, request: &str) -> String {
        request.to_string()
    }

    fn flat_request(&self, request: &str) -> tr_codec::Result<FieldMap> {
        let mut fields = FieldMap::new();
        fields.insert("key", request);
        Ok(fields)
    }

    fn flat_response(&self, response: &str) -> tr_codec::Result<FieldMap> {
        let mut fields = FieldMap::new();
        if response == EMPTY_VALUE {
            fields.insert("$", EMPTY_VALUE);
            return Ok(fields);
        }
        let value: serde_json::Value =
            serde_json::from_str(response).map_err(|e| CodecError::Malformed {
                offset: e.column().saturating_sub(1),
                reason: e.to_string(),
            })?;
        flat_json(&mut fields, "$".to_string(), &value);
        Ok(fields)
    }
}

fn flat_json(fields: &mut FieldMap, path: String, value: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                flat_json(fields, format!("{path}.{k}"), v);
            }
        }
        serde_json::Value::Array(items) if !items.is_empty() => {
            for (i, v) in items.iter().enumerate() {
                flat_json(fields, format!("{path}[{i}]"), v);
            }
        }
        other => fields.insert(path, other.to_string()),
    }
}
