//! Call-tree scoped key/value store.
//!
//! A [`Context`] is handed down a call tree. Clones share the same store, so a
//! binding made deep in the tree is visible to the whole tree. A tree started
//! from [`Context::background`] and given its own store with
//! [`Context::with_store`] never sees a sibling tree's bindings; moving values
//! between trees is explicit via [`Context::copy`].
//!
//! The recorder and replayer find the active session through
//! [`Context::session_id`].

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tr_common::{Error, Result, SessionId};

type Store = DashMap<String, Arc<dyn Any + Send + Sync>>;

/// Key under which the active session id is bound.
pub const SESSION_ID_KEY: &str = "::session_id::";

#[derive(Clone, Default)]
pub struct Context {
    store: Option<Arc<Store>>,
}

impl Context {
    /// A context with no store. Reads see nothing; writes fail.
    pub fn background() -> Self {
        Self::default()
    }

    /// Ensure a store is attached.
    ///
    /// Returns the context and whether a store was already present. An
    /// existing store is shared, not replaced.
    pub fn with_store(&self) -> (Context, bool) {
        match &self.store {
            Some(store) => (
                Context {
                    store: Some(Arc::clone(store)),
                },
                true,
            ),
            None => (
                Context {
                    store: Some(Arc::new(Store::new())),
                },
                false,
            ),
        }
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> Result<&Store> {
        self.store.as_deref().ok_or(Error::ContextUninitialized)
    }

    /// Raw lookup.
    pub fn get_any(&self, key: &str) -> Result<Option<Arc<dyn Any + Send + Sync>>> {
        Ok(self.store()?.get(key).map(|v| Arc::clone(v.value())))
    }

    /// Typed lookup. A value bound under `key` with another type is a
    /// `TypeMismatch`.
    pub fn get<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: Any + Clone + Send + Sync,
    {
        let Some(value) = self.get_any(key)? else {
            return Ok(None);
        };
        value
            .downcast_ref::<T>()
            .cloned()
            .map(Some)
            .ok_or_else(|| Error::TypeMismatch {
                expected: type_name::<T>().to_string(),
                found: "a value of another type".to_string(),
            })
    }

    /// Bind `key`. Rebinding an existing key is refused.
    pub fn set<T>(&self, key: impl Into<String>, value: T) -> Result<()>
    where
        T: Any + Send + Sync,
    {
        self.set_any(key.into(), Arc::new(value))
    }

    fn set_any(&self, key: String, value: Arc<dyn Any + Send + Sync>) -> Result<()> {
        match self.store()?.entry(key) {
            Entry::Occupied(e) => Err(Error::DuplicateKey(e.key().clone())),
            Entry::Vacant(e) => {
                e.insert(value);
                Ok(())
            }
        }
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        self.store()?.remove(key);
        Ok(())
    }

    /// Visit every binding. Iteration order is unspecified.
    pub fn for_each<F>(&self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, &Arc<dyn Any + Send + Sync>),
    {
        for entry in self.store()?.iter() {
            f(entry.key(), entry.value());
        }
        Ok(())
    }

    /// A fresh context whose store holds this context's bindings for `keys`.
    /// Keys that are not bound are skipped.
    pub fn copy(&self, keys: &[&str]) -> Result<Context> {
        let source = self.store()?;
        let target = Store::new();
        for key in keys {
            if let Some(value) = source.get(*key) {
                target.insert(key.to_string(), Arc::clone(value.value()));
            }
        }
        Ok(Context {
            store: Some(Arc::new(target)),
        })
    }

    pub fn bind_session_id(&self, id: &SessionId) -> Result<()> {
        self.set(SESSION_ID_KEY, id.clone())
    }

    /// The bound session id, if any. A context without a store has none.
    pub fn session_id(&self) -> Option<SessionId> {
        self.get::<SessionId>(SESSION_ID_KEY).ok().flatten()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.store {
            Some(store) => f
                .debug_struct("Context")
                .field("bindings", &store.len())
                .finish(),
            None => f.write_str("Context(background)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_background_rejects_writes() {
        let ctx = Context::background();
        assert!(matches!(ctx.set("a", 1), Err(Error::ContextUninitialized)));
        assert!(matches!(ctx.get::<i32>("a"), Err(Error::ContextUninitialized)));
        assert!(ctx.session_id().is_none());
    }

    #[test]
    fn test_with_store_reports_existing() {
        let (ctx, cached) = Context::background().with_store();
        assert!(!cached);
        ctx.set("a", 1_i32).unwrap();
        let (same, cached) = ctx.with_store();
        assert!(cached);
        assert_eq!(same.get::<i32>("a").unwrap(), Some(1));
    }

    #[test]
    fn test_duplicate_key_and_type_mismatch() {
        let (ctx, _) = Context::background().with_store();
        ctx.set("a", "x".to_string()).unwrap();
        assert!(matches!(ctx.set("a", "y".to_string()), Err(Error::DuplicateKey(ref k)) if k == "a"));
        assert!(matches!(ctx.get::<i64>("a"), Err(Error::TypeMismatch { .. })));
        assert_eq!(ctx.get::<String>("a").unwrap().as_deref(), Some("x"));
        ctx.delete("a").unwrap();
        assert_eq!(ctx.get::<String>("a").unwrap(), None);
        ctx.set("a", "z".to_string()).unwrap();
    }

    #[test]
    fn test_clones_share_and_siblings_do_not() {
        let (tree_a, _) = Context::background().with_store();
        let (tree_b, _) = Context::background().with_store();
        let child = tree_a.clone();
        let id = SessionId::new();
        child.bind_session_id(&id).unwrap();
        assert_eq!(tree_a.session_id(), Some(id));
        assert!(tree_b.session_id().is_none());
    }

    #[test]
    fn test_copy_selected_keys() {
        let (ctx, _) = Context::background().with_store();
        ctx.set("keep", 1_u8).unwrap();
        ctx.set("drop", 2_u8).unwrap();
        let copied = ctx.copy(&["keep", "missing"]).unwrap();
        assert_eq!(copied.get::<u8>("keep").unwrap(), Some(1));
        assert_eq!(copied.get::<u8>("drop").unwrap(), None);

        copied.set("new", 3_u8).unwrap();
        assert_eq!(ctx.get::<u8>("new").unwrap(), None);

        let mut keys = Vec::new();
        copied.for_each(|k, _| keys.push(k.to_string())).unwrap();
        keys.sort();
        assert_eq!(keys, vec!["keep", "new"]);
    }
}
