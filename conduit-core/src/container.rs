// Dependency injection container

use crate::{Error, Result};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

type Shared = Arc<dyn Any + Send + Sync>;
type FactoryFn = Arc<dyn Fn(&Container) -> Shared + Send + Sync>;

#[derive(Clone)]
enum Entry {
    /// A ready value
    Value(Shared),
    /// Built on first resolution, then cached as a value
    Shared(FactoryFn),
    /// Built again on every resolution
    Factory(FactoryFn),
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    frozen: HashSet<String>,
}

/// A string-keyed service container
///
/// Keys hold values, shared factories or per-call factories. A key is frozen
/// as soon as it has been resolved once (or explicitly through
/// [`Container::freeze`]); frozen keys can no longer be overwritten.
///
/// Clones share the same store, so the container handed to an application
/// is also the one its nested dispatchers see.
#[derive(Clone, Default)]
pub struct Container {
    inner: Arc<RwLock<Inner>>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new DI container");
        Self::default()
    }

    /// Register a value under `key`
    pub fn set<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Result<()> {
        self.insert(key.into(), Entry::Value(Arc::new(value)))
    }

    /// Register a factory whose result is built once and then reused
    pub fn share<T, F>(&self, key: impl Into<String>, factory: F) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> T + Send + Sync + 'static,
    {
        self.insert(key.into(), Entry::Shared(erase(factory)))
    }

    /// Register a factory that builds a new instance on every resolution
    pub fn factory<T, F>(&self, key: impl Into<String>, factory: F) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn(&Container) -> T + Send + Sync + 'static,
    {
        self.insert(key.into(), Entry::Factory(erase(factory)))
    }

    fn insert(&self, key: String, entry: Entry) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.frozen.contains(&key) {
            return Err(Error::ContainerFrozen(key));
        }
        inner.entries.insert(key.clone(), entry);

        debug!(provider = %key, "Provider registered in container");
        Ok(())
    }

    /// Resolve `key` as a `T`
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Result<Arc<T>> {
        trace!(provider = key, "Attempting to resolve provider");

        // Factories run without the lock held so they can resolve other keys
        let entry = self
            .inner
            .read()
            .entries
            .get(key)
            .cloned()
            .ok_or_else(|| Error::ProviderNotFound(key.to_string()))?;

        let value = match entry {
            Entry::Value(value) => value,
            Entry::Factory(factory) => factory(self),
            Entry::Shared(factory) => {
                let built = factory(self);
                let mut inner = self.inner.write();
                // Another caller may have finished first; keep its instance
                let cached = match inner.entries.get(key) {
                    Some(Entry::Value(existing)) => Some(existing.clone()),
                    _ => None,
                };
                match cached {
                    Some(existing) => existing,
                    None => {
                        inner
                            .entries
                            .insert(key.to_string(), Entry::Value(built.clone()));
                        built
                    }
                }
            }
        };

        self.inner.write().frozen.insert(key.to_string());

        value.downcast::<T>().map_err(|_| Error::ProviderType {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    /// Check if a key is registered
    pub fn has(&self, key: &str) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    /// Remove a key, lifting its frozen state. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.inner.write();
        inner.frozen.remove(key);
        let existed = inner.entries.remove(key).is_some();

        debug!(provider = key, existed, "Provider removed from container");
        existed
    }

    /// Freeze a key so it can no longer be replaced
    pub fn freeze(&self, key: impl Into<String>) {
        self.inner.write().frozen.insert(key.into());
    }

    pub fn is_frozen(&self, key: &str) -> bool {
        self.inner.read().frozen.contains(key)
    }

    /// Registered keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.read().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Clear all providers and frozen marks
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        let count = inner.entries.len();
        inner.entries.clear();
        inner.frozen.clear();

        debug!(provider_count = count, "Cleared all providers from container");
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("keys", &self.keys()).finish()
    }
}

fn erase<T, F>(factory: F) -> FactoryFn
where
    T: Any + Send + Sync,
    F: Fn(&Container) -> T + Send + Sync + 'static,
{
    Arc::new(move |container: &Container| Arc::new(factory(container)) as Shared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_set_and_get() {
        let container = Container::new();
        container.set("name", "conduit".to_string()).unwrap();

        let name = container.get::<String>("name").unwrap();
        assert_eq!(name.as_str(), "conduit");
    }

    #[test]
    fn test_resolution_freezes_key() {
        let container = Container::new();
        container.set("port", 8080u16).unwrap();
        container.set("port", 9090u16).unwrap();
        assert_eq!(*container.get::<u16>("port").unwrap(), 9090);

        assert!(container.is_frozen("port"));
        assert_eq!(
            container.set("port", 1u16),
            Err(Error::ContainerFrozen("port".into()))
        );
    }

    #[test]
    fn test_shared_factory_builds_once() {
        let container = Container::new();
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = builds.clone();
        container
            .share("service", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                vec![1, 2, 3]
            })
            .unwrap();

        let a = container.get::<Vec<i32>>("service").unwrap();
        let b = container.get::<Vec<i32>>("service").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_builds_every_time() {
        let container = Container::new();
        container.factory("list", |_| Vec::<u8>::new()).unwrap();

        let a = container.get::<Vec<u8>>("list").unwrap();
        let b = container.get::<Vec<u8>>("list").unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_factory_can_resolve_dependencies() {
        let container = Container::new();
        container.set("greeting", "hello".to_string()).unwrap();
        container
            .share("message", |c| {
                let greeting = c.get::<String>("greeting").unwrap();
                format!("{} world", greeting)
            })
            .unwrap();

        assert_eq!(
            container.get::<String>("message").unwrap().as_str(),
            "hello world"
        );
    }

    #[test]
    fn test_missing_and_mistyped() {
        let container = Container::new();
        assert_eq!(
            container.get::<String>("missing").unwrap_err(),
            Error::ProviderNotFound("missing".into())
        );

        container.set("n", 1u32).unwrap();
        assert!(matches!(
            container.get::<String>("n"),
            Err(Error::ProviderType { .. })
        ));
    }

    #[test]
    fn test_remove_unfreezes() {
        let container = Container::new();
        container.set("k", 1u8).unwrap();
        container.get::<u8>("k").unwrap();
        assert!(container.remove("k"));
        assert!(!container.has("k"));
        container.set("k", 2u8).unwrap();
        assert_eq!(container.keys(), vec!["k".to_string()]);
    }
}
