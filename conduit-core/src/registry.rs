// Named middleware registry

use crate::middleware::{CallableFn, FnProcessor, Handler, MethodTarget, Processor};
use crate::{Error, HttpRequest, HttpResponse, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

type ProcessorFactory = Arc<dyn Fn() -> Arc<dyn Processor> + Send + Sync>;
type TargetFactory = Arc<dyn Fn() -> Arc<dyn MethodTarget> + Send + Sync>;

#[derive(Clone)]
enum Registered {
    /// Instantiated with no arguments on every use
    Type(ProcessorFactory),
    Function(CallableFn),
    /// Only usable as the receiver of a `(name, method)` spec
    Target(TargetFactory),
}

/// Names that middleware specs may refer to
///
/// Names stand in for class and function names: a string spec is looked up
/// here when it runs, and a `(name, method)` spec is looked up when it is
/// normalized. Clones share one table, so names registered after a spec was
/// queued are still found when it runs.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: Arc<RwLock<HashMap<String, Registered>>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor type built with `Default` each time it runs
    pub fn register_type<P>(&self, name: impl Into<String>)
    where
        P: Processor + Default + 'static,
    {
        self.register_factory(name, P::default);
    }

    /// Register a processor built by `factory` each time it runs
    pub fn register_factory<P, F>(&self, name: impl Into<String>, factory: F)
    where
        P: Processor + 'static,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let factory: ProcessorFactory = Arc::new(move || Arc::new(factory()) as Arc<dyn Processor>);
        self.insert(name.into(), Registered::Type(factory));
    }

    /// Register a named function
    pub fn register_function<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        self.insert(name.into(), Registered::Function(Arc::new(func)));
    }

    /// Register a method receiver type, built with `Default` when resolved
    pub fn register_target<T>(&self, name: impl Into<String>)
    where
        T: MethodTarget + Default + 'static,
    {
        let factory: TargetFactory = Arc::new(|| Arc::new(T::default()) as Arc<dyn MethodTarget>);
        self.insert(name.into(), Registered::Target(factory));
    }

    fn insert(&self, name: String, entry: Registered) {
        debug!(middleware = %name, "Registered named middleware");
        self.entries.write().insert(name, entry);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Whether `name` can run on its own (a type or a function)
    pub fn is_invokable(&self, name: &str) -> bool {
        matches!(
            self.entries.read().get(name),
            Some(Registered::Type(_) | Registered::Function(_))
        )
    }

    /// Build the processor registered under `name`
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Processor>> {
        trace!(middleware = name, "Resolving named middleware");
        let entry = self.entries.read().get(name).cloned();

        match entry {
            Some(Registered::Type(factory)) => Ok(factory()),
            Some(Registered::Function(func)) => Ok(Arc::new(FnProcessor::new(name, func))),
            Some(Registered::Target(_)) => Err(Error::InvalidMiddleware(format!(
                "{} is a method receiver and cannot be invoked directly",
                name
            ))),
            None => Err(Error::MiddlewareNotFound(name.to_string())),
        }
    }

    /// Build the method receiver registered under `name`
    ///
    /// Types implementing [`MethodTarget`] are also accepted when they were
    /// registered as targets only; plain processors are not receivers.
    pub fn target(&self, name: &str) -> Option<Arc<dyn MethodTarget>> {
        match self.entries.read().get(name) {
            Some(Registered::Target(factory)) => Some(factory()),
            _ => None,
        }
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// A unit that names its middleware and resolves it only when it runs
pub(crate) struct LazyProcessor {
    name: String,
    registry: MiddlewareRegistry,
}

impl LazyProcessor {
    pub(crate) fn new(name: String, registry: MiddlewareRegistry) -> Self {
        Self { name, registry }
    }
}

impl Processor for LazyProcessor {
    fn process(&self, request: HttpRequest, handler: &mut dyn Handler) -> Result<HttpResponse> {
        let unit = self.registry.resolve(&self.name)?;
        unit.process(request, handler)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Noop;

    impl Processor for Noop {
        fn process(&self, request: HttpRequest, handler: &mut dyn Handler) -> Result<HttpResponse> {
            handler.handle(request)
        }
    }

    #[derive(Default)]
    struct Controller;

    impl MethodTarget for Controller {
        fn has_method(&self, method: &str) -> bool {
            method == "index"
        }

        fn call_method(
            &self,
            _method: &str,
            _request: HttpRequest,
            _handler: &mut dyn Handler,
        ) -> Result<HttpResponse> {
            Ok(HttpResponse::text("index"))
        }
    }

    #[test]
    fn test_resolve_kinds() {
        let registry = MiddlewareRegistry::new();
        registry.register_type::<Noop>("noop");
        registry.register_function("fn", |request, next| next.handle(request));
        registry.register_target::<Controller>("controller");

        assert!(registry.is_invokable("noop"));
        assert!(registry.is_invokable("fn"));
        assert!(!registry.is_invokable("controller"));
        assert!(registry.contains("controller"));

        assert!(registry.resolve("noop").is_ok());
        assert_eq!(registry.resolve("fn").unwrap().name(), "fn");
        assert!(matches!(
            registry.resolve("controller"),
            Err(Error::InvalidMiddleware(_))
        ));
        assert!(matches!(
            registry.resolve("missing"),
            Err(Error::MiddlewareNotFound(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_target_lookup() {
        let registry = MiddlewareRegistry::new();
        registry.register_target::<Controller>("controller");
        registry.register_type::<Noop>("noop");

        assert!(registry.target("controller").is_some());
        assert!(registry.target("noop").is_none());
        assert_eq!(registry.names(), vec!["controller", "noop"]);
    }
}
