// Middleware specifications and their normalization into processors

use crate::middleware::{CallableFn, FnProcessor, Handler, MethodProcessor, MethodTarget, Processor};
use crate::registry::{LazyProcessor, MiddlewareRegistry};
use crate::{Error, HttpRequest, HttpResponse, Result};
use std::sync::Arc;
use tracing::trace;

/// The receiver half of a `(receiver, method)` spec
#[derive(Clone)]
pub enum Receiver {
    /// A live instance
    Object(Arc<dyn MethodTarget>),
    /// A name registered with [`MiddlewareRegistry::register_target`]
    Name(String),
}

/// Everything that can be handed to `use_middleware`
///
/// Specs nest freely through [`MiddlewareSpec::Sequence`]. Falsy leaves
/// (`Empty`, `false`, zero, `""` and `"0"`) are placeholders that normalize
/// to nothing.
///
/// ```
/// use conduit_core::{MiddlewareRegistry, MiddlewareSpec, normalize};
///
/// let spec = MiddlewareSpec::seq([
///     MiddlewareSpec::callable(|request, next| next.handle(request)),
///     MiddlewareSpec::seq([MiddlewareSpec::Empty, false.into(), "".into()]),
/// ]);
///
/// let units = normalize(spec, &MiddlewareRegistry::new()).unwrap();
/// assert_eq!(units.len(), 1);
/// ```
#[derive(Clone)]
pub enum MiddlewareSpec {
    Empty,
    Bool(bool),
    Number(f64),
    /// A registered type or function name, resolved when it runs
    Name(String),
    Processor(Arc<dyn Processor>),
    Callable { name: String, func: CallableFn },
    Method { receiver: Receiver, method: String },
    Sequence(Vec<MiddlewareSpec>),
}

impl MiddlewareSpec {
    pub fn processor<P: Processor + 'static>(processor: P) -> Self {
        MiddlewareSpec::Processor(Arc::new(processor))
    }

    pub fn callable<F>(func: F) -> Self
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        MiddlewareSpec::Callable {
            name: std::any::type_name::<F>().to_string(),
            func: Arc::new(func),
        }
    }

    /// A callable with an explicit event target name
    pub fn named<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        MiddlewareSpec::Callable {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn method<T: MethodTarget + 'static>(target: T, method: impl Into<String>) -> Self {
        MiddlewareSpec::Method {
            receiver: Receiver::Object(Arc::new(target)),
            method: method.into(),
        }
    }

    /// A method of a receiver registered under `receiver`
    pub fn class_method(receiver: impl Into<String>, method: impl Into<String>) -> Self {
        MiddlewareSpec::Method {
            receiver: Receiver::Name(receiver.into()),
            method: method.into(),
        }
    }

    pub fn seq<I>(specs: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<MiddlewareSpec>,
    {
        MiddlewareSpec::Sequence(specs.into_iter().map(Into::into).collect())
    }

    /// Whether this spec normalizes to no units at all
    pub fn is_empty(&self) -> bool {
        match self {
            MiddlewareSpec::Sequence(items) => items.iter().all(MiddlewareSpec::is_empty),
            other => other.is_falsy(),
        }
    }

    fn is_falsy(&self) -> bool {
        match self {
            MiddlewareSpec::Empty => true,
            MiddlewareSpec::Bool(value) => !value,
            MiddlewareSpec::Number(value) => *value == 0.0,
            MiddlewareSpec::Name(name) => name.is_empty() || name == "0",
            _ => false,
        }
    }
}

impl std::fmt::Debug for MiddlewareSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MiddlewareSpec::Empty => f.write_str("Empty"),
            MiddlewareSpec::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            MiddlewareSpec::Number(value) => f.debug_tuple("Number").field(value).finish(),
            MiddlewareSpec::Name(name) => f.debug_tuple("Name").field(name).finish(),
            MiddlewareSpec::Processor(processor) => {
                f.debug_tuple("Processor").field(&processor.name()).finish()
            }
            MiddlewareSpec::Callable { name, .. } => f.debug_tuple("Callable").field(name).finish(),
            MiddlewareSpec::Method { receiver, method } => {
                let receiver = match receiver {
                    Receiver::Object(target) => target.name().to_string(),
                    Receiver::Name(name) => name.clone(),
                };
                f.debug_tuple("Method").field(&receiver).field(method).finish()
            }
            MiddlewareSpec::Sequence(items) => f.debug_list().entries(items).finish(),
        }
    }
}

impl From<()> for MiddlewareSpec {
    fn from(_: ()) -> Self {
        MiddlewareSpec::Empty
    }
}

impl From<bool> for MiddlewareSpec {
    fn from(value: bool) -> Self {
        MiddlewareSpec::Bool(value)
    }
}

impl From<i32> for MiddlewareSpec {
    fn from(value: i32) -> Self {
        MiddlewareSpec::Number(f64::from(value))
    }
}

impl From<f64> for MiddlewareSpec {
    fn from(value: f64) -> Self {
        MiddlewareSpec::Number(value)
    }
}

impl From<&str> for MiddlewareSpec {
    fn from(name: &str) -> Self {
        MiddlewareSpec::Name(name.to_string())
    }
}

impl From<String> for MiddlewareSpec {
    fn from(name: String) -> Self {
        MiddlewareSpec::Name(name)
    }
}

impl From<Arc<dyn Processor>> for MiddlewareSpec {
    fn from(processor: Arc<dyn Processor>) -> Self {
        MiddlewareSpec::Processor(processor)
    }
}

impl From<Vec<MiddlewareSpec>> for MiddlewareSpec {
    fn from(items: Vec<MiddlewareSpec>) -> Self {
        MiddlewareSpec::Sequence(items)
    }
}

impl<T: Into<MiddlewareSpec>> From<Option<T>> for MiddlewareSpec {
    fn from(value: Option<T>) -> Self {
        value.map_or(MiddlewareSpec::Empty, Into::into)
    }
}

/// Flatten `spec` into an ordered list of processors
///
/// Sequences are flattened depth-first, left to right, and falsy leaves are
/// skipped. Shape problems are reported here rather than when the chain
/// runs:
///
/// - `true` or a non-zero number is never a middleware;
/// - a bare name given as the whole spec must already be registered;
/// - a `(receiver, method)` pair must name a known receiver and method.
///
/// Names inside a sequence are kept lazy and resolved when they run.
/// Processors pass through untouched, so normalizing the output of a
/// previous normalization yields the same units.
pub fn normalize(spec: MiddlewareSpec, registry: &MiddlewareRegistry) -> Result<Vec<Arc<dyn Processor>>> {
    let mut units = Vec::new();
    flatten(spec, registry, false, &mut units)?;

    trace!(count = units.len(), "Normalized middleware");
    Ok(units)
}

fn flatten(
    spec: MiddlewareSpec,
    registry: &MiddlewareRegistry,
    nested: bool,
    units: &mut Vec<Arc<dyn Processor>>,
) -> Result<()> {
    if spec.is_falsy() {
        return Ok(());
    }

    match spec {
        MiddlewareSpec::Sequence(items) => {
            for item in items {
                flatten(item, registry, true, units)?;
            }
        }
        MiddlewareSpec::Bool(_) | MiddlewareSpec::Number(_) => {
            return Err(Error::InvalidMiddleware(format!(
                "{:?} is not a middleware",
                spec
            )));
        }
        MiddlewareSpec::Name(name) => {
            if !nested && !registry.is_invokable(&name) {
                return Err(Error::InvalidMiddleware(format!(
                    "'{}' is not a registered middleware",
                    name
                )));
            }
            units.push(Arc::new(LazyProcessor::new(name, registry.clone())));
        }
        MiddlewareSpec::Processor(processor) => units.push(processor),
        MiddlewareSpec::Callable { name, func } => {
            units.push(Arc::new(FnProcessor::new(name, func)));
        }
        MiddlewareSpec::Method { receiver, method } => {
            let target = match receiver {
                Receiver::Object(target) => target,
                Receiver::Name(name) => registry.target(&name).ok_or_else(|| {
                    Error::InvalidMiddleware(format!("'{}' is not a registered receiver", name))
                })?,
            };
            if !target.has_method(&method) {
                return Err(Error::InvalidMiddleware(format!(
                    "{} has no method '{}'",
                    target.name(),
                    method
                )));
            }
            units.push(Arc::new(MethodProcessor::new(target, method)));
        }
        MiddlewareSpec::Empty => {}
    }

    Ok(())
}
