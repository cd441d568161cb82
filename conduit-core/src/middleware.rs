// Middleware processing contract and adapters

use crate::{Container, HttpRequest, HttpResponse, MiddlewareSpec, Result};
use conduit_events::EventManager;
use std::sync::Arc;

/// The capability of continuing a middleware chain
///
/// A handler is handed to every [`Processor`]. Calling [`Handler::handle`]
/// runs the next pending unit of the same chain; returning without calling
/// it short-circuits everything still pending.
pub trait Handler {
    /// Run the next pending unit and return the response it produced
    fn handle(&mut self, request: HttpRequest) -> Result<HttpResponse>;

    /// Run `spec` in an isolated chain that shares this handler's container
    /// and response, without touching this chain's pending units. An empty
    /// spec continues this chain instead.
    fn run(&mut self, spec: MiddlewareSpec, request: Option<HttpRequest>) -> Result<HttpResponse>;

    /// Latest request seen by the chain
    fn request(&self) -> &HttpRequest;

    /// Shared response
    fn response(&self) -> &HttpResponse;

    fn response_mut(&mut self) -> &mut HttpResponse;

    /// Append to the shared response body
    fn write(&mut self, data: &[u8]) {
        self.response_mut().write(data);
    }

    fn container(&self) -> &Container;

    fn events(&self) -> &EventManager;
}

/// A middleware unit: anything that can process a request
///
/// # Example
///
/// ```
/// use conduit_core::{Handler, HttpRequest, HttpResponse, Processor, Result};
///
/// struct PoweredBy;
///
/// impl Processor for PoweredBy {
///     fn process(&self, request: HttpRequest, next: &mut dyn Handler) -> Result<HttpResponse> {
///         let response = next.handle(request)?;
///         Ok(response.with_header("X-Powered-By", "conduit"))
///     }
/// }
/// ```
pub trait Processor: Send + Sync {
    fn process(&self, request: HttpRequest, handler: &mut dyn Handler) -> Result<HttpResponse>;

    /// Identity used as the target of lifecycle events
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Signature shared by closure middleware, registered functions and route handlers
pub type CallableFn =
    Arc<dyn Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync>;

/// A receiver whose methods can be named in a `(receiver, method)` spec
///
/// Method names are checked through [`MethodTarget::has_method`] when the
/// spec is normalized, so a typo fails before anything runs.
pub trait MethodTarget: Send + Sync {
    fn has_method(&self, method: &str) -> bool;

    fn call_method(
        &self,
        method: &str,
        request: HttpRequest,
        handler: &mut dyn Handler,
    ) -> Result<HttpResponse>;

    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapts a callable to the [`Processor`] contract
pub struct FnProcessor {
    name: String,
    func: CallableFn,
}

impl FnProcessor {
    pub fn new(name: impl Into<String>, func: CallableFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl Processor for FnProcessor {
    fn process(&self, request: HttpRequest, handler: &mut dyn Handler) -> Result<HttpResponse> {
        (self.func)(request, handler)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapts a `(receiver, method)` pair to the [`Processor`] contract
pub struct MethodProcessor {
    name: String,
    target: Arc<dyn MethodTarget>,
    method: String,
}

impl MethodProcessor {
    pub fn new(target: Arc<dyn MethodTarget>, method: impl Into<String>) -> Self {
        let method = method.into();
        Self {
            name: format!("{}::{}", target.name(), method),
            target,
            method,
        }
    }
}

impl Processor for MethodProcessor {
    fn process(&self, request: HttpRequest, handler: &mut dyn Handler) -> Result<HttpResponse> {
        self.target.call_method(&self.method, request, handler)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
