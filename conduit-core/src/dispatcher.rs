// Middleware dispatcher

use crate::middleware::{Handler, Processor};
use crate::registry::MiddlewareRegistry;
use crate::spec::{MiddlewareSpec, normalize};
use crate::validation::validate_response;
use crate::{AppConfig, Container, Error, HttpRequest, HttpResponse, Result};
use conduit_events::{EventManager, EventParams};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Fired before a unit runs, targeting that unit
pub const BEFORE_DISPATCH: &str = "before.dispatch";
/// Fired when the chain resumes after a unit, targeting the last unit that ran
pub const AFTER_DISPATCH: &str = "after.dispatch";
/// Fired once the pending queue has been drained
pub const DONE_DISPATCH: &str = "done.dispatch";

/// Runs a queue of middleware units over a shared request and response
///
/// Each call to [`Dispatcher::handle`] validates the response produced so
/// far, pops the next pending unit and runs it with the dispatcher itself as
/// the [`Handler`]. A unit continues the chain by calling `handle` again, so
/// one pass over the queue is a stack of nested `handle` frames.
///
/// ```
/// use conduit_core::{Dispatcher, HttpRequest, MiddlewareSpec};
///
/// let mut dispatcher = Dispatcher::new();
/// dispatcher
///     .add_middleware(MiddlewareSpec::callable(|request, next| {
///         next.write(b"hello ");
///         next.handle(request)
///     }), false)
///     .unwrap()
///     .add_middleware(MiddlewareSpec::callable(|request, next| {
///         next.write(b"world");
///         next.handle(request)
///     }), false)
///     .unwrap();
///
/// let response = dispatcher.handle(HttpRequest::get("/")).unwrap();
/// assert_eq!(response.body_text(), "hello world");
/// ```
pub struct Dispatcher {
    pending: VecDeque<Arc<dyn Processor>>,
    processed: Vec<Arc<dyn Processor>>,
    running: bool,
    /// Number of `handle` frames currently on the stack
    depth: usize,
    request: HttpRequest,
    response: HttpResponse,
    events: EventManager,
    container: Container,
    registry: MiddlewareRegistry,
    config: AppConfig,
}

impl Dispatcher {
    /// Dispatcher with fresh collaborators and default configuration
    pub fn new() -> Self {
        DispatcherBuilder::new().build()
    }

    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Normalize `spec` and queue the resulting units
    ///
    /// With `add_to_front` the units are placed ahead of everything pending,
    /// keeping their own relative order.
    pub fn add_middleware(
        &mut self,
        spec: impl Into<MiddlewareSpec>,
        add_to_front: bool,
    ) -> Result<&mut Self> {
        let units = normalize(spec.into(), &self.registry)?;
        debug!(count = units.len(), add_to_front, "Queueing middleware");

        if add_to_front {
            for unit in units.into_iter().rev() {
                self.pending.push_front(unit);
            }
        } else {
            self.pending.extend(units);
        }
        Ok(self)
    }

    pub fn prepend_middleware(&mut self, spec: impl Into<MiddlewareSpec>) -> Result<&mut Self> {
        self.add_middleware(spec, true)
    }

    /// Drop pending and processed units
    pub fn clear(&mut self) {
        self.pending.clear();
        self.processed.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_middleware(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_middleware(&self) -> &VecDeque<Arc<dyn Processor>> {
        &self.pending
    }

    pub fn processed_middleware(&self) -> &[Arc<dyn Processor>] {
        &self.processed
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn set_request(&mut self, request: HttpRequest) {
        self.request = request;
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    pub fn set_response(&mut self, response: HttpResponse) {
        self.response = response;
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn registry(&self) -> &MiddlewareRegistry {
        &self.registry
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run the next pending unit
    ///
    /// Fails with [`Error::NoMiddleware`] when called from outside a running
    /// chain with nothing queued. Once the queue is drained the current
    /// response is returned as-is. When the outermost frame returns, whether
    /// by completion, short-circuit or error, the dispatcher is idle again;
    /// units a short-circuit skipped stay pending.
    pub fn handle(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        if !self.running && self.pending.is_empty() {
            return Err(Error::NoMiddleware);
        }

        self.depth += 1;
        let result = self.step(request);
        self.depth -= 1;

        if self.depth == 0 {
            if !self.pending.is_empty() {
                debug!(
                    remaining = self.pending.len(),
                    "Chain returned before draining the pending queue"
                );
            }
            self.running = false;
            self.processed.clear();
        }
        result
    }

    fn step(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        self.running = true;
        self.validate(&request, &self.response)?;

        if let Some(last) = self.processed.last().cloned() {
            self.notify(AFTER_DISPATCH, Some(last.name()));
        }

        let Some(unit) = self.pending.pop_front() else {
            self.processed.clear();
            self.running = false;
            self.request = request;
            self.notify(DONE_DISPATCH, None);
            return Ok(self.response.clone());
        };

        self.processed.push(unit.clone());
        self.notify(BEFORE_DISPATCH, Some(unit.name()));

        trace!(middleware = unit.name(), path = %request.path, "Running middleware");
        self.request = request.clone();
        let response = unit.process(request.clone(), self)?;

        self.validate(&request, &response)?;
        self.response = response.clone();
        Ok(response)
    }

    /// Run `spec` in an isolated sibling, or continue this chain if it is empty
    ///
    /// The sibling shares the container, events and registry and starts from
    /// a copy of the current response. Its final request becomes this
    /// dispatcher's request; its response is returned without replacing this
    /// dispatcher's response.
    pub fn run(
        &mut self,
        spec: impl Into<MiddlewareSpec>,
        request: Option<HttpRequest>,
    ) -> Result<HttpResponse> {
        let spec = spec.into();
        let request = request.unwrap_or_else(|| self.request.clone());

        if spec.is_empty() {
            return self.handle(request);
        }

        let mut sibling = self.sibling(request.clone());
        sibling.add_middleware(spec, false)?;

        trace!(count = sibling.pending.len(), "Running nested chain");
        let response = sibling.handle(request)?;
        self.request = sibling.request;
        Ok(response)
    }

    fn sibling(&self, request: HttpRequest) -> Dispatcher {
        Dispatcher {
            pending: VecDeque::new(),
            processed: Vec::new(),
            running: false,
            depth: 0,
            request,
            response: self.response.clone(),
            events: self.events.clone(),
            container: self.container.clone(),
            registry: self.registry.clone(),
            config: self.config.clone(),
        }
    }

    fn validate(&self, request: &HttpRequest, response: &HttpResponse) -> Result<()> {
        if self.config.validate_responses {
            validate_response(request, response)?;
        }
        Ok(())
    }

    fn notify(&self, name: &str, target: Option<&str>) {
        // Skip serializing the response when nobody listens
        if !self.config.dispatch_events || !self.events.has_listeners(name) {
            return;
        }
        let mut params = EventParams::new();
        params.insert("response".to_string(), self.response.to_value());
        params.insert(
            "path".to_string(),
            Value::String(self.request.path.clone()),
        );
        self.events.trigger(name, target, params);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for Dispatcher {
    fn handle(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        Dispatcher::handle(self, request)
    }

    fn run(&mut self, spec: MiddlewareSpec, request: Option<HttpRequest>) -> Result<HttpResponse> {
        Dispatcher::run(self, spec, request)
    }

    fn request(&self) -> &HttpRequest {
        &self.request
    }

    fn response(&self) -> &HttpResponse {
        &self.response
    }

    fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    fn container(&self) -> &Container {
        &self.container
    }

    fn events(&self) -> &EventManager {
        &self.events
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending: Vec<&str> = self.pending.iter().map(|unit| unit.name()).collect();
        f.debug_struct("Dispatcher")
            .field("pending", &pending)
            .field("processed", &self.processed.len())
            .field("running", &self.running)
            .field("request", &self.request)
            .field("status", &self.response.status)
            .finish()
    }
}

/// Collaborators for a [`Dispatcher`]; anything left unset gets a fresh default
#[derive(Default)]
pub struct DispatcherBuilder {
    request: Option<HttpRequest>,
    response: Option<HttpResponse>,
    events: Option<EventManager>,
    container: Option<Container>,
    registry: Option<MiddlewareRegistry>,
    config: Option<AppConfig>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(mut self, request: HttpRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn response(mut self, response: HttpResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub fn events(mut self, events: EventManager) -> Self {
        self.events = Some(events);
        self
    }

    pub fn container(mut self, container: Container) -> Self {
        self.container = Some(container);
        self
    }

    pub fn registry(mut self, registry: MiddlewareRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            pending: VecDeque::new(),
            processed: Vec::new(),
            running: false,
            depth: 0,
            request: self.request.unwrap_or_default(),
            response: self.response.unwrap_or_default(),
            events: self.events.unwrap_or_default(),
            container: self.container.unwrap_or_default(),
            registry: self.registry.unwrap_or_default(),
            config: self.config.unwrap_or_default(),
        }
    }
}
