// Application facade

use crate::dispatcher::{Dispatcher, DispatcherBuilder};
use crate::middleware::{Handler, Processor};
use crate::registry::MiddlewareRegistry;
use crate::spec::MiddlewareSpec;
use crate::{AppConfig, Container, HttpRequest, HttpResponse, Result};
use conduit_events::EventManager;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

/// The outward-facing application
///
/// An `App` owns a [`Dispatcher`] together with its container, event manager
/// and middleware registry, and applies the HTTP rules that sit outside the
/// chain itself, such as the empty body of `HEAD` responses.
///
/// # Examples
///
/// ```
/// use conduit_core::{App, HttpRequest, HttpResponse, MiddlewareSpec};
///
/// let mut app = App::new();
/// app.use_middleware(MiddlewareSpec::callable(|request, next| {
///     let response = next.handle(request)?;
///     Ok(response.with_header("X-Served-By", "conduit"))
/// }))
/// .unwrap()
/// .use_middleware(MiddlewareSpec::callable(|_request, _next| {
///     Ok(HttpResponse::text("hello"))
/// }))
/// .unwrap();
///
/// let response = app.handle(HttpRequest::get("/")).unwrap();
/// assert_eq!(response.body_text(), "hello");
/// assert_eq!(response.header_line("x-served-by"), Some("conduit"));
/// ```
pub struct App {
    dispatcher: Dispatcher,
}

impl App {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    /// Queue `spec` at the back
    pub fn use_middleware(&mut self, spec: impl Into<MiddlewareSpec>) -> Result<&mut Self> {
        self.dispatcher.add_middleware(spec, false)?;
        Ok(self)
    }

    pub fn add_middleware(
        &mut self,
        spec: impl Into<MiddlewareSpec>,
        add_to_front: bool,
    ) -> Result<&mut Self> {
        self.dispatcher.add_middleware(spec, add_to_front)?;
        Ok(self)
    }

    pub fn prepend_middleware(&mut self, spec: impl Into<MiddlewareSpec>) -> Result<&mut Self> {
        self.dispatcher.add_middleware(spec, true)?;
        Ok(self)
    }

    /// Run the queued chain for `request`
    ///
    /// For `HEAD` requests the body is dropped from the returned response;
    /// status and headers are untouched.
    pub fn handle(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        let head = request.is_head();
        let response = self.dispatcher.handle(request)?;
        Ok(self.finish(head, response))
    }

    /// Run `spec` in isolation, or the queued chain when `spec` is empty
    ///
    /// `request` defaults to the application's current request.
    pub fn run(
        &mut self,
        spec: impl Into<MiddlewareSpec>,
        request: Option<HttpRequest>,
    ) -> Result<HttpResponse> {
        let head = request
            .as_ref()
            .unwrap_or_else(|| self.dispatcher.request())
            .is_head();
        let response = self.dispatcher.run(spec, request)?;
        Ok(self.finish(head, response))
    }

    fn finish(&self, head: bool, response: HttpResponse) -> HttpResponse {
        if head && self.dispatcher.config().strip_head_body {
            debug!(status = response.status, "Stripping body from HEAD response");
            response.without_body()
        } else {
            response
        }
    }

    /// Append to the current response body
    pub fn write(&mut self, data: impl AsRef<[u8]>) {
        self.dispatcher.response_mut().write(data);
    }

    pub fn clear(&mut self) {
        self.dispatcher.clear();
    }

    pub fn is_running(&self) -> bool {
        self.dispatcher.is_running()
    }

    pub fn has_middleware(&self) -> bool {
        self.dispatcher.has_middleware()
    }

    /// Queued units, front first
    pub fn middleware(&self) -> &VecDeque<Arc<dyn Processor>> {
        self.dispatcher.pending_middleware()
    }

    pub fn request(&self) -> &HttpRequest {
        self.dispatcher.request()
    }

    pub fn set_request(&mut self, request: HttpRequest) {
        self.dispatcher.set_request(request);
    }

    pub fn response(&self) -> &HttpResponse {
        self.dispatcher.response()
    }

    pub fn set_response(&mut self, response: HttpResponse) {
        self.dispatcher.set_response(response);
    }

    pub fn container(&self) -> &Container {
        self.dispatcher.container()
    }

    pub fn events(&self) -> &EventManager {
        self.dispatcher.events()
    }

    pub fn registry(&self) -> &MiddlewareRegistry {
        self.dispatcher.registry()
    }

    pub fn config(&self) -> &AppConfig {
        self.dispatcher.config()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for App {
    fn handle(&mut self, request: HttpRequest) -> Result<HttpResponse> {
        App::handle(self, request)
    }

    fn run(&mut self, spec: MiddlewareSpec, request: Option<HttpRequest>) -> Result<HttpResponse> {
        App::run(self, spec, request)
    }

    fn request(&self) -> &HttpRequest {
        self.dispatcher.request()
    }

    fn response(&self) -> &HttpResponse {
        self.dispatcher.response()
    }

    fn response_mut(&mut self) -> &mut HttpResponse {
        self.dispatcher.response_mut()
    }

    fn container(&self) -> &Container {
        self.dispatcher.container()
    }

    fn events(&self) -> &EventManager {
        self.dispatcher.events()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Builder for an [`App`] with explicit collaborators
#[derive(Default)]
pub struct AppBuilder {
    inner: DispatcherBuilder,
}

impl AppBuilder {
    pub fn container(mut self, container: Container) -> Self {
        self.inner = self.inner.container(container);
        self
    }

    pub fn events(mut self, events: EventManager) -> Self {
        self.inner = self.inner.events(events);
        self
    }

    pub fn registry(mut self, registry: MiddlewareRegistry) -> Self {
        self.inner = self.inner.registry(registry);
        self
    }

    pub fn request(mut self, request: HttpRequest) -> Self {
        self.inner = self.inner.request(request);
        self
    }

    pub fn response(mut self, response: HttpResponse) -> Self {
        self.inner = self.inner.response(response);
        self
    }

    pub fn config(mut self, config: AppConfig) -> Self {
        self.inner = self.inner.config(config);
        self
    }

    pub fn build(self) -> App {
        let dispatcher = self.inner.build();
        info!(
            validate_responses = dispatcher.config().validate_responses,
            dispatch_events = dispatcher.config().dispatch_events,
            "Conduit application created"
        );
        App { dispatcher }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn body(text: &'static str) -> MiddlewareSpec {
        MiddlewareSpec::callable(move |_request, _next| {
            Ok(HttpResponse::text(text).with_header("X-Len", text.len().to_string()))
        })
    }

    #[test]
    fn test_head_strips_body() {
        let mut app = App::new();
        app.use_middleware(body("payload")).unwrap();

        let response = app.handle(HttpRequest::head("/")).unwrap();
        assert!(response.body.is_empty());
        assert_eq!(response.status, 200);
        assert_eq!(response.header_line("X-Len"), Some("7"));
    }

    #[test]
    fn test_head_stripping_can_be_disabled() {
        let mut app = App::with_config(AppConfig {
            strip_head_body: false,
            ..AppConfig::default()
        });
        app.use_middleware(body("payload")).unwrap();

        let response = app.handle(HttpRequest::head("/")).unwrap();
        assert_eq!(response.body_text(), "payload");
    }

    #[test]
    fn test_get_keeps_body() {
        let mut app = App::new();
        app.use_middleware(body("payload")).unwrap();
        assert_eq!(
            app.handle(HttpRequest::get("/")).unwrap().body_text(),
            "payload"
        );
    }

    #[test]
    fn test_run_requires_middleware() {
        let mut app = App::new();
        assert_eq!(app.run((), None), Err(Error::NoMiddleware));
        assert_eq!(
            app.run(Vec::<MiddlewareSpec>::new(), None),
            Err(Error::NoMiddleware)
        );
    }

    #[test]
    fn test_run_isolated_spec_leaves_queue() {
        let mut app = App::new();
        app.use_middleware(body("queued")).unwrap();

        let response = app.run(body("adhoc"), Some(HttpRequest::head("/x"))).unwrap();
        assert!(response.body.is_empty());
        assert_eq!(app.middleware().len(), 1);
    }

    #[test]
    fn test_write_appends() {
        let mut app = App::new();
        app.write("Hello, ");
        app.write(b"world");
        assert_eq!(app.response().body_text(), "Hello, world");
    }

    #[test]
    fn test_shared_collaborators() {
        let container = Container::new();
        container.set("greeting", "hi".to_string()).unwrap();

        let mut app = App::builder().container(container.clone()).build();
        app.use_middleware(MiddlewareSpec::callable(|_request, next| {
            let greeting = next.container().get::<String>("greeting")?;
            Ok(HttpResponse::text(greeting.as_str()))
        }))
        .unwrap();

        assert_eq!(app.handle(HttpRequest::get("/")).unwrap().body_text(), "hi");
        assert!(container.is_frozen("greeting"));
    }
}
