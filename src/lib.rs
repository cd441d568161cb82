// Conduit - a middleware pipeline framework for Rust
//
// Middleware of any supported shape is normalized into one ordered chain,
// run over a shared request and response, and validated after every step.

// Re-export core functionality
pub use conduit_core::*;

// Re-export the event system
pub use conduit_events;

// Re-export optional crates
#[cfg(feature = "config")]
pub use conduit_config;

/// Prelude for common imports
///
/// ```
/// use conduit::prelude::*;
///
/// let mut app = App::new();
/// app.use_middleware(MiddlewareSpec::callable(|_request, _next| {
///     Ok(HttpResponse::text("ok"))
/// }))
/// .unwrap();
/// assert_eq!(app.handle(HttpRequest::get("/")).unwrap().status, 200);
/// ```
pub mod prelude {
    pub use conduit_core::{
        App, AppConfig, Container, Dispatcher, Error, Handler, HttpRequest, HttpResponse,
        MethodTarget, MiddlewareRegistry, MiddlewareSpec, Processor, Result, Router,
    };
    pub use conduit_events::{Event, EventManager, EventParams, listener};

    #[cfg(feature = "config")]
    pub use conduit_config::{ConfigLoader, EnvLoader, load_config};
}
