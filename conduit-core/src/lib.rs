// Core library for the Conduit middleware framework
// This module contains the middleware contract, the normalizer, the dispatcher and the application facade

pub mod application;
pub mod config;
pub mod container;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod routing;
pub mod spec;
pub mod status;
pub mod validation;

// Re-export commonly used types
pub use application::*;
pub use config::*;
pub use container::*;
pub use dispatcher::*;
pub use error::*;
pub use http::*;
pub use middleware::*;
pub use registry::MiddlewareRegistry;
pub use routing::{MatchitMatcher, Route, RouteMatch, RouteMatcher, Router};
pub use spec::*;
pub use status::*;
pub use validation::*;

pub use conduit_events::{Event, EventManager, EventParams, Listener, listener};
