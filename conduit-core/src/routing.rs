// Routing as middleware

use crate::middleware::{CallableFn, Handler, Processor};
use crate::{Error, HttpRequest, HttpResponse, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// A successful path match
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    /// The registered pattern that matched
    pub pattern: String,
    pub params: Vec<(String, String)>,
}

/// Path matching strategy used by a [`Router`]
pub trait RouteMatcher: Send + Sync {
    /// Register a pattern; each pattern is added once
    fn add(&mut self, pattern: &str) -> Result<()>;

    fn find(&self, path: &str) -> Option<RouteMatch>;
}

/// Radix-tree matcher with `{param}` and `{*catch_all}` segments
pub struct MatchitMatcher {
    inner: matchit::Router<String>,
}

impl Default for MatchitMatcher {
    fn default() -> Self {
        Self {
            inner: matchit::Router::new(),
        }
    }
}

impl RouteMatcher for MatchitMatcher {
    fn add(&mut self, pattern: &str) -> Result<()> {
        self.inner
            .insert(pattern, pattern.to_string())
            .map_err(|e| Error::InvalidRoute(format!("{}: {}", pattern, e)))
    }

    fn find(&self, path: &str) -> Option<RouteMatch> {
        let matched = self.inner.at(path).ok()?;
        Some(RouteMatch {
            pattern: matched.value.clone(),
            params: matched
                .params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        })
    }
}

/// A method and a handler registered under one pattern
#[derive(Clone)]
pub struct Route {
    pub method: String,
    pub pattern: String,
    handler: CallableFn,
}

impl Route {
    /// Whether this route answers `method`; `GET` routes also answer `HEAD`
    pub fn allows(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
            || (self.method == "GET" && method.eq_ignore_ascii_case("HEAD"))
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// A group of routes that acts as a single middleware
///
/// On a match the route's handler is invoked with the path parameters added
/// as request attributes. A path that matches with the wrong method produces
/// a `405` response carrying an `Allow` header. Requests that match nothing
/// are passed on to the next middleware.
///
/// ```
/// use conduit_core::{App, HttpRequest, HttpResponse, MiddlewareSpec, Router};
///
/// let mut router = Router::new();
/// router
///     .get("/users/{id}", |request, _next| {
///         let id = request.attribute("id").and_then(|v| v.as_str()).unwrap_or_default();
///         Ok(HttpResponse::text(format!("user {}", id)))
///     })
///     .unwrap();
///
/// let mut app = App::new();
/// app.use_middleware(MiddlewareSpec::processor(router)).unwrap();
///
/// let response = app.handle(HttpRequest::get("/users/42")).unwrap();
/// assert_eq!(response.body_text(), "user 42");
/// ```
pub struct Router {
    prefix: String,
    routes: HashMap<String, Vec<Route>>,
    matcher: Box<dyn RouteMatcher>,
}

impl Router {
    pub fn new() -> Self {
        Self::with_matcher(MatchitMatcher::default())
    }

    pub fn with_matcher<M: RouteMatcher + 'static>(matcher: M) -> Self {
        Self {
            prefix: String::new(),
            routes: HashMap::new(),
            matcher: Box::new(matcher),
        }
    }

    /// Prepend `prefix` to every pattern registered afterwards
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    pub fn route<F>(&mut self, method: &str, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        let pattern = format!("{}{}", self.prefix, pattern);
        if !pattern.starts_with('/') {
            return Err(Error::InvalidRoute(format!(
                "{} must start with '/'",
                pattern
            )));
        }

        let method = method.to_ascii_uppercase();
        let routes = self.routes.get(&pattern).map(Vec::as_slice).unwrap_or_default();
        if routes.iter().any(|route| route.method == method) {
            return Err(Error::InvalidRoute(format!(
                "{} {} is already registered",
                method, pattern
            )));
        }
        if routes.is_empty() {
            self.matcher.add(&pattern)?;
        }

        debug!(method = %method, pattern = %pattern, "Registered route");
        self.routes.entry(pattern.clone()).or_default().push(Route {
            method,
            pattern,
            handler: Arc::new(handler),
        });
        Ok(self)
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        self.route("GET", pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        self.route("POST", pattern, handler)
    }

    pub fn put<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        self.route("PUT", pattern, handler)
    }

    pub fn delete<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(HttpRequest, &mut dyn Handler) -> Result<HttpResponse> + Send + Sync + 'static,
    {
        self.route("DELETE", pattern, handler)
    }

    /// All registered routes, ordered by pattern
    pub fn routes(&self) -> Vec<&Route> {
        let mut routes: Vec<&Route> = self.routes.values().flatten().collect();
        routes.sort_by(|a, b| a.pattern.cmp(&b.pattern).then(a.method.cmp(&b.method)));
        routes
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for Router {
    fn process(&self, mut request: HttpRequest, handler: &mut dyn Handler) -> Result<HttpResponse> {
        let path = request.path.split('?').next().unwrap_or("/");
        let Some(matched) = self.matcher.find(path) else {
            trace!(path = %request.path, "No route matched");
            return handler.handle(request);
        };

        let routes = self
            .routes
            .get(&matched.pattern)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let Some(route) = routes.iter().find(|route| route.allows(&request.method)) else {
            let allow: Vec<&str> = routes.iter().map(|route| route.method.as_str()).collect();
            debug!(method = %request.method, pattern = %matched.pattern, "Method not allowed");
            return Ok(HttpResponse::new(405).with_header("Allow", allow.join(", ")));
        };

        trace!(method = %route.method, pattern = %route.pattern, "Route matched");
        for (key, value) in matched.params {
            request.attributes.insert(key, value.into());
        }
        (route.handler)(request, handler)
    }

    fn name(&self) -> &str {
        "conduit::Router"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{App, MiddlewareSpec};
    use serde_json::Value;

    fn app_with(router: Router) -> App {
        let mut app = App::new();
        app.use_middleware(MiddlewareSpec::processor(router))
            .unwrap()
            .use_middleware(MiddlewareSpec::callable(|_request, _next| {
                Ok(HttpResponse::not_found())
            }))
            .unwrap();
        app
    }

    #[test]
    fn test_params_become_attributes() {
        let mut router = Router::new();
        router
            .get("/posts/{post}/comments/{id}", |request, _next| {
                assert_eq!(request.attribute("post"), Some(&Value::from("7")));
                let id = request.attribute("id").and_then(Value::as_str).unwrap_or_default();
                Ok(HttpResponse::text(id))
            })
            .unwrap();

        let mut app = app_with(router);
        let response = app.handle(HttpRequest::get("/posts/7/comments/3")).unwrap();
        assert_eq!(response.body_text(), "3");
    }

    #[test]
    fn test_unmatched_falls_through() {
        let mut router = Router::new();
        router.get("/", |_r, _n| Ok(HttpResponse::ok())).unwrap();

        let mut app = app_with(router);
        assert_eq!(
            app.handle(HttpRequest::get("/nowhere")),
            Err(Error::RouteNotFound("/nowhere".into()))
        );
    }

    #[test]
    fn test_wrong_method() {
        fn items() -> Router {
            let mut router = Router::new();
            router
                .get("/items", |_r, _n| Ok(HttpResponse::ok()))
                .unwrap()
                .post("/items", |_r, _n| Ok(HttpResponse::new(201)))
                .unwrap();
            router
        }

        let mut app = app_with(items());
        assert_eq!(
            app.handle(HttpRequest::new("DELETE", "/items")),
            Err(Error::MethodNotAllowed("DELETE".into()))
        );

        // Units are consumed by a pass, so the second request gets a fresh app
        let mut app = app_with(items());
        assert_eq!(app.handle(HttpRequest::post("/items")).unwrap().status, 201);
    }

    #[test]
    fn test_head_uses_get_route() {
        let mut router = Router::new();
        router
            .get("/page", |_r, _n| Ok(HttpResponse::text("content")))
            .unwrap();

        let mut app = app_with(router);
        let response = app.handle(HttpRequest::head("/page")).unwrap();
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_prefix_and_duplicates() {
        let mut router = Router::new().with_prefix("/api/");
        router.get("/health", |_r, _n| Ok(HttpResponse::ok())).unwrap();
        assert_eq!(router.routes()[0].pattern, "/api/health");

        assert!(matches!(
            router.get("/health", |_r, _n| Ok(HttpResponse::ok())),
            Err(Error::InvalidRoute(_))
        ));
        assert!(matches!(
            Router::new().get("health", |_r, _n| Ok(HttpResponse::ok())),
            Err(Error::InvalidRoute(_))
        ));
    }

    #[test]
    fn test_custom_matcher() {
        #[derive(Default)]
        struct Exact(Vec<String>);

        impl RouteMatcher for Exact {
            fn add(&mut self, pattern: &str) -> Result<()> {
                self.0.push(pattern.to_string());
                Ok(())
            }

            fn find(&self, path: &str) -> Option<RouteMatch> {
                self.0.iter().find(|p| *p == path).map(|pattern| RouteMatch {
                    pattern: pattern.clone(),
                    params: Vec::new(),
                })
            }
        }

        let mut router = Router::with_matcher(Exact::default());
        router.get("/{literal}", |_r, _n| Ok(HttpResponse::text("exact"))).unwrap();

        let mut app = app_with(router);
        assert_eq!(
            app.handle(HttpRequest::get("/{literal}")).unwrap().body_text(),
            "exact"
        );
    }
}
