// Routing system for HTTP requests

use crate::logging::{debug, trace};
use crate::traits::Transport;
use crate::{Error, HttpMethod, HttpRequest, HttpResponse};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;

/// A route handler function type
pub type HandlerFn =
    Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> + Send + Sync>;

/// Registration-time description of a route, kept for listing and diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterInfo {
    pub method: HttpMethod,
    pub path: String,
    pub handler_name: String,
    /// Catalog tags of the route's decorators, in chain order
    pub decorators: Vec<String>,
}

/// Route definition with handler
#[derive(Clone)]
pub struct Route {
    pub info: RouterInfo,
    pub handler: HandlerFn,
}

impl Route {
    pub fn new(method: HttpMethod, path: impl Into<String>, handler: HandlerFn) -> Self {
        let path = path.into();
        Self {
            info: RouterInfo {
                method,
                handler_name: format!("{method} {path}"),
                path,
                decorators: Vec::new(),
            },
            handler,
        }
    }

    pub fn from_info(info: RouterInfo, handler: HandlerFn) -> Self {
        Self { info, handler }
    }

    pub fn method(&self) -> HttpMethod {
        self.info.method
    }

    pub fn path(&self) -> &str {
        &self.info.path
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route").field("info", &self.info).finish()
    }
}

/// Router for managing routes and dispatching requests
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registered routes in registration order
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn routes_info(&self) -> Vec<RouterInfo> {
        self.routes.iter().map(|r| r.info.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find a route that matches the request
    pub async fn route(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        let (path, query) = match request.path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (request.path.clone(), None),
        };
        if let Some(query) = query {
            request.query_params = parse_query_string(&query);
            request.path = path.clone();
        }

        let mut path_matched = false;
        for route in &self.routes {
            let Some(params) = match_path(&route.info.path, &path) else {
                continue;
            };
            path_matched = true;
            if !route.info.method.accepts(&request.method) {
                continue;
            }

            trace!(method = %request.method, path = %path, handler = %route.info.handler_name, "Route matched");
            request.path_params = params;
            return (route.handler)(request).await;
        }

        if path_matched {
            Err(Error::MethodNotAllowed(format!("{} {}", request.method, path)))
        } else {
            Err(Error::RouteNotFound(format!("{} {}", request.method, path)))
        }
    }
}

impl Transport for Router {
    /// Rejects a second route on the same path whose method overlaps.
    /// `ANY` overlaps every method.
    fn add_route(&mut self, route: Route) -> Result<(), Error> {
        if self
            .routes
            .iter()
            .any(|r| {
                r.info.path == route.info.path && methods_overlap(r.info.method, route.info.method)
            })
        {
            return Err(Error::DuplicateRoute(format!(
                "{} {}",
                route.info.method, route.info.path
            )));
        }
        debug!(method = %route.info.method, path = %route.info.path, "Route added");
        self.routes.push(route);
        Ok(())
    }
}

fn methods_overlap(a: HttpMethod, b: HttpMethod) -> bool {
    a == b || a == HttpMethod::ANY || b == HttpMethod::ANY
}

/// Match a route path pattern against a request path
/// Returns Some(params) if matched, None otherwise
fn match_path(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if let Some(name) = pattern_part.strip_prefix(':') {
            let value = urlencoding::decode(path_part)
                .map(|s| s.into_owned())
                .unwrap_or_else(|_| path_part.to_string());
            params.insert(name.to_string(), value);
        } else if pattern_part != path_part {
            return None;
        }
    }

    Some(params)
}

/// Parse a query string into a map of parameters; later keys win.
/// `+` is a space here, unlike in path segments.
fn parse_query_string(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (key, value) = part.split_once('=').unwrap_or((part, ""));
            (decode_form(key), decode_form(value))
        })
        .collect()
}

fn decode_form(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_route(method: HttpMethod, path: &str) -> Route {
        let handler: HandlerFn = Arc::new(|req: HttpRequest| -> BoxFuture<'static, _> {
            Box::pin(async move {
                HttpResponse::ok().with_json(&serde_json::json!({
                    "params": req.path_params,
                    "query": req.query_params,
                }))
            })
        });
        Route::new(method, path, handler)
    }

    #[test]
    fn test_match_path_with_params() {
        let params = match_path("/users/:user_id/posts/:post_id", "/users/123/posts/456").unwrap();
        assert_eq!(params.get("user_id"), Some(&"123".to_string()));
        assert_eq!(params.get("post_id"), Some(&"456".to_string()));
        assert!(match_path("/users/:id", "/posts/123").is_none());
        assert!(match_path("/", "/").is_some());
    }

    #[test]
    fn test_parse_query_string_decodes() {
        let params = parse_query_string("name=john%20doe&email=test%40example.com&flag&q=a+b");
        assert_eq!(params.get("name"), Some(&"john doe".to_string()));
        assert_eq!(params.get("email"), Some(&"test@example.com".to_string()));
        assert_eq!(params.get("flag"), Some(&String::new()));
        assert_eq!(params.get("q"), Some(&"a b".to_string()));
        assert!(parse_query_string("").is_empty());
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = Router::new();
        router.add_route(echo_route(HttpMethod::GET, "/role")).unwrap();
        router.add_route(echo_route(HttpMethod::PUT, "/role")).unwrap();
        let err = router
            .add_route(echo_route(HttpMethod::GET, "/role"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute(_)));
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_path_params_keep_plus_signs() {
        let params = match_path("/role/detail/:id", "/role/detail/a+b%20c").unwrap();
        assert_eq!(params.get("id"), Some(&"a+b c".to_string()));
    }

    #[test]
    fn test_any_overlaps_every_method_on_the_same_path() {
        let mut router = Router::new();
        router.add_route(echo_route(HttpMethod::ANY, "/both")).unwrap();
        let err = router
            .add_route(echo_route(HttpMethod::GET, "/both"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute(_)));

        let mut router = Router::new();
        router.add_route(echo_route(HttpMethod::POST, "/both")).unwrap();
        assert!(router.add_route(echo_route(HttpMethod::ANY, "/both")).is_err());
        router.add_route(echo_route(HttpMethod::ANY, "/other")).unwrap();
        assert_eq!(router.len(), 2);
    }

    #[tokio::test]
    async fn test_route_extracts_params_and_query() {
        let mut router = Router::new();
        router
            .add_route(echo_route(HttpMethod::GET, "/role/detail/:id"))
            .unwrap();

        let response = router
            .route(HttpRequest::new("GET", "/role/detail/42?expand=perms"))
            .await
            .unwrap();
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["params"]["id"], "42");
        assert_eq!(body["query"]["expand"], "perms");
    }

    #[tokio::test]
    async fn test_not_found_and_method_not_allowed() {
        let mut router = Router::new();
        router.add_route(echo_route(HttpMethod::GET, "/role")).unwrap();

        let err = router.route(HttpRequest::new("GET", "/user")).await.unwrap_err();
        assert!(matches!(err, Error::RouteNotFound(_)));

        let err = router.route(HttpRequest::new("DELETE", "/role")).await.unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed(_)));
        assert_eq!(err.status_code(), 405);
    }

    #[tokio::test]
    async fn test_any_matches_every_method() {
        let mut router = Router::new();
        router.add_route(echo_route(HttpMethod::ANY, "/hook")).unwrap();
        for method in ["GET", "POST", "PATCH", "OPTIONS"] {
            assert!(router.route(HttpRequest::new(method, "/hook")).await.is_ok());
        }
    }
}
