//! Request routing: map an HTTP method and exact path to a handler.
//!
//! The gateway exposes a handful of fixed endpoints, so routes are literal
//! paths. Trailing slashes are normalized on both sides, so `/restart/` and
//! `/restart` are the same route. The first registered match wins and an
//! unmatched request gets `404 Not Found`.
//!
//! A `HEAD` request with no route of its own is served by the `GET` route for
//! the same path, and every `HEAD` response goes out without its body.
//!
//! Every dispatched request produces one access-log line with the method,
//! path, status and elapsed time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;

use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler stored by the router.
pub type Handler =
    Arc<dyn Fn(Request) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

impl Route {
    fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.path == normalize(path)
    }
}

/// Method + exact-path router.
///
/// # Examples
///
/// ```rust,no_run
/// use bibgate::{Router, Response, StatusCode};
///
/// let mut router = Router::new();
/// router.get("/health", |_req| async { Response::new(StatusCode::OK).body("ok") });
/// assert_eq!(router.len(), 1);
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` requests to `path`.
    pub fn add<H, F>(&mut self, method: Method, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |req: Request| {
            Box::pin(handler(req)) as Pin<Box<dyn Future<Output = Response> + Send>>
        });
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
        self
    }

    pub fn get<H, F>(&mut self, path: &str, handler: H) -> &mut Self
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.add(Method::Get, path, handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn find(&self, method: &Method, path: &str) -> Option<Handler> {
        self.routes
            .iter()
            .find(|route| route.matches(method, path))
            .map(|route| Arc::clone(&route.handler))
    }

    /// Dispatches `request` to the first matching route and logs the result.
    pub async fn route(&self, request: Request) -> Response {
        let start = Instant::now();
        let method = request.method().clone();
        let path = request.path().to_owned();

        let handler = self.find(&method, &path).or_else(|| match method {
            Method::Head => self.find(&Method::Get, &path),
            _ => None,
        });

        let mut response = match handler {
            Some(handler) => handler(request).await,
            None => Response::new(StatusCode::NOT_FOUND),
        };
        if method == Method::Head {
            response = response.without_body();
        }

        tracing::info!(
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            elapsed = ?start.elapsed(),
            "request served"
        );

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn normalize_strips_trailing_slash_but_not_root() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/restart/"), "/restart");
        assert_eq!(normalize("/restart"), "/restart");
    }

    #[test]
    fn router_starts_empty() {
        let router = Router::new();
        assert!(router.is_empty());
        assert_eq!(router.len(), 0);
    }

    #[tokio::test]
    async fn empty_router_returns_404() {
        let router = Router::new();
        let res = router.route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn root_route_ignores_query_string() {
        let mut router = Router::new();
        router.get("/", |req: Request| async move {
            let url = req.query_param("url").unwrap_or("").to_owned();
            Response::new(StatusCode::OK).body(url)
        });
        let res = router.route(make_request("GET", "/?url=abc")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body_bytes(), b"abc");
    }

    #[tokio::test]
    async fn method_must_match() {
        let mut router = Router::new();
        router.get("/", |_req| async { Response::new(StatusCode::OK) });
        let res = router.route(make_request("POST", "/")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn head_falls_back_to_get_without_body() {
        let mut router = Router::new();
        router.get("/", |_req| async { Response::new(StatusCode::OK).body("hello") });
        let res = router.route(make_request("HEAD", "/")).await;
        assert_eq!(res.status(), StatusCode::OK);

        let wire = String::from_utf8(res.into_bytes().to_vec()).unwrap();
        assert!(wire.ends_with("Content-Length: 5\r\n\r\n"), "{wire}");
    }

    #[tokio::test]
    async fn explicit_head_route_wins() {
        let mut router = Router::new();
        router
            .get("/", |_req| async { Response::new(StatusCode::OK) })
            .add(Method::Head, "/", |_req| async { Response::new(StatusCode::ACCEPTED) });
        let res = router.route(make_request("HEAD", "/")).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn trailing_slash_is_normalized() {
        let mut router = Router::new();
        router.get("/restart", |_req| async { Response::new(StatusCode::ACCEPTED) });
        let res = router.route(make_request("GET", "/restart/")).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router
            .get("/path", |_req| async { Response::new(StatusCode::OK) })
            .get("/path", |_req| async { Response::new(StatusCode::ACCEPTED) });
        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(router.len(), 2);
    }
}
