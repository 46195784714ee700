//! HTTP routes exposed by the gateway.

use std::sync::Arc;

use tokio::sync::Notify;

use super::Gateway;
use crate::http::{Request, Response, StatusCode};
use crate::router::Router;

/// Builds the gateway's router.
///
/// `GET /` serves translation queries (`HEAD /` too, through the router's
/// fallback). When `restart` is given, `GET
/// /restart` answers `202 Accepted` and fires it; the binary treats that as
/// a request to stop and exit for its supervisor to restart it.
pub fn router(gateway: Arc<Gateway>, restart: Option<Arc<Notify>>) -> Router {
    let mut router = Router::new();

    router.get("/", move |req: Request| {
        let gateway = Arc::clone(&gateway);
        async move { gateway.respond(&req).await }
    });

    if let Some(restart) = restart {
        router.get("/restart", move |_req: Request| {
            let restart = Arc::clone(&restart);
            async move {
                tracing::warn!("restart requested over HTTP");
                restart.notify_one();
                Response::new(StatusCode::ACCEPTED).body("restarting")
            }
        });
    }

    router
}

#[cfg(test)]
mod tests {
    use super::super::tests::{FakeUpstream, PAPER};
    use super::*;
    use crate::config::GatewayConfig;

    fn request(target: &str) -> Request {
        request_with("GET", target)
    }

    fn request_with(method: &str, target: &str) -> Request {
        let raw = format!("{method} {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    fn gateway() -> Arc<Gateway> {
        Arc::new(Gateway::new(
            &GatewayConfig::default(),
            Arc::new(FakeUpstream::default()),
        ))
    }

    #[tokio::test]
    async fn root_serves_queries() {
        let router = router(gateway(), None);
        let res = router
            .route(request(&format!("/?url={PAPER}&format=doi")))
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.body_bytes(), b"10.9999/abc");
    }

    #[tokio::test]
    async fn head_answers_like_get_without_a_body() {
        let router = router(gateway(), None);
        let target = format!("/?url={PAPER}&format=doi");
        let res = router.route(request_with("HEAD", &target)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("X-Cache"), Some("MISS"));

        let wire = String::from_utf8(res.into_bytes().to_vec()).unwrap();
        assert!(wire.ends_with("Content-Length: 11\r\n\r\n"), "{wire}");
    }

    #[tokio::test]
    async fn restart_is_absent_unless_enabled() {
        let router = router(gateway(), None);
        assert_eq!(router.len(), 1);
        let res = router.route(request("/restart")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn restart_fires_the_signal() {
        let signal = Arc::new(Notify::new());
        let router = router(gateway(), Some(signal.clone()));

        let res = router.route(request("/restart")).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        // notify_one stored a permit, so this resolves immediately
        signal.notified().await;
    }

    #[tokio::test]
    async fn unknown_paths_are_404() {
        let router = router(gateway(), None);
        let res = router.route(request("/export?format=ris")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
