//! # bibgate
//!
//! A caching gateway in front of a Zotero translation server.
//!
//! A client asks for `GET /?url=<page>&format=<fmt>`. The gateway resolves
//! the page through the translation server's `/web` endpoint, renders the
//! metadata through `/export`, and memoizes the outcome per `(url, format)`.
//! The pseudo-format `doi` renders RIS and answers with the DOI alone.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bibgate::config::GatewayConfig;
//! use bibgate::gateway::{self, Gateway};
//! use bibgate::server::Server;
//! use bibgate::upstream::TranslationServer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::default();
//!     let upstream = TranslationServer::new(config.upstream_base_url.clone(), None)?;
//!     let gateway = Arc::new(Gateway::new(&config, Arc::new(upstream)));
//!     let router = Arc::new(gateway::router(gateway, None));
//!
//!     let server = Server::bind(&config.listen_addr).await?;
//!     server
//!         .run(move |req| {
//!             let router = Arc::clone(&router);
//!             async move { router.route(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod doi;
pub mod gateway;
pub mod http;
pub mod router;
pub mod server;
pub mod upstream;

pub use cache::{CacheKey, CachedOutcome, ResultCache};
pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayError, Query};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
