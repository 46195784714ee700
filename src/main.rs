use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::info;

use bibgate::config::GatewayConfig;
use bibgate::gateway::{self, Gateway};
use bibgate::Request;
use bibgate::server::Server;
use bibgate::upstream::TranslationServer;

/// Exit status after `GET /restart`; a supervisor is expected to restart us.
const RESTART_EXIT_CODE: u8 = 10;

/// Time given to the `/restart` response to reach the client before exiting.
const RESTART_GRACE: Duration = Duration::from_millis(200);

/// Logs to stdout at the level given by `RUST_LOG`, `info` by default.
fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    init_logging();

    let config = GatewayConfig::from_env()?;
    info!(
        upstream = %config.upstream_base_url,
        single_flight = config.single_flight,
        restart_enabled = config.restart_enabled,
        "starting bibgate"
    );

    let upstream =
        TranslationServer::new(config.upstream_base_url.clone(), config.upstream_timeout)?;
    let gateway = Arc::new(Gateway::new(&config, Arc::new(upstream)));

    let restart = config.restart_enabled.then(|| Arc::new(Notify::new()));
    let router = Arc::new(gateway::router(gateway, restart.clone()));

    let server = Server::bind(&config.listen_addr).await?;
    let handler = move |req: Request| {
        let router = Arc::clone(&router);
        async move { router.route(req).await }
    };

    match restart {
        Some(signal) => {
            server
                .run_until(handler, async move { signal.notified().await })
                .await?;
            tokio::time::sleep(RESTART_GRACE).await;
            info!("exiting for restart");
            Ok(ExitCode::from(RESTART_EXIT_CODE))
        }
        None => {
            server.run(handler).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
