mod config;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use inbox_api::auth::{AppState, AppStateInner};
use inbox_api::router::build_router;
use inbox_backend::auth::{AuthProvider, LocalAuth, RestAuth};
use inbox_backend::rest::RestBackend;
use inbox_backend::{Backend, seed};
use inbox_gateway::registry::{self, WorkspaceRegistry};

use crate::config::{Config, Mode};

const REAPER_INTERVAL_SECS: u64 = 60;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inbox_server=debug,inbox_api=debug,inbox_gateway=debug,inbox_backend=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let (auth, backend, profiles) = match (&config.hosted, &config.demo) {
        (Some(hosted), _) => {
            let client = reqwest::Client::new();
            let auth: Arc<dyn AuthProvider> = Arc::new(RestAuth::new(
                client.clone(),
                &hosted.backend_url,
                &hosted.backend_key,
                &config.jwt_secret,
            ));
            let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(
                client,
                hosted.backend_url.clone(),
                hosted.backend_key.clone(),
            ));
            info!("Hosted mode against {}", hosted.backend_url);
            (auth, backend, HashMap::new())
        }
        (None, Some(demo)) => {
            let auth: Arc<dyn AuthProvider> =
                Arc::new(LocalAuth::new(&demo.email, &demo.password, &config.jwt_secret)?);
            let backend: Arc<dyn Backend> = Arc::new(seed::demo_backend().await);
            warn!("Demo mode: in-memory data, sign in as {}", demo.email);
            (auth, backend, seed::demo_profiles())
        }
        (None, None) => anyhow::bail!("no backend configured for {:?} mode", config.mode),
    };

    let state: AppState = Arc::new(AppStateInner {
        auth,
        backend,
        workspaces: WorkspaceRegistry::new(),
        profiles,
        secure_cookies: config.secure_cookies,
    });

    // Sessions that expire without signing out still hold a workspace
    tokio::spawn(registry::run_reaper(state.workspaces.clone(), REAPER_INTERVAL_SECS));

    let app = build_router(state.clone())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        "Inbox server listening on {} ({})",
        addr,
        if config.mode == Mode::Hosted { "hosted" } else { "demo" }
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release every live subscription before exit.
    state.workspaces.shutdown_all().await;
    info!("Inbox server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
