use std::net::SocketAddr;
use std::sync::Arc;

use authpoint_auth::{
    AuthenticatorState, AuthorizationEndpoint, SnapshotStorage, TrustedHeaderAuthenticator,
};
use axum::{Router, routing::get};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::config::{self, AppConfig, SnapshotConfig};
use crate::handlers::{self, AppState};
use crate::storage::{
    InMemoryClientStorage, InMemoryCodeIssuer, InMemorySnapshotStorage, RandomTokenIssuer,
};

pub struct AuthpointServer {
    addr: SocketAddr,
    app: Router,
    snapshots: Arc<dyn SnapshotStorage>,
    codes: Arc<InMemoryCodeIssuer>,
    snapshot_config: SnapshotConfig,
}

/// Wires the endpoint to in-memory collaborators.
pub fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let codes = Arc::new(InMemoryCodeIssuer::new(config::seconds(cfg.codes.max_age_secs)));
    let endpoint = AuthorizationEndpoint::new(
        &cfg.auth,
        Arc::new(InMemoryClientStorage::new(cfg.clients.iter().cloned())),
        codes.clone(),
        Arc::new(RandomTokenIssuer::default()),
    )?;

    Ok(AppState {
        endpoint: Arc::new(endpoint),
        snapshots: Arc::new(InMemorySnapshotStorage::new()),
        codes,
        authenticator: AuthenticatorState::new(Arc::new(TrustedHeaderAuthenticator::default())),
    })
}

pub fn build_router(state: AppState, cfg: &AppConfig) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route(
            "/oauth/authorize",
            get(handlers::authorize_get).post(handlers::authorize_post),
        )
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
                // The query carries state and PKCE values; log the path only.
                tracing::info_span!(
                    "http.request",
                    http.method = %req.method(),
                    http.path = %req.uri().path(),
                )
            }),
        )
        .layer(axum::extract::DefaultBodyLimit::max(cfg.server.body_limit_bytes))
        .with_state(state)
}

pub fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    Ok(build_router(build_state(cfg)?, cfg))
}

/// Periodically drops approval snapshots nobody answered and codes nobody
/// redeemed.
pub fn spawn_cleanup(
    snapshots: Arc<dyn SnapshotStorage>,
    codes: Arc<InMemoryCodeIssuer>,
    snapshot_config: &SnapshotConfig,
) -> JoinHandle<()> {
    let max_age = config::seconds(snapshot_config.max_age_secs);
    let period = std::time::Duration::from_secs(snapshot_config.cleanup_interval_secs);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match snapshots.cleanup_expired(max_age).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(removed, "Expired approval snapshots removed"),
                Err(e) => tracing::warn!(error = %e, "Snapshot cleanup failed"),
            }
            let removed = codes.cleanup_expired();
            if removed > 0 {
                tracing::debug!(removed, "Expired authorization codes removed");
            }
        }
    })
}

pub struct ServerBuilder {
    config: AppConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    pub fn build(self) -> anyhow::Result<AuthpointServer> {
        let state = build_state(&self.config)?;
        let snapshots = state.snapshots.clone();
        let codes = state.codes.clone();
        let app = build_router(state, &self.config);

        Ok(AuthpointServer {
            addr: self.config.addr(),
            app,
            snapshots,
            codes,
            snapshot_config: self.config.snapshots,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthpointServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let cleanup = spawn_cleanup(self.snapshots, self.codes, &self.snapshot_config);

        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        cleanup.abort();
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
