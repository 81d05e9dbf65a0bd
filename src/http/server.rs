//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, timeout, tracing, APM tracking)
//! - Bind server to listener
//! - Apply configuration updates while running

use arc_swap::ArcSwap;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::apm::Apm;
use crate::config::PrismaConfig;
use crate::correlation::{AnalyticsClient, Correlator};
use crate::health::HealthAggregator;
use crate::http::handlers;
use crate::http::middleware::apm_tracking;
use crate::lifecycle::startup::{self, StartupError};
use crate::portfolio::PortfolioStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ArcSwap<PrismaConfig>>,
    pub apm: Arc<Apm>,
    pub health: Arc<HealthAggregator>,
    pub correlator: Correlator,
    pub portfolios: PortfolioStore,
}

impl AppState {
    pub fn new(
        config: PrismaConfig,
        apm: Arc<Apm>,
        health: Arc<HealthAggregator>,
        analytics: Arc<dyn AnalyticsClient>,
        portfolios: PortfolioStore,
    ) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            correlator: Correlator::new(apm.clone(), analytics),
            apm,
            health,
            portfolios,
        }
    }

    /// Swap in a reloaded configuration.
    ///
    /// The APM switch and publishing domain take effect immediately; listener,
    /// health and observability settings need a restart.
    pub fn apply_config(&self, config: PrismaConfig) {
        self.apm.set_enabled(config.apm.enabled);
        tracing::info!(
            apm_enabled = config.apm.enabled,
            base_domain = %config.portfolio.base_domain,
            "Configuration updated"
        );
        self.config.store(Arc::new(config));
    }
}

/// HTTP server for the telemetry service.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Build every subsystem from `config` and the router on top of them.
    pub fn new(config: PrismaConfig) -> Result<Self, StartupError> {
        let state = startup::build_state(config)?;
        Ok(Self::from_state(state))
    }

    pub fn from_state(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<PrismaConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                state.apply_config(config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.load().timeouts.request_secs);

    let api = Router::new()
        .route("/api/portfolios", get(handlers::list_portfolios))
        .route("/api/portfolios/{slug}", get(handlers::get_portfolio))
        .route_layer(middleware::from_fn_with_state(state.clone(), apm_tracking));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/health/{name}", get(handlers::health_check))
        .route("/ready", get(handlers::ready))
        .route("/live", get(handlers::live))
        .route("/apm/summary", get(handlers::apm_summary))
        .merge(api)
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
