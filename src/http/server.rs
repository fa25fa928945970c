//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, admission guards)
//! - Bind the server to a listener, optionally over TLS
//! - Run the counter sweeper and apply config reloads while serving

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::health;
use crate::http::handlers;
use crate::http::request::request_span;
use crate::http::response::{catch_unhandled, enforce_timeout};
use crate::observability::metrics;
use crate::security::store::{CounterStore, MemoryStore};
use crate::security::{body_limit_middleware, rate_limit_middleware, AdmissionState};

/// Grace period for in-flight TLS connections on shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: AdmissionState,
    pub started_at: Instant,
}

/// HTTP server fronted by the admission pipeline.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    admission: AdmissionState,
}

impl HttpServer {
    /// Create a server that keeps rate-limit counters in process memory.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Create a server backed by the given counter store.
    pub fn with_store(config: GatewayConfig, store: Arc<dyn CounterStore>) -> Self {
        let admission = AdmissionState::new(&config, store);
        let state = AppState {
            admission: admission.clone(),
            started_at: Instant::now(),
        };
        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            admission,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers run outermost first: request ID, trace span, ID propagation,
    /// timeout, panic catcher, rate limit, body limit, handler.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let admission = state.admission.clone();
        Router::new()
            .route("/health", get(health::health))
            .route("/api/ping", get(handlers::ping))
            .route("/api/echo", post(handlers::echo))
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(middleware::from_fn_with_state(admission.clone(), body_limit_middleware))
            .layer(middleware::from_fn_with_state(admission, rate_limit_middleware))
            .layer(middleware::from_fn(catch_unhandled))
            .layer(middleware::from_fn_with_state(
                Duration::from_secs(config.timeouts.request_secs),
                enforce_timeout,
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        self.spawn_background(config_updates, &shutdown);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        self.spawn_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Router with all layers, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn admission(&self) -> &AdmissionState {
        &self.admission
    }

    fn spawn_background(
        &self,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) {
        let interval = Duration::from_secs(self.config.throttle.sweep_interval_secs);
        tokio::spawn(sweep_counters(
            self.admission.clone(),
            interval,
            shutdown.resubscribe(),
        ));
        tokio::spawn(apply_reloads(
            self.admission.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));
    }
}

/// Periodically evict counters whose window has elapsed.
async fn sweep_counters(admission: AdmissionState, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let store = admission.limiter().store();
                match store.sweep().await {
                    Ok(removed) => {
                        if let Ok(remaining) = store.tracked_keys().await {
                            metrics::record_tracked_keys(remaining);
                        }
                        tracing::debug!(removed, "Swept expired rate-limit counters");
                    }
                    Err(e) => tracing::warn!(error = %e, "Counter sweep failed"),
                }
            }
            _ = shutdown.recv() => {
                tracing::debug!("Counter sweeper stopping");
                break;
            }
        }
    }
}

/// Apply validated configs published by the watcher.
///
/// Listener, timeout and sweep interval changes need a restart; admission
/// settings apply to the next request.
async fn apply_reloads(
    admission: AdmissionState,
    mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = config_updates.recv() => match update {
                Some(config) => admission.reload(&config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
