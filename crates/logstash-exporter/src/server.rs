//! HTTP surface of the exporter.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{Span, error, info};

use crate::error::{Error, Result};
use crate::exporter::{BuildInfo, LogstashExporter};
use crate::metrics::CONTENT_TYPE;

pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const HEALTH_PATH: &str = "/health";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: SocketAddr,
    /// Path the exposition is served on.
    pub metrics_path: String,
}

impl ServerConfig {
    pub fn new(bind_address: SocketAddr, metrics_path: impl Into<String>) -> Result<Self> {
        let metrics_path = metrics_path.into();
        if !metrics_path.starts_with('/') || metrics_path.len() < 2 {
            return Err(Error::config(format!(
                "metrics path `{metrics_path}` must start with `/` and name a route"
            )));
        }
        if metrics_path == HEALTH_PATH {
            return Err(Error::config(format!(
                "metrics path must not be `{HEALTH_PATH}`"
            )));
        }
        Ok(Self {
            bind_address,
            metrics_path,
        })
    }
}

#[derive(Clone)]
struct AppState {
    exporter: Arc<LogstashExporter>,
    build_info: BuildInfo,
    metrics_path: Arc<str>,
}

/// Serves the index, health and metrics routes for one exporter.
pub struct ExporterServer {
    config: ServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ExporterServer {
    pub fn new(
        config: ServerConfig,
        exporter: Arc<LogstashExporter>,
        build_info: BuildInfo,
    ) -> Self {
        let state = AppState {
            exporter,
            build_info,
            metrics_path: Arc::from(config.metrics_path.as_str()),
        };
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Token that stops the server when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Builds the router with tracing on every route except health checks.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(index))
            .route(HEALTH_PATH, get(health))
            .route(&self.config.metrics_path, get(metrics))
            .with_state(self.state.clone())
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(|req: &Request| {
                        if req.uri().path() == HEALTH_PATH {
                            Span::none()
                        } else {
                            use tower_http::trace::MakeSpan;
                            let mut make_span = tower_http::trace::DefaultMakeSpan::new()
                                .level(tracing::Level::INFO);
                            make_span.make_span(req)
                        }
                    })
                    .on_response(
                        |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                            if span.is_disabled() {
                                return;
                            }
                            use tower_http::trace::OnResponse;
                            tower_http::trace::DefaultOnResponse::new()
                                .level(tracing::Level::DEBUG)
                                .on_response(res, latency, span);
                        },
                    ),
            )
    }

    /// Binds the listener and serves until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_address).await?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        let addr = listener.local_addr()?;
        info!(
            "exporter listening on http://{}{}",
            addr, self.config.metrics_path
        );

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("exporter server shutting down...");
            })
            .await?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let version = state.build_info.version;
    let path = &state.metrics_path;
    Html(format!(
        "<html>\n\
         <head><title>Logstash Exporter {version}</title></head>\n\
         <body>\n\
         <h1>Logstash Exporter {version}</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n"
    ))
}

async fn health(State(state): State<AppState>) -> String {
    let options = state.exporter.options();
    format!("{}-{} exporter is running", options.namespace, options.usage)
}

async fn metrics(State(state): State<AppState>) -> Response {
    let scrape = state.exporter.scrape().await;
    match scrape.render() {
        Ok(body) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
