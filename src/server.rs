//! HTTP gateway: liveness and comparison routes under a configurable
//! context path, plus read-only access to stored captures.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{GatewayError, Result};
use crate::pipeline::{ComparisonPipeline, DesignSource, PageCapture, PipelineError};
use crate::request::ComparisonRequest;

/// Route settings taken from [`ServerConfig`] and storage.
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub port: u16,
    pub context_path: String,
    pub images_dir: PathBuf,
}

impl RouterSettings {
    pub fn from_config(server: &ServerConfig, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            port: server.port,
            context_path: server.normalized_context_path(),
            images_dir: images_dir.into(),
        }
    }
}

struct AppState<P, D> {
    pipeline: Arc<ComparisonPipeline<P, D>>,
    port: u16,
    context_path: String,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: bool,
    message: String,
    #[serde(rename = "missingFields", skip_serializing_if = "Vec::is_empty")]
    missing_fields: Vec<String>,
}

impl StatusBody {
    fn new(status: bool, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            missing_fields: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompareBody {
    page_image: String,
    figma_image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    matching_ratio: Option<f64>,
}

struct ApiError(PipelineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = StatusBody {
            status: false,
            message: self.0.wire_message(),
            missing_fields: self.0.to_payload().missing_fields,
        };
        (status, Json(body)).into_response()
    }
}

pub fn router<P, D>(pipeline: Arc<ComparisonPipeline<P, D>>, settings: RouterSettings) -> Router
where
    P: PageCapture + 'static,
    D: DesignSource + 'static,
{
    let prefix = settings.context_path.clone();
    let state = Arc::new(AppState {
        pipeline,
        port: settings.port,
        context_path: settings.context_path,
    });

    Router::new()
        .route(&format!("{prefix}/ping"), get(ping::<P, D>))
        .route(&format!("{prefix}/compare"), post(compare::<P, D>))
        .nest_service("/images", ServeDir::new(settings.images_dir))
        .fallback(not_found)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping<P, D>(State(state): State<Arc<AppState<P, D>>>) -> Json<StatusBody> {
    let root = if state.context_path.is_empty() {
        "/"
    } else {
        state.context_path.as_str()
    };
    Json(StatusBody::new(
        true,
        format!(
            "Gateway is running on port {} root path --> {root}",
            state.port
        ),
    ))
}

async fn compare<P, D>(
    State(state): State<Arc<AppState<P, D>>>,
    body: std::result::Result<Json<ComparisonRequest>, JsonRejection>,
) -> Response
where
    P: PageCapture + 'static,
    D: DesignSource + 'static,
{
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusBody::new(false, rejection.body_text())),
            )
                .into_response()
        }
    };

    match state.pipeline.compare(&request).await {
        Ok(result) => Json(CompareBody {
            page_image: result.page_image.locator,
            figma_image: result.design_image.locator,
            matching_ratio: result.matching_ratio,
        })
        .into_response(),
        Err(err) => ApiError(err).into_response(),
    }
}

async fn not_found() -> (StatusCode, Json<StatusBody>) {
    (StatusCode::NOT_FOUND, Json(StatusBody::new(false, "Not Found")))
}

/// Bind `host:port` and serve until `shutdown` is cancelled.
pub async fn serve<P, D>(
    server: &ServerConfig,
    images_dir: PathBuf,
    pipeline: Arc<ComparisonPipeline<P, D>>,
    shutdown: CancellationToken,
) -> Result<()>
where
    P: PageCapture + 'static,
    D: DesignSource + 'static,
{
    let addr = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| GatewayError::Config(format!("Failed to bind {addr}: {e}")))?;
    serve_listener(
        listener,
        RouterSettings::from_config(server, images_dir),
        pipeline,
        shutdown,
    )
    .await
}

pub async fn serve_listener<P, D>(
    listener: TcpListener,
    settings: RouterSettings,
    pipeline: Arc<ComparisonPipeline<P, D>>,
    shutdown: CancellationToken,
) -> Result<()>
where
    P: PageCapture + 'static,
    D: DesignSource + 'static,
{
    let local: SocketAddr = listener.local_addr()?;
    info!(
        addr = %local,
        context_path = %settings.context_path,
        "gateway listening"
    );

    axum::serve(listener, router(pipeline, settings))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("gateway stopped");
    Ok(())
}
