use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir};

use crate::config::Config;
use crate::error::InternalErrorDetail;
use crate::response::ApiResponse;
use crate::storage::UploadStore;
use crate::{analysis, db, login, reports, spreadsheets};

/// Multipart framing overhead allowed on top of the file size limit.
const BODY_SLACK_BYTES: usize = 1024 * 1024;

pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub uploads: UploadStore,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let uploads = UploadStore::new(config.upload_dir.clone());
        AppState {
            pool,
            config,
            uploads,
        }
    }
}

/// Connect to the database and build the full router.
pub async fn build(config: Config) -> anyhow::Result<Router> {
    let pool = db::connect(&config.database_url).await?;
    Ok(router(Arc::new(AppState::new(pool, config))))
}

pub fn router(state: SharedState) -> Router {
    let config = &state.config;

    let mut app = Router::new()
        .nest("/api/auth", login::router())
        .nest("/api/spreadsheets", spreadsheets::router())
        .nest("/api/analysis", analysis::router())
        .nest("/api/reports", reports::router())
        .route("/api/health", get(health))
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes + BODY_SLACK_BYTES))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(log_requests));

    if config.is_development() {
        app = app.layer(middleware::from_fn(expose_error_details));
    }

    app.with_state(state)
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let app = build(config).await?;

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Server running on http://{}", addr);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiResponse::<()>::failure("Route not found")))
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({} ms)",
        method,
        path,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

/// Development only: put the underlying error text of a 500 into `message`.
async fn expose_error_details(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    match response.extensions().get::<InternalErrorDetail>().cloned() {
        Some(detail) => (
            response.status(),
            Json(ApiResponse::<()>::failure(detail.context).with_message(detail.detail)),
        )
            .into_response(),
        None => response,
    }
}
