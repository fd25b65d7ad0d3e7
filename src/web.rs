use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::flight_positions::ActivePosition;
use crate::flight_positions_repo::FlightPositionsRepository;

const MAP_TEMPLATE: &str = include_str!("../templates/map.html");

// App state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub positions: FlightPositionsRepository,
    /// Rendered once at startup; the title never changes while serving
    pub index_html: Arc<str>,
    /// How recent a position must be to show on the map
    pub seen_gap: Duration,
}

impl AppState {
    pub fn new(positions: FlightPositionsRepository, title: &str, seen_gap: Duration) -> Self {
        Self {
            positions,
            index_html: render_map_page(title).into(),
            seen_gap,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    errors: String,
}

fn json_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            errors: message.to_string(),
        }),
    )
        .into_response()
}

/// Body of `/data.json`
#[derive(Debug, Serialize)]
pub struct AircraftsResponse {
    pub aircrafts: Vec<ActivePosition>,
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.index_html.to_string())
}

async fn data_json(State(state): State<AppState>) -> Response {
    match state
        .positions
        .active_positions(state.seen_gap, Utc::now())
        .await
    {
        Ok(aircrafts) => Json(AircraftsResponse { aircrafts }).into_response(),
        Err(e) => {
            error!("Failed to load active positions: {:#}", e);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load active positions",
            )
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/data.json", get(data_json))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the map until `shutdown` is cancelled
pub async fn start_web_server(
    bind: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind web server to {}", bind))?;
    info!("Web server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Web server failed")
}

/// The map page with `title` filled in
pub fn render_map_page(title: &str) -> String {
    MAP_TEMPLATE.replace("{{ title }}", &escape_html(title))
}

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
