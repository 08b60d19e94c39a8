//! HTTP surface: a single parameter-validating balance-history endpoint.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use cointrail::clock::{Clock, SystemClock};
use cointrail::history::format_history;
use cointrail::storage::SnapshotStore;

/// Query window default: 4 hours back from now.
const DEFAULT_WINDOW_SECS: i64 = 4 * 60 * 60;

#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<dyn SnapshotStore>,
    pub provider: String,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, provider: impl Into<String>) -> Self {
        Self {
            snapshots,
            provider: provider.into(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/balance/history/{provider}", get(balance_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// Recognized query parameters and their defaults.
#[derive(Debug, Deserialize)]
struct HistoryParams {
    /// Inclusive range start, unix seconds. Defaults to now minus 4 hours.
    start: Option<i64>,
    /// Inclusive range end, unix seconds. Defaults to now.
    end: Option<i64>,
    user: Option<String>,
}

async fn balance_history(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let user = params.user.unwrap_or_default();
    if user.is_empty() {
        return message_response(StatusCode::BAD_REQUEST, "Invalid user");
    }

    if provider != state.provider {
        return message_response(
            StatusCode::BAD_REQUEST,
            &format!("Provider {provider} balance history not implemented"),
        );
    }

    let now = state.clock.now_unix();
    let start = params.start.unwrap_or(now - DEFAULT_WINDOW_SECS);
    let end = params.end.unwrap_or(now);

    match state.snapshots.snapshots_in_range(&user, start, end).await {
        Ok(snapshots) => (StatusCode::OK, Json(format_history(snapshots))).into_response(),
        Err(err) => {
            error!(user = %user, error = %err, "balance history query failed");
            message_response(StatusCode::INTERNAL_SERVER_ERROR, &format!("{err:#}"))
        }
    }
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}
