//! HTTP surface: inbound star events and the stats snapshot.
//!
//! `POST /events/github` expects a payload whose signature was already
//! verified in front of this service.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::display::{StatsSnapshot, get_stats};
use crate::github::RepositoryEventPayload;
use crate::store::StoreError;
use crate::sync::{MergeOutcome, StarCountChanged, apply_star_change};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match status {
            StatusCode::BAD_REQUEST => self.to_string(),
            _ => {
                error!(error = %self, "request failed");
                "Internal server error".to_string()
            }
        };
        (status, body).into_response()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
}

impl AppState {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub github_owner: Option<String>,
    pub npm_org: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub owner: String,
    pub item: String,
    pub outcome: MergeOutcome,
    pub owner_star_count: u64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events/github", post(github_event))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn github_event(
    State(state): State<AppState>,
    Json(payload): Json<RepositoryEventPayload>,
) -> Result<Json<EventResponse>, ServerError> {
    let event = StarCountChanged::from(payload);
    let applied = apply_star_change(state.db.as_ref(), &event, Utc::now()).await?;

    Ok(Json(EventResponse {
        owner: event.owner,
        item: event.item,
        outcome: applied.merge,
        owner_star_count: applied.aggregate.owner.metrics().star_count,
    }))
}

async fn stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsSnapshot>, ServerError> {
    let snapshot = get_stats(
        state.db.as_ref(),
        query.github_owner.as_deref(),
        query.npm_org.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(snapshot))
}

async fn health() -> &'static str {
    "ok"
}
