//! HTTP surface: per-session SSE streaming plus config/bonk endpoints.
//!
//! Bridges the blocking [`crate::stream::EventStream`] consumer loop onto an
//! async SSE response body by running the drain loop on a blocking thread and
//! forwarding rendered event text through a channel.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt as _;

use crate::error::BonkError;
use crate::sim::{SimParams, SimState};
use crate::stream::SessionRegistry;

/// Shared state every handler reaches through.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/sim/stream/:id", get(stream_handler))
        .route("/api/sim/config/:id", put(config_handler))
        .route("/api/sim/bonk/:id", post(bonk_handler))
        .with_state(state)
}

impl IntoResponse for BonkError {
    fn into_response(self) -> Response {
        let status = match self {
            BonkError::BadInvocation(_) => StatusCode::PRECONDITION_FAILED,
            BonkError::FileOpenFailure(_)
            | BonkError::ModalSetupFailure(_)
            | BonkError::ModalCompleteExtinction => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

async fn stream_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let event_stream = state.registry.stream_for(&id);
    let (tx, rx) = tokio::sync::mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || loop {
        let tx = tx.clone();
        let mut disconnected = false;
        event_stream.drain(|rendered| match tx.blocking_send(rendered) {
            Ok(()) => true,
            Err(_) => {
                disconnected = true;
                false
            }
        });
        if disconnected {
            break;
        }
    });

    let body = Body::from_stream(
        ReceiverStream::new(rx).map(|chunk| Ok::<_, Infallible>(chunk)),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap()
}

async fn config_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(params): Json<SimParams>,
) -> impl IntoResponse {
    state.registry.set_config(&id, params);
    StatusCode::NO_CONTENT
}

async fn bonk_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(sim_state): Json<SimState>,
) -> Result<StatusCode, BonkError> {
    state.registry.bonk(&id, sim_state)?;
    Ok(StatusCode::NO_CONTENT)
}
