//! Receiver side of the peer synchronizer: the `/synchronize` endpoint a
//! peer POSTs its update history to.

use crate::sync::{verify_bearer_token, PeerSynchronizer, SyncEnvelope};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use horao_domain::LogicalInfrastructure;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state for the `/synchronize` route: the replica under
/// replication and the synchronizer whose secret authenticates peers and
/// whose suppression flag keeps peer-originated updates from re-firing
/// the change listener.
#[derive(Clone)]
pub struct ReceiverState {
    infrastructure: Arc<Mutex<LogicalInfrastructure>>,
    synchronizer: Arc<Mutex<PeerSynchronizer>>,
    peer_strict: bool,
}

impl ReceiverState {
    pub fn new(
        infrastructure: Arc<Mutex<LogicalInfrastructure>>,
        synchronizer: Arc<Mutex<PeerSynchronizer>>,
        peer_strict: bool,
    ) -> Self {
        Self {
            infrastructure,
            synchronizer,
            peer_strict,
        }
    }
}

/// Build the router carrying the `/synchronize` route. Mount with
/// `axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())`
/// so the handler can enforce `PEER_STRICT`.
pub fn router(state: ReceiverState) -> Router {
    Router::new()
        .route("/synchronize", post(synchronize))
        .with_state(state)
}

fn peer_host(url: &str) -> &str {
    let without_scheme = url
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let end = without_scheme
        .find([':', '/'])
        .unwrap_or(without_scheme.len());
    &without_scheme[..end]
}

async fn synchronize(
    State(state): State<ReceiverState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(envelope): Json<SyncEnvelope>,
) -> impl IntoResponse {
    let span = tracing::info_span!("synchronize_receive", peer = %remote);
    let _guard = span.enter();

    let synchronizer = state.synchronizer.lock().await;

    let token = match headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        Some(token) => token,
        None => return StatusCode::UNAUTHORIZED,
    };

    if verify_bearer_token(token, synchronizer.secret()).is_err() {
        tracing::warn!("rejected synchronize request: bad bearer token");
        return StatusCode::UNAUTHORIZED;
    }

    if state.peer_strict
        && !synchronizer
            .peers()
            .iter()
            .any(|peer| peer_host(peer) == remote.ip().to_string())
    {
        tracing::warn!(peer = %remote, "rejected synchronize request: source IP not in PEERS");
        return StatusCode::UNAUTHORIZED;
    }

    let mut infrastructure = state.infrastructure.lock().await;
    match envelope.apply_to(&mut infrastructure, &synchronizer) {
        Ok(()) => StatusCode::OK,
        Err(error) => {
            tracing::error!(error = %error, "failed to apply peer update");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
