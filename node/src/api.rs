//! # REST API
//!
//! Builds the axum router that exposes the registry over HTTP. All handlers
//! share one [`NodeLedger`] behind a single mutex: operations are applied
//! strictly one at a time, in the order the lock is acquired.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                        |
//! |--------|-----------------------------|------------------------------------|
//! | GET    | `/health`                   | Liveness probe                     |
//! | GET    | `/status`                   | Registry summary                   |
//! | POST   | `/operations`               | Apply one operation                |
//! | GET    | `/certificates/:id`         | Full certificate record and state  |
//! | GET    | `/certificates/:id/owner`   | Current owner                      |
//! | GET    | `/certificates/:id/listing` | Sale status                        |
//! | GET    | `/principals/:principal`    | Roles, holdings, payouts           |
//! | GET    | `/events?since=N`           | Page of the notification log       |
//!
//! ## Caller identity
//!
//! `POST /operations` acts as whatever `caller` the request body names,
//! `admin` included. The node does no authentication of its own and the
//! CORS layer admits any origin, so it must sit behind a front layer that
//! authenticates clients and pins `caller` to the authenticated principal.

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use gridcert_contracts::{
    Certificate, CertificateId, EventRecord, Operation, RegistryError, Role,
};

use crate::metrics::SharedMetrics;
use crate::state::NodeLedger;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Registry and payout book. The mutex is the node's ordering point.
    pub ledger: Arc<Mutex<NodeLedger>>,
    /// Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/operations", post(operation_handler))
        .route("/certificates/:id", get(certificate_handler))
        .route("/certificates/:id/owner", get(owner_handler))
        .route("/certificates/:id/listing", get(listing_handler))
        .route("/principals/:principal", get(principal_handler))
        .route("/events", get(events_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Certificates ever issued.
    pub certificates: usize,
    /// Certificates currently for sale.
    pub listed: usize,
    /// Notifications in the log.
    pub events: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /certificates/:id`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CertificateResponse {
    /// The full record.
    pub certificate: Certificate,
    /// Lifecycle state, e.g. "Active-Listed(50)".
    pub state: String,
    /// Whether the certificate is for sale.
    pub is_for_sale: bool,
    /// Listing price.
    pub price: u64,
}

/// Response payload for `GET /certificates/:id/owner`.
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerResponse {
    /// Certificate id.
    pub id: CertificateId,
    /// Current owner.
    pub owner: String,
}

/// Response payload for `GET /certificates/:id/listing`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListingResponse {
    /// Certificate id.
    pub id: CertificateId,
    /// Whether the certificate is for sale.
    pub is_for_sale: bool,
    /// Listing price.
    pub price: u64,
}

/// Response payload for `GET /principals/:principal`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PrincipalResponse {
    /// The principal.
    pub principal: String,
    /// Roles held.
    pub roles: Vec<Role>,
    /// Ids of certificates currently owned.
    pub certificates: Vec<CertificateId>,
    /// Total payments received from sales.
    pub payout_balance: u64,
}

/// Query parameters for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// First sequence number to return.
    #[serde(default)]
    pub since: u64,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable error kind.
    pub kind: String,
}

/// HTTP status for a registry error.
fn status_for(error: &RegistryError) -> StatusCode {
    match error {
        RegistryError::Unauthorized { .. } | RegistryError::NotOwner { .. } => {
            StatusCode::FORBIDDEN
        }
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::NotForSale(_)
        | RegistryError::AlreadyRetired(_)
        | RegistryError::HandoffInProgress(_) => StatusCode::CONFLICT,
        RegistryError::InsufficientPayment { .. } => StatusCode::PAYMENT_REQUIRED,
        RegistryError::InvalidAmount | RegistryError::InvalidWindow { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        RegistryError::PaymentFailed(_) => StatusCode::BAD_GATEWAY,
        RegistryError::IdSpaceExhausted => StatusCode::INSUFFICIENT_STORAGE,
    }
}

fn error_response(error: &RegistryError) -> Response {
    (
        status_for(error),
        Json(ErrorResponse {
            error: error.to_string(),
            kind: error.kind().to_string(),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: registry summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let ledger = state.ledger.lock().await;
    Json(StatusResponse {
        version: state.version.clone(),
        certificates: ledger.registry.certificate_count(),
        listed: ledger.registry.listed_count(),
        events: ledger.registry.events().len(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `POST /operations`: applies one operation and returns its receipt.
async fn operation_handler(
    State(state): State<AppState>,
    Json(op): Json<Operation>,
) -> Response {
    let kind = op.kind();
    let caller = op.caller().to_string();
    let mut ledger = state.ledger.lock().await;

    match ledger.apply(op) {
        Ok(receipt) => {
            let events: Vec<_> = receipt.events.iter().map(|r| r.event.clone()).collect();
            state
                .metrics
                .record_applied(kind, &events, &ledger.registry);
            (StatusCode::OK, Json(receipt)).into_response()
        }
        Err(e) => {
            tracing::debug!(operation = kind, %caller, error = %e, "operation rejected");
            state.metrics.record_rejected(kind, &e);
            error_response(&e)
        }
    }
}

/// `GET /certificates/:id`: full record with lifecycle state and listing.
async fn certificate_handler(
    Path(id): Path<CertificateId>,
    State(state): State<AppState>,
) -> Response {
    let ledger = state.ledger.lock().await;
    let registry = &ledger.registry;
    let lookup = registry
        .certificate(id)
        .and_then(|c| registry.state_of(id).map(|s| (c.clone(), s)));

    match lookup {
        Ok((certificate, lifecycle)) => {
            let (is_for_sale, price) = registry.is_listed(id);
            Json(CertificateResponse {
                certificate,
                state: lifecycle.to_string(),
                is_for_sale,
                price,
            })
            .into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `GET /certificates/:id/owner`: current owner.
async fn owner_handler(Path(id): Path<CertificateId>, State(state): State<AppState>) -> Response {
    let ledger = state.ledger.lock().await;
    match ledger.registry.owner_of(id) {
        Ok(owner) => Json(OwnerResponse {
            id,
            owner: owner.to_string(),
        })
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// `GET /certificates/:id/listing`: sale status.
async fn listing_handler(
    Path(id): Path<CertificateId>,
    State(state): State<AppState>,
) -> Response {
    let ledger = state.ledger.lock().await;
    if let Err(e) = ledger.registry.certificate(id) {
        return error_response(&e);
    }
    let (is_for_sale, price) = ledger.registry.is_listed(id);
    Json(ListingResponse {
        id,
        is_for_sale,
        price,
    })
    .into_response()
}

/// `GET /principals/:principal`: roles, holdings and payouts. Unknown
/// principals read as holding nothing.
async fn principal_handler(
    Path(principal): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let ledger = state.ledger.lock().await;
    Json(PrincipalResponse {
        roles: ledger.registry.roles_of(&principal),
        certificates: ledger.registry.owned_by(&principal),
        payout_balance: ledger.payouts.balance_of(&principal),
        principal,
    })
}

/// `GET /events?since=N`: a page of the notification log.
async fn events_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let ledger = state.ledger.lock().await;
    let page: Vec<EventRecord> = ledger.registry.events_since(query.since).to_vec();
    Json(page)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
