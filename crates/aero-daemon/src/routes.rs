//! Axum router and all HTTP handlers for aero-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and
//! attaches middleware layers. All handlers are `pub(crate)` so the
//! scenario tests in `tests/` can compose the router directly.

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;
use uuid::Uuid;

use aero_model::{Actor, TransitionError};

use crate::{
    api_types::{
        AllowedEventsResponse, CreateOrderRequest, ErrorResponse, HealthResponse, HistoryRecord,
        HistoryResponse, OrderResponse, StatusResponse, TriggerRequest, TriggerResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/:id", get(get_order))
        .route("/v1/orders/:id/allowed-events", get(get_allowed_events))
        .route("/v1/orders/:id/history", get(get_history))
        .route("/v1/orders/:id/events", post(trigger_event))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Map the transition error taxonomy onto HTTP statuses. `Busy` is a
/// retryable 503; an illegal event is a 409 naming the state and event.
fn error_response(err: &TransitionError) -> Response {
    let (status, code) = match err {
        TransitionError::OrderNotFound(_) => (StatusCode::NOT_FOUND, "ORDER_NOT_FOUND"),
        TransitionError::IllegalTransition { .. } => (StatusCode::CONFLICT, "ILLEGAL_TRANSITION"),
        TransitionError::Forbidden { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        TransitionError::Busy => (StatusCode::SERVICE_UNAVAILABLE, "BUSY"),
        TransitionError::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE"),
    };

    (
        status,
        Json(ErrorResponse {
            code: code.to_string(),
            error: err.to_string(),
            retryable: err.is_retryable(),
        }),
    )
        .into_response()
}

fn order_response(row: aero_db::orders::OrderRow) -> OrderResponse {
    OrderResponse {
        id: row.id,
        order_number: row.order_number,
        owner_user_id: row.owner_user_id,
        amount_cents: row.amount_cents,
        currency: row.currency,
        state: row.state,
        ticket_ref: row.ticket_ref,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let db_ok = aero_db::status(&st.pool)
        .await
        .map(|s| s.ok && s.has_orders_table)
        .unwrap_or(false);

    (
        StatusCode::OK,
        Json(StatusResponse {
            daemon_uptime_secs: uptime_secs(),
            db_ok,
            config_hash: st.config_hash.clone(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/stream (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(
    State(st): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = st.bus.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| async move {
        let msg = msg.ok()?;
        let event = match &msg {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Transition { .. } => "transition",
        };
        let data = serde_json::to_string(&msg).ok()?;
        Some(Ok(Event::default().event(event).data(data)))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// POST /v1/orders
// ---------------------------------------------------------------------------

pub(crate) async fn create_order(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    if req.amount_cents < 0 {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                code: "INVALID_AMOUNT".to_string(),
                error: "amount_cents must be >= 0".to_string(),
                retryable: false,
            }),
        )
            .into_response();
    }

    let id = Uuid::new_v4();
    let order = aero_db::orders::NewOrder {
        id,
        order_number: aero_db::orders::generate_order_number(id),
        owner_user_id: req.owner_user_id,
        amount_cents: req.amount_cents,
        currency: req.currency,
    };

    if let Err(e) = aero_db::orders::insert_order(&st.pool, &order).await {
        return error_response(&TransitionError::Persistence(e.to_string()));
    }

    match aero_db::orders::fetch_order(&st.pool, id).await {
        Ok(Some(row)) => {
            info!(order_id = %id, order_number = %row.order_number, "order created");
            (StatusCode::CREATED, Json(order_response(row))).into_response()
        }
        Ok(None) => error_response(&TransitionError::OrderNotFound(id)),
        Err(e) => error_response(&TransitionError::Persistence(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_order(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match aero_db::orders::fetch_order(&st.pool, id).await {
        Ok(Some(row)) => (StatusCode::OK, Json(order_response(row))).into_response(),
        Ok(None) => error_response(&TransitionError::OrderNotFound(id)),
        Err(e) => error_response(&TransitionError::Persistence(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id/allowed-events
// ---------------------------------------------------------------------------

pub(crate) async fn get_allowed_events(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    let state = match st.service.current_state(id).await {
        Ok(s) => s,
        Err(e) => return error_response(&e),
    };

    (
        StatusCode::OK,
        Json(AllowedEventsResponse {
            order_id: id,
            state,
            allowed_events: aero_model::allowed_events(state),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/orders/:id/history
// ---------------------------------------------------------------------------

pub(crate) async fn get_history(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match st.service.history(id).await {
        Ok(rows) => {
            let records = rows
                .into_iter()
                .map(|r| HistoryRecord {
                    from_state: r.from_state,
                    to_state: r.to_state,
                    event: r.event,
                    actor_id: r.actor_id,
                    actor_role: r.actor_role,
                    success: r.success,
                    error_message: r.error_message,
                    request_context: r.request_context,
                    ts_utc: r.ts_utc,
                })
                .collect();
            (
                StatusCode::OK,
                Json(HistoryResponse {
                    order_id: id,
                    records,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/orders/:id/events
// ---------------------------------------------------------------------------

pub(crate) async fn trigger_event(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<TriggerRequest>,
) -> Response {
    let actor = Actor::new(req.actor_id, req.actor_role);

    match st.service.trigger(id, req.event, &actor, req.context).await {
        Ok(state) => {
            info!(order_id = %id, event = %req.event, state = %state, "transition committed");
            let _ = st.bus.send(BusMsg::Transition {
                order_id: id,
                event: req.event.as_str().to_string(),
                state: state.as_str().to_string(),
            });
            (
                StatusCode::OK,
                Json(TriggerResponse {
                    order_id: id,
                    state,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(&e),
    }
}
