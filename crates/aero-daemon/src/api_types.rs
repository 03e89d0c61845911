//! Request and response types for all aero-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use aero_model::{ActorRole, OrderEvent, OrderState};

// ---------------------------------------------------------------------------
// /v1/health and /v1/status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub daemon_uptime_secs: u64,
    pub db_ok: bool,
    pub config_hash: String,
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub owner_user_id: String,
    pub amount_cents: i64,
    /// ISO 4217 code; the schema default applies when omitted.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_currency() -> String {
    "EUR".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub owner_user_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub state: OrderState,
    pub ticket_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub event: OrderEvent,
    pub actor_id: String,
    pub actor_role: ActorRole,
    /// Opaque request context, copied into the history record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub order_id: Uuid,
    /// State reached after the event and any internal follow-ups.
    pub state: OrderState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowedEventsResponse {
    pub order_id: Uuid,
    pub state: OrderState,
    pub allowed_events: Vec<OrderEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub event: String,
    pub actor_id: String,
    pub actor_role: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub request_context: Option<Value>,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub order_id: Uuid,
    pub records: Vec<HistoryRecord>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Response body for every rejected operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine code: ORDER_NOT_FOUND | ILLEGAL_TRANSITION |
    /// FORBIDDEN | BUSY | PERSISTENCE
    pub code: String,
    /// Human-readable description naming the current state and the
    /// attempted event where applicable.
    pub error: String,
    /// Whether retrying the same request may succeed.
    pub retryable: bool,
}
