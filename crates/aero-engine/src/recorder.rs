//! Fire-and-forget transition history.
//!
//! Every attempt is recorded, success or failure. A history write
//! failure is logged and swallowed: business state consistency takes
//! priority over audit completeness, so a committed transition is never
//! reversed (and a returned error never masked) because the audit insert
//! failed.

use aero_db::history::NewHistory;
use aero_model::{Actor, OrderEvent, TransitionError};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::executor::AttemptOutcome;

/// Append one history row for the attempt's outcome.
pub(crate) async fn record_attempt(
    pool: &PgPool,
    order_id: Uuid,
    event: OrderEvent,
    actor: &Actor,
    ctx: Option<&Value>,
    result: &Result<AttemptOutcome, TransitionError>,
) {
    let rec = match result {
        Ok(outcome) => NewHistory {
            order_id,
            from_state: Some(outcome.from.as_str().to_string()),
            to_state: Some(outcome.to.as_str().to_string()),
            event: event.as_str().to_string(),
            actor_id: actor.id.clone(),
            actor_role: actor.role.as_str().to_string(),
            success: true,
            error_message: None,
            request_context: ctx.cloned(),
        },
        Err(err) => NewHistory {
            order_id,
            // The busy and not-found paths never loaded the order, so the
            // originating state is unknown there.
            from_state: match err {
                TransitionError::IllegalTransition { from, .. } => {
                    Some(from.as_str().to_string())
                }
                _ => None,
            },
            to_state: None,
            event: event.as_str().to_string(),
            actor_id: actor.id.clone(),
            actor_role: actor.role.as_str().to_string(),
            success: false,
            error_message: Some(err.to_string()),
            request_context: ctx.cloned(),
        },
    };

    if let Err(e) = aero_db::history::append_history(pool, &rec).await {
        tracing::error!(%order_id, event = %event, error = %e, "history append failed");
    }
}
