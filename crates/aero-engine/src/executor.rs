//! The transition action executor.
//!
//! `attempt` runs one guarded transition end to end: fresh load,
//! legality, authority, state-entry side effects, persist. The caller
//! MUST hold the order's lock for the whole call; without it the fresh
//! read is racy.
//!
//! Side-effect policy: an issuance failure while entering
//! TICKETING_IN_PROGRESS does not roll back the transition. The failure
//! is returned as a follow-up TICKETING_FAILURE event for the service to
//! inject once the lock is released; the move into "in progress" stands,
//! which is how the external ticketing flow actually behaves. Only a
//! storage failure aborts the attempt, and then nothing is committed.

use aero_model::{Actor, OrderEvent, OrderState, TransitionError};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::collab::{IssuanceClient, PaymentsClient};
use crate::guard;

/// A committed transition, plus any follow-up event the side effects
/// produced (issuance outcome).
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub from: OrderState,
    pub to: OrderState,
    /// Event to inject next, with its request context. Always run as the
    /// system actor, after the order lock has been released.
    pub followup: Option<(OrderEvent, Value)>,
}

/// Run one transition attempt. See the module docs for the contract.
pub(crate) async fn attempt(
    pool: &PgPool,
    issuer: &dyn IssuanceClient,
    payments: &dyn PaymentsClient,
    order_id: Uuid,
    event: OrderEvent,
    actor: &Actor,
    ctx: Option<&Value>,
) -> Result<AttemptOutcome, TransitionError> {
    // Fresh read under the caller-held lock. Never from a cache.
    let order = aero_db::orders::fetch_order(pool, order_id)
        .await
        .map_err(|e| TransitionError::Persistence(e.to_string()))?
        .ok_or(TransitionError::OrderNotFound(order_id))?;

    let from = order.state;
    let to = guard::check_transition(from, event)?;
    guard::authorize(actor, &order.owner_user_id)?;

    // State-entry side effects. Business failures become follow-up
    // events; they never abort the transition.
    let mut followup = None;
    let mut ticket_ref: Option<String> = None;

    match to {
        OrderState::TicketingInProgress => match issuer.issue_ticket(order_id).await {
            Ok(ticket) => {
                followup = Some((
                    OrderEvent::TicketingSuccess,
                    json!({ "ticket_ref": ticket }),
                ));
            }
            Err(e) => {
                tracing::warn!(%order_id, error = %e, "ticket issuance failed");
                followup = Some((
                    OrderEvent::TicketingFailure,
                    json!({ "issuance_error": e.as_str() }),
                ));
            }
        },
        OrderState::Cancelled if from != OrderState::PendingPayment => {
            // Money was captured at PAY time; start giving it back.
            if let Err(e) = payments.initiate_refund(order_id).await {
                tracing::error!(%order_id, error = %e, "refund initiation failed; chase out of band");
            }
        }
        OrderState::Ticketed => {
            ticket_ref = ctx
                .and_then(|v| v.get("ticket_ref"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        _ => {}
    }

    // Persist last: a storage failure here means the attempt is simply
    // not committed and may be retried under a fresh lock.
    aero_db::orders::update_state(pool, order_id, to, ticket_ref.as_deref())
        .await
        .map_err(|e| TransitionError::Persistence(e.to_string()))?;

    Ok(AttemptOutcome { from, to, followup })
}
