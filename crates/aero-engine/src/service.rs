//! The order state machine service.
//!
//! Orchestrates one transition attempt: lock, guard + act + persist,
//! unlock, record. The single most important property here is that an
//! acquired lock is always released on the way out, whatever the attempt
//! returned; the release and the history append run on every path.

use aero_model::{allowed_events, Actor, OrderEvent, OrderState, TransitionError};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::collab::{IssuanceClient, PaymentsClient};
use crate::executor::{self, AttemptOutcome};
use crate::recorder;

/// Stateless transition orchestrator. Cheap to clone; all shared pieces
/// are behind `Arc` or are pool handles.
#[derive(Clone)]
pub struct StateMachineService {
    pool: PgPool,
    issuer: Arc<dyn IssuanceClient>,
    payments: Arc<dyn PaymentsClient>,
    order_lease: Duration,
}

impl StateMachineService {
    pub fn new(
        pool: PgPool,
        issuer: Arc<dyn IssuanceClient>,
        payments: Arc<dyn PaymentsClient>,
        order_lease: Duration,
    ) -> Self {
        Self {
            pool,
            issuer,
            payments,
            order_lease,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Drive `event` against the order, then any follow-up events the
    /// side effects produced (issuance outcome), and return the final
    /// state reached.
    ///
    /// Lock acquisition is non-blocking: contention returns
    /// [`TransitionError::Busy`] immediately with no side effects.
    pub async fn trigger(
        &self,
        order_id: Uuid,
        event: OrderEvent,
        actor: &Actor,
        ctx: Option<Value>,
    ) -> Result<OrderState, TransitionError> {
        let mut outcome = self.trigger_once(order_id, event, actor, ctx).await?;

        while let Some((next_event, next_ctx)) = outcome.followup.take() {
            // Follow-ups run under the system identity, against a freshly
            // reacquired lock. If that injection loses a race, the first
            // transition already committed; report the state we reached
            // and let the stuck-issuance job recover the rest.
            match self
                .trigger_once(order_id, next_event, &Actor::system(), Some(next_ctx))
                .await
            {
                Ok(next) => outcome = next,
                Err(e) => {
                    tracing::warn!(
                        %order_id, event = %next_event, error = %e,
                        "follow-up event not applied; scheduled recovery will pick it up"
                    );
                    break;
                }
            }
        }

        Ok(outcome.to)
    }

    /// One locked attempt: acquire, delegate, always release, record.
    async fn trigger_once(
        &self,
        order_id: Uuid,
        event: OrderEvent,
        actor: &Actor,
        ctx: Option<Value>,
    ) -> Result<AttemptOutcome, TransitionError> {
        let lock_name = aero_db::lock::order_lock_name(order_id);
        let request_id = Uuid::new_v4().to_string();

        let acquired =
            aero_db::lock::acquire(&self.pool, &lock_name, &request_id, self.order_lease)
                .await
                .map_err(|e| TransitionError::Persistence(e.to_string()))?;

        let result = if !acquired {
            Err(TransitionError::Busy)
        } else {
            let result = executor::attempt(
                &self.pool,
                self.issuer.as_ref(),
                self.payments.as_ref(),
                order_id,
                event,
                actor,
                ctx.as_ref(),
            )
            .await;

            // Release no matter what the attempt returned. A failed
            // release is only logged: the lease expires on its own, and
            // surfacing it would mask the attempt's real outcome.
            match aero_db::lock::release(&self.pool, &lock_name, &request_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(%order_id, "order lock was no longer ours at release (lease expired?)");
                }
                Err(e) => {
                    tracing::error!(%order_id, error = %e, "order lock release failed");
                }
            }

            result
        };

        recorder::record_attempt(&self.pool, order_id, event, actor, ctx.as_ref(), &result)
            .await;

        result
    }

    /// Current persisted state of the order.
    pub async fn current_state(&self, order_id: Uuid) -> Result<OrderState, TransitionError> {
        let order = aero_db::orders::fetch_order(&self.pool, order_id)
            .await
            .map_err(|e| TransitionError::Persistence(e.to_string()))?
            .ok_or(TransitionError::OrderNotFound(order_id))?;
        Ok(order.state)
    }

    /// Events with a legal transition out of the order's current state.
    /// Empty once the order is terminal.
    pub async fn allowed_events(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderEvent>, TransitionError> {
        Ok(allowed_events(self.current_state(order_id).await?))
    }

    /// Full transition history of the order, oldest first.
    pub async fn history(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<aero_db::history::HistoryRow>, TransitionError> {
        // 404 beats an empty list for an order that never existed.
        self.current_state(order_id).await?;
        aero_db::history::fetch_history(&self.pool, order_id)
            .await
            .map_err(|e| TransitionError::Persistence(e.to_string()))
    }
}
