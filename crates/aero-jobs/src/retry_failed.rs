//! Retry failed issuance, or give up and cancel.
//!
//! Each TICKETING_FAILED order is retried while its committed failure
//! count stays under the configured cap. At the cap the job stops
//! burning issuance attempts: it cancels the order (which initiates the
//! refund) and marks the history record for manual review.

use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, warn};

use aero_config::Config;
use aero_engine::StateMachineService;
use aero_model::{OrderEvent, TransitionError};

use crate::{renew_leadership, JobCtx, JobStats};

/// Retry below the cap, cancel at it. Pure; the cap comparison is the
/// whole policy.
pub fn next_event_for_failed(failure_count: i64, retry_cap: u32) -> OrderEvent {
    if failure_count < i64::from(retry_cap) {
        OrderEvent::RetryTicketing
    } else {
        OrderEvent::Cancel
    }
}

pub async fn run_once(
    pool: &PgPool,
    service: &StateMachineService,
    cfg: &Config,
    ctx: &JobCtx,
) -> anyhow::Result<JobStats> {
    let matches = aero_db::orders::scan_ticketing_failed(pool, cfg.scan_batch_limit).await?;

    let mut stats = JobStats {
        scanned: matches.len(),
        ..JobStats::default()
    };

    for (i, order) in matches.iter().enumerate() {
        if !renew_leadership(pool, cfg, ctx, i).await {
            break;
        }

        let failures = aero_db::history::count_issuance_failures(pool, order.id).await?;
        let event = next_event_for_failed(failures, cfg.ticketing_retry_cap);

        let request_ctx = match event {
            OrderEvent::RetryTicketing => {
                json!({ "attempt": failures + 1, "retry_cap": cfg.ticketing_retry_cap })
            }
            _ => {
                warn!(
                    order_id = %order.id,
                    failures,
                    "issuance retry cap reached; cancelling for manual refund review"
                );
                json!({
                    "reason": "issuance retry cap reached",
                    "failures": failures,
                    "manual_review": true,
                })
            }
        };

        let result = service
            .trigger(order.id, event, &ctx.actor, Some(request_ctx))
            .await;

        match result {
            Ok(_) => stats.transitioned += 1,
            Err(TransitionError::IllegalTransition { .. }) | Err(TransitionError::Busy) => {
                debug!(order_id = %order.id, "retry skipped; order moved on");
                stats.skipped += 1;
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "retry failed; continuing batch");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
