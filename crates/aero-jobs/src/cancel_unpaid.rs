//! Cancel orders left unpaid past the payment timeout.

use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, warn};

use aero_config::Config;
use aero_engine::StateMachineService;
use aero_model::{OrderEvent, TransitionError};

use crate::{renew_leadership, JobCtx, JobStats};

/// One tick: scan PENDING_PAYMENT orders older than the timeout and
/// inject AUTO_CANCEL for each.
///
/// An order paid (or cancelled) between the scan and its turn in the
/// loop is rejected by the transition guard; that is the expected
/// outcome of losing the race to a user action, not an error.
pub async fn run_once(
    pool: &PgPool,
    service: &StateMachineService,
    cfg: &Config,
    ctx: &JobCtx,
) -> anyhow::Result<JobStats> {
    let matches = aero_db::orders::scan_unpaid_older_than(
        pool,
        cfg.payment_timeout_secs as f64,
        cfg.scan_batch_limit,
    )
    .await?;

    let mut stats = JobStats {
        scanned: matches.len(),
        ..JobStats::default()
    };

    for (i, order) in matches.iter().enumerate() {
        if !renew_leadership(pool, cfg, ctx, i).await {
            break;
        }

        let result = service
            .trigger(
                order.id,
                OrderEvent::AutoCancel,
                &ctx.actor,
                Some(json!({ "reason": "payment timeout" })),
            )
            .await;

        match result {
            Ok(_) => stats.transitioned += 1,
            Err(TransitionError::IllegalTransition { .. }) | Err(TransitionError::Busy) => {
                // Lost the race to a concurrent user action.
                debug!(order_id = %order.id, "auto-cancel skipped; order moved on");
                stats.skipped += 1;
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "auto-cancel failed; continuing batch");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
