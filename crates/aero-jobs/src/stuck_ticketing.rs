//! Fail issuance that has been in flight for too long.
//!
//! An order can sit in TICKETING_IN_PROGRESS forever if the process
//! crashed between moving the state and applying the issuance outcome.
//! Past the stall threshold this job treats the external call as dead
//! and injects TICKETING_FAILURE, putting the order somewhere a retry or
//! an explicit cancel can reach it.

use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, warn};

use aero_config::Config;
use aero_engine::StateMachineService;
use aero_model::{OrderEvent, TransitionError};

use crate::{renew_leadership, JobCtx, JobStats};

pub async fn run_once(
    pool: &PgPool,
    service: &StateMachineService,
    cfg: &Config,
    ctx: &JobCtx,
) -> anyhow::Result<JobStats> {
    let matches = aero_db::orders::scan_ticketing_stuck(
        pool,
        cfg.ticketing_stuck_timeout_secs as f64,
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
                OrderEvent::TicketingFailure,
                &ctx.actor,
                Some(json!({ "issuance_error": "TIMEOUT", "reason": "stalled issuance" })),
            )
            .await;

        match result {
            Ok(_) => stats.transitioned += 1,
            Err(TransitionError::IllegalTransition { .. }) | Err(TransitionError::Busy) => {
                debug!(order_id = %order.id, "stall recovery skipped; order moved on");
                stats.skipped += 1;
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "stall recovery failed; continuing batch");
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}
