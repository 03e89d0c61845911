//! Scenario: Stalled Issuance Is Failed So It Can Be Retried
//!
//! # Invariant under test
//! An order abandoned in TICKETING_IN_PROGRESS (e.g. the instance died
//! between committing the transition and applying the issuance outcome)
//! is moved to TICKETING_FAILED by the stuck_ticketing job once it is
//! older than the stall threshold. Fresh in-progress orders are left
//! alone.
//!
//! All tests skip gracefully when `AERO_DATABASE_URL` is not set.

use aero_jobs::{stuck_ticketing, JobCtx};
use aero_model::OrderState;
use aero_testkit::{backdate, force_state, make_harness, seed_order};

#[tokio::test]
#[ignore = "requires AERO_DATABASE_URL; run with -- --include-ignored"]
async fn stale_in_progress_order_is_failed_fresh_one_is_not() -> anyhow::Result<()> {
    let h = make_harness().await?;
    let ctx = JobCtx::new("stuck_ticketing", aero_jobs::instance_id());

    // Simulates a crash: in progress, no outcome ever applied, old.
    let stale = seed_order(&h.pool, "u-1").await?;
    force_state(&h.pool, stale, OrderState::TicketingInProgress).await?;
    backdate(
        &h.pool,
        stale,
        h.config.ticketing_stuck_timeout_secs as f64 + 60.0,
    )
    .await?;

    // In progress but recent: the external call may still be in flight.
    let fresh = seed_order(&h.pool, "u-2").await?;
    force_state(&h.pool, fresh, OrderState::TicketingInProgress).await?;

    let stats = stuck_ticketing::run_once(&h.pool, &h.service, &h.config, &ctx).await?;
    assert!(stats.transitioned >= 1);

    assert_eq!(
        aero_testkit::state_of(&h.pool, stale).await?,
        OrderState::TicketingFailed
    );
    assert_eq!(
        aero_testkit::state_of(&h.pool, fresh).await?,
        OrderState::TicketingInProgress
    );

    // The synthetic failure is recorded like any issuance failure, so
    // the retry job's failure count sees it.
    assert_eq!(
        aero_db::history::count_issuance_failures(&h.pool, stale).await?,
        1
    );
    let history = h.service.history(stale).await?;
    let rec = history.iter().find(|r| r.success).expect("committed row");
    assert_eq!(rec.event, "TICKETING_FAILURE");
    let ctx_json = rec.request_context.as_ref().expect("context");
    assert_eq!(ctx_json["issuance_error"], "TIMEOUT");

    Ok(())
}
