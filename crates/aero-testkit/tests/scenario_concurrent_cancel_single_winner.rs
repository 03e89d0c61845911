//! Scenario: Concurrent Cancels, Exactly One Winner
//!
//! # Invariant under test
//! Two simultaneous CANCEL attempts on the same PAID order commit at
//! most one cancellation. The loser either finds the lock busy, or
//! acquires it after the winner released and is rejected by the guard
//! because the state is already CANCELLED. Either way exactly one
//! refund starts.
//!
//! All tests skip gracefully when `AERO_DATABASE_URL` is not set.

use aero_model::{Actor, ActorRole, OrderEvent, OrderState, TransitionError};
use aero_testkit::{make_harness, seed_order};

#[tokio::test]
#[ignore = "requires AERO_DATABASE_URL; run with -- --include-ignored"]
async fn two_concurrent_cancels_commit_exactly_once() -> anyhow::Result<()> {
    let h = make_harness().await?;
    let order_id = seed_order(&h.pool, "u-1").await?;
    let owner = Actor::new("u-1", ActorRole::Customer);

    h.service
        .trigger(order_id, OrderEvent::Pay, &owner, None)
        .await?;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let svc = h.service.clone();
        let actor = owner.clone();
        handles.push(tokio::spawn(async move {
            svc.trigger(order_id, OrderEvent::Cancel, &actor, None).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await? {
            Ok(state) => {
                assert_eq!(state, OrderState::Cancelled);
                wins += 1;
            }
            Err(TransitionError::Busy) => {}
            Err(TransitionError::IllegalTransition { from, event }) => {
                // The loser acquired after the winner: the order is
                // already terminal.
                assert_eq!(from, OrderState::Cancelled);
                assert_eq!(event, OrderEvent::Cancel);
            }
            Err(other) => panic!("unexpected loser outcome: {other}"),
        }
    }

    assert_eq!(wins, 1, "exactly one cancel must commit");
    assert_eq!(
        aero_testkit::state_of(&h.pool, order_id).await?,
        OrderState::Cancelled
    );
    assert_eq!(
        h.payments.refunds(),
        vec![order_id],
        "exactly one refund must start"
    );

    Ok(())
}

#[tokio::test]
#[ignore = "requires AERO_DATABASE_URL; run with -- --include-ignored"]
async fn held_order_lock_makes_trigger_busy_with_no_side_effects() -> anyhow::Result<()> {
    let h = make_harness().await?;
    let order_id = seed_order(&h.pool, "u-1").await?;
    let owner = Actor::new("u-1", ActorRole::Customer);

    // Another party (e.g. a concurrent request on another instance)
    // holds the order's lock.
    let lock_name = aero_db::lock::order_lock_name(order_id);
    assert!(
        aero_db::lock::acquire(
            &h.pool,
            &lock_name,
            "foreign-request",
            std::time::Duration::from_secs(30)
        )
        .await?
    );

    let err = h
        .service
        .trigger(order_id, OrderEvent::Pay, &owner, None)
        .await
        .unwrap_err();
    assert_eq!(err, TransitionError::Busy);
    assert!(err.is_retryable());

    assert_eq!(
        aero_testkit::state_of(&h.pool, order_id).await?,
        OrderState::PendingPayment,
        "a busy rejection must have no side effects"
    );

    // The busy attempt is still in the history, with no known from-state.
    let history = h.service.history(order_id).await?;
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert!(history[0].from_state.is_none());

    // Once the foreign holder releases, the same call goes through.
    aero_db::lock::release(&h.pool, &lock_name, "foreign-request").await?;
    let state = h
        .service
        .trigger(order_id, OrderEvent::Pay, &owner, None)
        .await?;
    assert_eq!(state, OrderState::Paid);

    Ok(())
}
