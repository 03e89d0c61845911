//! Scenario: Authorization Guard
//!
//! # Invariant under test
//! A customer may only operate on orders they own; administrators and
//! the system identity may operate on any order. A forbidden attempt
//! moves nothing and is recorded as a failure.
//!
//! All tests skip gracefully when `AERO_DATABASE_URL` is not set.

use aero_model::{Actor, ActorRole, OrderEvent, OrderState, TransitionError};
use aero_testkit::{make_harness, seed_order};

#[tokio::test]
#[ignore = "requires AERO_DATABASE_URL; run with -- --include-ignored"]
async fn stranger_cannot_pay_someone_elses_order() -> anyhow::Result<()> {
    let h = make_harness().await?;
    let order_id = seed_order(&h.pool, "u-1").await?;
    let stranger = Actor::new("u-2", ActorRole::Customer);

    let err = h
        .service
        .trigger(order_id, OrderEvent::Pay, &stranger, None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        TransitionError::Forbidden {
            actor_id: "u-2".into()
        }
    );

    assert_eq!(
        aero_testkit::state_of(&h.pool, order_id).await?,
        OrderState::PendingPayment
    );

    let history = h.service.history(order_id).await?;
    assert_eq!(history.len(), 1);
    assert!(!history[0].success);
    assert_eq!(history[0].actor_id, "u-2");

    Ok(())
}

#[tokio::test]
#[ignore = "requires AERO_DATABASE_URL; run with -- --include-ignored"]
async fn admin_may_cancel_any_order() -> anyhow::Result<()> {
    let h = make_harness().await?;
    let order_id = seed_order(&h.pool, "u-1").await?;
    let admin = Actor::new("ops-7", ActorRole::Admin);

    let state = h
        .service
        .trigger(order_id, OrderEvent::Cancel, &admin, None)
        .await?;
    assert_eq!(state, OrderState::Cancelled);

    Ok(())
}

#[tokio::test]
#[ignore = "requires AERO_DATABASE_URL; run with -- --include-ignored"]
async fn owner_may_cancel_their_own_order() -> anyhow::Result<()> {
    let h = make_harness().await?;
    let order_id = seed_order(&h.pool, "u-1").await?;
    let owner = Actor::new("u-1", ActorRole::Customer);

    let state = h
        .service
        .trigger(order_id, OrderEvent::Cancel, &owner, None)
        .await?;
    assert_eq!(state, OrderState::Cancelled);

    // Cancelled before payment: no money was taken, so no refund starts.
    assert!(h.payments.refunds().is_empty());

    Ok(())
}
