//! Order rows: creation, fresh reads, state persistence, job scans.
//!
//! `update_state` is called only by the action executor, after the
//! caller has acquired the order's lock and re-validated the transition
//! against a fresh read. No other write path touches `orders.state`.

use aero_model::OrderState;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Fields supplied at creation. State starts at PENDING_PAYMENT via the
/// schema default; the order number is assigned once and never changes.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub order_number: String,
    pub owner_user_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[derive(Debug, Clone)]
pub struct OrderRow {
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

/// Generate a human-facing order number. Uniqueness is backed by the
/// unique index on `orders.order_number`; the uuid-derived suffix makes
/// collisions a non-event in practice.
pub fn generate_order_number(id: Uuid) -> String {
    let hex = id.simple().to_string();
    format!("AO-{}", &hex[..12].to_uppercase())
}

pub async fn insert_order(pool: &PgPool, order: &NewOrder) -> Result<()> {
    sqlx::query(
        r#"
        insert into orders (id, order_number, owner_user_id, amount_cents, currency)
        values ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(order.id)
    .bind(&order.order_number)
    .bind(&order.owner_user_id)
    .bind(order.amount_cents)
    .bind(&order.currency)
    .execute(pool)
    .await
    .context("insert_order failed")?;

    Ok(())
}

/// Fresh read of a single order. Always hits the database; order state is
/// never cached in-process.
pub async fn fetch_order(pool: &PgPool, id: Uuid) -> Result<Option<OrderRow>> {
    let row = sqlx::query(
        r#"
        select id, order_number, owner_user_id, amount_cents, currency,
               state, ticket_ref, created_at, updated_at
        from orders
        where id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("fetch_order failed")?;

    row.map(row_to_order).transpose()
}

/// Persist the outcome of a committed transition. `ticket_ref`, when
/// present, is recorded alongside the state (set on TICKETING_SUCCESS).
pub async fn update_state(
    pool: &PgPool,
    id: Uuid,
    new_state: OrderState,
    ticket_ref: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        update orders
        set state = $2,
            ticket_ref = coalesce($3, ticket_ref),
            updated_at = now()
        where id = $1
        "#,
    )
    .bind(id)
    .bind(new_state.as_str())
    .bind(ticket_ref)
    .execute(pool)
    .await
    .context("update_state failed")?;

    Ok(())
}

/// Orders still PENDING_PAYMENT after `older_than_secs`. Oldest first so
/// repeated ticks drain the backlog in creation order.
pub async fn scan_unpaid_older_than(
    pool: &PgPool,
    older_than_secs: f64,
    limit: i64,
) -> Result<Vec<OrderRow>> {
    scan_by_age(
        pool,
        "PENDING_PAYMENT",
        "created_at",
        older_than_secs,
        limit,
    )
    .await
}

/// Orders sitting in TICKETING_IN_PROGRESS past the stall threshold,
/// measured from the transition that put them there.
pub async fn scan_ticketing_stuck(
    pool: &PgPool,
    older_than_secs: f64,
    limit: i64,
) -> Result<Vec<OrderRow>> {
    scan_by_age(
        pool,
        "TICKETING_IN_PROGRESS",
        "updated_at",
        older_than_secs,
        limit,
    )
    .await
}

/// Orders awaiting a retry-or-escalate decision.
pub async fn scan_ticketing_failed(pool: &PgPool, limit: i64) -> Result<Vec<OrderRow>> {
    let rows = sqlx::query(
        r#"
        select id, order_number, owner_user_id, amount_cents, currency,
               state, ticket_ref, created_at, updated_at
        from orders
        where state = 'TICKETING_FAILED'
        order by updated_at
        limit $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("scan_ticketing_failed failed")?;

    rows.into_iter().map(row_to_order).collect()
}

async fn scan_by_age(
    pool: &PgPool,
    state: &str,
    age_column: &str,
    older_than_secs: f64,
    limit: i64,
) -> Result<Vec<OrderRow>> {
    // age_column is one of two compile-time literals; never user input.
    let sql = format!(
        r#"
        select id, order_number, owner_user_id, amount_cents, currency,
               state, ticket_ref, created_at, updated_at
        from orders
        where state = $1
          and {age_column} < now() - make_interval(secs => $2)
        order by {age_column}
        limit $3
        "#
    );

    let rows = sqlx::query(&sql)
        .bind(state)
        .bind(older_than_secs)
        .bind(limit)
        .fetch_all(pool)
        .await
        .with_context(|| format!("scan of {state} orders failed"))?;

    rows.into_iter().map(row_to_order).collect()
}

fn row_to_order(row: sqlx::postgres::PgRow) -> Result<OrderRow> {
    let state_text: String = row.try_get("state")?;
    let state = OrderState::parse(&state_text)
        .ok_or_else(|| anyhow!("invalid order state in storage: {state_text}"))?;

    Ok(OrderRow {
        id: row.try_get("id")?,
        order_number: row.try_get("order_number")?,
        owner_user_id: row.try_get("owner_user_id")?,
        amount_cents: row.try_get("amount_cents")?,
        currency: row.try_get("currency")?,
        state,
        ticket_ref: row.try_get("ticket_ref")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
