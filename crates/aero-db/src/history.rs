//! Append-only transition history.
//!
//! One row per transition attempt, success or failure. Rows are never
//! updated or deleted; the table is the diagnostic record for lock
//! contention, repeated issuance failures, and authorization rejections.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewHistory {
    pub order_id: Uuid,
    /// None when the attempt failed before the order was loaded (e.g. the
    /// lock was busy).
    pub from_state: Option<String>,
    /// None on failed attempts.
    pub to_state: Option<String>,
    pub event: String,
    pub actor_id: String,
    pub actor_role: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub request_context: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub id: i64,
    pub order_id: Uuid,
    pub from_state: Option<String>,
    pub to_state: Option<String>,
    pub event: String,
    pub actor_id: String,
    pub actor_role: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub request_context: Option<Value>,
    pub ts_utc: DateTime<Utc>,
}

/// Insert one history row (append-only semantics enforced at app layer).
pub async fn append_history(pool: &PgPool, rec: &NewHistory) -> Result<()> {
    sqlx::query(
        r#"
        insert into order_state_history (
          order_id, from_state, to_state, event, actor_id, actor_role,
          success, error_message, request_context
        ) values (
          $1, $2, $3, $4, $5, $6, $7, $8, $9
        )
        "#,
    )
    .bind(rec.order_id)
    .bind(&rec.from_state)
    .bind(&rec.to_state)
    .bind(&rec.event)
    .bind(&rec.actor_id)
    .bind(&rec.actor_role)
    .bind(rec.success)
    .bind(&rec.error_message)
    .bind(&rec.request_context)
    .execute(pool)
    .await
    .context("append_history failed")?;

    Ok(())
}

/// Full history of one order, oldest first.
pub async fn fetch_history(pool: &PgPool, order_id: Uuid) -> Result<Vec<HistoryRow>> {
    let rows = sqlx::query(
        r#"
        select id, order_id, from_state, to_state, event, actor_id,
               actor_role, success, error_message, request_context, ts_utc
        from order_state_history
        where order_id = $1
        order by id
        "#,
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
    .context("fetch_history failed")?;

    rows.into_iter()
        .map(|row| {
            Ok(HistoryRow {
                id: row.try_get("id")?,
                order_id: row.try_get("order_id")?,
                from_state: row.try_get("from_state")?,
                to_state: row.try_get("to_state")?,
                event: row.try_get("event")?,
                actor_id: row.try_get("actor_id")?,
                actor_role: row.try_get("actor_role")?,
                success: row.try_get("success")?,
                error_message: row.try_get("error_message")?,
                request_context: row.try_get("request_context")?,
                ts_utc: row.try_get("ts_utc")?,
            })
        })
        .collect()
}

/// How many times issuance has failed for this order: committed
/// transitions into TICKETING_FAILED. Drives the retry-or-escalate
/// decision of the failed-issuance job.
pub async fn count_issuance_failures(pool: &PgPool, order_id: Uuid) -> Result<i64> {
    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from order_state_history
        where order_id = $1
          and to_state = 'TICKETING_FAILED'
          and success
        "#,
    )
    .bind(order_id)
    .fetch_one(pool)
    .await
    .context("count_issuance_failures failed")?;

    Ok(n)
}
