//! Lease locks over shared storage.
//!
//! # Invariants
//!
//! 1. **At most one live lease per name.** `acquire` is a single atomic
//!    upsert: it writes the row only where no row exists or the existing
//!    lease has expired. There is no read-then-write window.
//! 2. **Holder-guarded release and renew.** A party that lost its lease to
//!    expiry and reacquisition cannot release or extend the new holder's
//!    lock: both statements match on `locked_by`.
//! 3. **Bounded leases.** Leases are capped at [`MAX_LEASE_SECS`]; expiry
//!    is the sole recovery mechanism for a crashed holder, so an unbounded
//!    lease would be a permanent wedge.
//!
//! Lock state lives only in the `locks` table, so the mutual exclusion
//! holds across every deployed instance sharing the database.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

/// Hard ceiling on any lease. Mirrored by `aero_config::MAX_LEASE_SECS`.
pub const MAX_LEASE_SECS: u64 = 1800;

/// Lock name serializing all transitions of one order.
pub fn order_lock_name(order_id: Uuid) -> String {
    format!("order:{order_id}")
}

/// Lock name electing a single leader per scheduled job across instances.
pub fn job_lock_name(job_name: &str) -> String {
    format!("job:{job_name}")
}

/// Atomically take the lock unless an unexpired lease exists.
///
/// Returns `true` when this call obtained the lease, `false` when another
/// holder's lease is still live. Errors only on storage failure or an
/// over-limit lease request.
pub async fn acquire(pool: &PgPool, name: &str, holder: &str, lease: Duration) -> Result<bool> {
    let lease_secs = checked_lease_secs(lease)?;

    // Single-statement compare-and-set: insert wins an absent name, the
    // conflict arm wins an expired one, and a live lease matches neither.
    let res = sqlx::query(
        r#"
        insert into locks (name, locked_by, locked_at, lock_until)
        values ($1, $2, now(), now() + make_interval(secs => $3))
        on conflict (name) do update
        set locked_by = excluded.locked_by,
            locked_at = excluded.locked_at,
            lock_until = excluded.lock_until
        where locks.lock_until <= now()
        "#,
    )
    .bind(name)
    .bind(holder)
    .bind(lease_secs)
    .execute(pool)
    .await
    .with_context(|| format!("lock acquire failed for {name}"))?;

    Ok(res.rows_affected() == 1)
}

/// Release the lock if `holder` still owns it.
///
/// Returns `false` when the name is unlocked or owned by someone else
/// (the lease expired and was reacquired); that outcome is not an error.
pub async fn release(pool: &PgPool, name: &str, holder: &str) -> Result<bool> {
    let res = sqlx::query(
        r#"
        delete from locks
        where name = $1 and locked_by = $2
        "#,
    )
    .bind(name)
    .bind(holder)
    .execute(pool)
    .await
    .with_context(|| format!("lock release failed for {name}"))?;

    Ok(res.rows_affected() == 1)
}

/// Extend a live lease held by `holder`. Used by long-running job
/// executions that would otherwise outlive their lease mid-scan.
///
/// Returns `false` when the lease already expired or belongs to another
/// holder; the caller must treat that as lost leadership.
pub async fn renew(pool: &PgPool, name: &str, holder: &str, lease: Duration) -> Result<bool> {
    let lease_secs = checked_lease_secs(lease)?;

    let res = sqlx::query(
        r#"
        update locks
        set lock_until = now() + make_interval(secs => $3)
        where name = $1 and locked_by = $2 and lock_until > now()
        "#,
    )
    .bind(name)
    .bind(holder)
    .bind(lease_secs)
    .execute(pool)
    .await
    .with_context(|| format!("lock renew failed for {name}"))?;

    Ok(res.rows_affected() == 1)
}

/// Diagnostic read of a lock row (tests, operator tooling).
pub async fn fetch_lock(pool: &PgPool, name: &str) -> Result<Option<LockRow>> {
    let row = sqlx::query(
        r#"
        select name, locked_by, locked_at, lock_until
        from locks
        where name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("fetch_lock failed for {name}"))?;

    row.map(|r| {
        Ok(LockRow {
            name: r.try_get("name")?,
            locked_by: r.try_get("locked_by")?,
            locked_at: r.try_get("locked_at")?,
            lock_until: r.try_get("lock_until")?,
        })
    })
    .transpose()
}

#[derive(Debug, Clone)]
pub struct LockRow {
    pub name: String,
    pub locked_by: String,
    pub locked_at: DateTime<Utc>,
    pub lock_until: DateTime<Utc>,
}

fn checked_lease_secs(lease: Duration) -> Result<f64> {
    let secs = lease.as_secs_f64();
    if secs <= 0.0 {
        bail!("lease must be > 0");
    }
    if secs > MAX_LEASE_SECS as f64 {
        bail!("lease {secs}s exceeds the {MAX_LEASE_SECS}s ceiling");
    }
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_names_are_namespaced() {
        let id = Uuid::nil();
        assert_eq!(
            order_lock_name(id),
            "order:00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(job_lock_name("cancel_unpaid"), "job:cancel_unpaid");
    }

    #[test]
    fn lease_bounds_are_enforced() {
        assert!(checked_lease_secs(Duration::from_secs(0)).is_err());
        assert!(checked_lease_secs(Duration::from_secs(30)).is_ok());
        assert!(checked_lease_secs(Duration::from_secs(MAX_LEASE_SECS)).is_ok());
        assert!(checked_lease_secs(Duration::from_secs(MAX_LEASE_SECS + 1)).is_err());
    }
}
