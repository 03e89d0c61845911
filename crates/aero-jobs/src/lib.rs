//! Scheduled control loops.
//!
//! Three periodic jobs keep the order population moving without user
//! action: unpaid orders time out into cancellation, stalled issuance is
//! failed so it can be retried, and repeatedly failed issuance is retried
//! up to a cap and then escalated to cancellation.
//!
//! # Leadership
//!
//! Several instances of the service may run at once. Before scanning,
//! each tick takes the job's leadership lock (`job:{name}`) with this
//! instance's id; losing the acquire means another instance is running
//! this tick, so the loser just skips and retries next interval. The
//! lease is renewed during long scans and released at tick end.
//!
//! # Failure tolerance
//!
//! A job tick injects synthetic events through the same state machine
//! service as user traffic, one order at a time. Rejections are normal:
//! an order a user just paid is no longer PENDING_PAYMENT, a busy lock
//! means someone else is operating on the order right now. Neither stops
//! the rest of the batch.

use aero_model::Actor;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

use aero_config::Config;
use aero_engine::StateMachineService;

pub mod cancel_unpaid;
pub mod retry_failed;
pub mod stuck_ticketing;

/// Renew the job lease after this many processed orders.
const RENEW_EVERY: usize = 50;

/// What one tick of a job did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Orders matched by the scan.
    pub scanned: usize,
    /// Transitions that committed.
    pub transitioned: usize,
    /// Orders skipped: guard rejections, busy locks, per-order errors.
    pub skipped: usize,
}

/// Identity one job loop runs under: the job name, the process instance
/// holding its leadership lease, and the actor its events carry.
#[derive(Debug, Clone)]
pub struct JobCtx {
    pub name: &'static str,
    pub instance: String,
    pub actor: Actor,
}

impl JobCtx {
    pub fn new(name: &'static str, instance: impl Into<String>) -> Self {
        let instance = instance.into();
        let actor = Actor::job(name, &instance);
        Self {
            name,
            instance,
            actor,
        }
    }
}

/// Stable identity for this process instance, used as the leadership
/// lock holder and in job actor ids.
pub fn instance_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "local".to_string());
    format!("{host}-{}", Uuid::new_v4().simple())
}

type TickFuture<'a> =
    std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<JobStats>> + Send + 'a>>;

type TickFn =
    for<'a> fn(&'a PgPool, &'a StateMachineService, &'a Config, &'a JobCtx) -> TickFuture<'a>;

pub fn cancel_unpaid_tick<'a>(
    pool: &'a PgPool,
    svc: &'a StateMachineService,
    cfg: &'a Config,
    ctx: &'a JobCtx,
) -> TickFuture<'a> {
    Box::pin(cancel_unpaid::run_once(pool, svc, cfg, ctx))
}

pub fn stuck_ticketing_tick<'a>(
    pool: &'a PgPool,
    svc: &'a StateMachineService,
    cfg: &'a Config,
    ctx: &'a JobCtx,
) -> TickFuture<'a> {
    Box::pin(stuck_ticketing::run_once(pool, svc, cfg, ctx))
}

pub fn retry_failed_tick<'a>(
    pool: &'a PgPool,
    svc: &'a StateMachineService,
    cfg: &'a Config,
    ctx: &'a JobCtx,
) -> TickFuture<'a> {
    Box::pin(retry_failed::run_once(pool, svc, cfg, ctx))
}

/// Spawn all three job loops onto the runtime.
pub fn spawn_all(pool: PgPool, service: StateMachineService, cfg: Arc<Config>) {
    let instance = instance_id();
    info!(instance = %instance, "starting scheduled jobs");

    let jobs: [(&'static str, u64, TickFn); 3] = [
        (
            "cancel_unpaid",
            cfg.cancel_unpaid_interval_secs,
            cancel_unpaid_tick,
        ),
        (
            "stuck_ticketing",
            cfg.stuck_ticketing_interval_secs,
            stuck_ticketing_tick,
        ),
        (
            "retry_failed",
            cfg.retry_failed_interval_secs,
            retry_failed_tick,
        ),
    ];

    for (name, interval_secs, tick) in jobs {
        spawn_job(
            JobCtx::new(name, instance.clone()),
            Duration::from_secs(interval_secs),
            pool.clone(),
            service.clone(),
            Arc::clone(&cfg),
            tick,
        );
    }
}

/// One periodic loop: tick on an interval, run under job leadership.
fn spawn_job(
    ctx: JobCtx,
    interval: Duration,
    pool: PgPool,
    service: StateMachineService,
    cfg: Arc<Config>,
    tick: TickFn,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match run_guarded(&pool, &service, &cfg, &ctx, tick).await {
                Ok(Some(stats)) => {
                    if stats.scanned > 0 {
                        info!(
                            job = ctx.name,
                            scanned = stats.scanned,
                            transitioned = stats.transitioned,
                            skipped = stats.skipped,
                            "job tick complete"
                        );
                    }
                }
                Ok(None) => {
                    debug!(job = ctx.name, "another instance holds the job lock; skipping tick");
                }
                Err(e) => {
                    error!(job = ctx.name, error = %e, "job tick failed");
                }
            }
        }
    });
}

/// Take leadership, run the tick, always release. `None` = lost the
/// leadership race this tick.
pub async fn run_guarded(
    pool: &PgPool,
    service: &StateMachineService,
    cfg: &Config,
    ctx: &JobCtx,
    tick: TickFn,
) -> anyhow::Result<Option<JobStats>> {
    let lock_name = aero_db::lock::job_lock_name(ctx.name);
    let lease = Duration::from_secs(cfg.job_lease_secs);

    if !aero_db::lock::acquire(pool, &lock_name, &ctx.instance, lease).await? {
        return Ok(None);
    }

    let result = tick(pool, service, cfg, ctx).await;

    if let Err(e) = aero_db::lock::release(pool, &lock_name, &ctx.instance).await {
        error!(job = ctx.name, error = %e, "job lock release failed; lease will expire");
    }

    result.map(Some)
}

/// Renew the job lease mid-scan so a large batch cannot outlive it.
/// Returns `false` when leadership was lost (lease expired under us);
/// the tick must stop, another instance may already be scanning.
pub(crate) async fn renew_leadership(
    pool: &PgPool,
    cfg: &Config,
    ctx: &JobCtx,
    processed: usize,
) -> bool {
    if processed == 0 || processed % RENEW_EVERY != 0 {
        return true;
    }

    let lock_name = aero_db::lock::job_lock_name(ctx.name);
    let lease = Duration::from_secs(cfg.job_lease_secs);
    match aero_db::lock::renew(pool, &lock_name, &ctx.instance, lease).await {
        Ok(true) => true,
        Ok(false) => {
            error!(job = ctx.name, "job leadership lost mid-scan; stopping tick");
            false
        }
        Err(e) => {
            error!(job = ctx.name, error = %e, "job lease renew failed; stopping tick");
            false
        }
    }
}
