use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

/// Env var naming a JSON config file. Defaults apply when unset.
pub const ENV_CONFIG_PATH: &str = "AERO_CONFIG_PATH";

/// Hard ceiling on any lock lease. A crashed holder must never be able to
/// block an order or a job for longer than this; lease expiry is the only
/// recovery mechanism for holder failure.
pub const MAX_LEASE_SECS: u64 = 1800;

/// Effective configuration for the order backend.
///
/// Timeouts, retry caps, and lease durations are deployment-tunable; the
/// serde defaults below are the tested constants a bare deployment runs
/// with. All durations are whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Daemon bind address.
    pub daemon_addr: String,
    /// Orders still PENDING_PAYMENT after this many seconds are
    /// auto-cancelled by the unpaid-timeout job.
    pub payment_timeout_secs: u64,
    /// Orders TICKETING_IN_PROGRESS for longer than this are treated as a
    /// stalled external call and failed by the stuck-issuance job.
    pub ticketing_stuck_timeout_secs: u64,
    /// Issuance failures per order before the retry job gives up and
    /// cancels instead.
    pub ticketing_retry_cap: u32,
    /// Lease on the per-order transition lock.
    pub order_lease_secs: u64,
    /// Lease on scheduled-job leadership locks.
    pub job_lease_secs: u64,
    /// Tick intervals for the three scheduled jobs.
    pub cancel_unpaid_interval_secs: u64,
    pub stuck_ticketing_interval_secs: u64,
    pub retry_failed_interval_secs: u64,
    /// Max orders one job tick will pull from a scan.
    pub scan_batch_limit: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon_addr: "127.0.0.1:8710".to_string(),
            payment_timeout_secs: 900,
            ticketing_stuck_timeout_secs: 600,
            ticketing_retry_cap: 3,
            order_lease_secs: 30,
            job_lease_secs: 1800,
            cancel_unpaid_interval_secs: 60,
            stuck_ticketing_interval_secs: 60,
            retry_failed_interval_secs: 120,
            scan_batch_limit: 200,
        }
    }
}

impl Config {
    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {:?}", path))?;
        let cfg: Config = serde_json::from_str(&raw)
            .with_context(|| format!("parse config file {:?}", path))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from the file named by `AERO_CONFIG_PATH`, or defaults when the
    /// env var is unset.
    pub fn load_from_env() -> Result<Self> {
        match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) => Self::load(path),
            Err(_) => {
                let cfg = Self::default();
                cfg.validate()?;
                Ok(cfg)
            }
        }
    }

    /// Reject configurations that would break the lease protocol.
    pub fn validate(&self) -> Result<()> {
        if self.order_lease_secs == 0 || self.job_lease_secs == 0 {
            bail!("lease durations must be > 0");
        }
        if self.order_lease_secs > MAX_LEASE_SECS || self.job_lease_secs > MAX_LEASE_SECS {
            bail!(
                "lease durations must not exceed {} seconds (lease expiry is the only \
                 crashed-holder recovery)",
                MAX_LEASE_SECS
            );
        }
        if self.cancel_unpaid_interval_secs == 0
            || self.stuck_ticketing_interval_secs == 0
            || self.retry_failed_interval_secs == 0
        {
            bail!("job intervals must be > 0");
        }
        if self.scan_batch_limit <= 0 {
            bail!("scan_batch_limit must be > 0");
        }
        Ok(())
    }

    /// Stable hash of the effective config, logged at boot so operators can
    /// tell which configuration an instance is actually running.
    pub fn config_hash(&self) -> String {
        let raw = serde_json::to_value(self).unwrap_or(Value::Null);
        let canonical = serde_json::to_string(&sort_keys(&raw)).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Canonicalize by sorting object keys recursively.
fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        cfg.validate().expect("defaults must validate");
        assert_eq!(cfg.ticketing_retry_cap, 3);
        assert_eq!(cfg.order_lease_secs, 30);
        assert_eq!(cfg.job_lease_secs, 1800);
    }

    #[test]
    fn oversized_lease_rejected() {
        let cfg = Config {
            job_lease_secs: MAX_LEASE_SECS + 1,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let cfg = Config {
            cancel_unpaid_interval_secs: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hash_is_stable_and_sensitive() {
        let a = Config::default();
        let b = Config::default();
        assert_eq!(a.config_hash(), b.config_hash());

        let c = Config {
            payment_timeout_secs: 901,
            ..Config::default()
        };
        assert_ne!(a.config_hash(), c.config_hash());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        write!(f, r#"{{ "payment_timeout_secs": 120 }}"#).expect("write");

        let cfg = Config::load(f.path()).expect("load");
        assert_eq!(cfg.payment_timeout_secs, 120);
        assert_eq!(cfg.ticketing_retry_cap, 3, "unset keys take defaults");
    }
}
